//! Fixed-capacity append-and-evict buffers.
//!
//! Used identically for user history (capacity 15) and group message logs
//! (capacity 50). The retained items are always the most recent `capacity`
//! appended, in chronological order.

/// Append `item` and evict from the front until `len <= capacity`.
///
/// A capacity of zero keeps nothing. Returns the number of evicted items.
pub fn push_bounded<T>(buffer: &mut Vec<T>, item: T, capacity: usize) -> usize {
    buffer.push(item);
    truncate_front(buffer, capacity)
}

/// Evict the oldest items until `len <= capacity`. Returns how many went.
pub fn truncate_front<T>(buffer: &mut Vec<T>, capacity: usize) -> usize {
    let excess = buffer.len().saturating_sub(capacity);
    if excess > 0 {
        buffer.drain(..excess);
    }
    excess
}

/// Pure form of [`push_bounded`]: consumes the buffer and returns the new one.
#[must_use]
pub fn appended<T>(mut buffer: Vec<T>, item: T, capacity: usize) -> Vec<T> {
    push_bounded(&mut buffer, item, capacity);
    buffer
}
