//! Prompt golden set.
//!
//! Renders representative turns through the built-in templates and checks
//! that what the model needs is present and that no placeholder leaks.

use confidant_llm::prompt::{self, PromptTemplates};
use confidant_llm::{OtherUser, PromptContext, Speaker, Turn};

/// A golden rendering case.
struct GoldenCase {
    name: &'static str,
    context: PromptContext,
    system_must_contain: Vec<&'static str>,
    user_must_contain: Vec<&'static str>,
}

fn facts(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

fn golden_cases() -> Vec<GoldenCase> {
    vec![
        // ---------------------------------------------------------------
        // 1. First contact: nothing known yet
        // ---------------------------------------------------------------
        GoldenCase {
            name: "first_contact",
            context: PromptContext {
                system: "You are Pip, a cheerful companion.".into(),
                ..PromptContext::new("Alex", "hi, I'm Alex from Porto")
            },
            system_must_contain: vec!["You are Pip", "talking with Alex", "- nothing yet", "[UPDATE:"],
            user_must_contain: vec!["(this is the first message)", "Alex: hi, I'm Alex from Porto"],
        },
        // ---------------------------------------------------------------
        // 2. Returning user with facts and history
        // ---------------------------------------------------------------
        GoldenCase {
            name: "returning_user",
            context: PromptContext {
                system: "You are Pip.".into(),
                language: "pt".into(),
                facts: facts(&[("city", "Porto"), ("name", "Alex"), ("pet", "a cat called Miso")]),
                history: vec![
                    Turn::new(Speaker::User, "Miso knocked over my coffee"),
                    Turn::new(Speaker::Assistant, "Classic Miso!"),
                ],
                ..PromptContext::new("Alex", "remind me to buy coffee in 30 minutes")
            },
            system_must_contain: vec!["\"pt\"", "- city: Porto", "- pet: a cat called Miso", "[REMIND:"],
            user_must_contain: vec!["Alex: Miso knocked over my coffee", "You: Classic Miso!"],
        },
        // ---------------------------------------------------------------
        // 3. Cross-user question
        // ---------------------------------------------------------------
        GoldenCase {
            name: "cross_user_question",
            context: PromptContext {
                system: "You are Pip.".into(),
                other: Some(OtherUser {
                    name: "Sam".into(),
                    facts: facts(&[("birthday", "June 3"), ("food", "ramen")]),
                }),
                ..PromptContext::new("Alex", "when is @sam's birthday?")
            },
            system_must_contain: vec!["talking with Alex"],
            user_must_contain: vec!["What you remember about Sam (another user):", "- birthday: June 3"],
        },
        // ---------------------------------------------------------------
        // 4. Message that looks like a template
        // ---------------------------------------------------------------
        GoldenCase {
            name: "message_with_braces",
            context: PromptContext::new("Kim", "what does {persona} mean?"),
            system_must_contain: vec!["talking with Kim"],
            user_must_contain: vec!["Kim: what does {persona} mean?"],
        },
    ]
}

#[test]
fn golden_cases_render() {
    let templates = PromptTemplates::builtin();
    for case in golden_cases() {
        let (system, user) = templates.render(&case.context);
        for needle in &case.system_must_contain {
            assert!(system.contains(needle), "[{}] system prompt missing {needle:?}:\n{system}", case.name);
        }
        for needle in &case.user_must_contain {
            assert!(user.contains(needle), "[{}] user prompt missing {needle:?}:\n{user}", case.name);
        }
        for placeholder in ["{display_name}", "{facts}", "{history}", "{other_section}", "{language}"] {
            assert!(!system.contains(placeholder), "[{}] system leaks {placeholder}", case.name);
            assert!(!user.contains(placeholder), "[{}] user leaks {placeholder}", case.name);
        }
    }
}

#[test]
fn system_prompt_teaches_both_directives() {
    for tag in ["[UPDATE: {", "[REMIND: {\"minutes\""] {
        assert!(prompt::SYSTEM_TEMPLATE.contains(tag), "system template must describe {tag}");
    }
    assert!(prompt::SYSTEM_TEMPLATE.contains("Never mention them"));
}

#[test]
fn user_template_ends_with_the_new_message() {
    assert!(prompt::USER_TEMPLATE.trim_end().ends_with("{message}"));
}
