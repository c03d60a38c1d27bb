use super::*;
use crate::llm::Role;

#[test]
fn polish_wraps_text_verbatim() {
    let conv = build_conversation("polish_text", "teh quick fox", &ActionParams::default()).unwrap();

    let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User]);
    assert!(conv.system().starts_with("You are a seasoned copywriter"));
    assert_eq!(
        conv.user(),
        "Polish and optimize the following text:\n\nteh quick fox"
    );
}

#[test]
fn summarize_asks_for_dash_bullets() {
    let conv = build_conversation("summarize_points", "A. B. C.", &ActionParams::default()).unwrap();

    assert!(conv.system().contains("'-'"));
    assert!(conv.user().ends_with("A. B. C."));
}

#[test]
fn translate_names_the_language_in_both_messages() {
    let conv = build_conversation("translate", "Hello", &ActionParams::translate_to("French")).unwrap();

    assert!(conv.system().contains("into French."));
    assert_eq!(
        conv.user(),
        "Please translate the following text into French:\n\nHello"
    );
}

#[test]
fn translate_without_language_fails() {
    assert_eq!(
        build_conversation("translate", "Hello", &ActionParams::default()),
        Err(PromptError::MissingTargetLanguage)
    );
    assert_eq!(
        build_conversation("translate", "Hello", &ActionParams::translate_to("  ")),
        Err(PromptError::MissingTargetLanguage)
    );
}

#[test]
fn unknown_action_is_rejected() {
    assert_eq!(
        build_conversation("rewrite", "x", &ActionParams::default()),
        Err(PromptError::UnknownAction {
            action: "rewrite".into()
        })
    );
}

#[test]
fn placeholders_inside_user_text_stay_literal() {
    let text = "keep {target_language} and {text} as typed";
    let conv = build_for(Action::Translate, text, &ActionParams::translate_to("Korean")).unwrap();

    assert!(conv.user().ends_with(text));
}

#[test]
fn ids_round_trip_through_from_id() {
    for action in Action::ALL {
        assert_eq!(Action::from_id(action.id()), Ok(action));
        assert_eq!(action.to_string(), action.id());
    }
}
