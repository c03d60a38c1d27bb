//! Action registry: maps an action and the captured text to a conversation.
//!
//! Pure lookups only. A missing template or parameter is reported as a
//! `PromptError` before anything is sent anywhere.

use crate::llm::Conversation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("Unknown action: {action}")]
    UnknownAction { action: String },
    #[error("Translation needs a target language")]
    MissingTargetLanguage,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    #[serde(rename = "polish_text")]
    Polish,
    #[serde(rename = "summarize_points")]
    Summarize,
    #[serde(rename = "translate")]
    Translate,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Polish, Action::Summarize, Action::Translate];

    pub fn id(self) -> &'static str {
        match self {
            Action::Polish => "polish_text",
            Action::Summarize => "summarize_points",
            Action::Translate => "translate",
        }
    }

    pub fn from_id(id: &str) -> Result<Self, PromptError> {
        Action::ALL
            .into_iter()
            .find(|action| action.id() == id)
            .ok_or_else(|| PromptError::UnknownAction {
                action: id.to_string(),
            })
    }

    fn template(self) -> &'static PromptTemplate {
        match self {
            Action::Polish => &POLISH,
            Action::Summarize => &SUMMARIZE,
            Action::Translate => &TRANSLATE,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Extra inputs some actions need.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionParams {
    pub target_language: Option<String>,
}

impl ActionParams {
    pub fn translate_to(language: impl Into<String>) -> Self {
        Self {
            target_language: Some(language.into()),
        }
    }

    fn target_language(&self) -> Option<&str> {
        self.target_language
            .as_deref()
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
    }
}

/// Immutable instruction pair. `{text}` and `{target_language}` are
/// substituted at build time.
#[derive(Debug)]
pub struct PromptTemplate {
    pub system: &'static str,
    pub user: &'static str,
}

/* ---------- templates ---------- */

static POLISH: PromptTemplate = PromptTemplate {
    system: "You are a seasoned copywriter and language polishing expert. Your task is to optimize and improve the text provided by users, ensuring it meets the highest standards in terms of grammar, style, clarity, and persuasiveness. Please output only the optimized text without any introductory remarks, conclusions, or explanatory language.",
    user: "Polish and optimize the following text:\n\n{text}",
};

static SUMMARIZE: PromptTemplate = PromptTemplate {
    system: "You are an efficient information analyst. Your task is to precisely extract key points from the text provided by users and present them clearly in an unordered list (using '-' as a prefix). The summary should be comprehensive yet concise, outputting only the final bullet point list.",
    user: "Summarize the main points of the following text:\n\n{text}",
};

static TRANSLATE: PromptTemplate = PromptTemplate {
    system: "You are a professional translator. Your task is to accurately translate the user's text into {target_language}. Provide only the translated text, without any additional explanations, comments, or the original text.",
    user: "Please translate the following text into {target_language}:\n\n{text}",
};

/// (menu label, language name) pairs offered by the translate menu.
pub const TRANSLATION_TARGETS: [(&str, &str); 5] = [
    ("中文", "Simplified Chinese"),
    ("English", "English"),
    ("日本語", "Japanese"),
    ("Français", "French"),
    ("한국어", "Korean"),
];

/// Resolves `action_id` and builds its conversation.
pub fn build_conversation(
    action_id: &str,
    text: &str,
    params: &ActionParams,
) -> Result<Conversation, PromptError> {
    build_for(Action::from_id(action_id)?, text, params)
}

pub fn build_for(
    action: Action,
    text: &str,
    params: &ActionParams,
) -> Result<Conversation, PromptError> {
    let template = action.template();
    let (system, user) = match action {
        Action::Translate => {
            let language = params
                .target_language()
                .ok_or(PromptError::MissingTargetLanguage)?;
            (
                template.system.replace("{target_language}", language),
                template
                    .user
                    .replace("{target_language}", language)
                    .replace("{text}", text),
            )
        }
        Action::Polish | Action::Summarize => (
            template.system.to_string(),
            template.user.replace("{text}", text),
        ),
    };
    Ok(Conversation::new(system, user))
}

#[cfg(test)]
mod tests;
