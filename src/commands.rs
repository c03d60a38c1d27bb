//! Shell commands standing in for the hotkeys and toolbar buttons.

use crate::capture::ActivationMode;
use crate::prompts::{Action, ActionParams, TRANSLATION_TARGETS};
use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
auto                  capture the current selection and open the panel
manual                use the clipboard contents and open the panel
polish | summarize    run an action on the captured text
translate <language>  translate (a menu number works too; bare `translate` lists them)
cancel                close the panel and ignore the running response
copy                  copy the response to the clipboard
providers             list configured providers
provider <name>       switch provider and save the settings
set <name> url=<u> model=<m> key=<k>
                      edit a provider (any subset of fields) and save
help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Activate(ActivationMode),
    Run { action: Action, params: ActionParams },
    TranslateMenu,
    Cancel,
    Copy,
    Providers,
    UseProvider(String),
    /// Unset fields keep their stored value.
    EditProvider {
        name: String,
        api_url: Option<String>,
        model_name: Option<String>,
        api_key: Option<String>,
    },
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}', type `help`")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("Expected url=, model= or key=, got '{0}'")]
    BadField(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "auto" => Command::Activate(ActivationMode::Auto),
            "manual" | "paste" => Command::Activate(ActivationMode::Manual),
            "polish" | "polish_text" => Command::Run {
                action: Action::Polish,
                params: ActionParams::default(),
            },
            "summarize" | "summarize_points" => Command::Run {
                action: Action::Summarize,
                params: ActionParams::default(),
            },
            "translate" if rest.is_empty() => Command::TranslateMenu,
            "translate" => Command::Run {
                action: Action::Translate,
                params: ActionParams::translate_to(target_language(rest)),
            },
            "cancel" | "esc" | "close" => Command::Cancel,
            "copy" => Command::Copy,
            "providers" => Command::Providers,
            "provider" if rest.is_empty() => return Err(CommandError::MissingArgument("provider")),
            "provider" => Command::UseProvider(rest.to_string()),
            "set" => parse_edit(rest)?,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => return Err(CommandError::Unknown(word.to_string())),
        };
        Ok(command)
    }
}

/// `<name> field=value...`; a name and at least one field are required.
fn parse_edit(rest: &str) -> Result<Command, CommandError> {
    let mut words = rest.split_whitespace();
    let name = words.next().ok_or(CommandError::MissingArgument("set"))?;
    let (mut api_url, mut model_name, mut api_key) = (None, None, None);
    for word in words {
        let (slot, value) = match word.split_once('=') {
            Some(("url", value)) => (&mut api_url, value),
            Some(("model", value)) => (&mut model_name, value),
            Some(("key", value)) => (&mut api_key, value),
            _ => return Err(CommandError::BadField(word.to_string())),
        };
        *slot = Some(value.to_string());
    }
    if api_url.is_none() && model_name.is_none() && api_key.is_none() {
        return Err(CommandError::MissingArgument("set"));
    }
    Ok(Command::EditProvider {
        name: name.to_string(),
        api_url,
        model_name,
        api_key,
    })
}

/// A menu number or label maps to its language name; anything else is
/// taken literally.
fn target_language(arg: &str) -> String {
    if let Ok(n) = arg.parse::<usize>() {
        if let Some((_, language)) = n.checked_sub(1).and_then(|i| TRANSLATION_TARGETS.get(i)) {
            return language.to_string();
        }
    }
    TRANSLATION_TARGETS
        .iter()
        .find(|(label, _)| *label == arg)
        .map(|(_, language)| language.to_string())
        .unwrap_or_else(|| arg.to_string())
}
