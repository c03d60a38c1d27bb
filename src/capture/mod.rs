//! Where the text to transform comes from.
//!
//! `auto` activation reads the current selection, `manual` activation reads
//! whatever the user already copied. Both return `None` when nothing usable
//! is there.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    Auto,
    Manual,
}

impl fmt::Display for ActivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationMode::Auto => f.write_str("auto"),
            ActivationMode::Manual => f.write_str("manual"),
        }
    }
}

pub trait TextSource {
    /// Currently selected text, if the platform exposes one.
    fn capture_selection(&mut self) -> Option<String>;

    fn read_clipboard(&mut self) -> Option<String>;

    fn write_clipboard(&mut self, text: &str) -> bool;

    fn capture(&mut self, mode: ActivationMode) -> Option<String> {
        let text = match mode {
            ActivationMode::Auto => self.capture_selection(),
            ActivationMode::Manual => self.read_clipboard(),
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

/// System clipboard through `arboard`, opened lazily.
#[derive(Default)]
pub struct SystemClipboard {
    clipboard: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Option<&mut arboard::Clipboard> {
        if self.clipboard.is_none() {
            match arboard::Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!(error = %e, "Clipboard unavailable");
                    return None;
                }
            }
        }
        self.clipboard.as_mut()
    }
}

impl TextSource for SystemClipboard {
    #[cfg(all(
        unix,
        not(any(target_os = "macos", target_os = "android", target_os = "emscripten"))
    ))]
    fn capture_selection(&mut self) -> Option<String> {
        use arboard::{GetExtLinux, LinuxClipboardKind};

        let clipboard = self.handle()?;
        let selection = clipboard.get().clipboard(LinuxClipboardKind::Primary).text();
        match selection {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(error = %e, "No primary selection, reading clipboard");
                self.read_clipboard()
            }
        }
    }

    // Without a primary selection the user has to copy first.
    #[cfg(not(all(
        unix,
        not(any(target_os = "macos", target_os = "android", target_os = "emscripten"))
    )))]
    fn capture_selection(&mut self) -> Option<String> {
        self.read_clipboard()
    }

    fn read_clipboard(&mut self) -> Option<String> {
        let clipboard = self.handle()?;
        match clipboard.get_text() {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(error = %e, "Clipboard holds no text");
                None
            }
        }
    }

    fn write_clipboard(&mut self, text: &str) -> bool {
        let Some(clipboard) = self.handle() else {
            return false;
        };
        match clipboard.set_text(text.to_string()) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to write clipboard");
                false
            }
        }
    }
}

/// Fixed text with an in-memory clipboard.
#[derive(Debug, Clone, Default)]
pub struct StaticText {
    pub text: Option<String>,
    pub written: Vec<String>,
}

impl StaticText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            written: Vec::new(),
        }
    }
}

impl TextSource for StaticText {
    fn capture_selection(&mut self) -> Option<String> {
        self.text.clone()
    }

    fn read_clipboard(&mut self) -> Option<String> {
        self.text.clone()
    }

    fn write_clipboard(&mut self, text: &str) -> bool {
        self.written.push(text.to_string());
        true
    }
}
