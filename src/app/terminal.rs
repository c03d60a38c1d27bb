//! Plain-text rendering of the popup panel.

use super::Surface;
use crate::capture::ActivationMode;
use crate::engine::Presenter;
use std::fmt;
use std::io::Write;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Hidden,
    /// Toolbar visible, no response area.
    Shell,
    Loading,
    Live,
}

pub struct TerminalPresenter<W: Write> {
    out: W,
    state: PanelState,
    transcript: String,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: PanelState::Hidden,
            transcript: String::new(),
        }
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        let written = self.out.write_fmt(args).and_then(|_| self.out.flush());
        if let Err(e) = written {
            debug!(error = %e, "Terminal write failed");
        }
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn show_loading(&mut self) {
        self.transcript.clear();
        self.state = PanelState::Loading;
        self.emit(format_args!("… working\n"));
    }

    fn begin_stream(&mut self) {
        self.state = PanelState::Live;
    }

    fn append(&mut self, fragment: &str) {
        self.transcript.push_str(fragment);
        self.emit(format_args!("{}", fragment));
    }

    fn end_stream(&mut self) {
        self.state = PanelState::Shell;
        self.emit(format_args!("\n── done ──\n"));
    }

    fn withdraw(&mut self) {
        if self.state != PanelState::Hidden {
            self.emit(format_args!("\n── closed ──\n"));
        }
        self.state = PanelState::Hidden;
    }
}

impl<W: Write> Surface for TerminalPresenter<W> {
    fn show_shell(&mut self, mode: ActivationMode, preview: &str) {
        self.transcript.clear();
        self.state = PanelState::Shell;
        self.emit(format_args!(
            "── QuickAI ({}) ──\n> {}\npolish | summarize | translate <language> | cancel\n",
            mode, preview
        ));
    }

    fn notice(&mut self, message: &str) {
        self.emit(format_args!("[quickai] {}\n", message));
    }

    fn transcript(&self) -> &str {
        &self.transcript
    }
}
