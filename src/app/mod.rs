//! Application controller and event loop.
//!
//! The `App` owns every piece of single-threaded state: settings, the text
//! source, the display surface and the task coordinator. The loop in
//! `run_interactive` is the only place that touches it.

pub mod terminal;

pub use terminal::TerminalPresenter;

use crate::capture::{ActivationMode, TextSource};
use crate::commands::{Command, HELP};
use crate::config::{GeneralSettings, ProviderConfig, Settings, SettingsError};
use crate::engine::{CoordinatorError, DrainReport, Presenter, StartOutcome, TaskCoordinator};
use crate::llm::{self, Provider};
use crate::prompts::{ActionParams, TRANSLATION_TARGETS};
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Presenter plus the shell chrome the coordinator never needs.
pub trait Surface: Presenter {
    fn show_shell(&mut self, mode: ActivationMode, preview: &str);

    /// One-line status message outside the response area.
    fn notice(&mut self, message: &str);

    /// Response text rendered so far.
    fn transcript(&self) -> &str;
}

/// Builds a provider client, logging instead of failing.
pub fn connect(config: &ProviderConfig, general: &GeneralSettings) -> Option<Arc<dyn Provider>> {
    match llm::build_provider(config, general) {
        Ok(provider) => Some(provider),
        Err(e) => {
            warn!(provider = %config.provider_name, error = %e, "Provider unavailable");
            None
        }
    }
}

pub struct App<T: TextSource, S: Surface> {
    settings: Settings,
    settings_path: Option<PathBuf>,
    source: T,
    surface: S,
    coordinator: TaskCoordinator,
    selected_text: Option<String>,
}

impl<T: TextSource, S: Surface> App<T, S> {
    /// `settings_path` of `None` keeps provider switches in memory only.
    pub fn new(
        settings: Settings,
        settings_path: Option<PathBuf>,
        source: T,
        surface: S,
        provider: Option<Arc<dyn Provider>>,
    ) -> Self {
        Self {
            settings,
            settings_path,
            source,
            surface,
            coordinator: TaskCoordinator::new(provider),
            selected_text: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn source(&self) -> &T {
        &self.source
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_busy(&self) -> bool {
        self.coordinator.is_busy()
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.settings.general.drain_interval_ms.max(1))
    }

    /* ---------- activation ---------- */

    /// Captures text for `mode` and opens the shell. Blank captures are
    /// logged and otherwise ignored.
    pub fn activate(&mut self, mode: ActivationMode) -> bool {
        let Some(text) = self.source.capture(mode) else {
            info!(mode = %mode, "Activation failed: no text captured from clipboard or selection");
            return false;
        };
        self.accept_text(mode, text);
        true
    }

    /// Uses `text` as if it had been captured.
    pub fn accept_text(&mut self, mode: ActivationMode, text: String) {
        let preview: String = text
            .trim()
            .chars()
            .take(self.settings.general.preview_chars)
            .collect();
        info!(mode = %mode, preview = %preview, "Captured text");
        self.surface.show_shell(mode, &preview);
        self.selected_text = Some(text);
    }

    /* ---------- tasks ---------- */

    /// Starts `action` on the captured text. `Ok(None)` means nothing has
    /// been captured yet.
    pub fn run_action(
        &mut self,
        action: &str,
        params: &ActionParams,
    ) -> Result<Option<StartOutcome>, CoordinatorError> {
        let Some(text) = self.selected_text.as_deref() else {
            info!(action, "No captured text, activate first");
            self.surface.notice("Nothing captured yet. Use `auto` or `manual` first.");
            return Ok(None);
        };
        let outcome = self
            .coordinator
            .start_task(action, text, params, &mut self.surface)
            .map_err(|e| {
                self.surface.notice(&e.to_string());
                e
            })?;
        Ok(Some(outcome))
    }

    pub fn cancel(&mut self) {
        self.coordinator.cancel(&mut self.surface);
    }

    /// One drain pass. A panicking surface is contained here so the caller's
    /// polling loop always gets to schedule the next pass.
    pub fn tick(&mut self) -> DrainReport {
        let coordinator = &mut self.coordinator;
        let surface = &mut self.surface;
        match panic::catch_unwind(AssertUnwindSafe(|| coordinator.drain(surface))) {
            Ok(report) => report,
            Err(_) => {
                error!("Display surface failed while draining; polling continues");
                DrainReport::default()
            }
        }
    }

    /* ---------- settings & clipboard ---------- */

    /// Selects `name` and persists the choice. Nothing changes unless the
    /// settings file was written.
    pub fn switch_provider(&mut self, name: &str) -> Result<(), SettingsError> {
        let mut updated = self.settings.clone();
        updated.set_current_provider(name)?;
        self.commit(updated)?;
        self.reconnect();
        info!(provider = name, "Switched provider");
        Ok(())
    }

    /// Edits a provider record and persists it. The active client is rebuilt
    /// when `name` is the current provider; `None` keeps the stored key.
    pub fn update_provider(
        &mut self,
        name: &str,
        api_url: String,
        model_name: String,
        api_key: Option<String>,
    ) -> Result<(), SettingsError> {
        let mut updated = self.settings.clone();
        updated.update_provider(name, api_url, model_name, api_key)?;
        self.commit(updated)?;
        if self.settings.current_provider == name {
            self.reconnect();
        }
        info!(provider = name, "Provider settings updated");
        Ok(())
    }

    fn commit(&mut self, settings: Settings) -> Result<(), SettingsError> {
        if let Some(path) = &self.settings_path {
            settings.save(path)?;
        }
        self.settings = settings;
        Ok(())
    }

    fn reconnect(&mut self) {
        let config = self.settings.current_provider_config();
        self.coordinator
            .set_provider(connect(&config, &self.settings.general));
    }

    /// Puts the rendered response on the clipboard.
    pub fn copy_result(&mut self) -> bool {
        let text = self.surface.transcript().trim().to_string();
        if text.is_empty() {
            self.surface.notice("Nothing to copy yet.");
            return false;
        }
        let copied = self.source.write_clipboard(&text);
        if copied {
            self.surface.notice("Response copied to clipboard.");
        }
        copied
    }

    /* ---------- shell commands ---------- */

    pub fn handle_line(&mut self, line: &str) -> ControlFlow<()> {
        if line.trim().is_empty() {
            return ControlFlow::Continue(());
        }
        match line.parse::<Command>() {
            Ok(command) => self.dispatch(command),
            Err(e) => {
                self.surface.notice(&e.to_string());
                ControlFlow::Continue(())
            }
        }
    }

    pub fn dispatch(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Activate(mode) => {
                if !self.activate(mode) {
                    self.surface.notice("No text captured from clipboard or selection.");
                }
            }
            Command::Run { action, params } => {
                if let Ok(Some(StartOutcome::Busy)) = self.run_action(action.id(), &params) {
                    self.surface.notice("Still working on the previous request.");
                }
            }
            Command::TranslateMenu => {
                let menu: Vec<String> = TRANSLATION_TARGETS
                    .iter()
                    .enumerate()
                    .map(|(i, (label, language))| format!("{}. {} ({})", i + 1, label, language))
                    .collect();
                self.surface
                    .notice(&format!("translate <language|number>: {}", menu.join(", ")));
            }
            Command::Cancel => self.cancel(),
            Command::Copy => {
                self.copy_result();
            }
            Command::Providers => {
                let names = self.settings.provider_names().join(", ");
                let current = self.settings.current_provider.clone();
                self.surface
                    .notice(&format!("providers: {} (current: {})", names, current));
            }
            Command::UseProvider(name) => {
                if let Err(e) = self.switch_provider(&name) {
                    self.surface.notice(&e.to_string());
                }
            }
            Command::EditProvider {
                name,
                api_url,
                model_name,
                api_key,
            } => {
                let result = self.settings.providers.get(&name).cloned().map(|current| {
                    self.update_provider(
                        &name,
                        api_url.unwrap_or(current.api_url),
                        model_name.unwrap_or(current.model_name),
                        api_key,
                    )
                });
                match result {
                    Some(Ok(())) => self.surface.notice(&format!("Saved settings for {}.", name)),
                    Some(Err(e)) => self.surface.notice(&e.to_string()),
                    None => self.surface.notice(&format!("Unknown AI provider: {}", name)),
                }
            }
            Command::Help => self.surface.notice(HELP),
            Command::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }
}

/* ---------- loops ---------- */

/// Interactive shell: shell commands in, fixed-interval drain, Ctrl-C out.
pub async fn run_interactive<T: TextSource, S: Surface>(
    mut app: App<T, S>,
    mut lines: UnboundedReceiver<String>,
) {
    let mut ticker = tokio::time::interval(app.drain_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                app.tick();
            }
            line = lines.recv() => match line {
                Some(line) => {
                    if app.handle_line(&line).is_break() {
                        break;
                    }
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    if app.is_busy() {
        app.cancel();
    }
    info!("QuickAI stopped");
}

/// Runs one action on the captured text and returns once it has ended.
pub async fn run_once<T: TextSource, S: Surface>(
    mut app: App<T, S>,
    action: &str,
    params: &ActionParams,
) -> Result<(), CoordinatorError> {
    match app.run_action(action, params)? {
        Some(StartOutcome::Started(generation)) => {
            info!(generation = %generation, "Streaming response");
        }
        Some(StartOutcome::Busy) | None => return Ok(()),
    }

    let mut ticker = tokio::time::interval(app.drain_interval());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while app.is_busy() {
        tokio::select! {
            _ = ticker.tick() => {
                app.tick();
            }
            _ = &mut ctrl_c => {
                app.cancel();
            }
        }
    }
    Ok(())
}
