//! QuickAI: send the text you are looking at to a language model and watch
//! the answer stream back.

pub mod app;
pub mod capture;
pub mod commands;
pub mod config;
pub mod engine;
pub mod llm;
pub mod prompts;

use anyhow::{bail, Context};
use app::{App, TerminalPresenter};
use capture::{ActivationMode, SystemClipboard, TextSource};
use clap::{Parser, Subcommand};
use config::Settings;
use prompts::ActionParams;
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quickai", version, about = "Polish, summarize or translate selected text with an LLM")]
struct Cli {
    /// Settings file (defaults to the platform config dir)
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Interactive shell driven by text commands (default)
    Interactive,
    /// Run a single action and exit when the response is complete
    Once {
        /// polish_text, summarize_points or translate
        #[arg(long)]
        action: String,
        #[arg(long)]
        target_language: Option<String>,
        /// Text to process; the clipboard is used when omitted
        #[arg(long)]
        text: Option<String>,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let settings_path = cli.settings.unwrap_or_else(Settings::default_path);
    let settings = Settings::load_or_init(&settings_path)
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;
    let active = config::resolve_active_provider(&settings);
    let provider = app::connect(&active, &settings.general);
    info!(
        provider = %active.provider_name,
        settings = %settings_path.display(),
        "QuickAI starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;

    let result: anyhow::Result<()> = runtime.block_on(async move {
        let surface = TerminalPresenter::new(io::stdout());
        match cli.mode.unwrap_or(Mode::Interactive) {
            Mode::Interactive => {
                let app = App::new(
                    settings,
                    Some(settings_path),
                    SystemClipboard::new(),
                    surface,
                    provider,
                );
                println!("{}", commands::HELP);
                run_interactive(app).await;
                Ok(())
            }
            Mode::Once {
                action,
                target_language,
                text,
            } => {
                let mut source = SystemClipboard::new();
                let text = match text.or_else(|| source.read_clipboard()) {
                    Some(text) if !text.trim().is_empty() => text,
                    _ => bail!("no text given and the clipboard is empty"),
                };
                // One-shot runs never persist provider switches.
                let mut app = App::new(settings, None, source, surface, provider);
                app.accept_text(ActivationMode::Manual, text);
                let params = ActionParams { target_language };
                app::run_once(app, &action, &params).await?;
                Ok(())
            }
        }
    });
    // The stdin reader may still be parked in a blocking read.
    runtime.shutdown_background();
    result
}

/// Feeds stdin lines to the shell loop from a separate task.
async fn run_interactive<T: TextSource, S: app::Surface>(app: App<T, S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
        debug!("stdin closed");
    });
    app::run_interactive(app, rx).await;
}
