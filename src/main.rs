mod attachment;
mod config;
mod events;
mod llm;
mod logging;
mod session;
mod storage;
mod streaming;
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{IsTerminal, Stdout, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::llm::{ChatBackend, GeminiClient};
use crate::session::{BubbleState, ChatSession, IgnoreReason, SessionSettings, SubmitOutcome};
use crate::storage::{PreferenceStore, Theme};

#[derive(Parser)]
#[command(name = "gemchat")]
#[command(version)]
#[command(about = "Chat with Gemini from the terminal", long_about = None)]
struct Cli {
    /// Model to use instead of the configured one
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single message and print the reply
    Ask {
        /// Message text
        text: String,
        /// File to attach to the message
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show or toggle the stored theme
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },
    /// Store an API key in the config file
    Key {
        /// Gemini API key
        key: String,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum ThemeAction {
    Show,
    Toggle,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(model) = cli.model {
        config.model = model;
    }

    let _log_guard = match logging::init(&config.log_dir()) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("⚠️  Logging disabled: {err:#}");
            None
        }
    };

    match cli.command {
        None => ui::run(config).await,
        Some(Commands::Ask { text, file }) => ask(config, &text, file).await,
        Some(Commands::Theme { action }) => theme(&config, action.unwrap_or(ThemeAction::Show)),
        Some(Commands::Key { key }) => {
            config.api_key = Some(key.trim().to_string());
            config.save()?;
            println!("🔑 API key saved to {}", config.config_path().display());
            Ok(())
        }
    }
}

/// One-shot request; a terminal gets the typing effect
async fn ask(config: Config, text: &str, file: Option<PathBuf>) -> Result<()> {
    if !config.has_api_key() {
        bail!(
            "No API key configured. Set GEMINI_API_KEY or add api_key to {}",
            config.config_path().display()
        );
    }

    let backend = GeminiClient::new(&config)?;
    let mut session = ChatSession::new(backend, SessionSettings::from_config(&config));

    if let Some(path) = file {
        let attachment = session
            .attach(&path)
            .with_context(|| format!("Cannot attach {}", path.display()))?;
        eprintln!("📎 {}", attachment.label());
    }

    match session.submit(text) {
        SubmitOutcome::Accepted { .. } => {}
        SubmitOutcome::Ignored(IgnoreReason::EmptyInput) => bail!("Message is empty"),
        SubmitOutcome::Ignored(IgnoreReason::ResponseInFlight) => {
            bail!("A response is already in flight")
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stdout = std::io::stdout();
    let mut printed = 0;

    if stdout.is_terminal() {
        while session.is_responding() {
            tokio::select! {
                Some(event) = session.next_event() => session.apply(event),
                _ = &mut ctrl_c => {
                    session.stop_response();
                }
            }
            printed = print_reply(&mut stdout, &session, printed)?;
        }
    } else {
        // Piped output gets the whole reply at once
        tokio::select! {
            _ = session.run_until_idle() => {}
            _ = &mut ctrl_c => {
                session.stop_response();
            }
        }
    }
    print_reply(&mut stdout, &session, printed)?;

    match session.transcript().last().map(|bubble| &bubble.state) {
        Some(BubbleState::Failed(err)) if err.is_cancelled() => {
            eprintln!("{err}");
            Ok(())
        }
        Some(BubbleState::Failed(err)) => bail!("{err}"),
        Some(BubbleState::Stopped) => {
            println!();
            eprintln!("(stopped)");
            Ok(())
        }
        _ => {
            println!();
            Ok(())
        }
    }
}

/// Write whatever reply text appeared since `printed` bytes; returns the new offset
fn print_reply<B: ChatBackend>(
    stdout: &mut Stdout,
    session: &ChatSession<B>,
    printed: usize,
) -> Result<usize> {
    let Some(bubble) = session.transcript().last() else {
        return Ok(printed);
    };
    let showing_reply = matches!(
        bubble.state,
        BubbleState::Revealing | BubbleState::Done | BubbleState::Stopped
    );
    if !showing_reply || bubble.text.len() <= printed {
        return Ok(printed);
    }

    write!(stdout, "{}", &bubble.text[printed..])?;
    stdout.flush()?;
    Ok(bubble.text.len())
}

fn theme(config: &Config, action: ThemeAction) -> Result<()> {
    let mut store = PreferenceStore::open(config.preferences_path())
        .context("Failed to open preferences")?;

    let current = match action {
        ThemeAction::Show => Theme::load(&store),
        ThemeAction::Toggle => Theme::toggle(&mut store).context("Failed to save theme")?,
    };
    println!("{}", current.preference_value());
    Ok(())
}
