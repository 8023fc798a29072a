//! Terminal front end

pub mod conversation;
pub mod theme;

use crate::config::Config;
use crate::llm::{ChatBackend, GeminiClient};
use crate::session::{ChatSession, SessionSettings};
use crate::storage::PreferenceStore;
use anyhow::{Context, Result};
use conversation::{ConversationAction, ConversationManager};
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use tokio::time::Duration;
use tracing::info;

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Redraw cadence while idle, keeps the indicator animated
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Run the interactive chat until the user quits
pub async fn run(config: Config) -> Result<()> {
    let backend = GeminiClient::new(&config)?;
    let preferences = PreferenceStore::open(config.preferences_path())
        .context("Failed to open preferences")?;
    let session = ChatSession::new(backend, SessionSettings::from_config(&config));
    let mut manager = ConversationManager::new(session, preferences);

    if !config.has_api_key() {
        manager.show_alert(format!(
            "No API key configured.\nSet GEMINI_API_KEY or add api_key to {}",
            config.config_path().display()
        ));
    }

    info!(session = %manager.session().id(), model = %config.model, "Starting chat UI");

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut manager).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop<B: ChatBackend>(
    terminal: &mut Tui,
    manager: &mut ConversationManager<B>,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut frames = tokio::time::interval(FRAME_INTERVAL);

    loop {
        terminal
            .draw(|frame| manager.render(frame.size(), frame.buffer_mut()))
            .context("Failed to draw frame")?;

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if manager.handle_key(key) == ConversationAction::Exit {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err).context("Failed to read terminal event"),
                None => break,
            },
            Some(event) = manager.session_mut().next_event() => {
                let session = manager.session_mut();
                session.apply(event);
                // Catch up on anything queued behind it before redrawing
                session.process_events();
            }
            _ = frames.tick() => {}
        }
    }

    info!(turns = manager.session().history().len(), "Chat UI closed");
    Ok(())
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}
