use crate::events::{Role, Turn};
use crate::llm::ChatBackend;
use crate::session::{ChatSession, IgnoreReason, SubmitOutcome};
use crate::storage::{PreferenceStore, Theme};
use crate::ui::conversation::{
    get_help_text, ComposerResult, ComposerView, ConversationComposer, ConversationHistory,
    ParsedCommand, ResponseIndicator, SlashCommand,
};
use crate::ui::theme::Palette;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use std::path::PathBuf;
use tracing::warn;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Routes user actions to the session and draws the conversation screen
pub struct ConversationManager<B: ChatBackend> {
    session: ChatSession<B>,
    composer: ConversationComposer,
    preferences: PreferenceStore,
    theme: Theme,
    /// Modal message; blocks input until dismissed
    alert: Option<String>,
    notice: Option<String>,
    scroll: usize,
}

impl<B: ChatBackend> ConversationManager<B> {
    pub fn new(session: ChatSession<B>, preferences: PreferenceStore) -> Self {
        let theme = Theme::load(&preferences);
        Self {
            session,
            composer: ConversationComposer::new("Ask Gemini"),
            preferences,
            theme,
            alert: None,
            notice: None,
            scroll: 0,
        }
    }

    pub fn session(&self) -> &ChatSession<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ChatSession<B> {
        &mut self.session
    }

    #[cfg(test)]
    pub fn theme(&self) -> Theme {
        self.theme
    }

    #[cfg(test)]
    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn show_alert(&mut self, message: impl Into<String>) {
        self.alert = Some(message.into());
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return ConversationAction::Exit;
        }

        if self.alert.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.alert = None;
            }
            return ConversationAction::None;
        }

        match key.code {
            KeyCode::Esc if self.composer.palette_open() => {
                self.composer.close_command_palette();
            }
            KeyCode::Esc => self.stop_response(),
            KeyCode::Char('l') if ctrl => self.clear_history(),
            KeyCode::Char('t') if ctrl => self.toggle_theme(),
            KeyCode::F(n @ 1..=4) if !self.session.chats_active() => {
                self.use_suggestion(usize::from(n - 1));
            }
            KeyCode::Up if !self.composer.palette_open() && self.composer.content().is_empty() => {
                self.recall_last_message();
            }
            KeyCode::PageUp => self.scroll = self.scroll.saturating_add(5),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_sub(5),
            _ => match self.composer.handle_key(key) {
                ComposerResult::Submitted(input) => self.submit(input),
                ComposerResult::Command(command) => return self.handle_slash_command(command),
                ComposerResult::None => {}
            },
        }

        ConversationAction::None
    }

    fn submit(&mut self, input: String) {
        match self.session.submit(&input) {
            SubmitOutcome::Accepted { .. } => {
                self.notice = None;
                self.scroll = 0;
            }
            SubmitOutcome::Ignored(IgnoreReason::ResponseInFlight) => {
                // Keep the text so it can be sent once the reply is done
                self.composer.set_content(&input);
                self.notice =
                    Some("Wait for the reply to finish, or press Esc to stop it".to_string());
            }
            SubmitOutcome::Ignored(IgnoreReason::EmptyInput) => {}
        }
    }

    /// Put the last message sent back into an empty composer
    fn recall_last_message(&mut self) {
        let last = self
            .session
            .history()
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .and_then(Turn::text)
            .map(str::to_string);
        if let Some(text) = last {
            self.composer.set_content(&text);
        }
    }

    fn stop_response(&mut self) {
        if self.session.stop_response() {
            self.notice = None;
        }
    }

    fn clear_history(&mut self) {
        self.session.clear_history();
        self.composer.clear();
        self.scroll = 0;
        self.notice = None;
    }

    fn toggle_theme(&mut self) {
        match Theme::toggle(&mut self.preferences) {
            Ok(theme) => self.theme = theme,
            Err(err) => {
                warn!(error = %err, "Failed to save theme preference");
                self.show_alert(format!("Failed to save theme: {err}"));
            }
        }
    }

    fn use_suggestion(&mut self, index: usize) {
        if let Some(SubmitOutcome::Accepted { .. }) = self.session.use_suggestion(index) {
            self.composer.clear();
            self.scroll = 0;
        }
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        if self.session.is_responding() && !command.command.available_during_response() {
            self.notice = Some(format!(
                "/{} is not available while a reply is in flight",
                command.command.command()
            ));
            return ConversationAction::None;
        }

        match command.command {
            SlashCommand::Attach => match command.argument() {
                Some(path) => self.attach(expand_home(path)),
                None => self.show_alert("Usage: /attach <path>"),
            },
            SlashCommand::Detach => {
                if self.session.cancel_attachment() {
                    self.notice = Some("Attachment removed".to_string());
                }
            }
            SlashCommand::Stop => self.stop_response(),
            SlashCommand::Clear => self.clear_history(),
            SlashCommand::Theme => self.toggle_theme(),
            SlashCommand::Suggest => match command.suggestion_index() {
                Some(index) if index < self.session.suggestions().len() => {
                    self.use_suggestion(index)
                }
                _ => self.show_alert(format!(
                    "Usage: /suggest <1-{}>",
                    self.session.suggestions().len()
                )),
            },
            SlashCommand::Help => self.show_alert(get_help_text()),
            SlashCommand::Bye => return ConversationAction::Exit,
        }

        ConversationAction::None
    }

    fn attach(&mut self, path: PathBuf) {
        match self.session.attach(&path) {
            Ok(attachment) => {
                self.notice = Some(format!("Attached {}", attachment.label()));
            }
            Err(err) => self.show_alert(err.to_string()),
        }
    }

    /// Render the whole conversation screen
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let palette = Palette::for_theme(self.theme);
        buf.set_style(area, palette.base());

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Header
                Constraint::Min(5),    // History
                Constraint::Length(1), // Indicator
                Constraint::Length(3), // Composer
            ])
            .split(area);

        let header = Line::from(vec![
            Span::styled(
                " gemchat ",
                Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  Ctrl+T {}  Ctrl+L clear  /help", self.theme.toggle_label()),
                Style::default().fg(palette.muted),
            ),
        ]);
        buf.set_line(chunks[0].x, chunks[0].y, &header, chunks[0].width);

        ConversationHistory {
            bubbles: self.session.transcript(),
            suggestions: self.session.suggestions(),
            chats_active: self.session.chats_active(),
            palette: &palette,
            scroll: self.scroll,
        }
        .render(chunks[1], buf);

        ResponseIndicator {
            responding: self.session.is_responding(),
            notice: self.notice.as_deref(),
            palette: &palette,
        }
        .render(chunks[2], buf);

        ComposerView {
            composer: &self.composer,
            palette: &palette,
            attachment: self.session.pending_attachment().map(|a| a.label()),
            responding: self.session.is_responding(),
        }
        .render(chunks[3], buf);

        if let Some(message) = &self.alert {
            render_alert(message, &palette, area, buf);
        }
    }
}

fn render_alert(message: &str, palette: &Palette, area: Rect, buf: &mut Buffer) {
    let width = area.width.saturating_sub(4).min(70);
    let height = (message.lines().count() as u16 + 4).min(area.height);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };

    Clear.render(popup, buf);
    Paragraph::new(format!("{message}\n\n[Enter] OK"))
        .wrap(Wrap { trim: false })
        .style(palette.base())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Notice ")
                .border_style(Style::default().fg(palette.error)),
        )
        .render(popup, buf);
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatError;
    use crate::session::SessionSettings;
    use async_trait::async_trait;
    use std::fs::File;
    use tempfile::TempDir;

    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn generate(&self, contents: Vec<Turn>) -> Result<String, ChatError> {
            let last = contents.last().and_then(Turn::text).unwrap_or_default();
            Ok(format!("echo {last}"))
        }
    }

    fn manager(dir: &TempDir) -> ConversationManager<EchoBackend> {
        let store = PreferenceStore::open(dir.path().join("preferences.json")).unwrap();
        ConversationManager::new(ChatSession::new(EchoBackend, SessionSettings::default()), store)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_line(manager: &mut ConversationManager<EchoBackend>, text: &str) -> ConversationAction {
        for c in text.chars() {
            manager.handle_key(key(KeyCode::Char(c)));
        }
        manager.handle_key(key(KeyCode::Enter))
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_sends_and_reply_arrives() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);

        type_line(&mut manager, "ping");
        manager.session_mut().run_until_idle().await;

        assert_eq!(manager.session().history()[1].text(), Some("echo ping"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_kept_when_busy() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);

        type_line(&mut manager, "first");
        type_line(&mut manager, "second");

        assert_eq!(manager.composer.content(), "second");
        assert_eq!(manager.session().history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ctrl_t_toggles_and_persists_theme() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        assert_eq!(manager.theme(), Theme::Dark);

        manager.handle_key(ctrl('t'));
        assert_eq!(manager.theme(), Theme::Light);

        let reloaded = self::manager(&dir);
        assert_eq!(reloaded.theme(), Theme::Light);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_attachment_raises_alert() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.png");
        File::create(&path).unwrap().set_len(6 * 1024 * 1024).unwrap();

        let mut manager = manager(&dir);
        type_line(&mut manager, &format!("/attach {}", path.display()));

        assert_eq!(manager.alert(), Some("File size too large. Max 5MB allowed."));
        assert!(manager.session().pending_attachment().is_none());

        // Input is blocked until the alert is dismissed
        manager.handle_key(key(KeyCode::Char('x')));
        assert_eq!(manager.composer.content(), "");
        manager.handle_key(key(KeyCode::Enter));
        assert!(manager.alert().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_function_key_sends_suggestion_only_before_chat() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        let first = manager.session().suggestions()[0].clone();

        manager.handle_key(key(KeyCode::F(1)));
        manager.session_mut().run_until_idle().await;
        assert_eq!(manager.session().history()[0].text(), Some(first.as_str()));

        manager.handle_key(key(KeyCode::F(2)));
        assert_eq!(manager.session().history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_exit_keys() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);

        type_line(&mut manager, "hello");
        manager.handle_key(ctrl('l'));
        assert!(manager.session().history().is_empty());
        assert!(!manager.session().chats_active());

        assert_eq!(type_line(&mut manager, "/bye"), ConversationAction::Exit);
        assert_eq!(manager.handle_key(ctrl('c')), ConversationAction::Exit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_up_recalls_last_message_into_empty_composer() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);

        manager.handle_key(key(KeyCode::Up));
        assert_eq!(manager.composer.content(), "");

        type_line(&mut manager, "what is rust");
        manager.session_mut().run_until_idle().await;
        manager.handle_key(key(KeyCode::Up));
        assert_eq!(manager.composer.content(), "what is rust");

        // Only an empty composer is replaced
        manager.composer.set_content("draft");
        manager.handle_key(key(KeyCode::Up));
        assert_eq!(manager.composer.content(), "draft");
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/a.png"), PathBuf::from("/tmp/a.png"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/a.png"), home.join("a.png"));
        }
    }
}
