use crate::ui::conversation::commands::{
    command_entries, parse_slash_command, CommandEntry, ParsedCommand,
};
use crate::ui::theme::Palette;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// Single-line prompt input with a slash-command palette
#[derive(Clone)]
pub struct ConversationComposer {
    content: String,
    /// Byte offset into `content`, always on a char boundary
    cursor: usize,
    placeholder: String,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            cursor: 0,
            placeholder: placeholder.into(),
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if self.show_command_palette && self.apply_selected_command() {
                    return ComposerResult::None;
                }
                if self.content.trim().is_empty() {
                    return ComposerResult::None;
                }

                let content = std::mem::take(&mut self.content);
                self.cursor = 0;
                self.close_command_palette();

                return match parse_slash_command(&content) {
                    Some(command) => ComposerResult::Command(command),
                    None => ComposerResult::Submitted(content),
                };
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(c);
                self.sync_command_palette();
            }
            KeyCode::Backspace => {
                if self.backspace() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Delete => {
                if self.delete() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Left => self.cursor = self.prev_boundary(),
            KeyCode::Right => self.cursor = self.next_boundary(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.content.len(),
            _ => {}
        }

        ComposerResult::None
    }

    /// Whether Esc should go to the palette rather than the conversation
    pub fn palette_open(&self) -> bool {
        self.show_command_palette
    }

    pub fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn insert_char(&mut self, c: char) {
        self.content.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Delete character before cursor
    fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let start = self.prev_boundary();
        self.content.replace_range(start..self.cursor, "");
        self.cursor = start;
        true
    }

    /// Delete character at cursor
    fn delete(&mut self) -> bool {
        if self.cursor >= self.content.len() {
            return false;
        }
        let end = self.next_boundary();
        self.content.replace_range(self.cursor..end, "");
        true
    }

    fn prev_boundary(&self) -> usize {
        self.content[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    fn next_boundary(&self) -> usize {
        self.content[self.cursor..]
            .chars()
            .next()
            .map(|c| self.cursor + c.len_utf8())
            .unwrap_or(self.content.len())
    }

    /// Open, refresh or close the palette to match the current content
    fn sync_command_palette(&mut self) {
        let is_command_prefix =
            self.content.starts_with('/') && !self.content.contains(char::is_whitespace);
        if !is_command_prefix {
            self.close_command_palette();
            return;
        }

        let query = self.content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();
        self.show_command_palette = true;

        self.selected_command = if self.filtered_commands.is_empty() {
            None
        } else {
            let index = self.selected_command.unwrap_or(0);
            Some(index.min(self.filtered_commands.len() - 1))
        };
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let len = self.filtered_commands.len() as isize;
        let current = self.selected_command.unwrap_or(0) as isize;
        self.selected_command = Some((current + delta).rem_euclid(len) as usize);
    }

    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index))
            .copied()
        else {
            return false;
        };

        // Already complete: let Enter submit it
        if self.content.trim() == format!("/{}", entry.keyword) {
            self.close_command_palette();
            return false;
        }

        self.content = format!("/{} ", entry.keyword);
        self.cursor = self.content.len();
        self.close_command_palette();
        true
    }

    /// Get current content
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: &str) {
        self.content = content.to_string();
        self.cursor = self.content.len();
        self.close_command_palette();
    }

    /// Clear content
    pub fn clear(&mut self) {
        self.set_content("");
    }
}

/// Composer plus the context it is drawn in
pub struct ComposerView<'a> {
    pub composer: &'a ConversationComposer,
    pub palette: &'a Palette,
    pub attachment: Option<String>,
    pub responding: bool,
}

impl Widget for ComposerView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let composer = self.composer;
        let palette = self.palette;

        let title = match &self.attachment {
            Some(label) => format!(" Message · {} (/detach to remove) ", label),
            None => " Message ".to_string(),
        };
        let border = if self.responding { palette.muted } else { palette.accent };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(palette.base())
            .border_style(Style::default().fg(border));

        let inner_area = block.inner(area);
        block.render(area, buf);

        if composer.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                composer.placeholder.as_str(),
                Style::default().fg(palette.muted),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let mut content = composer.content.clone();
            content.insert(composer.cursor.min(content.len()), '▌');
            let line = Line::from(vec![Span::styled(content, Style::default().fg(palette.text))]);
            buf.set_line(inner_area.x, inner_area.y, &line, inner_area.width);
        }

        if !composer.show_command_palette || composer.filtered_commands.is_empty() {
            return;
        }

        let palette_height = (composer.filtered_commands.len().min(8) + 2) as u16;
        let palette_area = Rect {
            x: area.x,
            y: area.y.saturating_sub(palette_height),
            width: area.width,
            height: palette_height.min(area.y),
        };
        if palette_area.height < 3 {
            return;
        }

        Clear.render(palette_area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Commands ")
            .style(palette.base())
            .border_style(Style::default().fg(palette.accent));
        let inner = block.inner(palette_area);
        block.render(palette_area, buf);

        for (index, entry) in composer.filtered_commands.iter().enumerate() {
            if index >= inner.height as usize {
                break;
            }

            let style = if composer.selected_command == Some(index) {
                Style::default()
                    .fg(palette.background)
                    .bg(palette.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.text)
            };

            let line = Line::from(vec![
                Span::styled(format!("/{}", entry.keyword), style),
                Span::styled(" — ", Style::default().fg(palette.muted)),
                Span::styled(entry.description, Style::default().fg(palette.muted)),
            ]);
            buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
        }
    }
}
