//! Conversation transcript display component

use crate::events::Role;
use crate::session::{BubbleState, ChatBubble};
use crate::ui::theme::Palette;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Transcript of the current session, anchored to the bottom
pub struct ConversationHistory<'a> {
    pub bubbles: &'a [ChatBubble],
    pub suggestions: &'a [String],
    pub chats_active: bool,
    pub palette: &'a Palette,
    /// Lines scrolled up from the bottom
    pub scroll: usize,
}

impl Widget for ConversationHistory<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Gemini Chat ")
            .style(self.palette.base())
            .border_style(Style::default().fg(self.palette.border));

        let inner_area = block.inner(area);
        block.render(area, buf);

        let lines = if self.chats_active {
            let mut lines = Vec::new();
            for bubble in self.bubbles {
                lines.extend(self.render_bubble(bubble, inner_area.width));
                lines.push(Line::from(""));
            }
            lines
        } else {
            self.welcome_lines(inner_area.width)
        };

        // Show the tail that fits, shifted up by the scroll offset
        let height = inner_area.height as usize;
        let end = lines.len().saturating_sub(self.scroll.min(lines.len().saturating_sub(height)));
        let start = end.saturating_sub(height);

        for (i, line) in lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

impl<'a> ConversationHistory<'a> {
    fn welcome_lines(&self, width: u16) -> Vec<Line<'a>> {
        let palette = self.palette;
        let mut lines = vec![
            Line::from(Span::styled(
                "Hello, there",
                Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "How can I help you today?",
                Style::default().fg(palette.muted),
            )),
            Line::from(""),
        ];

        for (index, suggestion) in self.suggestions.iter().enumerate() {
            let prefix = format!("  F{}  ", index + 1);
            let wrapped = wrap_text(suggestion, (width as usize).saturating_sub(prefix.len()));
            for (i, text) in wrapped.into_iter().enumerate() {
                let lead = if i == 0 { prefix.clone() } else { " ".repeat(prefix.len()) };
                lines.push(Line::from(vec![
                    Span::styled(lead, Style::default().fg(palette.accent)),
                    Span::styled(text, Style::default().fg(palette.text)),
                ]));
            }
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Type a message and press Enter. /help lists commands.",
            Style::default().fg(palette.muted),
        )));
        lines
    }

    /// Render a single bubble into lines
    fn render_bubble(&self, bubble: &ChatBubble, width: u16) -> Vec<Line<'a>> {
        let palette = self.palette;
        let mut lines = Vec::new();

        let (icon, colour) = match bubble.role {
            Role::User => ("👤", palette.user),
            Role::Model => ("✨", palette.model),
        };
        let timestamp = bubble.timestamp.format("%H:%M").to_string();
        lines.push(Line::from(vec![
            Span::styled(
                format!("{} {} ", icon, bubble.role.display_name()),
                Style::default().fg(colour).add_modifier(Modifier::BOLD),
            ),
            Span::styled(timestamp, Style::default().fg(palette.muted)),
        ]));

        let text_style = if bubble.is_error() {
            Style::default().fg(palette.error)
        } else if bubble.state == BubbleState::Loading {
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC)
        } else {
            Style::default().fg(palette.text)
        };

        let content_lines = wrap_text(&bubble.text, width.saturating_sub(2) as usize);
        let last = content_lines.len().saturating_sub(1);
        for (i, content_line) in content_lines.into_iter().enumerate() {
            let mut spans = vec![Span::raw("  "), Span::styled(content_line, text_style)];
            if i == last && bubble.state == BubbleState::Revealing {
                spans.push(Span::styled("▋", Style::default().fg(palette.accent)));
            }
            lines.push(Line::from(spans));
        }

        if let Some(label) = &bubble.attachment {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(label.clone(), Style::default().fg(palette.muted)),
            ]));
        }

        if bubble.state == BubbleState::Stopped {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(
                    "(stopped)",
                    Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
                ),
            ]));
        }

        lines
    }
}

/// Wrap text to `width` columns, keeping the text's own line breaks
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.chars().count();
            if current_width > 0 && current_width + 1 + word_width > width {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            if current_width > 0 {
                current_line.push(' ');
                current_width += 1;
            }
            current_line.push_str(word);
            current_width += word_width;
        }

        lines.push(current_line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        assert_eq!(
            wrap_text("the quick brown fox", 9),
            vec!["the quick", "brown fox"]
        );
    }

    #[test]
    fn test_wrap_keeps_paragraphs() {
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn test_long_word_gets_its_own_line() {
        assert_eq!(
            wrap_text("hi supercalifragilistic yo", 5),
            vec!["hi", "supercalifragilistic", "yo"]
        );
    }
}
