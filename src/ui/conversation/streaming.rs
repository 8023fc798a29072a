use crate::ui::theme::Palette;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Widget,
};

/// One-line status under the transcript: response indicator or a notice
pub struct ResponseIndicator<'a> {
    pub responding: bool,
    pub notice: Option<&'a str>,
    pub palette: &'a Palette,
}

impl Widget for ResponseIndicator<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, self.palette.base());

        let line = if self.responding {
            let dots = match (std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis()
                / 300)
                % 4
            {
                0 => ".",
                1 => "..",
                2 => "...",
                _ => "   ",
            };

            Line::from(vec![
                Span::styled("✨ Gemini is responding", Style::default().fg(self.palette.model)),
                Span::styled(dots, Style::default().fg(self.palette.accent)),
                Span::styled("  Esc to stop", Style::default().fg(self.palette.muted)),
            ])
        } else if let Some(notice) = self.notice {
            Line::from(Span::styled(notice, Style::default().fg(self.palette.muted)))
        } else {
            return;
        };

        buf.set_line(area.x, area.y, &line, area.width);
    }
}
