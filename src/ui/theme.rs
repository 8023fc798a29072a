use ratatui::style::{Color, Style};

use crate::storage::Theme;

/// Colours used by every conversation widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub accent: Color,
    pub user: Color,
    pub model: Color,
    pub error: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                background: Color::Rgb(24, 24, 27),
                text: Color::Rgb(237, 237, 237),
                muted: Color::Rgb(150, 150, 160),
                border: Color::Rgb(70, 70, 80),
                accent: Color::Rgb(29, 123, 132),
                user: Color::Rgb(130, 170, 255),
                model: Color::Rgb(120, 220, 160),
                error: Color::Rgb(214, 41, 57),
            },
            Theme::Light => Self {
                background: Color::Rgb(243, 247, 255),
                text: Color::Rgb(9, 9, 9),
                muted: Color::Rgb(90, 90, 100),
                border: Color::Rgb(200, 205, 220),
                accent: Color::Rgb(29, 123, 132),
                user: Color::Rgb(30, 80, 200),
                model: Color::Rgb(20, 120, 70),
                error: Color::Rgb(214, 41, 57),
            },
        }
    }

    pub fn base(&self) -> Style {
        Style::default().fg(self.text).bg(self.background)
    }
}
