//! Screen cell

use super::style::{Palette, Rgb, StyleFlags};

/// One grid position: an optional grapheme plus its colours and style.
///
/// `text` holds a whole code point, or a base character followed by the
/// combining marks attached to it. Cleared cells carry no text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: Option<String>,
    pub fg: Rgb,
    pub bg: Rgb,
    pub style: StyleFlags,
}

impl Cell {
    /// Blank cell in the palette's default colours
    pub fn blank(palette: &Palette) -> Self {
        Self {
            text: None,
            fg: palette.foreground(),
            bg: palette.background(),
            style: StyleFlags::empty(),
        }
    }

    pub fn new(ch: char, fg: Rgb, bg: Rgb, style: StyleFlags) -> Self {
        Self {
            text: Some(ch.to_string()),
            fg,
            bg,
            style,
        }
    }

    /// Attach a combining mark to whatever grapheme the cell holds.
    pub fn push_mark(&mut self, mark: char) {
        match &mut self.text {
            Some(text) => text.push(mark),
            None => self.text = Some(mark.to_string()),
        }
    }

    /// Exchange foreground and background (selection marking).
    pub fn swap_colors(&mut self) {
        std::mem::swap(&mut self.fg, &mut self.bg);
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.text.is_none()
    }

    /// Text to paint (space if empty)
    pub fn display_text(&self) -> &str {
        self.text.as_deref().unwrap_or(" ")
    }
}
