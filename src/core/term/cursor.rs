//! Cursor state and movement
//!
//! The cursor is plain data: it is cloned for DECSC/DECRC and borrows the
//! buffer only while it moves or writes.

use unicode_normalization::char::is_combining_mark;

use super::buffer::Buffer;
use super::cell::Cell;
use super::screen::Modes;
use super::style::{Palette, Rgb, StyleFlags};

const TAB_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    x: usize,
    y: usize,
    /// Set after writing the last column; the next printable wraps first.
    wrap_due: bool,
    pub visible: bool,
    pub blinking: bool,
    foreground: Rgb,
    background: Rgb,
    pub style: StyleFlags,
    inverted: bool,
}

impl Cursor {
    pub fn new(palette: &Palette) -> Self {
        Self {
            x: 0,
            y: 0,
            wrap_due: false,
            visible: true,
            blinking: true,
            foreground: palette.foreground(),
            background: palette.background(),
            style: StyleFlags::empty(),
            inverted: false,
        }
    }

    pub fn x(&self) -> usize {
        self.x
    }

    pub fn y(&self) -> usize {
        self.y
    }

    pub fn wrap_due(&self) -> bool {
        self.wrap_due
    }

    pub fn set_foreground(&mut self, color: Rgb) {
        self.foreground = color;
    }

    pub fn set_background(&mut self, color: Rgb) {
        self.background = color;
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    /// Colours written into cells: (fg, bg), swapped while inverted
    pub fn cell_colors(&self) -> (Rgb, Rgb) {
        if self.inverted {
            (self.background, self.foreground)
        } else {
            (self.foreground, self.background)
        }
    }

    /// SGR 0
    pub fn reset_attributes(&mut self, palette: &Palette) {
        self.foreground = palette.foreground();
        self.background = palette.background();
        self.style = StyleFlags::empty();
        self.inverted = false;
    }

    pub fn set_x(&mut self, x: usize, buf: &Buffer) {
        self.x = x.min(buf.width() - 1);
        self.wrap_due = false;
    }

    pub fn set_y(&mut self, y: usize, buf: &Buffer) {
        self.y = y.min(buf.height() - 1);
        self.wrap_due = false;
    }

    pub fn up(&mut self, n: usize) {
        self.y = self.y.saturating_sub(n);
        self.wrap_due = false;
    }

    pub fn down(&mut self, n: usize, buf: &Buffer) {
        self.set_y(self.y.saturating_add(n), buf);
    }

    pub fn left(&mut self, n: usize) {
        self.x = self.x.saturating_sub(n);
        self.wrap_due = false;
    }

    pub fn right(&mut self, n: usize, buf: &Buffer) {
        self.set_x(self.x.saturating_add(n), buf);
    }

    /// Pull the cursor back inside the grid after a resize or restore.
    pub fn clamp_to(&mut self, buf: &Buffer) {
        self.x = self.x.min(buf.width() - 1);
        self.y = self.y.min(buf.height() - 1);
    }

    pub fn carriage_return(&mut self) {
        self.x = 0;
        self.wrap_due = false;
    }

    /// Move down one row, scrolling when leaving the bottom of the scroll region.
    pub fn line_feed(&mut self, buf: &mut Buffer) {
        self.wrap_due = false;
        if self.y + 1 == buf.scroll_bottom() {
            buf.scroll(1);
        } else if self.y + 1 < buf.height() {
            self.y += 1;
        }
    }

    /// Move up one row, scrolling when leaving the top of the scroll region.
    pub fn reverse_line_feed(&mut self, buf: &mut Buffer) {
        self.wrap_due = false;
        if self.y == buf.scroll_top() {
            buf.scroll(-1);
        } else if self.y > 0 {
            self.y -= 1;
        }
    }

    /// Step one cell right. At the last column only the wrap flag changes.
    pub fn advance(&mut self, buf: &Buffer, autowrap: bool) {
        if self.x + 1 >= buf.width() {
            self.wrap_due = autowrap;
        } else {
            self.x += 1;
            self.wrap_due = false;
        }
    }

    /// Step one cell left, reverse-wrapping to the previous row under autowrap.
    pub fn retreat(&mut self, buf: &mut Buffer, autowrap: bool) {
        self.wrap_due = false;
        if self.x > 0 {
            self.x -= 1;
            return;
        }
        if !autowrap {
            return;
        }

        if self.y == buf.scroll_top() {
            buf.scroll(-1);
        } else if self.y > 0 {
            self.y -= 1;
        } else {
            return;
        }
        self.x = buf.width() - 1;
    }

    /// CHT: forward `n` tab stops
    pub fn tab_forward(&mut self, n: usize, buf: &Buffer) {
        let stop = (self.x / TAB_WIDTH).saturating_add(n).saturating_mul(TAB_WIDTH);
        self.set_x(stop, buf);
    }

    /// CBT: back `n` tab stops
    pub fn tab_backward(&mut self, n: usize) {
        for _ in 0..n {
            if self.x == 0 {
                break;
            }
            self.x = (self.x - 1) / TAB_WIDTH * TAB_WIDTH;
        }
        self.wrap_due = false;
    }

    /// Write one printable code point at the cursor and advance.
    pub fn write(&mut self, ch: char, buf: &mut Buffer, modes: &Modes) {
        if is_combining_mark(ch) {
            self.attach_mark(ch, buf, modes.autowrap);
            return;
        }

        if self.wrap_due && modes.autowrap {
            self.carriage_return();
            self.line_feed(buf);
        }
        if modes.insert {
            buf.insert_blanks(self.x, self.y, 1);
        }

        let (fg, bg) = self.cell_colors();
        *buf.cell_mut(self.x, self.y) = Cell::new(ch, fg, bg, self.style);
        self.advance(buf, modes.autowrap);
    }

    /// Combining marks join the most recently written cell and never
    /// move the cursor by more than one cell.
    fn attach_mark(&mut self, mark: char, buf: &mut Buffer, autowrap: bool) {
        if self.wrap_due {
            buf.cell_mut(self.x, self.y).push_mark(mark);
        } else if self.x > 0 {
            buf.cell_mut(self.x - 1, self.y).push_mark(mark);
        } else {
            // Nothing to join at the start of a line
            let (fg, bg) = self.cell_colors();
            *buf.cell_mut(self.x, self.y) = Cell::new(mark, fg, bg, self.style);
            self.advance(buf, autowrap);
        }
    }
}
