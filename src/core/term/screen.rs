//! Screen: buffer, live cursor, saved cursor and terminal modes
//!
//! All decoder-visible mutations go through [`Screen`]; the painter only sees
//! [`Snapshot`]s through the [`Surface`] trait.

use std::io;
use std::sync::Arc;

use super::buffer::{Buffer, Point};
use super::cell::Cell;
use super::cursor::Cursor;
use super::style::Palette;

/// Terminal modes toggled by SM/RM and DECSET/DECRST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modes {
    /// DECAWM
    pub autowrap: bool,
    /// IRM
    pub insert: bool,
    /// DECSCNM: paint with foreground and background exchanged
    pub inverted: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            autowrap: true,
            insert: false,
            inverted: false,
        }
    }
}

/// Cursor as the painter needs it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorView {
    pub x: usize,
    pub y: usize,
    pub visible: bool,
    pub blinking: bool,
}

/// Point-in-time copy of the active grid for painting
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub width: usize,
    pub height: usize,
    pub rows: Vec<Vec<Cell>>,
    pub cursor: CursorView,
    pub inverted: bool,
}

/// Painting surface the screen is displayed on
pub trait Surface {
    /// Draw a full frame
    fn paint(&mut self, snapshot: &Snapshot) -> io::Result<()>;

    /// Ask for a full repaint on the next frame
    fn request_repaint(&mut self);

    /// Size in cells (cols, rows)
    fn size(&self) -> io::Result<(u16, u16)>;
}

#[derive(Debug, Clone)]
pub struct Screen {
    buffer: Buffer,
    cursor: Cursor,
    saved: Cursor,
    pub modes: Modes,
}

impl Screen {
    /// Size used when the hosting terminal cannot report one
    pub const DEFAULT_COLS: u16 = 80;
    pub const DEFAULT_ROWS: u16 = 24;

    pub fn new(cols: usize, rows: usize, palette: Arc<Palette>) -> Self {
        let cursor = Cursor::new(&palette);
        Self {
            buffer: Buffer::new(cols, rows, palette),
            saved: cursor.clone(),
            cursor,
            modes: Modes::default(),
        }
    }

    pub fn width(&self) -> usize {
        self.buffer.width()
    }

    pub fn height(&self) -> usize {
        self.buffer.height()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn palette(&self) -> &Arc<Palette> {
        self.buffer.palette()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Attribute and visibility changes; use the movement methods for position.
    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn write(&mut self, ch: char) {
        self.buffer.clear_selection();
        self.cursor.write(ch, &mut self.buffer, &self.modes);
    }

    pub fn write_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.write(ch);
        }
    }

    /// Write a locally generated line (status or error text) followed by CR LF.
    pub fn print_line(&mut self, text: &str) {
        self.write_str(text);
        self.carriage_return();
        self.line_feed();
    }

    pub fn carriage_return(&mut self) {
        self.cursor.carriage_return();
    }

    pub fn line_feed(&mut self) {
        self.cursor.line_feed(&mut self.buffer);
    }

    pub fn reverse_line_feed(&mut self) {
        self.cursor.reverse_line_feed(&mut self.buffer);
    }

    pub fn backspace(&mut self) {
        self.cursor.retreat(&mut self.buffer, self.modes.autowrap);
    }

    pub fn tab(&mut self, n: usize) {
        self.cursor.tab_forward(n, &self.buffer);
    }

    pub fn back_tab(&mut self, n: usize) {
        self.cursor.tab_backward(n);
    }

    pub fn cursor_up(&mut self, n: usize) {
        self.cursor.up(n);
    }

    pub fn cursor_down(&mut self, n: usize) {
        self.cursor.down(n, &self.buffer);
    }

    pub fn cursor_left(&mut self, n: usize) {
        self.cursor.left(n);
    }

    pub fn cursor_right(&mut self, n: usize) {
        self.cursor.right(n, &self.buffer);
    }

    pub fn set_cursor_x(&mut self, x: usize) {
        self.cursor.set_x(x, &self.buffer);
    }

    pub fn set_cursor_y(&mut self, y: usize) {
        self.cursor.set_y(y, &self.buffer);
    }

    pub fn set_cursor_position(&mut self, x: usize, y: usize) {
        self.cursor.set_x(x, &self.buffer);
        self.cursor.set_y(y, &self.buffer);
    }

    pub fn save_cursor(&mut self) {
        self.saved = self.cursor.clone();
    }

    pub fn restore_cursor(&mut self) {
        self.cursor = self.saved.clone();
        self.cursor.clamp_to(&self.buffer);
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn clear_line(&mut self, y: usize) {
        self.buffer.clear_line(y);
    }

    pub fn clear_cell(&mut self, x: usize, y: usize) {
        self.buffer.clear_cell(x, y);
    }

    pub fn scroll(&mut self, d: isize) {
        self.buffer.scroll(d);
    }

    /// DCH at the cursor
    pub fn delete(&mut self, n: usize) {
        self.buffer.delete(self.cursor.x(), self.cursor.y(), n);
    }

    /// ICH at the cursor
    pub fn insert_blanks(&mut self, n: usize) {
        self.buffer.insert_blanks(self.cursor.x(), self.cursor.y(), n);
    }

    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) -> bool {
        self.buffer.set_scroll_region(top, bottom)
    }

    pub fn use_alternate(&mut self) {
        self.buffer.use_alternate();
    }

    pub fn use_normal(&mut self) {
        self.buffer.use_normal();
    }

    /// Resize the grids and pull both cursors back inside.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.buffer.resize(cols, rows);
        self.cursor.clamp_to(&self.buffer);
        self.saved.clamp_to(&self.buffer);
    }

    /// RIS
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.cursor = Cursor::new(self.buffer.palette());
        self.saved = self.cursor.clone();
        self.modes = Modes::default();
    }

    pub fn select(&mut self, a: Point, b: Point) {
        self.buffer.select(a, b);
    }

    pub fn clear_selection(&mut self) {
        self.buffer.clear_selection();
    }

    pub fn selection_text(&self) -> String {
        self.buffer.selection_text()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            width: self.width(),
            height: self.height(),
            rows: self.buffer.rows().to_vec(),
            cursor: CursorView {
                x: self.cursor.x(),
                y: self.cursor.y(),
                visible: self.cursor.visible,
                blinking: self.cursor.blinking,
            },
            inverted: self.modes.inverted,
        }
    }
}
