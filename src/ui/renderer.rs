//! Terminal renderer using crossterm
//!
//! Paints screen snapshots onto the hosting terminal and passes window
//! requests from the remote side through to it.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, SetCursorStyle, Show},
    event::{DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
};
use tracing::{debug, info};
use unicode_width::UnicodeWidthStr;

use crate::core::term::{Cell, Rgb, Snapshot, StyleFlags, Surface, WindowOp};

/// A stretch of cells on one row sharing colours and style
#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    column: u16,
    text: String,
    fg: Rgb,
    bg: Rgb,
    style: StyleFlags,
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb {
        r: rgb.r,
        g: rgb.g,
        b: rgb.b,
    }
}

/// Split a row into runs. Cells whose text is not exactly one column wide
/// get a run of their own so every run starts at its true column.
fn row_runs(row: &[Cell], inverted: bool) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut isolate_next = false;

    for (x, cell) in row.iter().enumerate() {
        let (fg, bg) = if inverted { (cell.bg, cell.fg) } else { (cell.fg, cell.bg) };
        let text = cell.display_text();
        let single = UnicodeWidthStr::width(text) == 1;

        match runs.last_mut() {
            Some(run) if single && !isolate_next && run.fg == fg && run.bg == bg && run.style == cell.style => {
                run.text.push_str(text);
            }
            _ => runs.push(Run {
                column: x as u16,
                text: text.to_string(),
                fg,
                bg,
                style: cell.style,
            }),
        }
        isolate_next = !single;
    }
    runs
}

fn printable_title(title: &str) -> String {
    title.chars().filter(|c| !c.is_control()).collect()
}

/// xterm request that performs `op` on the hosting terminal, if any
fn window_sequence(op: WindowOp) -> Option<String> {
    let sequence = match op {
        WindowOp::Deiconify => "\x1b[1t".to_string(),
        WindowOp::Iconify => "\x1b[2t".to_string(),
        WindowOp::Move { x, y } => format!("\x1b[3;{};{}t", x, y),
        WindowOp::ResizePixels { height, width } => format!("\x1b[4;{};{}t", height, width),
        WindowOp::Raise => "\x1b[5t".to_string(),
        WindowOp::Lower => "\x1b[6t".to_string(),
        WindowOp::Refresh => "\x1b[7t".to_string(),
        WindowOp::ResizeCells { rows, cols } => format!("\x1b[8;{};{}t", rows, cols),
        WindowOp::Maximize(on) => format!("\x1b[9;{}t", u8::from(on)),
        _ => return None,
    };
    Some(sequence)
}

/// Terminal renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
    repaint_requested: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            repaint_requested: true,
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableMouseCapture,
            EnableBracketedPaste,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        stdout.flush()?;

        self.initialized = true;
        info!("Renderer initialized");
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(
            stdout,
            ResetColor,
            SetAttribute(Attribute::Reset),
            SetCursorStyle::DefaultUserShape,
            Show,
            EnableLineWrap,
            DisableBracketedPaste,
            DisableMouseCapture,
            LeaveAlternateScreen
        );
        let _ = stdout.flush();

        terminal::disable_raw_mode()?;
        println!();
        Ok(())
    }

    /// True once after a repaint was requested
    pub fn take_repaint_request(&mut self) -> bool {
        std::mem::take(&mut self.repaint_requested)
    }

    /// Set the host window title. Control characters from the remote
    /// side are dropped so they cannot end or extend the title sequence.
    pub fn set_title(&mut self, title: &str) -> io::Result<()> {
        execute!(io::stdout(), SetTitle(printable_title(title)))
    }

    pub fn bell(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(b"\x07")?;
        stdout.flush()
    }

    /// Forward a window request to the hosting terminal. Returns false if
    /// there is nothing to forward.
    pub fn apply_window_op(&mut self, op: WindowOp) -> io::Result<bool> {
        let Some(sequence) = window_sequence(op) else {
            debug!("window op {:?} has no host equivalent", op);
            return Ok(false);
        };
        let mut stdout = io::stdout();
        stdout.write_all(sequence.as_bytes())?;
        stdout.flush()?;
        if matches!(op, WindowOp::Refresh) {
            self.repaint_requested = true;
        }
        Ok(true)
    }

    fn apply_style<W: Write>(out: &mut W, run: &Run) -> io::Result<()> {
        queue!(out, SetAttribute(Attribute::Reset))?;
        if run.style.contains(StyleFlags::BOLD) {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        if run.style.contains(StyleFlags::ITALIC) {
            queue!(out, SetAttribute(Attribute::Italic))?;
        }
        if run.style.contains(StyleFlags::UNDERLINE) {
            queue!(out, SetAttribute(Attribute::Underlined))?;
        }
        queue!(out, SetForegroundColor(to_color(run.fg)), SetBackgroundColor(to_color(run.bg)))
    }
}

impl Surface for Renderer {
    fn paint(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = io::BufWriter::with_capacity(65536, stdout.lock());

        queue!(out, Hide)?;
        for (y, row) in snapshot.rows.iter().enumerate() {
            for run in row_runs(row, snapshot.inverted) {
                queue!(out, MoveTo(run.column, y as u16))?;
                Self::apply_style(&mut out, &run)?;
                queue!(out, Print(&run.text))?;
            }
        }
        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;

        let cursor = snapshot.cursor;
        if cursor.visible {
            let shape = if cursor.blinking {
                SetCursorStyle::BlinkingBlock
            } else {
                SetCursorStyle::SteadyBlock
            };
            queue!(out, MoveTo(cursor.x as u16, cursor.y as u16), shape, Show)?;
        }

        out.flush()
    }

    fn request_repaint(&mut self) {
        self.repaint_requested = true;
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::Palette;

    fn cell(ch: char, fg: Rgb, bg: Rgb) -> Cell {
        Cell::new(ch, fg, bg, StyleFlags::empty())
    }

    #[test]
    fn test_runs_group_matching_cells() {
        let palette = Palette::default();
        let (fg, bg, red) = (palette.foreground(), palette.background(), palette.color(1));
        let row = vec![cell('a', fg, bg), cell('b', fg, bg), cell('c', red, bg), Cell::blank(&palette)];

        let runs = row_runs(&row, false);
        assert_eq!(runs.len(), 3);
        assert_eq!((runs[0].column, runs[0].text.as_str()), (0, "ab"));
        assert_eq!((runs[1].column, runs[1].fg), (2, red));
        assert_eq!((runs[2].column, runs[2].text.as_str()), (3, " "));
    }

    #[test]
    fn test_runs_swap_for_inverted_screen() {
        let palette = Palette::default();
        let row = vec![Cell::blank(&palette)];
        let runs = row_runs(&row, true);
        assert_eq!(runs[0].fg, palette.background());
        assert_eq!(runs[0].bg, palette.foreground());
    }

    #[test]
    fn test_wide_and_combining_cells_isolated() {
        let palette = Palette::default();
        let (fg, bg) = (palette.foreground(), palette.background());
        let mut accented = cell('e', fg, bg);
        accented.push_mark('\u{301}');
        let row = vec![cell('a', fg, bg), cell('漢', fg, bg), cell('b', fg, bg), accented, cell('c', fg, bg)];

        let runs = row_runs(&row, false);
        let columns: Vec<u16> = runs.iter().map(|r| r.column).collect();
        assert_eq!(columns, vec![0, 1, 2]);
        assert_eq!(runs[2].text, "be\u{301}c");

        let lone_mark = Cell::new('\u{301}', fg, bg, StyleFlags::empty());
        let runs = row_runs(&[cell('x', fg, bg), lone_mark, cell('y', fg, bg)], false);
        let columns: Vec<u16> = runs.iter().map(|r| r.column).collect();
        assert_eq!(columns, vec![0, 1, 2]);
    }

    #[test]
    fn test_title_control_characters_removed() {
        assert_eq!(printable_title("vim \u{9c}\x1b]0;evil\x07 main.rs"), "vim ]0;evil main.rs");
        assert_eq!(printable_title("plain"), "plain");
    }

    #[test]
    fn test_window_sequences() {
        assert_eq!(window_sequence(WindowOp::Iconify).as_deref(), Some("\x1b[2t"));
        assert_eq!(
            window_sequence(WindowOp::ResizeCells { rows: 30, cols: 100 }).as_deref(),
            Some("\x1b[8;30;100t")
        );
        assert_eq!(window_sequence(WindowOp::Maximize(true)).as_deref(), Some("\x1b[9;1t"));
        assert_eq!(window_sequence(WindowOp::ReportTitle), None);
    }
}
