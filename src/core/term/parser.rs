//! Escape-sequence decoder
//!
//! Consumes code points one at a time, drives the [`Screen`] and reports
//! bells, titles, mode changes and window manipulation to a [`Host`].
//! Anything it does not understand is logged at debug level and skipped
//! without losing sync with the stream.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::params::ParamAccumulator;
use super::screen::Screen;
use super::style::{Palette, Rgb, StyleFlags};

const MAX_TITLE_LEN: usize = 4096;
const MAX_OSC_CODE_LEN: usize = 8;
const MAX_INTERMEDIATES: usize = 16;

/// Reply that must be sent back to the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// ENQ answerback
    Answerback,
    /// DSR 5: terminal OK
    OperatingStatus,
    /// DSR 6: ESC [ row ; col R (1-based)
    CursorPosition { row: usize, col: usize },
    /// DA: VT100 with advanced video option
    DeviceAttributes,
    WindowState { iconified: bool },
    WindowPosition { x: i32, y: i32 },
    WindowPixelSize { height: u32, width: u32 },
    TextAreaSize { rows: usize, cols: usize },
    ScreenSize { rows: usize, cols: usize },
    IconLabel(String),
    Title(String),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Answerback => f.write_str("Terminal"),
            Response::OperatingStatus => f.write_str("\x1b[0n"),
            Response::CursorPosition { row, col } => write!(f, "\x1b[{};{}R", row, col),
            Response::DeviceAttributes => f.write_str("\x1b[?1;2c"),
            Response::WindowState { iconified } => {
                write!(f, "\x1b[{}t", if *iconified { 2 } else { 1 })
            }
            Response::WindowPosition { x, y } => write!(f, "\x1b[3;{};{}t", x, y),
            Response::WindowPixelSize { height, width } => write!(f, "\x1b[4;{};{}t", height, width),
            Response::TextAreaSize { rows, cols } => write!(f, "\x1b[8;{};{}t", rows, cols),
            Response::ScreenSize { rows, cols } => write!(f, "\x1b[9;{};{}t", rows, cols),
            Response::IconLabel(label) => write!(f, "\x1b]L{}\x1b\\", label),
            Response::Title(title) => write!(f, "\x1b]l{}\x1b\\", title),
        }
    }
}

/// Window manipulation (`CSI Ps ; Ps ; Ps t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOp {
    Deiconify,
    Iconify,
    Move { x: u16, y: u16 },
    ResizePixels { height: u16, width: u16 },
    Raise,
    Lower,
    Refresh,
    ResizeCells { rows: u16, cols: u16 },
    Maximize(bool),
    ReportState,
    ReportPosition,
    ReportPixelSize,
    ReportTextAreaSize,
    ReportScreenSize,
    ReportIconLabel,
    ReportTitle,
}

impl WindowOp {
    /// Validate an operation code and its remaining arguments.
    pub fn parse(op: u16, args: &[Option<u16>]) -> Option<Self> {
        if args.len() > 2 {
            return None;
        }
        let arg = |i: usize| args.get(i).copied().flatten();

        let parsed = match op {
            1 => WindowOp::Deiconify,
            2 => WindowOp::Iconify,
            3 => WindowOp::Move {
                x: arg(0)?,
                y: arg(1)?,
            },
            4 => WindowOp::ResizePixels {
                height: arg(0)?,
                width: arg(1)?,
            },
            5 => WindowOp::Raise,
            6 => WindowOp::Lower,
            7 => WindowOp::Refresh,
            8 => WindowOp::ResizeCells {
                rows: arg(0)?,
                cols: arg(1)?,
            },
            9 => match arg(0)? {
                0 => WindowOp::Maximize(false),
                1 => WindowOp::Maximize(true),
                _ => return None,
            },
            11 => WindowOp::ReportState,
            13 => WindowOp::ReportPosition,
            14 => WindowOp::ReportPixelSize,
            18 => WindowOp::ReportTextAreaSize,
            19 => WindowOp::ReportScreenSize,
            20 => WindowOp::ReportIconLabel,
            21 => WindowOp::ReportTitle,
            _ => return None,
        };
        Some(parsed)
    }
}

/// Window position and pixel size as reported to the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width_px: u32,
    pub height_px: u32,
    pub iconified: bool,
}

/// Side effects the decoder cannot apply to the screen itself.
///
/// Every method has a no-op default so hosts implement only what they support.
pub trait Host {
    fn bell(&mut self) {}

    fn set_title(&mut self, _title: &str) {}

    fn title(&self) -> String {
        String::new()
    }

    /// DECCKM
    fn set_application_cursor_keys(&mut self, _enabled: bool) {}

    /// Perform a window action. Returns false if unsupported.
    fn window_op(&mut self, _op: WindowOp) -> bool {
        false
    }

    fn window_geometry(&self) -> WindowGeometry {
        WindowGeometry::default()
    }

    /// Called after every CSI sequence, supported or not
    fn sequence_done(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DecoderState {
    #[default]
    Ground,
    Escape,
    /// ESC ( and friends: the designator is discarded
    Charset,
    Csi,
    CsiIntermediate,
    OscCode,
    OscTitle,
    OscTitleEscape,
    OscIgnore,
    OscIgnoreEscape,
}

impl DecoderState {
    fn in_osc(self) -> bool {
        matches!(
            self,
            DecoderState::OscCode
                | DecoderState::OscTitle
                | DecoderState::OscTitleEscape
                | DecoderState::OscIgnore
                | DecoderState::OscIgnoreEscape
        )
    }
}

fn printable(ch: char) -> String {
    if ch.is_control() {
        format!("<{:#04x}>", ch as u32)
    } else {
        ch.to_string()
    }
}

#[derive(Debug, Default)]
pub struct Decoder {
    state: DecoderState,
    params: ParamAccumulator,
    private: bool,
    intermediates: String,
    osc_code: String,
    osc_text: String,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a single code point
    pub fn feed(&mut self, ch: char, screen: &mut Screen, host: &mut dyn Host) -> Option<Response> {
        // C0 controls act immediately, even inside a sequence
        if (ch < ' ' || ch == '\u{7f}') && !self.state.in_osc() {
            return self.control(ch, screen, host);
        }

        match self.state {
            DecoderState::Ground => {
                if ch.is_control() {
                    trace!("ignored control {}", printable(ch));
                } else {
                    screen.write(ch);
                }
                None
            }
            DecoderState::Escape => {
                self.escape(ch, screen, host);
                None
            }
            DecoderState::Charset => {
                self.state = DecoderState::Ground;
                None
            }
            DecoderState::Csi => self.csi(ch, screen, host),
            DecoderState::CsiIntermediate => {
                self.csi_intermediate(ch, host);
                None
            }
            DecoderState::OscCode => {
                self.osc_command(ch);
                None
            }
            DecoderState::OscTitle => {
                self.osc_title(ch, host);
                None
            }
            DecoderState::OscIgnore => {
                self.osc_ignore(ch);
                None
            }
            DecoderState::OscTitleEscape => {
                self.finish_title(host);
                self.osc_escape(ch, screen, host)
            }
            DecoderState::OscIgnoreEscape => self.osc_escape(ch, screen, host),
        }
    }

    fn control(&mut self, ch: char, screen: &mut Screen, host: &mut dyn Host) -> Option<Response> {
        match ch {
            '\u{1b}' => {
                if !matches!(self.state, DecoderState::Ground | DecoderState::Escape) {
                    debug!("sequence interrupted by ESC in state {:?}", self.state);
                }
                self.state = DecoderState::Escape;
            }
            // CAN, SUB
            '\u{18}' | '\u{1a}' => self.state = DecoderState::Ground,
            '\u{05}' => return Some(Response::Answerback),
            '\u{07}' => host.bell(),
            '\u{08}' => screen.backspace(),
            '\t' => screen.tab(1),
            '\n' | '\u{0b}' | '\u{0c}' => screen.line_feed(),
            '\r' => screen.carriage_return(),
            _ => trace!("ignored control {}", printable(ch)),
        }
        None
    }

    fn escape(&mut self, ch: char, screen: &mut Screen, host: &mut dyn Host) {
        self.state = DecoderState::Ground;
        match ch {
            '[' => {
                self.params.start();
                self.private = false;
                self.intermediates.clear();
                self.state = DecoderState::Csi;
            }
            ']' => {
                self.osc_code.clear();
                self.state = DecoderState::OscCode;
            }
            '(' | ')' | '*' | '+' => self.state = DecoderState::Charset,
            '7' => screen.save_cursor(),
            '8' => screen.restore_cursor(),
            'D' => screen.line_feed(),
            'E' => {
                screen.carriage_return();
                screen.line_feed();
            }
            'M' => screen.reverse_line_feed(),
            'c' => {
                screen.reset();
                host.set_application_cursor_keys(false);
            }
            // Keypad modes have no effect on output
            '=' | '>' => {}
            _ => debug!("unsupported: ESC {}", printable(ch)),
        }
    }

    fn csi(&mut self, ch: char, screen: &mut Screen, host: &mut dyn Host) -> Option<Response> {
        let terminator = self.params.feed(ch)?;
        match terminator {
            '?' if !self.private => {
                self.private = true;
                self.params.start();
                None
            }
            ' '..='/' | ':' | '<'..='?' => {
                self.intermediates.push(terminator);
                self.state = DecoderState::CsiIntermediate;
                None
            }
            _ => {
                self.state = DecoderState::Ground;
                let response = self.dispatch_csi(terminator, screen, host);
                host.sequence_done();
                response
            }
        }
    }

    /// Skip to the final byte of a sequence we cannot interpret.
    fn csi_intermediate(&mut self, ch: char, host: &mut dyn Host) {
        if ('\u{40}'..='\u{7e}').contains(&ch) {
            self.state = DecoderState::Ground;
            debug!(
                "unsupported: CSI {}{}{}{}",
                if self.private { "?" } else { "" },
                self.params,
                self.intermediates,
                ch
            );
            host.sequence_done();
        } else if self.intermediates.len() < MAX_INTERMEDIATES {
            self.intermediates.push(ch);
        }
    }

    fn unsupported_csi(&self, final_char: char) {
        debug!(
            "unsupported: CSI {}{}{}",
            if self.private { "?" } else { "" },
            self.params,
            printable(final_char)
        );
    }

    fn dispatch_csi(&mut self, final_char: char, screen: &mut Screen, host: &mut dyn Host) -> Option<Response> {
        // Count or 1-based position; an explicit 0 means 1
        let n = usize::from(self.params.get_or(0, 1).max(1));

        match final_char {
            '@' => screen.insert_blanks(n),
            'A' => screen.cursor_up(n),
            'B' => screen.cursor_down(n),
            'C' => screen.cursor_right(n),
            'D' => screen.cursor_left(n),
            'E' => {
                screen.cursor_down(n);
                screen.carriage_return();
            }
            'F' => {
                screen.cursor_up(n);
                screen.carriage_return();
            }
            'G' | '`' => screen.set_cursor_x(n - 1),
            'H' | 'f' => {
                let x = usize::from(self.params.get_or(1, 1).max(1));
                screen.set_cursor_position(x - 1, n - 1);
            }
            'I' => screen.tab(n),
            'Z' => screen.back_tab(n),
            'J' => self.erase(self.params.get_or(0, 0), screen),
            'K' => self.erase(self.params.get_or(0, 0).saturating_add(4), screen),
            'P' => screen.delete(n),
            'S' => screen.scroll(n as isize),
            'T' => screen.scroll(-(n as isize)),
            'd' => screen.set_cursor_y(n - 1),
            'h' | 'l' => self.set_modes(final_char == 'h', screen, host),
            'm' => self.select_graphic_rendition(screen),
            'n' => return self.device_status(screen),
            'c' => {
                if !self.private && self.params.get_or(0, 0) == 0 {
                    return Some(Response::DeviceAttributes);
                }
                self.unsupported_csi(final_char);
            }
            'r' => {
                let bottom = match self.params.get_or(1, 0) {
                    0 => screen.height(),
                    b => usize::from(b),
                };
                if !screen.set_scroll_region(n - 1, bottom) {
                    self.unsupported_csi(final_char);
                }
            }
            't' => return self.window(screen, host),
            _ => self.unsupported_csi(final_char),
        }
        None
    }

    /// ED (0..=3) and EL (4..=6 here, offset by 4)
    fn erase(&self, code: u16, screen: &mut Screen) {
        let (x, y) = (screen.cursor().x(), screen.cursor().y());
        let (width, height) = (screen.width(), screen.height());

        match code {
            0 => {
                for col in x..width {
                    screen.clear_cell(col, y);
                }
                for row in y + 1..height {
                    screen.clear_line(row);
                }
            }
            1 => {
                for row in 0..y {
                    screen.clear_line(row);
                }
                for col in 0..=x {
                    screen.clear_cell(col, y);
                }
            }
            2 => screen.clear(),
            4 => {
                for col in x..width {
                    screen.clear_cell(col, y);
                }
            }
            5 => {
                for col in 0..=x {
                    screen.clear_cell(col, y);
                }
            }
            6 => screen.clear_line(y),
            _ => debug!("unsupported: erase {}", code),
        }
    }

    fn device_status(&self, screen: &Screen) -> Option<Response> {
        if !self.private {
            match self.params.get_or(0, 0) {
                5 => return Some(Response::OperatingStatus),
                6 => {
                    let cursor = screen.cursor();
                    return Some(Response::CursorPosition {
                        row: cursor.y() + 1,
                        col: cursor.x() + 1,
                    });
                }
                _ => {}
            }
        }
        self.unsupported_csi('n');
        None
    }

    fn set_modes(&mut self, enable: bool, screen: &mut Screen, host: &mut dyn Host) {
        loop {
            let mode = self.params.pop();
            self.set_mode(mode, enable, screen, host);
            if !self.params.has_remaining() {
                break;
            }
        }
    }

    fn set_mode(&self, mode: Option<u16>, enable: bool, screen: &mut Screen, host: &mut dyn Host) {
        match (self.private, mode) {
            (false, Some(4)) => screen.modes.insert = enable,
            (true, Some(1)) => host.set_application_cursor_keys(enable),
            // DECSCLM: smooth scrolling has no meaning here
            (true, Some(4)) => {}
            (true, Some(5)) => screen.modes.inverted = enable,
            (true, Some(7)) => screen.modes.autowrap = enable,
            (true, Some(12)) => screen.cursor_mut().blinking = enable,
            (true, Some(25)) => screen.cursor_mut().visible = enable,
            (true, Some(47 | 1047)) => {
                if enable {
                    screen.use_alternate();
                } else {
                    screen.use_normal();
                }
            }
            (true, Some(1048)) => {
                if enable {
                    screen.save_cursor();
                } else {
                    screen.restore_cursor();
                }
            }
            (true, Some(1049)) => {
                if enable {
                    screen.save_cursor();
                    screen.use_alternate();
                    screen.clear();
                } else {
                    screen.use_normal();
                    screen.restore_cursor();
                }
            }
            _ => debug!(
                "unsupported: mode {}{} {}",
                if self.private { "?" } else { "" },
                mode.map(|m| m.to_string()).unwrap_or_default(),
                if enable { "set" } else { "reset" }
            ),
        }
    }

    fn select_graphic_rendition(&mut self, screen: &mut Screen) {
        let palette = Arc::clone(screen.palette());

        loop {
            let code = self.params.pop_or(0);
            let cursor = screen.cursor_mut();
            match code {
                0 => cursor.reset_attributes(&palette),
                1 | 5 => cursor.style |= StyleFlags::BOLD,
                2 | 3 => cursor.style |= StyleFlags::ITALIC,
                4 => cursor.style |= StyleFlags::UNDERLINE,
                7 => cursor.set_inverted(true),
                21 | 22 | 25 => cursor.style.remove(StyleFlags::BOLD),
                23 => cursor.style.remove(StyleFlags::ITALIC),
                24 => cursor.style.remove(StyleFlags::UNDERLINE),
                27 => cursor.set_inverted(false),
                30..=37 => cursor.set_foreground(palette.color((code - 30) as u8)),
                38 => match self.extended_color(&palette) {
                    Some(color) => cursor.set_foreground(color),
                    None => debug!("unsupported: SGR 38 with {}", self.params),
                },
                39 => cursor.set_foreground(palette.foreground()),
                40..=47 => cursor.set_background(palette.color((code - 40) as u8)),
                48 => match self.extended_color(&palette) {
                    Some(color) => cursor.set_background(color),
                    None => debug!("unsupported: SGR 48 with {}", self.params),
                },
                49 => cursor.set_background(palette.background()),
                90..=97 => cursor.set_foreground(palette.color((code - 90 + 8) as u8)),
                100..=107 => cursor.set_background(palette.color((code - 100 + 8) as u8)),
                _ => debug!("unsupported: SGR {}", code),
            }

            if !self.params.has_remaining() {
                break;
            }
        }
    }

    /// `5;n` (indexed) or `2;r;g;b` (direct) after SGR 38/48
    fn extended_color(&mut self, palette: &Palette) -> Option<Rgb> {
        match self.params.pop()? {
            5 => {
                let index = self.params.pop()?;
                Some(palette.color(index.min(255) as u8))
            }
            2 => {
                let mut channel = || self.params.pop_or(0).min(255) as u8;
                let (r, g, b) = (channel(), channel(), channel());
                Some(Rgb::new(r, g, b))
            }
            _ => None,
        }
    }

    fn window(&mut self, screen: &Screen, host: &mut dyn Host) -> Option<Response> {
        let code = self.params.get_or(0, 1);
        self.params.pop();
        let Some(op) = WindowOp::parse(code, &self.params.remaining()) else {
            debug!("unsupported: window op {} ({})", code, self.params);
            return None;
        };

        let geometry = host.window_geometry();
        match op {
            WindowOp::ReportState => Some(Response::WindowState {
                iconified: geometry.iconified,
            }),
            WindowOp::ReportPosition => Some(Response::WindowPosition {
                x: geometry.x,
                y: geometry.y,
            }),
            WindowOp::ReportPixelSize => Some(Response::WindowPixelSize {
                height: geometry.height_px,
                width: geometry.width_px,
            }),
            WindowOp::ReportTextAreaSize => Some(Response::TextAreaSize {
                rows: screen.height(),
                cols: screen.width(),
            }),
            WindowOp::ReportScreenSize => Some(Response::ScreenSize {
                rows: screen.height(),
                cols: screen.width(),
            }),
            WindowOp::ReportIconLabel => Some(Response::IconLabel(host.title())),
            WindowOp::ReportTitle => Some(Response::Title(host.title())),
            action => {
                if !host.window_op(action) {
                    debug!("unsupported: window op {:?}", action);
                }
                None
            }
        }
    }

    fn osc_command(&mut self, ch: char) {
        match ch {
            '0'..='9' if self.osc_code.len() < MAX_OSC_CODE_LEN => self.osc_code.push(ch),
            ';' if matches!(self.osc_code.as_str(), "0" | "1" | "2") => {
                self.osc_text.clear();
                self.state = DecoderState::OscTitle;
            }
            _ => {
                debug!("unsupported: OSC {}", self.osc_code);
                self.state = DecoderState::OscIgnore;
                self.osc_ignore(ch);
            }
        }
    }

    fn osc_title(&mut self, ch: char, host: &mut dyn Host) {
        match ch {
            '\u{07}' | '\u{9c}' => {
                self.finish_title(host);
                self.state = DecoderState::Ground;
            }
            '\u{1b}' => self.state = DecoderState::OscTitleEscape,
            _ if self.osc_text.len() < MAX_TITLE_LEN => self.osc_text.push(ch),
            _ => {}
        }
    }

    fn finish_title(&mut self, host: &mut dyn Host) {
        let title = std::mem::take(&mut self.osc_text);
        host.set_title(&title);
    }

    fn osc_ignore(&mut self, ch: char) {
        match ch {
            '\u{07}' | '\u{9c}' => self.state = DecoderState::Ground,
            '\u{1b}' => self.state = DecoderState::OscIgnoreEscape,
            _ => {}
        }
    }

    /// ESC inside an OSC string: `ESC \` ends it, anything else starts a new escape.
    fn osc_escape(&mut self, ch: char, screen: &mut Screen, host: &mut dyn Host) -> Option<Response> {
        if ch == '\\' {
            self.state = DecoderState::Ground;
            return None;
        }
        self.state = DecoderState::Escape;
        self.feed(ch, screen, host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::buffer::Point;

    #[derive(Default)]
    struct RecordingHost {
        bells: usize,
        title: String,
        app_cursor: bool,
        ops: Vec<WindowOp>,
        accept_ops: bool,
        sequences: usize,
        geometry: WindowGeometry,
    }

    impl Host for RecordingHost {
        fn bell(&mut self) {
            self.bells += 1;
        }

        fn set_title(&mut self, title: &str) {
            self.title = title.to_string();
        }

        fn title(&self) -> String {
            self.title.clone()
        }

        fn set_application_cursor_keys(&mut self, enabled: bool) {
            self.app_cursor = enabled;
        }

        fn window_op(&mut self, op: WindowOp) -> bool {
            self.ops.push(op);
            self.accept_ops
        }

        fn window_geometry(&self) -> WindowGeometry {
            self.geometry
        }

        fn sequence_done(&mut self) {
            self.sequences += 1;
        }
    }

    struct Harness {
        decoder: Decoder,
        screen: Screen,
        host: RecordingHost,
    }

    impl Harness {
        fn new(cols: usize, rows: usize) -> Self {
            Self {
                decoder: Decoder::new(),
                screen: Screen::new(cols, rows, Arc::new(Palette::default())),
                host: RecordingHost::default(),
            }
        }

        fn feed(&mut self, input: &str) -> Vec<Response> {
            input
                .chars()
                .filter_map(|ch| self.decoder.feed(ch, &mut self.screen, &mut self.host))
                .collect()
        }

        fn text(&self, x: usize, y: usize) -> &str {
            self.screen.buffer().cell(x, y).display_text()
        }

        fn row(&self, y: usize) -> String {
            self.screen.buffer().rows()[y]
                .iter()
                .map(|c| c.display_text())
                .collect()
        }

        fn cursor(&self) -> (usize, usize) {
            (self.screen.cursor().x(), self.screen.cursor().y())
        }

        fn palette(&self) -> Arc<Palette> {
            Arc::clone(self.screen.palette())
        }
    }

    #[test]
    fn test_cursor_movement() {
        let mut t = Harness::new(80, 24);

        t.feed("\x1b[5;10H");
        assert_eq!(t.cursor(), (9, 4));

        t.feed("\x1b[H");
        assert_eq!(t.cursor(), (0, 0));

        t.feed("\x1b[3B\x1b[2C");
        assert_eq!(t.cursor(), (2, 3));

        t.feed("\x1b[A\x1b[0D");
        assert_eq!(t.cursor(), (1, 2));

        t.feed("\x1b[99;999H");
        assert_eq!(t.cursor(), (79, 23));

        t.feed("\x1b[2F");
        assert_eq!(t.cursor(), (0, 21));

        t.feed("\x1b[40G\x1b[5d");
        assert_eq!(t.cursor(), (39, 4));
    }

    #[test]
    fn test_inverse_video_end_to_end() {
        let mut t = Harness::new(80, 24);
        let palette = t.palette();

        t.feed("\x1b[2JHi\x1b[H\x1b[7mX");

        let x = t.screen.buffer().cell(0, 0);
        assert_eq!(x.display_text(), "X");
        assert_eq!(x.fg, palette.background());
        assert_eq!(x.bg, palette.foreground());

        let i = t.screen.buffer().cell(1, 0);
        assert_eq!(i.display_text(), "i");
        assert_eq!(i.fg, palette.foreground());
        assert_eq!(i.bg, palette.background());

        assert_eq!(t.cursor(), (1, 0));
    }

    #[test]
    fn test_sgr_inverse_is_idempotent() {
        let mut once = Harness::new(10, 2);
        let mut twice = Harness::new(10, 2);
        once.feed("\x1b[31;7mA");
        twice.feed("\x1b[31;7;7mA");
        assert_eq!(once.screen.buffer().cell(0, 0), twice.screen.buffer().cell(0, 0));

        let mut restored = Harness::new(10, 2);
        restored.feed("\x1b[31m\x1b[7m\x1b[27mA");
        let palette = restored.palette();
        assert_eq!(restored.screen.buffer().cell(0, 0).fg, palette.color(1));
        assert_eq!(restored.screen.buffer().cell(0, 0).bg, palette.background());
    }

    #[test]
    fn test_sgr_colors() {
        let mut t = Harness::new(20, 2);
        let palette = t.palette();

        t.feed("\x1b[31;42ma");
        let cell = t.screen.buffer().cell(0, 0);
        assert_eq!(cell.fg, palette.color(1));
        assert_eq!(cell.bg, palette.color(2));

        t.feed("\x1b[91;104mb");
        let cell = t.screen.buffer().cell(1, 0);
        assert_eq!(cell.fg, palette.color(9));
        assert_eq!(cell.bg, palette.color(12));

        t.feed("\x1b[38;5;196;48;2;1;2;3mc");
        let cell = t.screen.buffer().cell(2, 0);
        assert_eq!(cell.fg, palette.color(196));
        assert_eq!(cell.bg, Rgb::new(1, 2, 3));

        t.feed("\x1b[39;49md");
        let cell = t.screen.buffer().cell(3, 0);
        assert_eq!(cell.fg, palette.foreground());
        assert_eq!(cell.bg, palette.background());
    }

    #[test]
    fn test_sgr_styles_and_reset() {
        let mut t = Harness::new(20, 2);
        let palette = t.palette();

        t.feed("\x1b[1;3;4ma");
        assert_eq!(
            t.screen.buffer().cell(0, 0).style,
            StyleFlags::BOLD | StyleFlags::ITALIC | StyleFlags::UNDERLINE
        );

        t.feed("\x1b[22;24mb");
        assert_eq!(t.screen.buffer().cell(1, 0).style, StyleFlags::ITALIC);

        t.feed("\x1b[35;7m\x1b[mc");
        let cell = t.screen.buffer().cell(2, 0);
        assert_eq!(cell.style, StyleFlags::empty());
        assert_eq!(cell.fg, palette.foreground());
        assert_eq!(cell.bg, palette.background());
    }

    #[test]
    fn test_erase_in_display() {
        let mut t = Harness::new(4, 3);
        t.feed("aaaa");
        t.feed("\r\nbbbb\r\ncccc");

        t.feed("\x1b[2;2H\x1b[J");
        assert_eq!(t.row(0), "aaaa");
        assert_eq!(t.row(1), "b   ");
        assert_eq!(t.row(2), "    ");

        t.feed("\x1b[1J");
        assert_eq!(t.row(0), "    ");
        assert_eq!(t.row(1), "    ");
        assert_eq!(t.cursor(), (1, 1));
    }

    #[test]
    fn test_erase_in_line() {
        let mut t = Harness::new(5, 1);
        t.feed("abcde\x1b[3G\x1b[K");
        assert_eq!(t.row(0), "ab   ");

        t.feed("\x1b[1Gxyz\x1b[2D\x1b[1K");
        assert_eq!(t.row(0), "  z  ");

        t.feed("\x1b[2K");
        assert_eq!(t.row(0), "     ");
    }

    #[test]
    fn test_unknown_erase_leaves_screen() {
        let mut t = Harness::new(5, 1);
        t.feed("abc\x1b[3J\x1b[7K");
        assert_eq!(t.row(0), "abc  ");
        assert_eq!(t.host.sequences, 2);
    }

    #[test]
    fn test_insert_delete_chars() {
        let mut t = Harness::new(6, 1);
        t.feed("abcdef\x1b[2G\x1b[2P");
        assert_eq!(t.row(0), "adef  ");

        t.feed("\x1b[3@");
        assert_eq!(t.row(0), "a   de");
    }

    #[test]
    fn test_scroll_region_and_index() {
        let mut t = Harness::new(2, 4);
        t.feed("a\r\nb\r\nc\r\nd");
        t.feed("\x1b[2;3r");
        assert_eq!(t.cursor(), (1, 3));

        t.feed("\x1b[3H\x1bD");
        assert_eq!(t.row(0), "a ");
        assert_eq!(t.row(1), "c ");
        assert_eq!(t.row(2), "  ");
        assert_eq!(t.row(3), "d ");

        t.feed("\x1b[2H\x1bM");
        assert_eq!(t.row(1), "  ");
        assert_eq!(t.row(2), "c ");

        t.feed("\x1b[S");
        assert_eq!(t.row(1), "c ");
    }

    #[test]
    fn test_invalid_scroll_region_ignored() {
        let mut t = Harness::new(10, 5);
        t.feed("\x1b[4;2r\x1b[1;9r");
        assert_eq!(t.screen.buffer().scroll_top(), 0);
        assert_eq!(t.screen.buffer().scroll_bottom(), 5);
    }

    #[test]
    fn test_alternate_buffer_isolation() {
        let mut t = Harness::new(10, 3);
        t.feed("main\x1b[2;3H");

        t.feed("\x1b[?1049h");
        assert!(t.screen.buffer().is_alternate());
        assert_eq!(t.row(0), " ".repeat(10));
        t.feed("\x1b[Halt");
        assert_eq!(t.text(0, 0), "a");

        t.feed("\x1b[?1049l");
        assert!(!t.screen.buffer().is_alternate());
        assert_eq!(&t.row(0)[..4], "main");
        assert_eq!(t.cursor(), (2, 1));
    }

    #[test]
    fn test_mode_47_keeps_alternate_contents() {
        let mut t = Harness::new(4, 2);
        t.feed("\x1b[?47hab\x1b[?47l\x1b[?47h");
        assert_eq!(t.row(0), "ab  ");
    }

    #[test]
    fn test_autowrap_mode() {
        let mut t = Harness::new(3, 2);
        t.feed("\x1b[?7labcd");
        assert_eq!(t.row(0), "abd");
        assert_eq!(t.row(1), "   ");

        t.feed("\x1b[?7h\x1b[Hxyzw");
        assert_eq!(t.row(1), "w  ");
    }

    #[test]
    fn test_insert_mode() {
        let mut t = Harness::new(5, 1);
        t.feed("abc\r\x1b[4hX\x1b[4lY");
        assert_eq!(t.row(0), "XYbc ");
    }

    #[test]
    fn test_private_modes() {
        let mut t = Harness::new(5, 2);

        t.feed("\x1b[?1h");
        assert!(t.host.app_cursor);
        t.feed("\x1b[?1l");
        assert!(!t.host.app_cursor);

        t.feed("\x1b[?25;12l");
        assert!(!t.screen.cursor().visible);
        assert!(!t.screen.cursor().blinking);

        t.feed("\x1b[?5h");
        assert!(t.screen.snapshot().inverted);
    }

    #[test]
    fn test_save_restore_cursor() {
        let mut t = Harness::new(10, 5);
        t.feed("\x1b[3;4H\x1b[31m\x1b7\x1b[H\x1b[0m\x1b8X");
        assert_eq!(t.cursor(), (4, 2));
        assert_eq!(t.screen.buffer().cell(3, 2).fg, t.palette().color(1));
    }

    #[test]
    fn test_tabs() {
        let mut t = Harness::new(30, 1);
        t.feed("ab\tc");
        assert_eq!(t.text(8, 0), "c");

        t.feed("\x1b[2I");
        assert_eq!(t.cursor(), (24, 0));

        t.feed("\x1b[Z");
        assert_eq!(t.cursor(), (16, 0));

        t.feed("\x1b[9Z");
        assert_eq!(t.cursor(), (0, 0));
    }

    #[test]
    fn test_control_characters() {
        let mut t = Harness::new(10, 3);

        let responses = t.feed("ab\x07\x08c\x05");
        assert_eq!(t.row(0), "ac        ");
        assert_eq!(t.host.bells, 1);
        assert_eq!(responses, vec![Response::Answerback]);

        t.feed("\x0bx\x0cy\x01\x7f\u{85}");
        assert_eq!(t.cursor(), (4, 2));
        assert_eq!(t.text(2, 1), "x");
        assert_eq!(t.text(3, 2), "y");
    }

    #[test]
    fn test_c0_inside_csi_executes() {
        let mut t = Harness::new(10, 3);
        t.feed("abc\x1b[2\rC");
        assert_eq!(t.cursor(), (2, 0));
    }

    #[test]
    fn test_device_reports() {
        let mut t = Harness::new(80, 24);
        t.feed("\x1b[5;7H");

        let responses = t.feed("\x1b[6n\x1b[5n\x1b[c\x1b[0c");
        assert_eq!(
            responses,
            vec![
                Response::CursorPosition { row: 5, col: 7 },
                Response::OperatingStatus,
                Response::DeviceAttributes,
                Response::DeviceAttributes,
            ]
        );
        assert_eq!(responses[0].to_string(), "\x1b[5;7R");
        assert_eq!(responses[2].to_string(), "\x1b[?1;2c");
    }

    #[test]
    fn test_osc_title() {
        let mut t = Harness::new(10, 2);

        t.feed("\x1b]0;first\x07");
        assert_eq!(t.host.title, "first");

        t.feed("\x1b]2;second\x1b\\A");
        assert_eq!(t.host.title, "second");
        assert_eq!(t.text(0, 0), "A");

        t.feed("\x1b]1;third\u{9c}");
        assert_eq!(t.host.title, "third");
    }

    #[test]
    fn test_osc_title_interrupted_by_escape() {
        let mut t = Harness::new(10, 5);
        t.feed("\x1b]0;partial\x1b[3;4H");
        assert_eq!(t.host.title, "partial");
        assert_eq!(t.cursor(), (3, 2));
    }

    #[test]
    fn test_unknown_osc_skipped_to_terminator() {
        let mut t = Harness::new(10, 2);
        t.feed("\x1b]52;c;aGVsbG8=\x07ok");
        t.feed("\x1b]777;notify;x\x1b\\!");
        assert_eq!(t.host.title, "");
        assert_eq!(&t.row(0)[..3], "ok!");
    }

    #[test]
    fn test_unsupported_sequences_keep_sync() {
        let mut t = Harness::new(10, 2);
        t.feed("\x1b[>0c\x1b[ q\x1b(Bok\x1bZ!");
        assert_eq!(&t.row(0)[..3], "ok!");
        assert_eq!(t.host.sequences, 2);
    }

    #[test]
    fn test_sequence_done_after_each_csi() {
        let mut t = Harness::new(10, 2);
        t.feed("\x1b[H\x1b[2J\x1b[?25l\x1b[99y");
        assert_eq!(t.host.sequences, 4);
    }

    #[test]
    fn test_window_reports() {
        let mut t = Harness::new(80, 24);
        t.host.title = "remote".to_string();
        t.host.geometry = WindowGeometry {
            x: 10,
            y: 20,
            width_px: 640,
            height_px: 480,
            iconified: true,
        };

        let responses = t.feed("\x1b[18t\x1b[19t\x1b[11t\x1b[13t\x1b[14t\x1b[21t\x1b[20t");
        let text: Vec<String> = responses.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            text,
            vec![
                "\x1b[8;24;80t",
                "\x1b[9;24;80t",
                "\x1b[2t",
                "\x1b[3;10;20t",
                "\x1b[4;480;640t",
                "\x1b]lremote\x1b\\",
                "\x1b]Lremote\x1b\\",
            ]
        );
    }

    #[test]
    fn test_window_actions_forwarded() {
        let mut t = Harness::new(80, 24);
        t.host.accept_ops = true;

        let responses = t.feed("\x1b[8;30;100t\x1b[2t\x1b[9;1t\x1b[3;5t\x1b[8;1;2;3t\x1b[99t");
        assert!(responses.is_empty());
        assert_eq!(
            t.host.ops,
            vec![
                WindowOp::ResizeCells { rows: 30, cols: 100 },
                WindowOp::Iconify,
                WindowOp::Maximize(true),
            ]
        );
    }

    #[test]
    fn test_window_op_parse() {
        assert_eq!(WindowOp::parse(1, &[]), Some(WindowOp::Deiconify));
        assert_eq!(
            WindowOp::parse(3, &[Some(1), Some(2)]),
            Some(WindowOp::Move { x: 1, y: 2 })
        );
        assert_eq!(WindowOp::parse(3, &[Some(1), None]), None);
        assert_eq!(WindowOp::parse(9, &[Some(0)]), Some(WindowOp::Maximize(false)));
        assert_eq!(WindowOp::parse(9, &[Some(2)]), None);
        assert_eq!(WindowOp::parse(5, &[Some(1), Some(2), Some(3)]), None);
        assert_eq!(WindowOp::parse(12, &[]), None);
    }

    #[test]
    fn test_full_reset() {
        let mut t = Harness::new(10, 3);
        t.host.app_cursor = true;
        t.feed("abc\x1b[?1049h\x1b[?7l\x1b[31m\x1bcX");

        assert!(!t.screen.buffer().is_alternate());
        assert!(t.screen.modes.autowrap);
        assert!(!t.host.app_cursor);
        assert_eq!(t.text(0, 0), "X");
        assert_eq!(t.screen.buffer().cell(0, 0).fg, t.palette().foreground());
        assert_eq!(t.text(1, 0), " ");
    }

    #[test]
    fn test_combining_mark_after_wrap() {
        let mut t = Harness::new(3, 2);
        t.feed("abc\u{301}d");
        assert_eq!(t.text(2, 0), "c\u{301}");
        assert_eq!(t.text(0, 1), "d");
    }

    #[test]
    fn test_selection_cleared_by_output() {
        let mut t = Harness::new(5, 2);
        t.feed("hello");
        t.screen.select(Point::new(0, 0), Point::new(4, 0));
        assert_eq!(t.screen.selection_text(), "hello");

        t.feed("\x1b[2;1Hx");
        assert!(t.screen.buffer().selection().is_none());
    }
}
