//! sshterm - A remote-shell terminal client
//!
//! sshterm runs the system ssh client on a pseudo-terminal and interprets the remote
//! shell's VT100/xterm output itself, painting the result into the hosting
//! terminal with crossterm.
//!
//! # Quick Start
//!
//! ```text
//! sshterm example.org            # Connect as the current user
//! sshterm alice@example.org      # Connect as alice
//! sshterm -p 2222 example.org    # Non-standard port
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | Ctrl+Shift+C | Copy selection |
//! | Ctrl+Shift+V | Paste |
//! | Ctrl+Shift+Q | Quit |

mod config;
mod core;
mod ui;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use crossterm::terminal;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::core::session::{Session, SessionEvent};
use crate::core::term::{Point, Surface, WindowGeometry};
use crate::core::transport::{SshChannel, Target};
use crate::ui::Renderer;

/// Command line options
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    identity_file: Option<PathBuf>,
    debug: bool,
}

/// What the command line asked for
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Connect(Args),
    Help,
    Version,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Paint at most this often
const FRAME: Duration = Duration::from_millis(16);

fn print_version() {
    eprintln!("sshterm {}", VERSION);
}

fn print_help() {
    eprintln!("sshterm {} - A remote-shell terminal client", VERSION);
    eprintln!();
    eprintln!("Usage: sshterm [OPTIONS] [user@]host");
    eprintln!();
    eprintln!("Connection options:");
    eprintln!("  -p, --port <PORT>        Remote port");
    eprintln!("  -l, --user <USER>        Remote user name");
    eprintln!("  -i, --identity <FILE>    Private key file");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -d, --debug              Debug logging");
    eprintln!("  -v, --version            Show version");
    eprintln!("  -h, --help               Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Ctrl+Shift+C             Copy selection");
    eprintln!("  Ctrl+Shift+V             Paste");
    eprintln!("  Ctrl+Shift+Q             Quit");
    eprintln!();
    eprintln!("Configuration: ~/.sshterm/config.toml");
    eprintln!("Log file:      ~/.sshterm/sshterm.log");
}

fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "-d" | "--debug" => parsed.debug = true,
            "-p" | "--port" => {
                let value = args.next().ok_or("-p requires a port")?;
                let port = value.parse().map_err(|_| format!("Invalid port: {}", value))?;
                parsed.port = Some(port);
            }
            "-l" | "--user" => {
                parsed.user = Some(args.next().ok_or("-l requires a user name")?);
            }
            "-i" | "--identity" => {
                parsed.identity_file = Some(PathBuf::from(args.next().ok_or("-i requires a file")?));
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown option: {}", other));
            }
            destination => {
                if parsed.host.is_some() {
                    return Err(format!("Unexpected argument: {}", destination));
                }
                match destination.split_once('@') {
                    Some((user, host)) if !user.is_empty() && !host.is_empty() => {
                        parsed.user.get_or_insert_with(|| user.to_string());
                        parsed.host = Some(host.to_string());
                    }
                    Some(_) => return Err(format!("Invalid destination: {}", destination)),
                    None => parsed.host = Some(destination.to_string()),
                }
            }
        }
    }

    Ok(Command::Connect(parsed))
}

/// Command line wins over the config file
fn build_target(args: &Args, config: &Config) -> Option<Target> {
    let host = args.host.clone().or_else(|| config.host.clone())?;
    let mut target = Target::new(host);
    target.port = args.port.or(config.port);
    target.user = args.user.clone().or_else(|| config.user.clone());
    target.identity_file = args.identity_file.clone().or_else(|| config.identity_file.clone());
    target.ssh_command = config.ssh_command.clone();
    Some(target)
}

/// Log to `~/.sshterm/sshterm.log`; the terminal itself belongs to the
/// painted surface. `RUST_LOG` overrides `level`.
fn init_logging(level: Level) {
    let log_path = Config::config_dir()
        .map(|d| d.join("sshterm.log"))
        .unwrap_or_else(|| PathBuf::from("sshterm.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(level).into())
            .from_env_lossy();
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args(env::args().skip(1)) {
        Ok(Command::Connect(args)) => args,
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Command::Version) => {
            print_version();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let config = Config::load();
    init_logging(if args.debug { Level::DEBUG } else { config.log_level() });
    info!("sshterm {} starting...", VERSION);

    let Some(target) = build_target(&args, &config) else {
        eprintln!("Error: no host given");
        eprintln!("Use --help for usage information");
        std::process::exit(1);
    };

    run_terminal(&target, &config)
}

fn run_terminal(target: &Target, config: &Config) -> anyhow::Result<()> {
    let mut renderer = Renderer::new();
    let (cols, rows) = renderer.size().unwrap_or_else(|e| {
        warn!("Cannot query terminal size ({}), using config", e);
        (config.terminal.cols, config.terminal.rows)
    });
    info!("Terminal size: {}x{}", cols, rows);

    let mut session = Session::new(cols, rows, Arc::new(config.palette()));
    update_window_geometry(&session);
    renderer.init()?;

    session.print_line(&format!("Connecting to {} ...", target));
    if let Some(user) = &target.user {
        session.print_line(&format!("Using username \"{}\"", user));
    }
    match SshChannel::connect(target, cols, rows) {
        Ok(channel) => session.connect(channel)?,
        Err(e) => {
            error!("Failed to connect to {}: {}", target, e);
            session.print_line(&format!("*** {}", e));
            session.print_line("Press Ctrl+Shift+Q to quit");
        }
    }

    let result = run_main_loop(&session, &mut renderer);
    session.disconnect();
    renderer.cleanup()?;
    result
}

/// Pixel size of the hosting window, when the platform reports one
fn update_window_geometry(session: &Session) {
    match terminal::window_size() {
        Ok(size) => {
            session.set_window_geometry(WindowGeometry {
                width_px: u32::from(size.width),
                height_px: u32::from(size.height),
                ..WindowGeometry::default()
            });
        }
        Err(e) => debug!("window size unavailable: {}", e),
    }
}

fn is_shortcut(key: &KeyEvent, ch: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL | KeyModifiers::SHIFT)
        && matches!(key.code, KeyCode::Char(c) if c.eq_ignore_ascii_case(&ch))
}

fn copy_to_clipboard(text: &str) {
    if text.is_empty() {
        return;
    }
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(e) = clipboard.set_text(text) {
                warn!("Clipboard write failed: {}", e);
            }
        }
        Err(e) => warn!("Clipboard unavailable: {}", e),
    }
}

fn paste_from_clipboard(session: &Session) {
    match arboard::Clipboard::new().and_then(|mut c| c.get_text()) {
        Ok(text) => session.paste(&text),
        Err(e) => warn!("Clipboard read failed: {}", e),
    }
}

/// Left-button selection state
#[derive(Default)]
struct MouseSelection {
    anchor: Option<Point>,
    dragged: bool,
}

impl MouseSelection {
    fn handle(&mut self, session: &Session, mouse: &MouseEvent) {
        let here = Point::new(usize::from(mouse.column), usize::from(mouse.row));
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.anchor = Some(here);
                self.dragged = false;
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(anchor) = self.anchor {
                    self.dragged = true;
                    session.select(anchor, here);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if std::mem::take(&mut self.dragged) {
                    copy_to_clipboard(&session.copy());
                } else {
                    session.clear_selection();
                }
                self.anchor = None;
            }
            MouseEventKind::Down(MouseButton::Right) => paste_from_clipboard(session),
            _ => {}
        }
    }
}

fn run_main_loop(session: &Session, renderer: &mut Renderer) -> anyhow::Result<()> {
    let mut mouse = MouseSelection::default();

    loop {
        for event in session.poll_events() {
            match event {
                SessionEvent::Exited => {
                    info!("Session ended");
                    return Ok(());
                }
                SessionEvent::Bell => renderer.bell()?,
                SessionEvent::TitleChanged(title) => renderer.set_title(&title)?,
                SessionEvent::Window(op) => {
                    renderer.apply_window_op(op)?;
                }
                SessionEvent::Error(e) => {
                    error!("Session error: {}", e);
                    session.print_line("Press Ctrl+Shift+Q to quit");
                }
            }
        }

        if session.take_dirty() | renderer.take_repaint_request() {
            renderer.paint(&session.snapshot())?;
        }

        if !event::poll(FRAME)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if is_shortcut(&key, 'q') {
                    info!("Quit requested");
                    return Ok(());
                }
                if is_shortcut(&key, 'c') {
                    copy_to_clipboard(&session.copy());
                    continue;
                }
                if is_shortcut(&key, 'v') {
                    paste_from_clipboard(session);
                    continue;
                }
                if session.is_running() {
                    session.handle_key(&key);
                }
            }

            Event::Resize(cols, rows) => {
                let (width_px, height_px) = terminal::window_size()
                    .map(|size| (size.width, size.height))
                    .unwrap_or((0, 0));
                info!("Resize: {}x{}", cols, rows);
                session.resize(cols, rows, width_px, height_px);
                renderer.request_repaint();
            }

            Event::Paste(text) => session.paste(&text),

            Event::Mouse(mouse_event) => mouse.handle(session, &mouse_event),

            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, String> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_destination() {
        let Ok(Command::Connect(args)) = parse(&["-p", "2222", "alice@example.org"]) else {
            panic!("expected connect");
        };
        assert_eq!(args.host.as_deref(), Some("example.org"));
        assert_eq!(args.user.as_deref(), Some("alice"));
        assert_eq!(args.port, Some(2222));

        // -l takes precedence over user@
        let Ok(Command::Connect(args)) = parse(&["-l", "bob", "alice@example.org", "-d"]) else {
            panic!("expected connect");
        };
        assert_eq!(args.user.as_deref(), Some("bob"));
        assert!(args.debug);
    }

    #[test]
    fn test_parse_errors_and_info() {
        assert_eq!(parse(&["-h", "bogus"]), Ok(Command::Help));
        assert_eq!(parse(&["--version"]), Ok(Command::Version));
        assert!(parse(&["-p"]).is_err());
        assert!(parse(&["-p", "ssh", "host"]).is_err());
        assert!(parse(&["-x", "host"]).is_err());
        assert!(parse(&["one", "two"]).is_err());
        assert!(parse(&["@host"]).is_err());
    }

    #[test]
    fn test_target_merges_config() {
        let config = Config::parse("host = \"fallback\"\nport = 22\nuser = \"cfg\"\nssh_command = \"/usr/bin/ssh\"").unwrap();

        let target = build_target(&Args::default(), &config).unwrap();
        assert_eq!(target.to_string(), "cfg@fallback:22");
        assert_eq!(target.ssh_command, "/usr/bin/ssh");

        let args = Args {
            host: Some("cli".to_string()),
            port: Some(2200),
            ..Args::default()
        };
        let target = build_target(&args, &config).unwrap();
        assert_eq!(target.to_string(), "cfg@cli:2200");

        assert!(build_target(&Args::default(), &Config::default()).is_none());
    }
}
