//! Transport channel
//!
//! The terminal only needs three things from a remote connection: a blocking
//! stream of decoded code points, a way to send text back, and a way to
//! report size changes and hang up. [`Channel`] bundles the two halves; the
//! source half moves into the decoder thread while the [`Transport`] half is
//! shared with the UI.
//!
//! [`SshChannel`] provides both halves by running the system `ssh` client
//! on a pseudo-terminal, so size changes reach the remote side.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 4096;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("connection closed by remote host")]
    EndOfStream,

    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Blocking source of decoded code points
pub trait CodePointSource: Send {
    /// Next code point. `EndOfStream` once the remote side has closed.
    fn receive(&mut self) -> Result<char, ChannelError>;
}

/// Outbound half of a connection, shared between threads
pub trait Transport: Send + Sync {
    /// Send text to the remote side. Silently dropped once disconnected.
    fn send(&self, text: &str);

    /// Report a new window size in cells and pixels
    fn resize(&self, cols: u16, rows: u16, width_px: u16, height_px: u16);

    /// Hang up. The source half then reports end of stream or an error.
    fn disconnect(&self);
}

/// Both halves of an established connection
pub struct Channel {
    pub source: Box<dyn CodePointSource>,
    pub transport: Arc<dyn Transport>,
}

/// UTF-8 decoder over any byte stream.
///
/// Sequences split across reads are reassembled; invalid bytes and a
/// truncated sequence at end of stream become U+FFFD.
pub struct CodePointReader<R> {
    inner: R,
    pending: Vec<u8>,
    decoded: VecDeque<char>,
}

impl<R: Read> CodePointReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(READ_CHUNK),
            decoded: VecDeque::with_capacity(READ_CHUNK),
        }
    }

    fn fill(&mut self) -> Result<(), ChannelError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    if self.pending.is_empty() {
                        return Err(ChannelError::EndOfStream);
                    }
                    self.pending.clear();
                    self.decoded.push_back(char::REPLACEMENT_CHARACTER);
                    return Ok(());
                }
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    self.decode();
                    if !self.decoded.is_empty() {
                        return Ok(());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ChannelError::Io(e)),
            }
        }
    }

    /// Move every complete code point from `pending` to `decoded`.
    fn decode(&mut self) {
        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.decoded.extend(text.chars());
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&rest[..valid]) {
                        self.decoded.extend(text.chars());
                    }
                    match e.error_len() {
                        Some(len) => {
                            self.decoded.push_back(char::REPLACEMENT_CHARACTER);
                            consumed += valid + len;
                        }
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }
}

impl<R: Read + Send> CodePointSource for CodePointReader<R> {
    fn receive(&mut self) -> Result<char, ChannelError> {
        loop {
            if let Some(ch) = self.decoded.pop_front() {
                return Ok(ch);
            }
            self.fill()?;
        }
    }
}

/// Transport over any writer. Cannot forward size changes.
pub struct StreamTransport<W> {
    writer: Mutex<Option<W>>,
}

impl<W: Write + Send> StreamTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
        }
    }
}

impl<W: Write + Send> Transport for StreamTransport<W> {
    fn send(&self, text: &str) {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(writer) = guard.as_mut() else {
            return;
        };
        if let Err(e) = writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.flush())
        {
            warn!("send failed: {}", e);
        }
    }

    fn resize(&self, cols: u16, rows: u16, _width_px: u16, _height_px: u16) {
        debug!("size change to {}x{} not forwarded over a plain stream", cols, rows);
    }

    fn disconnect(&self) {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Where and how to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub identity_file: Option<PathBuf>,
    /// ssh client executable
    pub ssh_command: String,
}

impl Target {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            user: None,
            identity_file: None,
            ssh_command: "ssh".to_string(),
        }
    }

    /// Arguments passed to the ssh client
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args = vec!["-tt".to_string()];
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(user) = &self.user {
            args.push("-l".to_string());
            args.push(user.clone());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(self.host.clone());
        args
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

/// Master side of a pseudo-terminal with a child process on the slave side
pub struct PtyTransport {
    writer: StreamTransport<Box<dyn Write + Send>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    child: Mutex<Option<Box<dyn Child + Send + Sync>>>,
}

impl Transport for PtyTransport {
    fn send(&self, text: &str) {
        self.writer.send(text);
    }

    fn resize(&self, cols: u16, rows: u16, width_px: u16, height_px: u16) {
        let size = PtySize {
            rows,
            cols,
            pixel_width: width_px,
            pixel_height: height_px,
        };
        let master = self.master.lock().unwrap_or_else(PoisonError::into_inner);
        match master.resize(size) {
            Ok(()) => debug!("pty resized to {}x{}", cols, rows),
            Err(e) => warn!("pty resize to {}x{} failed: {}", cols, rows, e),
        }
    }

    fn disconnect(&self) {
        self.writer.disconnect();
        let child = self.child.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut child) = child {
            if let Err(e) = child.kill() {
                debug!("child already gone: {}", e);
            }
            let _ = child.wait();
            info!("child process stopped");
        }
    }
}

/// Reader over a pty master. Linux reports a closed slave side as EIO
/// rather than end of file.
struct PtyReader<R>(R);

impl<R: Read> Read for PtyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.read(buf) {
            Err(e) if is_closed_pty(&e) => {
                debug!("pty read returned EIO (child likely exited)");
                Ok(0)
            }
            other => other,
        }
    }
}

#[cfg(unix)]
fn is_closed_pty(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EIO)
}

#[cfg(not(unix))]
fn is_closed_pty(_e: &io::Error) -> bool {
    false
}

fn pty_error<E: fmt::Display>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

/// Run `cmd` on a fresh `cols`x`rows` pseudo-terminal and wire the master
/// side into a [`Channel`].
pub fn spawn_pty(mut cmd: CommandBuilder, cols: u16, rows: u16) -> Result<Channel, ChannelError> {
    let program = cmd
        .get_argv()
        .first()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    cmd.env("TERM", "xterm");

    let pair = native_pty_system()
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(pty_error)?;

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| ChannelError::Spawn {
            command: program,
            source: pty_error(e),
        })?;
    // Only the child may hold the slave, or the reader never sees it close
    drop(pair.slave);

    let reader = pair.master.try_clone_reader().map_err(pty_error)?;
    let writer = pair.master.take_writer().map_err(pty_error)?;

    Ok(Channel {
        source: Box::new(CodePointReader::new(PtyReader(reader))),
        transport: Arc::new(PtyTransport {
            writer: StreamTransport::new(writer),
            master: Mutex::new(pair.master),
            child: Mutex::new(Some(child)),
        }),
    })
}

pub struct SshChannel;

impl SshChannel {
    /// Run the ssh client on a pseudo-terminal of the given size.
    /// Password and host key prompts arrive through the channel like any
    /// other remote output.
    pub fn connect(target: &Target, cols: u16, rows: u16) -> Result<Channel, ChannelError> {
        let args = target.ssh_args();
        info!("Spawning {} {} on a {}x{} pty", target.ssh_command, args.join(" "), cols, rows);

        let mut cmd = CommandBuilder::new(&target.ssh_command);
        cmd.args(&args);
        if let Ok(dir) = std::env::current_dir() {
            cmd.cwd(dir);
        }
        spawn_pty(cmd, cols, rows)
    }
}
