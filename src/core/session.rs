//! Session management
//!
//! A [`Session`] owns the screen and runs the decoder thread that moves code
//! points from a [`Channel`] into it. The UI thread reads snapshots, forwards
//! input and drains [`SessionEvent`]s; it never blocks on the network.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossterm::event::KeyEvent;
use tracing::{error, info, trace};

use super::term::{Decoder, Host, Palette, Point, Screen, Snapshot, WindowGeometry, WindowOp};
use super::transport::{Channel, ChannelError, CodePointSource, Transport};
use crate::ui::KeyMapper;

/// Session events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Bell,
    TitleChanged(String),
    /// Window action requested by the remote side
    Window(WindowOp),
    /// Transport failed; the session no longer receives data
    Error(String),
    /// Remote side closed the connection
    Exited,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the UI and the decoder thread
#[derive(Default)]
struct Shared {
    dirty: AtomicBool,
    running: AtomicBool,
    application_cursor: AtomicBool,
    title: Mutex<String>,
    geometry: Mutex<WindowGeometry>,
}

/// Decoder-side [`Host`]: records state and forwards events to the UI.
struct SessionHost<'a> {
    shared: &'a Shared,
    events: &'a Sender<SessionEvent>,
}

impl Host for SessionHost<'_> {
    fn bell(&mut self) {
        let _ = self.events.send(SessionEvent::Bell);
    }

    fn set_title(&mut self, title: &str) {
        *lock(&self.shared.title) = title.to_string();
        let _ = self.events.send(SessionEvent::TitleChanged(title.to_string()));
    }

    fn title(&self) -> String {
        lock(&self.shared.title).clone()
    }

    fn set_application_cursor_keys(&mut self, enabled: bool) {
        self.shared.application_cursor.store(enabled, Ordering::SeqCst);
    }

    fn window_op(&mut self, op: WindowOp) -> bool {
        self.events.send(SessionEvent::Window(op)).is_ok()
    }

    fn window_geometry(&self) -> WindowGeometry {
        *lock(&self.shared.geometry)
    }

    fn sequence_done(&mut self) {
        self.shared.dirty.store(true, Ordering::Release);
    }
}

/// A terminal session
pub struct Session {
    screen: Arc<Mutex<Screen>>,
    shared: Arc<Shared>,
    transport: Option<Arc<dyn Transport>>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    reader_thread: Option<JoinHandle<()>>,
}

impl Session {
    /// Create a disconnected session
    pub fn new(cols: u16, rows: u16, palette: Arc<Palette>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            screen: Arc::new(Mutex::new(Screen::new(cols as usize, rows as usize, palette))),
            shared: Arc::new(Shared::default()),
            transport: None,
            events_tx,
            events_rx,
            reader_thread: None,
        }
    }

    /// Attach a channel and start the decoder thread
    pub fn connect(&mut self, channel: Channel) -> io::Result<()> {
        let Channel { source, transport } = channel;
        self.transport = Some(Arc::clone(&transport));
        self.shared.running.store(true, Ordering::SeqCst);

        let screen = Arc::clone(&self.screen);
        let shared = Arc::clone(&self.shared);
        let events = self.events_tx.clone();

        let spawned = thread::Builder::new()
            .name("decoder".to_string())
            .spawn(move || decode_loop(source, transport, screen, shared, events));

        match spawned {
            Ok(handle) => {
                self.reader_thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Check if the decoder thread is still receiving
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// True once per batch of screen changes
    pub fn take_dirty(&self) -> bool {
        self.shared.dirty.swap(false, Ordering::AcqRel)
    }

    fn mark_dirty(&self) {
        self.shared.dirty.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> Snapshot {
        lock(&self.screen).snapshot()
    }

    #[cfg(test)]
    pub fn title(&self) -> String {
        lock(&self.shared.title).clone()
    }

    pub fn application_cursor_keys(&self) -> bool {
        self.shared.application_cursor.load(Ordering::SeqCst)
    }

    /// Record where the window is, for position and size reports
    pub fn set_window_geometry(&self, geometry: WindowGeometry) {
        *lock(&self.shared.geometry) = geometry;
    }

    /// Resize the screen and tell the remote side
    pub fn resize(&self, cols: u16, rows: u16, width_px: u16, height_px: u16) {
        lock(&self.screen).resize(cols as usize, rows as usize);
        {
            let mut geometry = lock(&self.shared.geometry);
            geometry.width_px = u32::from(width_px);
            geometry.height_px = u32::from(height_px);
        }
        if let Some(transport) = &self.transport {
            transport.resize(cols, rows, width_px, height_px);
        }
        self.mark_dirty();
    }

    /// Send text to the remote side (no-op while disconnected)
    pub fn send(&self, text: &str) {
        if let Some(transport) = &self.transport {
            transport.send(text);
        }
    }

    /// Translate a key press and send it
    pub fn handle_key(&self, key: &KeyEvent) -> bool {
        match KeyMapper::map(key, self.application_cursor_keys()) {
            Some(text) => {
                self.send(&text);
                true
            }
            None => false,
        }
    }

    pub fn paste(&self, text: &str) {
        self.send(text);
    }

    /// Text of the current selection
    pub fn copy(&self) -> String {
        lock(&self.screen).selection_text()
    }

    pub fn select(&self, a: Point, b: Point) {
        lock(&self.screen).select(a, b);
        self.mark_dirty();
    }

    pub fn clear_selection(&self) {
        lock(&self.screen).clear_selection();
        self.mark_dirty();
    }

    /// Write a local status line into the screen
    pub fn print_line(&self, text: &str) {
        lock(&self.screen).print_line(text);
        self.mark_dirty();
    }

    /// Drain pending events
    pub fn poll_events(&self) -> Vec<SessionEvent> {
        self.events_rx.try_iter().collect()
    }

    /// Hang up. Later sends are dropped.
    pub fn disconnect(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.disconnect();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

fn decode_loop(
    mut source: Box<dyn CodePointSource>,
    transport: Arc<dyn Transport>,
    screen: Arc<Mutex<Screen>>,
    shared: Arc<Shared>,
    events: Sender<SessionEvent>,
) {
    let mut decoder = Decoder::new();

    loop {
        let ch = match source.receive() {
            Ok(ch) => ch,
            Err(ChannelError::EndOfStream) => {
                info!("Remote side closed the connection");
                let _ = events.send(SessionEvent::Exited);
                break;
            }
            Err(e) => {
                error!("Transport failed: {}", e);
                lock(&screen).print_line(&format!("*** {}", e));
                shared.dirty.store(true, Ordering::Release);
                let _ = events.send(SessionEvent::Error(e.to_string()));
                break;
            }
        };

        let response = {
            let mut host = SessionHost {
                shared: &shared,
                events: &events,
            };
            let mut screen = lock(&screen);
            decoder.feed(ch, &mut screen, &mut host)
        };
        shared.dirty.store(true, Ordering::Release);

        if let Some(response) = response {
            trace!("response {:?}", response);
            transport.send(&response.to_string());
        }
    }

    shared.running.store(false, Ordering::SeqCst);
}
