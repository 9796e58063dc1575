//! Core terminal emulation components.
//!
//! - **term**: VT100/xterm screen model and escape-sequence decoder
//! - **transport**: channel abstraction and the ssh-backed implementation
//! - **session**: screen + channel + decoder thread
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Channel
//! │   ├── CodePointSource (decoder thread)
//! │   └── Transport (send / resize / disconnect)
//! └── Screen
//!     ├── Buffer (primary + alternate grids, selection)
//!     ├── Cursor (live + saved)
//!     └── Decoder (escape sequences)
//! ```

pub mod session;
pub mod term;
pub mod transport;
