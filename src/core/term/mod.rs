//! VT100/xterm terminal emulation.
//!
//! - **params**: CSI parameter accumulation
//! - **style**: colour palette and style bits
//! - **cell**: a single grid position
//! - **cursor**: position, pending wrap and pen attributes
//! - **buffer**: primary/alternate grids, scroll region, selection
//! - **screen**: buffer + cursors + modes, snapshots for painting
//! - **parser**: escape-sequence decoder and the `Host` seam
//!
//! # Data flow
//!
//! ```text
//! code points ──▶ Decoder ──▶ Screen ──▶ Snapshot ──▶ Surface
//!                    │
//!                    └──▶ Host (bell, title, window ops) / Response
//! ```

pub mod buffer;
pub mod cell;
pub mod cursor;
pub mod params;
pub mod parser;
pub mod screen;
pub mod style;

pub use buffer::Point;
pub use cell::Cell;
pub use parser::{Decoder, Host, WindowGeometry, WindowOp};
pub use screen::{Screen, Snapshot, Surface};
pub use style::{Palette, Rgb, StyleFlags};
