//! User interface rendering and input handling.
//!
//! - **renderer**: paints screen snapshots with crossterm
//! - **keymapper**: keyboard input to remote byte sequence mapping

pub mod keymapper;
pub mod renderer;

pub use keymapper::*;
pub use renderer::*;
