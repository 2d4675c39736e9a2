//! Session layer: the shared relay state and the per-connection protocol
//! handler that drives it.

pub mod handler;
pub mod state;

pub use handler::{DropReason, FrameOutcome};
pub use state::RelayState;
