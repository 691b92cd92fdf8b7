//! Frame-indexed playback of decoded traces.
//!
//! [`PlaybackController`] is a plain state machine: `seek`, `start`, `stop`
//! and `tick` mutate the current frame index and push the visible points of
//! the new frame to a render callback. It owns no timer; [`Ticker`] supplies
//! one on a background thread, or a UI event loop can call `tick()` itself.

mod controller;
mod filter;
mod ticker;

pub use controller::{
    PlaybackController, PlaybackError, PlaybackState, PlaybackStatus, RenderCallback,
};
pub use filter::DisplayFilter;
pub use ticker::Ticker;
