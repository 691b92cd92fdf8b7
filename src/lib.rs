//! Hourglass replay - Decode and play back recorded sand particle traces.
//!
//! The hourglass simulator writes every particle's position for every step
//! into a flat binary trace. This crate decodes those traces and drives a
//! frame-indexed playback loop that hands each frame to a renderer.
//!
//! # Architecture
//!
//! - `trace`: Binary trace decoding (eager and streaming)
//! - `playback`: Playback state machine, display filter and timer
//! - `schema`: Playback configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hourglass_replay::{
//!     playback::{PlaybackController, Ticker},
//!     schema::PlaybackConfig,
//!     trace,
//! };
//!
//! let trace = Arc::new(trace::load(".dat")?);
//! let mut controller = PlaybackController::new(trace, &PlaybackConfig::default())?;
//! controller.set_render_callback(|index, points| {
//!     println!("Frame: {} ({} visible points)", index, points.len());
//! });
//!
//! let ticker = Ticker::spawn(controller)?;
//! ticker.refresh();
//! ticker.start()?;
//! std::thread::sleep(std::time::Duration::from_millis(100));
//! ticker.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod playback;
pub mod schema;
pub mod trace;

// Re-export commonly used types
pub use playback::{PlaybackController, PlaybackError, Ticker};
pub use schema::{PlaybackConfig, WrapMode};
pub use trace::{Frame, Point3D, Trace, TraceError};
