//! Sand trace decoding.
//!
//! A trace is the simulator's raw output: a particle count followed by one
//! position record per particle per frame.
//!
//! # File Format
//!
//! ```text
//! Header (8 bytes):
//!   Particle count (sand_num): u64
//!
//! Frames (repeated until end of file):
//!   sand_num * { x: f64, y: f64, z: f64 }
//! ```
//!
//! All values are little-endian. There is no magic, version or per-frame
//! length; trailing bytes shorter than one frame are ignored.

mod format;
mod reader;

pub use format::{Frame, HEADER_SIZE, Point3D, RECORD_SIZE, Trace, TraceError, decode, encode};
pub use reader::{FrameIterator, TraceReader, load};
