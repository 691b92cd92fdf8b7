//! Schema module - Configuration types for trace playback.

mod config;

pub use config::*;
