//! Frame-indexed playback state machine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use super::filter::DisplayFilter;
use crate::schema::{ConfigError, PlaybackConfig, WrapMode};
use crate::trace::{Frame, Point3D, Trace};

/// Receives `(frame index, visible points)` whenever the current frame changes.
pub type RenderCallback = Box<dyn FnMut(usize, &[Point3D]) + Send>;

/// Whether auto-play is ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Running,
}

/// Snapshot of the controller's mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackState {
    pub current_index: usize,
    pub status: PlaybackStatus,
}

impl PlaybackState {
    pub fn is_running(&self) -> bool {
        self.status == PlaybackStatus::Running
    }
}

/// Playback errors. Neither variant leaves the state modified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("Frame index {index} out of range (trace has {frame_count} frames)")]
    OutOfRange { index: usize, frame_count: usize },
    #[error("Cannot start playback of a trace with no frames")]
    EmptyTrace,
}

/// Playback controller over a decoded trace.
///
/// Usage:
/// ```ignore
/// let trace = Arc::new(hourglass_replay::trace::load("sand.dat")?);
/// let mut controller = PlaybackController::new(trace, &PlaybackConfig::default())?;
/// controller.set_render_callback(|index, points| println!("Frame: {index} ({} points)", points.len()));
///
/// controller.seek(10)?;
/// controller.start()?;
/// while controller.tick() {
///     // Driven by a timer; see `Ticker`.
/// }
/// ```
pub struct PlaybackController {
    trace: Arc<Trace>,
    state: PlaybackState,
    wrap: WrapMode,
    filter: DisplayFilter,
    interval: Duration,
    on_render: Option<RenderCallback>,
    /// Reused buffer for the filtered point set handed to the renderer.
    visible: Vec<Point3D>,
}

impl PlaybackController {
    /// Create a stopped controller positioned at frame 0.
    pub fn new(trace: Arc<Trace>, config: &PlaybackConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            trace,
            state: PlaybackState::default(),
            wrap: config.wrap,
            filter: DisplayFilter::new(config.min_visible_z),
            interval: config.interval(),
            on_render: None,
            visible: Vec::new(),
        })
    }

    /// Register the render callback, replacing any previous one.
    pub fn set_render_callback<F>(&mut self, callback: F)
    where
        F: FnMut(usize, &[Point3D]) + Send + 'static,
    {
        self.on_render = Some(Box::new(callback));
    }

    pub fn trace(&self) -> &Arc<Trace> {
        &self.trace
    }

    pub fn frame_count(&self) -> usize {
        self.trace.frame_count()
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn wrap(&self) -> WrapMode {
        self.wrap
    }

    pub fn filter(&self) -> DisplayFilter {
        self.filter
    }

    /// The frame at the current index, if the trace has any frames.
    pub fn current_frame(&self) -> Option<&Frame> {
        self.trace.frame(self.state.current_index)
    }

    /// Jump directly to `index`. Allowed while running or stopped.
    ///
    /// Renders only if the index actually changes.
    pub fn seek(&mut self, index: usize) -> Result<(), PlaybackError> {
        let frame_count = self.frame_count();
        if index >= frame_count {
            return Err(PlaybackError::OutOfRange { index, frame_count });
        }
        if index != self.state.current_index {
            self.state.current_index = index;
            self.render();
        }
        Ok(())
    }

    /// Begin auto-play. No-op when already running.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        if self.trace.is_empty() {
            return Err(PlaybackError::EmptyTrace);
        }
        if !self.is_running() {
            self.state.status = PlaybackStatus::Running;
            info!("Playback started at frame {}", self.state.current_index);
        }
        Ok(())
    }

    /// Halt auto-play, keeping the current index. No-op when stopped.
    pub fn stop(&mut self) {
        if self.is_running() {
            self.state.status = PlaybackStatus::Stopped;
            info!("Playback stopped at frame {}", self.state.current_index);
        }
    }

    /// Advance one frame under the wrap policy.
    ///
    /// Does nothing while stopped. Returns `true` if the index changed
    /// (and the frame was rendered).
    pub fn tick(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        let modulus = self.wrap.modulus(self.frame_count());
        let next = (self.state.current_index + 1) % modulus;
        if next == self.state.current_index {
            return false;
        }
        self.state.current_index = next;
        self.render();
        true
    }

    /// Re-emit the current frame to the renderer.
    pub fn refresh(&mut self) {
        self.render();
    }

    /// Seek one frame forward, stopping at the last frame.
    pub fn step_forward(&mut self) -> Result<(), PlaybackError> {
        let last = self
            .frame_count()
            .checked_sub(1)
            .ok_or(PlaybackError::EmptyTrace)?;
        self.seek((self.state.current_index + 1).min(last))
    }

    /// Seek one frame back, stopping at frame 0.
    pub fn step_backward(&mut self) -> Result<(), PlaybackError> {
        if self.trace.is_empty() {
            return Err(PlaybackError::EmptyTrace);
        }
        self.seek(self.state.current_index.saturating_sub(1))
    }

    fn render(&mut self) {
        let Some(callback) = self.on_render.as_mut() else {
            return;
        };
        let Some(frame) = self.trace.frame(self.state.current_index) else {
            return;
        };
        self.filter.collect_into(frame, &mut self.visible);
        debug!(
            "Rendering frame {} ({}/{} points visible)",
            self.state.current_index,
            self.visible.len(),
            frame.len()
        );
        callback(self.state.current_index, &self.visible);
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("frame_count", &self.frame_count())
            .field("state", &self.state)
            .field("wrap", &self.wrap)
            .field("filter", &self.filter)
            .field("interval", &self.interval)
            .field("has_renderer", &self.on_render.is_some())
            .finish()
    }
}
