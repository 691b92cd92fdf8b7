//! Background timer that drives playback ticks.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use super::controller::{PlaybackController, PlaybackError, PlaybackState};

struct Inner {
    controller: PlaybackController,
    next_tick: Option<Instant>,
    shutdown: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Inner>) -> MutexGuard<'a, Inner> {
        self.wake.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_timeout<'a>(
        &self,
        guard: MutexGuard<'a, Inner>,
        timeout: Duration,
    ) -> MutexGuard<'a, Inner> {
        self.wake
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner)
            .0
    }
}

/// Runs a [`PlaybackController`] on its own timer thread.
///
/// The controller sits behind a single mutex. Each tick, including its
/// render callback, runs with that mutex held, so ticks never overlap
/// and a tick that falls due while a render is still running is dropped
/// rather than queued. Once [`Ticker::stop`] returns no further tick
/// starts.
///
/// The render callback runs on the timer thread and must not call back
/// into the `Ticker`. If it panics during a tick, playback is stopped and
/// can be started again.
pub struct Ticker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Move `controller` onto a new timer thread. Playback starts stopped
    /// unless the controller was already running.
    pub fn spawn(controller: PlaybackController) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                controller,
                next_tick: None,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("playback-ticker".into())
            .spawn(move || run(&thread_shared))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Begin ticking. No-op when already running.
    pub fn start(&self) -> Result<(), PlaybackError> {
        let mut inner = self.shared.lock();
        if inner.controller.is_running() {
            return Ok(());
        }
        inner.controller.start()?;
        inner.next_tick = None;
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Stop ticking. Waits for an in-flight tick to finish.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        inner.controller.stop();
        inner.next_tick = None;
        self.shared.wake.notify_all();
    }

    /// Scrub to `index`, rendering on the caller's thread.
    pub fn seek(&self, index: usize) -> Result<(), PlaybackError> {
        self.shared.lock().controller.seek(index)
    }

    /// Re-render the current frame on the caller's thread.
    pub fn refresh(&self) {
        self.shared.lock().controller.refresh();
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().controller.state()
    }

    pub fn current_index(&self) -> usize {
        self.shared.lock().controller.current_index()
    }

    pub fn frame_count(&self) -> usize {
        self.shared.lock().controller.frame_count()
    }

    /// Run `f` with exclusive access to the controller.
    ///
    /// Starting or stopping the controller inside `f` reschedules the timer
    /// the same way [`Ticker::start`] and [`Ticker::stop`] do.
    pub fn with_controller<T>(&self, f: impl FnOnce(&mut PlaybackController) -> T) -> T {
        let mut inner = self.shared.lock();
        let was_running = inner.controller.is_running();
        let result = f(&mut inner.controller);
        if inner.controller.is_running() != was_running {
            inner.next_tick = None;
            self.shared.wake.notify_all();
        }
        result
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.lock();
            inner.shutdown = true;
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Playback ticker thread panicked");
        }
    }
}

fn run(shared: &Shared) {
    debug!("Playback ticker thread started");
    let mut inner = shared.lock();
    loop {
        if inner.shutdown {
            break;
        }
        if !inner.controller.is_running() {
            inner.next_tick = None;
            inner = shared.wait(inner);
            continue;
        }

        let interval = inner.controller.interval();
        let now = Instant::now();
        let due = *inner.next_tick.get_or_insert(now + interval);
        if now < due {
            // Re-check shutdown and status after every wake-up.
            inner = shared.wait_timeout(inner, due - now);
            continue;
        }

        let ticked = panic::catch_unwind(AssertUnwindSafe(|| inner.controller.tick()));
        if ticked.is_err() {
            error!(
                "Render callback panicked at frame {}, stopping playback",
                inner.controller.current_index()
            );
            inner.controller.stop();
            continue;
        }
        // Deadline counts from the end of the render, so slow renders skip
        // ticks instead of bunching them up.
        inner.next_tick = Some(Instant::now() + interval);
    }
    debug!("Playback ticker thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PlaybackConfig, WrapMode};
    use crate::trace::{Frame, Point3D, Trace};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn ticker(frame_count: usize, wrap: WrapMode) -> (Ticker, mpsc::Receiver<usize>) {
        let frames = (0..frame_count)
            .map(|f| Frame::new(vec![Point3D::new(f as f64, 0.0, 0.0)]))
            .collect();
        let trace = Arc::new(Trace::from_frames(1, frames).unwrap());
        let config = PlaybackConfig {
            interval_ms: 1,
            wrap,
            ..Default::default()
        };
        let mut controller = PlaybackController::new(trace, &config).unwrap();
        let (tx, rx) = mpsc::channel();
        controller.set_render_callback(move |index, _| {
            let _ = tx.send(index);
        });
        (Ticker::spawn(controller).unwrap(), rx)
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_ticks_while_running() {
        let (ticker, rx) = ticker(5, WrapMode::ShortCycle);
        ticker.start().unwrap();

        let indices: Vec<usize> = (0..9).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
        assert_eq!(indices, vec![1, 2, 3, 0, 1, 2, 3, 0, 1]);
        ticker.stop();
    }

    #[test]
    fn test_no_tick_after_stop() {
        let (ticker, rx) = ticker(10, WrapMode::FullCycle);
        ticker.start().unwrap();
        rx.recv_timeout(TIMEOUT).unwrap();
        rx.recv_timeout(TIMEOUT).unwrap();

        ticker.stop();
        let stopped_at = ticker.current_index();
        // Anything rendered before stop returned is already queued.
        while rx.try_recv().is_ok() {}

        thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
        assert_eq!(ticker.current_index(), stopped_at);
        assert!(!ticker.state().is_running());
    }

    #[test]
    fn test_restart_continues_from_index() {
        let (ticker, rx) = ticker(10, WrapMode::FullCycle);
        ticker.seek(6).unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 6);

        ticker.start().unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 7);
        ticker.stop();
        while rx.try_recv().is_ok() {}

        let resume = ticker.current_index();
        ticker.start().unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), (resume + 1) % 10);
    }

    #[test]
    fn test_seek_while_running() {
        let (ticker, rx) = ticker(100, WrapMode::FullCycle);
        ticker.start().unwrap();
        rx.recv_timeout(TIMEOUT).unwrap();

        ticker.seek(50).unwrap();
        let mut seen_seek = false;
        for _ in 0..100 {
            let index = rx.recv_timeout(TIMEOUT).unwrap();
            if index == 50 {
                seen_seek = true;
            } else if seen_seek {
                assert_eq!(index, 51);
                break;
            }
        }
        assert!(seen_seek);
        assert!(ticker.seek(100).is_err());
    }

    #[test]
    fn test_start_empty_trace_fails() {
        let trace = Arc::new(crate::trace::decode(&1u64.to_le_bytes()).unwrap());
        let controller = PlaybackController::new(trace, &PlaybackConfig::default()).unwrap();
        let ticker = Ticker::spawn(controller).unwrap();

        assert_eq!(ticker.start(), Err(PlaybackError::EmptyTrace));
        assert!(!ticker.state().is_running());
        assert_eq!(ticker.frame_count(), 0);
    }

    #[test]
    fn test_with_controller_access() {
        let (ticker, rx) = ticker(3, WrapMode::ShortCycle);
        let count = ticker.with_controller(|c| {
            c.refresh();
            c.frame_count()
        });
        assert_eq!(count, 3);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 0);
    }

    fn ticker_with_renderer<F>(frame_count: usize, render: F) -> Ticker
    where
        F: FnMut(usize, &[Point3D]) + Send + 'static,
    {
        let frames = (0..frame_count)
            .map(|f| Frame::new(vec![Point3D::new(f as f64, 0.0, 0.0)]))
            .collect();
        let trace = Arc::new(Trace::from_frames(1, frames).unwrap());
        let config = PlaybackConfig {
            interval_ms: 1,
            wrap: WrapMode::FullCycle,
            ..Default::default()
        };
        let mut controller = PlaybackController::new(trace, &config).unwrap();
        controller.set_render_callback(render);
        Ticker::spawn(controller).unwrap()
    }

    #[test]
    fn test_with_controller_start_wakes_parked_timer() {
        let (ticker, rx) = ticker(50, WrapMode::FullCycle);
        // Let the timer thread park while stopped.
        thread::sleep(Duration::from_millis(100));

        ticker.with_controller(|c| c.start()).unwrap();
        assert!(ticker.state().is_running());
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 1);

        ticker.with_controller(|c| c.stop());
        while rx.try_recv().is_ok() {}
        let stopped_at = ticker.current_index();
        thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
        assert_eq!(ticker.current_index(), stopped_at);
    }

    #[test]
    fn test_slow_render_skips_ticks() {
        const RENDER_TIME: Duration = Duration::from_millis(20);
        const RUN_TIME: Duration = Duration::from_millis(200);

        let renders = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&renders);
        let ticker = ticker_with_renderer(100, move |_, _| {
            thread::sleep(RENDER_TIME);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let started = Instant::now();
        ticker.start().unwrap();
        thread::sleep(RUN_TIME);
        ticker.stop();
        let elapsed = started.elapsed();

        let count = renders.load(Ordering::SeqCst);
        let max = (elapsed.as_millis() / RENDER_TIME.as_millis()) as usize + 1;
        assert!(count >= 1);
        assert!(count <= max, "{count} renders in {elapsed:?}, expected at most {max}");

        // Nothing was queued up behind the slow renders.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(renders.load(Ordering::SeqCst), count);
    }

    #[test]
    fn test_render_panic_stops_playback() {
        let panicked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&panicked);
        let (tx, rx) = mpsc::channel();
        let ticker = ticker_with_renderer(10, move |index, _| {
            if !flag.swap(true, Ordering::SeqCst) {
                panic!("renderer failed");
            }
            let _ = tx.send(index);
        });

        ticker.start().unwrap();
        let deadline = Instant::now() + TIMEOUT;
        while ticker.state().is_running() {
            assert!(Instant::now() < deadline, "playback still running after panic");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(panicked.load(Ordering::SeqCst));
        let index = ticker.current_index();

        // The timer thread survived and ticks again after a restart.
        ticker.start().unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), (index + 1) % 10);
    }
}
