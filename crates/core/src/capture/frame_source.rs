use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::domain::video_capture::{CaptureError, VideoCapture};
use crate::config::config_store::ConfigSource;
use crate::config::settings::Settings;
use crate::pipeline::frame_queue::FrameQueue;
use crate::shared::clock::Clock;
use crate::shared::frame::Frame;
use crate::trigger::trigger_watch::TriggerWatch;

/// Longest single sleep, so a stop request is seen promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Delays and counts used by the capture loop.
#[derive(Clone, Debug)]
pub struct CaptureTimings {
    /// Pause between open attempts.
    pub retry_delay: Duration,
    /// Frames grabbed and dropped right after a (re)connect.
    pub reconnect_discard: usize,
    /// Keep-alive grab period while suspended.
    pub suspend_interval: Duration,
    /// How long to drain the source when a trigger wakes capture up.
    pub flush_duration: Duration,
    /// Frames grabbed before each retrieve.
    pub grabs_per_cycle: usize,
    /// Pause after a transport error.
    pub error_pause: Duration,
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
            reconnect_discard: 10,
            suspend_interval: Duration::from_millis(50),
            flush_duration: Duration::from_millis(400),
            grabs_per_cycle: 2,
            error_pause: Duration::from_millis(500),
        }
    }
}

/// What one capture cycle did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Published,
    Suspended,
    Reconnecting,
}

/// Capture stage: keeps the camera connection alive and publishes the
/// newest frames.
pub struct FrameSource {
    capture: Box<dyn VideoCapture>,
    trigger: TriggerWatch,
    config: Arc<dyn ConfigSource>,
    clock: Arc<dyn Clock>,
    timings: CaptureTimings,
    trigger_was_active: bool,
    next_index: usize,
}

impl FrameSource {
    pub fn new(
        capture: Box<dyn VideoCapture>,
        trigger: TriggerWatch,
        config: Arc<dyn ConfigSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            capture,
            trigger,
            config,
            clock,
            timings: CaptureTimings::default(),
            trigger_was_active: false,
            next_index: 0,
        }
    }

    pub fn with_timings(mut self, timings: CaptureTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Capture until `stop` is set.
    ///
    /// Fails only when no source is configured; every other fault is
    /// retried.
    pub fn run(&mut self, queue: &FrameQueue<Frame>, stop: &AtomicBool) -> Result<(), CaptureError> {
        if self.config.snapshot().input_stream_url.is_empty() {
            log::error!("No input stream url configured");
            return Err(CaptureError::MissingSource);
        }
        while !stop.load(Ordering::Relaxed) {
            self.step(queue, stop);
        }
        self.capture.release();
        log::info!("Capture stopped");
        Ok(())
    }

    /// One capture cycle.
    pub fn step(&mut self, queue: &FrameQueue<Frame>, stop: &AtomicBool) -> StepOutcome {
        let settings = self.config.snapshot();
        self.trigger.refresh(settings.stream_suspend_grace_seconds);
        let trigger_active = self.trigger.suspend_active(self.clock.now());
        let woke_up = trigger_active && !self.trigger_was_active;
        self.trigger_was_active = trigger_active;

        if settings.enable_stream_suspend && !trigger_active {
            return self.keep_warm(&settings, stop);
        }

        if !self.capture.is_opened() {
            if let Err(e) = self.connect(&settings, stop) {
                log::error!("Camera open failed: {e}");
                self.capture.release();
                self.sleep(self.timings.retry_delay, stop);
                return StepOutcome::Reconnecting;
            }
            for _ in 0..self.timings.reconnect_discard {
                if !matches!(self.capture.grab(), Ok(true)) {
                    break;
                }
            }
        }

        if woke_up {
            self.flush(stop);
        }

        for _ in 0..self.timings.grabs_per_cycle {
            if let Err(e) = self.capture.grab() {
                return self.drop_connection(&format!("grab failed: {e}"), stop);
            }
        }
        let frame = match self.capture.retrieve() {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.drop_connection("no frame retrieved", stop),
            Err(e) => return self.drop_connection(&format!("retrieve failed: {e}"), stop),
        };

        let frame = frame
            .resized(settings.output_width, settings.output_height)
            .with_index(self.next_index);
        self.next_index = self.next_index.wrapping_add(1);
        if queue.push(frame) > 0 {
            log::debug!("Frame queue full, dropped oldest frame");
        }
        StepOutcome::Published
    }

    /// Suspend mode: hold the connection with cheap grabs, publish nothing.
    fn keep_warm(&mut self, settings: &Settings, stop: &AtomicBool) -> StepOutcome {
        if !self.capture.is_opened() {
            if let Err(e) = self.connect(settings, stop) {
                log::error!("Camera open failed (suspend warmup): {e}");
                self.capture.release();
                self.sleep(self.timings.error_pause, stop);
                return StepOutcome::Reconnecting;
            }
        }
        match self.capture.grab() {
            Ok(true) => {
                self.sleep(self.timings.suspend_interval, stop);
                StepOutcome::Suspended
            }
            _ => self.drop_connection("grab failed during suspend", stop),
        }
    }

    fn connect(&mut self, settings: &Settings, stop: &AtomicBool) -> Result<(), CaptureError> {
        let url = settings.input_stream_url.as_str();
        if url.is_empty() {
            return Err(CaptureError::MissingSource);
        }
        let max = settings.max_capture_retries.max(1);
        for attempt in 1..=max {
            match self.capture.open(url) {
                Ok(()) if self.capture.is_opened() => {
                    log::info!("Camera connected");
                    return Ok(());
                }
                Ok(()) => log::warn!("Connection attempt {attempt}/{max} failed"),
                Err(e) => log::warn!("Connection attempt {attempt}/{max} failed: {e}"),
            }
            self.capture.release();
            if attempt < max {
                self.sleep(self.timings.retry_delay, stop);
            }
            if stop.load(Ordering::Relaxed) {
                break;
            }
        }
        Err(CaptureError::OpenFailed {
            url: url.to_string(),
            attempts: max,
        })
    }

    /// Drain frames buffered by the source so the next one is live.
    fn flush(&mut self, stop: &AtomicBool) {
        let deadline = Instant::now() + self.timings.flush_duration;
        let mut drained = 0usize;
        while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
            if !matches!(self.capture.grab(), Ok(true)) {
                break;
            }
            drained += 1;
        }
        log::debug!("Trigger wake-up flushed {drained} frames");
    }

    fn drop_connection(&mut self, reason: &str, stop: &AtomicBool) -> StepOutcome {
        log::warn!("Camera {reason}, reconnecting");
        self.capture.release();
        self.sleep(self.timings.error_pause, stop);
        StepOutcome::Reconnecting
    }

    fn sleep(&self, total: Duration, stop: &AtomicBool) {
        let deadline = Instant::now() + total;
        loop {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
