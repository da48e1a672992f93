use std::sync::Arc;

use crate::config::config_store::ConfigSource;
use crate::config::settings::Settings;
use crate::detection::domain::cadence_policy::{decide, CadenceAction, FrameCounter};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_encoder::FaceEncoder;
use crate::detection::domain::face_matcher::{Descriptor, FaceMatcher, Gallery};
use crate::detection::domain::face_tracker::TrackerFactory;
use crate::detection::domain::frame_enhancement::{normalize_contrast, sharpness};
use crate::detection::domain::tracked_face::TrackedFace;
use crate::notification::domain::notifier::{Notifier, NotifyOutcome};
use crate::overlay::overlay_renderer::{OverlayRenderer, OverlayStyle};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::clock::Clock;
use crate::shared::constants::UNKNOWN_LABEL;
use crate::shared::frame::{Frame, GrayFrame};
use crate::trigger::domain::trigger_window::WindowPhase;
use crate::trigger::trigger_watch::TriggerWatch;

/// Collaborators handed to [`Processor::new`].
pub struct ProcessorParts {
    pub detector: Box<dyn FaceDetector>,
    pub encoder: Box<dyn FaceEncoder>,
    pub gallery: Gallery,
    pub trackers: Box<dyn TrackerFactory>,
    pub notifier: Box<dyn Notifier>,
    pub trigger: TriggerWatch,
    pub config: Arc<dyn ConfigSource>,
    pub clock: Arc<dyn Clock>,
}

/// Per-frame recognition stage.
///
/// Runs the trigger window state machine, picks detection or tracking
/// for each frame, annotates a copy of the frame and drives identity
/// notifications. Failures degrade to an unannotated pass-through.
pub struct Processor {
    detector: Box<dyn FaceDetector>,
    encoder: Box<dyn FaceEncoder>,
    gallery: Gallery,
    trackers: Box<dyn TrackerFactory>,
    notifier: Box<dyn Notifier>,
    trigger: TriggerWatch,
    config: Arc<dyn ConfigSource>,
    clock: Arc<dyn Clock>,
    renderer: OverlayRenderer,
    tracked: Vec<TrackedFace>,
    counter: FrameCounter,
    window_was_live: bool,
}

impl Processor {
    pub fn new(parts: ProcessorParts) -> Self {
        log::info!(
            "Processor ready: {} reference faces, tracker '{}'",
            parts.gallery.len(),
            parts.trackers.name()
        );
        Self {
            detector: parts.detector,
            encoder: parts.encoder,
            gallery: parts.gallery,
            trackers: parts.trackers,
            notifier: parts.notifier,
            trigger: parts.trigger,
            config: parts.config,
            clock: parts.clock,
            renderer: OverlayRenderer::default(),
            tracked: Vec::new(),
            counter: FrameCounter::default(),
            window_was_live: false,
        }
    }

    pub fn tracked_faces(&self) -> &[TrackedFace] {
        &self.tracked
    }

    pub fn frame_counter(&self) -> u64 {
        self.counter.value()
    }

    pub fn trigger(&self) -> &TriggerWatch {
        &self.trigger
    }

    /// Process one frame and return the frame to publish.
    pub fn process(&mut self, frame: Frame) -> Frame {
        let settings = self.config.snapshot();
        self.trigger.refresh(settings.stream_suspend_grace_seconds);
        self.renderer.set_style(OverlayStyle::from_settings(&settings));
        let now = self.clock.now();

        self.advance_window(&frame, &settings, now);

        // After the state machine, so a window that expired on this frame
        // no longer counts as live.
        let window_live = self.trigger.suspend_active(now);
        if self.window_was_live && !window_live {
            log::debug!("Trigger window ended, running housekeeping");
            self.notifier.housekeeping();
        }
        self.window_was_live = window_live;

        let action = decide(
            self.trigger.window_mut(),
            now,
            self.counter.value(),
            settings.periodic_interval(),
        );
        let out = match action {
            CadenceAction::TrackOnly => self.tracker_pass(&frame, &settings),
            CadenceAction::TriggeredDetection | CadenceAction::IntervalDetection => {
                let triggered = action == CadenceAction::TriggeredDetection;
                self.detection_pass(&frame, &settings, triggered, window_live)
            }
        };
        self.counter.advance();
        out
    }

    /// Handle the start and expiry edges of the current window.
    fn advance_window(&mut self, frame: &Frame, settings: &Settings, now: f64) {
        match self.trigger.phase(now) {
            WindowPhase::Armed => {
                if settings.announce_unknown_on_trigger {
                    self.notifier.announce_identity(UNKNOWN_LABEL);
                }
                if let Some(w) = self.trigger.window_mut() {
                    w.start_unknown_sent = true;
                }
            }
            WindowPhase::Expiring => {
                let saw_face = self.trigger.window().is_some_and(|w| w.saw_face);
                if saw_face {
                    self.send(UNKNOWN_LABEL, frame, true);
                    if let Some(w) = self.trigger.window_mut() {
                        w.final_event_sent = true;
                    }
                } else {
                    log::info!("Trigger window expired without a face");
                }
                self.trigger.terminate();
            }
            WindowPhase::Active | WindowPhase::Lingering | WindowPhase::Ended => {}
        }
    }

    fn detection_pass(
        &mut self,
        frame: &Frame,
        settings: &Settings,
        triggered: bool,
        window_live: bool,
    ) -> Frame {
        let scale = settings.face_scale_factor;
        let small = if scale < 1.0 {
            let w = ((frame.width() as f64 * scale).round() as u32).max(1);
            let h = ((frame.height() as f64 * scale).round() as u32).max(1);
            frame.resized(w, h)
        } else {
            frame.clone()
        };

        if settings.enable_blur_filter {
            let score = sharpness(&small);
            if score < settings.blur_threshold {
                log::debug!("Frame too blurry for detection ({score:.1})");
                return self.tracker_pass(frame, settings);
            }
        }
        let small = if settings.enable_clahe {
            normalize_contrast(&small)
        } else {
            small
        };

        let faces = match self.detect_and_encode(&small) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Face detection failed: {e}");
                return frame.clone();
            }
        };

        self.tracked.clear();
        if triggered && !faces.is_empty() {
            if let Some(w) = self.trigger.window_mut() {
                w.saw_face = true;
            }
        }

        let matcher = FaceMatcher::new(settings.face_match_threshold);
        let gray = (!faces.is_empty()).then(|| GrayFrame::from_frame(frame));
        let mut marked = frame.clone();
        for (small_box, descriptor) in faces {
            let label = matcher.best_match(&descriptor, &self.gallery).label;
            let bbox = small_box
                .rescale_from_detection(scale)
                .clamped(frame.width(), frame.height());
            if bbox.is_empty() {
                continue;
            }
            if let Some(gray) = &gray {
                self.seed_tracker(gray, bbox, &label);
            }
            if settings.enable_face_overlay {
                self.renderer.draw(&mut marked, bbox, &label);
            }
            self.notify_identity(&label, &marked, window_live);
        }
        marked
    }

    fn detect_and_encode(
        &mut self,
        small: &Frame,
    ) -> Result<Vec<(BoundingBox, Descriptor)>, Box<dyn std::error::Error>> {
        let boxes = self.detector.detect(small)?;
        if boxes.is_empty() {
            return Ok(Vec::new());
        }
        let descriptors = self.encoder.encode(small, &boxes)?;
        Ok(boxes.into_iter().zip(descriptors).collect())
    }

    fn seed_tracker(&mut self, gray: &GrayFrame, bbox: BoundingBox, label: &str) {
        let mut tracker = self.trackers.create();
        match tracker.init(gray, bbox) {
            Ok(()) => self.tracked.push(TrackedFace::new(bbox, label.to_string(), tracker)),
            Err(e) => log::debug!("Tracker init failed for {label}: {e}"),
        }
    }

    /// Inside a window only the first known identity is sent, forced.
    /// Outside, every identity goes through the throttle.
    fn notify_identity(&mut self, label: &str, marked: &Frame, window_live: bool) {
        if !window_live {
            self.send(label, marked, false);
            return;
        }
        let Some(w) = self.trigger.window_mut() else {
            return;
        };
        if label == UNKNOWN_LABEL || w.final_event_sent {
            return;
        }
        w.force_notify_pending = false;
        w.final_event_sent = true;
        let stop = w.stop_on_first_match;

        self.send(label, marked, true);
        if stop {
            log::info!("Stopping trigger after first match ({label})");
            self.trigger.terminate();
        }
    }

    fn send(&mut self, identity: &str, frame: &Frame, forced: bool) {
        if let NotifyOutcome::Fired(report) = self.notifier.notify(identity, frame, forced) {
            for e in &report.storage_errors {
                log::error!("Notification for {identity} incomplete: {e}");
            }
            if report.dropped {
                log::warn!("Notification for {identity} was not handed to any channel");
            }
        }
    }

    fn tracker_pass(&mut self, frame: &Frame, settings: &Settings) -> Frame {
        if self.tracked.is_empty() {
            return frame.clone();
        }
        let gray = GrayFrame::from_frame(frame);
        self.tracked.retain_mut(|face| {
            let alive = face.advance(&gray);
            if !alive {
                log::debug!("Tracking lost for {}", face.label);
            }
            alive
        });
        let mut out = frame.clone();
        if settings.enable_face_overlay {
            for face in &self.tracked {
                self.renderer.draw(&mut out, face.bbox, &face.label);
            }
        }
        out
    }
}
