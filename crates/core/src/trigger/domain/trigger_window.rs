use super::trigger_descriptor::TriggerDescriptor;
use crate::config::settings::MAX_GRACE_SECONDS;

/// Where a window stands relative to its deadlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowPhase {
    /// Just activated; the start-of-window signal has not been handled.
    Armed,
    /// Recognition runs under the window's cadence.
    Active,
    /// Recognition deadline passed without a final event.
    Expiring,
    /// Recognition is over but capture stays warm until the grace deadline.
    Lingering,
    Ended,
}

/// State of one manual trigger.
///
/// Recognition stops exactly at `recognition_deadline`; only the capture
/// suspend gate extends to `suspend_grace_deadline`.
#[derive(Clone, Debug)]
pub struct TriggerWindow {
    pub activated_at: f64,
    pub recognition_deadline: f64,
    pub suspend_grace_deadline: f64,
    pub cadence_hz: f64,
    pub stop_on_first_match: bool,
    pub force_notify_pending: bool,
    pub saw_face: bool,
    pub start_unknown_sent: bool,
    pub final_event_sent: bool,
    next_detection_at: f64,
    terminated: bool,
}

impl TriggerWindow {
    pub fn open(descriptor: &TriggerDescriptor, grace_seconds: f64) -> Self {
        let grace = if grace_seconds.is_finite() {
            grace_seconds.clamp(0.0, MAX_GRACE_SECONDS)
        } else {
            0.0
        };
        let recognition_deadline = descriptor.timestamp + descriptor.duration;
        Self {
            activated_at: descriptor.timestamp,
            recognition_deadline,
            suspend_grace_deadline: recognition_deadline + grace,
            cadence_hz: descriptor.cadence_hz,
            stop_on_first_match: descriptor.stop_on_match,
            force_notify_pending: descriptor.force_notify,
            saw_face: false,
            start_unknown_sent: false,
            final_event_sent: false,
            next_detection_at: 0.0,
            terminated: false,
        }
    }

    pub fn phase(&self, now: f64) -> WindowPhase {
        if self.terminated {
            WindowPhase::Ended
        } else if now >= self.recognition_deadline {
            if !self.final_event_sent {
                WindowPhase::Expiring
            } else if now <= self.suspend_grace_deadline {
                WindowPhase::Lingering
            } else {
                WindowPhase::Ended
            }
        } else if !self.start_unknown_sent {
            WindowPhase::Armed
        } else {
            WindowPhase::Active
        }
    }

    pub fn is_recognition_active(&self, now: f64) -> bool {
        matches!(self.phase(now), WindowPhase::Armed | WindowPhase::Active)
    }

    /// Whether capture should stay out of suspend mode.
    pub fn suspend_active(&self, now: f64) -> bool {
        !self.terminated && now <= self.suspend_grace_deadline
    }

    /// Claim a detection slot under the window cadence.
    ///
    /// Returns `false` when the previous slot was less than `1 / cadence_hz`
    /// ago.
    pub fn try_claim_detection(&mut self, now: f64) -> bool {
        if now < self.next_detection_at {
            return false;
        }
        self.next_detection_at = now + 1.0 / self.cadence_hz.max(f64::EPSILON);
        true
    }

    /// Stop the window for good: both deadlines collapse to zero.
    pub fn terminate(&mut self) {
        self.terminated = true;
        self.recognition_deadline = 0.0;
        self.suspend_grace_deadline = 0.0;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn window(duration: f64, grace: f64) -> TriggerWindow {
        TriggerWindow::open(&TriggerDescriptor::new(100.0, duration, 5.0, false), grace)
    }

    #[test]
    fn test_open_resets_flags_and_sets_deadlines() {
        let w = window(2.0, 10.0);
        assert_relative_eq!(w.recognition_deadline, 102.0);
        assert_relative_eq!(w.suspend_grace_deadline, 112.0);
        assert!(!w.saw_face && !w.start_unknown_sent && !w.final_event_sent);
        assert!(w.force_notify_pending);
    }

    #[rstest]
    #[case(-5.0, 102.0)]
    #[case(10_000.0, 702.0)]
    #[case(f64::INFINITY, 102.0)]
    fn test_grace_clamped(#[case] grace: f64, #[case] expected: f64) {
        assert_relative_eq!(window(2.0, grace).suspend_grace_deadline, expected);
    }

    #[test]
    fn test_grace_never_extends_recognition() {
        let mut w = window(2.0, 10.0);
        w.start_unknown_sent = true;
        assert_eq!(w.phase(101.9), WindowPhase::Active);
        assert_eq!(w.phase(102.0), WindowPhase::Expiring);
        assert!(w.suspend_active(105.0));
    }

    #[test]
    fn test_phase_sequence_with_final_event() {
        let mut w = window(2.0, 10.0);
        assert_eq!(w.phase(100.0), WindowPhase::Armed);
        w.start_unknown_sent = true;
        assert_eq!(w.phase(100.5), WindowPhase::Active);
        w.final_event_sent = true;
        assert_eq!(w.phase(102.5), WindowPhase::Lingering);
        assert_eq!(w.phase(112.5), WindowPhase::Ended);
        assert!(!w.suspend_active(112.5));
    }

    #[test]
    fn test_terminate_zeroes_deadlines() {
        let mut w = window(2.0, 10.0);
        w.terminate();
        assert_eq!(w.phase(100.0), WindowPhase::Ended);
        assert_eq!(w.recognition_deadline, 0.0);
        assert_eq!(w.suspend_grace_deadline, 0.0);
        assert!(!w.suspend_active(0.0));
    }

    #[test]
    fn test_detection_slots_follow_cadence() {
        let mut w = window(2.0, 0.0);
        assert!(w.try_claim_detection(100.0));
        assert!(!w.try_claim_detection(100.1));
        assert!(w.try_claim_detection(100.25));
    }
}
