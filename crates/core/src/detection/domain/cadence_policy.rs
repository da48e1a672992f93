use crate::shared::constants::FRAME_COUNTER_WRAP;
use crate::trigger::domain::trigger_window::TriggerWindow;

/// What the processor does with one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CadenceAction {
    /// Full detection inside a trigger window, paced by its cadence.
    TriggeredDetection,
    /// Full detection on the periodic schedule outside any window.
    IntervalDetection,
    /// Only advance the existing trackers.
    TrackOnly,
}

impl CadenceAction {
    pub fn is_detection(self) -> bool {
        !matches!(self, CadenceAction::TrackOnly)
    }
}

/// Decide between full detection and tracker-only for this frame.
///
/// `periodic` is the configured frame interval, `None` when periodic
/// recognition is off. A live window claims its detection slot here.
pub fn decide(
    window: Option<&mut TriggerWindow>,
    now: f64,
    frame_counter: u64,
    periodic: Option<u32>,
) -> CadenceAction {
    match window {
        Some(w) if w.is_recognition_active(now) => {
            if w.try_claim_detection(now) {
                CadenceAction::TriggeredDetection
            } else {
                CadenceAction::TrackOnly
            }
        }
        _ => match periodic {
            Some(n) if n > 0 && frame_counter % n as u64 == 0 => CadenceAction::IntervalDetection,
            _ => CadenceAction::TrackOnly,
        },
    }
}

/// Processing frame counter; resets to 0 at a large bound.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCounter(u64);

impl FrameCounter {
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn advance(&mut self) {
        self.0 += 1;
        if self.0 >= FRAME_COUNTER_WRAP {
            self.0 = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::domain::trigger_descriptor::TriggerDescriptor;
    use rstest::rstest;

    fn live_window() -> TriggerWindow {
        let mut w = TriggerWindow::open(&TriggerDescriptor::new(100.0, 2.0, 2.0, false), 0.0);
        w.start_unknown_sent = true;
        w
    }

    #[test]
    fn test_window_detection_paced_by_cadence() {
        let mut w = live_window();
        assert_eq!(decide(Some(&mut w), 100.0, 1, None), CadenceAction::TriggeredDetection);
        assert_eq!(decide(Some(&mut w), 100.2, 2, None), CadenceAction::TrackOnly);
        assert_eq!(decide(Some(&mut w), 100.5, 3, None), CadenceAction::TriggeredDetection);
    }

    #[test]
    fn test_window_overrides_periodic_schedule() {
        let mut w = live_window();
        decide(Some(&mut w), 100.0, 0, Some(1));
        assert_eq!(decide(Some(&mut w), 100.1, 0, Some(1)), CadenceAction::TrackOnly);
    }

    #[test]
    fn test_expired_window_falls_back_to_periodic() {
        let mut w = live_window();
        w.final_event_sent = true;
        assert_eq!(decide(Some(&mut w), 103.0, 10, Some(5)), CadenceAction::IntervalDetection);
    }

    #[rstest]
    #[case(0, Some(60), CadenceAction::IntervalDetection)]
    #[case(59, Some(60), CadenceAction::TrackOnly)]
    #[case(120, Some(60), CadenceAction::IntervalDetection)]
    #[case(0, None, CadenceAction::TrackOnly)]
    #[case(0, Some(0), CadenceAction::TrackOnly)]
    fn test_periodic_schedule(
        #[case] counter: u64,
        #[case] periodic: Option<u32>,
        #[case] expected: CadenceAction,
    ) {
        assert_eq!(decide(None, 0.0, counter, periodic), expected);
    }

    #[test]
    fn test_counter_wraps_to_zero() {
        let mut c = FrameCounter(FRAME_COUNTER_WRAP - 1);
        c.advance();
        assert_eq!(c.value(), 0);
        assert_eq!(decide(None, 0.0, c.value(), Some(60)), CadenceAction::IntervalDetection);
    }
}
