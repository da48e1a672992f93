use crate::detection::domain::face_tracker::{FaceTracker, TrackerFactory};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::GrayFrame;

/// Search radius as a fraction of the larger box side.
const SEARCH_FRACTION: f64 = 0.5;

/// Coarse search step in pixels before the ±1 refinement.
const COARSE_STEP: i32 = 2;

/// Mean absolute grey difference above which the track counts as lost.
pub const DEFAULT_MAX_MEAN_DIFF: f64 = 40.0;

/// Tracker that re-finds its initial grey patch near the last position.
///
/// Matching uses the sum of absolute differences over every second pixel
/// of the template.
pub struct TemplateTracker {
    template: Vec<u8>,
    bbox: Option<BoundingBox>,
    max_mean_diff: f64,
}

impl TemplateTracker {
    pub fn new(max_mean_diff: f64) -> Self {
        Self {
            template: Vec::new(),
            bbox: None,
            max_mean_diff,
        }
    }
}

impl Default for TemplateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEAN_DIFF)
    }
}

impl FaceTracker for TemplateTracker {
    fn init(&mut self, gray: &GrayFrame, bbox: BoundingBox) -> Result<(), Box<dyn std::error::Error>> {
        let bbox = bbox.clamped(gray.width(), gray.height());
        if bbox.width < 2 || bbox.height < 2 {
            return Err(format!("box too small to track: {bbox:?}").into());
        }
        let pixels = gray.data();
        let w = gray.width() as usize;
        let mut template = Vec::with_capacity((bbox.width * bbox.height) as usize);
        for y in bbox.top..bbox.bottom() {
            let start = y as usize * w + bbox.left as usize;
            template.extend_from_slice(&pixels[start..start + bbox.width as usize]);
        }
        self.template = template;
        self.bbox = Some(bbox);
        Ok(())
    }

    fn update(&mut self, gray: &GrayFrame) -> Option<BoundingBox> {
        let last = self.bbox?;
        let fw = gray.width() as i32;
        let fh = gray.height() as i32;
        if last.width > fw || last.height > fh {
            self.bbox = None;
            return None;
        }
        let margin = (last.width.max(last.height) as f64 * SEARCH_FRACTION).round() as i32;
        let x_range = ((last.left - margin).max(0), (last.left + margin).min(fw - last.width));
        let y_range = ((last.top - margin).max(0), (last.top + margin).min(fh - last.height));

        let score = |x: i32, y: i32| self.mean_diff(gray.data(), fw as usize, x, y, last);
        let mut best = (last.left, last.top, f64::MAX);
        let consider = |x: i32, y: i32, best: &mut (i32, i32, f64)| {
            if x < x_range.0 || x > x_range.1 || y < y_range.0 || y > y_range.1 {
                return;
            }
            let s = score(x, y);
            if s < best.2 {
                *best = (x, y, s);
            }
        };

        let mut y = y_range.0;
        while y <= y_range.1 {
            let mut x = x_range.0;
            while x <= x_range.1 {
                consider(x, y, &mut best);
                x += COARSE_STEP;
            }
            y += COARSE_STEP;
        }
        let (cx, cy, _) = best;
        for dy in -1..=1 {
            for dx in -1..=1 {
                consider(cx + dx, cy + dy, &mut best);
            }
        }

        if best.2 > self.max_mean_diff {
            self.bbox = None;
            return None;
        }
        let found = BoundingBox::new(best.0, best.1, last.width, last.height);
        self.bbox = Some(found);
        Some(found)
    }
}

impl TemplateTracker {
    fn mean_diff(&self, gray: &[u8], stride: usize, x: i32, y: i32, size: BoundingBox) -> f64 {
        let tw = size.width as usize;
        let mut total = 0u64;
        let mut n = 0u64;
        for ty in (0..size.height as usize).step_by(2) {
            let row = (y as usize + ty) * stride + x as usize;
            for tx in (0..tw).step_by(2) {
                let a = gray[row + tx] as i32;
                let b = self.template[ty * tw + tx] as i32;
                total += (a - b).unsigned_abs() as u64;
                n += 1;
            }
        }
        if n == 0 {
            f64::MAX
        } else {
            total as f64 / n as f64
        }
    }
}

pub struct TemplateTrackerFactory {
    max_mean_diff: f64,
}

impl TemplateTrackerFactory {
    pub fn new(max_mean_diff: f64) -> Self {
        Self { max_mean_diff }
    }
}

impl Default for TemplateTrackerFactory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEAN_DIFF)
    }
}

impl TrackerFactory for TemplateTrackerFactory {
    fn name(&self) -> &str {
        "template"
    }

    fn create(&self) -> Box<dyn FaceTracker> {
        Box::new(TemplateTracker::new(self.max_mean_diff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::Frame;

    /// Dark 64x64 frame with a bright 12x12 textured square at (x, y).
    fn frame_with_square(x: usize, y: usize) -> GrayFrame {
        let (w, h) = (64usize, 64usize);
        let mut data = vec![20u8; w * h * 3];
        for sy in 0..12 {
            for sx in 0..12 {
                let v = if (sx / 3 + sy / 3) % 2 == 0 { 250 } else { 150 };
                let idx = ((y + sy) * w + x + sx) * 3;
                data[idx..idx + 3].copy_from_slice(&[v, v, v]);
            }
        }
        GrayFrame::from_frame(&Frame::new(data, w as u32, h as u32, 3, 0))
    }

    #[test]
    fn test_follows_moving_square() {
        let mut tracker = TemplateTracker::default();
        tracker
            .init(&frame_with_square(20, 20), BoundingBox::new(20, 20, 12, 12))
            .unwrap();
        let found = tracker.update(&frame_with_square(23, 18)).unwrap();
        assert_eq!((found.left, found.top), (23, 18));
        let again = tracker.update(&frame_with_square(26, 16)).unwrap();
        assert_eq!((again.left, again.top), (26, 16));
    }

    #[test]
    fn test_loses_track_when_object_vanishes() {
        let mut tracker = TemplateTracker::default();
        tracker
            .init(&frame_with_square(20, 20), BoundingBox::new(20, 20, 12, 12))
            .unwrap();
        let blank = GrayFrame::from_frame(&Frame::new(vec![20u8; 64 * 64 * 3], 64, 64, 3, 1));
        assert_eq!(tracker.update(&blank), None);
        assert_eq!(tracker.update(&frame_with_square(20, 20)), None);
    }

    #[test]
    fn test_update_before_init_is_lost() {
        let mut tracker = TemplateTracker::default();
        assert_eq!(tracker.update(&frame_with_square(0, 0)), None);
    }

    #[test]
    fn test_init_rejects_degenerate_box() {
        let mut tracker = TemplateTracker::default();
        let frame = frame_with_square(0, 0);
        assert!(tracker.init(&frame, BoundingBox::new(100, 100, 5, 5)).is_err());
    }

    #[test]
    fn test_factory_creates_independent_trackers() {
        let factory = TemplateTrackerFactory::default();
        assert_eq!(factory.name(), "template");
        let mut a = factory.create();
        let mut b = factory.create();
        a.init(&frame_with_square(20, 20), BoundingBox::new(20, 20, 12, 12))
            .unwrap();
        assert!(b.update(&frame_with_square(20, 20)).is_none());
        assert!(a.update(&frame_with_square(20, 20)).is_some());
    }
}
