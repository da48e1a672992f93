/// Axis-aligned face box in pixel coordinates (left, top, width, height).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Build from corner coordinates, rounding each corner to the nearest pixel.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let left = x1.round() as i32;
        let top = y1.round() as i32;
        Self {
            left,
            top,
            width: x2.round() as i32 - left,
            height: y2.round() as i32 - top,
        }
    }

    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Map a box found on a frame downscaled by `scale` back to the
    /// original frame. Corners are divided by `scale` and rounded, so
    /// `left=100` at `scale=0.75` becomes 133.
    pub fn rescale_from_detection(&self, scale: f64) -> Self {
        if scale <= 0.0 {
            return *self;
        }
        Self::from_corners(
            self.left as f64 / scale,
            self.top as f64 / scale,
            self.right() as f64 / scale,
            self.bottom() as f64 / scale,
        )
    }

    /// Intersect with the `frame_w` x `frame_h` frame rectangle.
    pub fn clamped(&self, frame_w: u32, frame_h: u32) -> Self {
        let x1 = self.left.clamp(0, frame_w as i32);
        let y1 = self.top.clamp(0, frame_h as i32);
        let x2 = self.right().clamp(0, frame_w as i32);
        let y2 = self.bottom().clamp(0, frame_h as i32);
        Self {
            left: x1,
            top: y1,
            width: (x2 - x1).max(0),
            height: (y2 - y1).max(0),
        }
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.left.max(other.left);
        let iy1 = self.top.max(other.top);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() as f64 + other.area() as f64 - inter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    // ── Rescaling ────────────────────────────────────────────────────

    #[test]
    fn test_rescale_rounds_instead_of_truncating() {
        let b = BoundingBox::new(100, 60, 30, 30);
        let r = b.rescale_from_detection(0.75);
        assert_eq!(r.left, 133);
        assert_eq!(r.top, 80);
        // right = 130 / 0.75 = 173.33 → 173
        assert_eq!(r.right(), 173);
        assert_ne!(r.left, 100, "integer reciprocal would leave the box unscaled");
    }

    #[rstest]
    #[case(1.0, BoundingBox::new(10, 20, 30, 40))]
    #[case(0.5, BoundingBox::new(20, 40, 60, 80))]
    #[case(0.25, BoundingBox::new(40, 80, 120, 160))]
    fn test_rescale_exact_factors(#[case] scale: f64, #[case] expected: BoundingBox) {
        let b = BoundingBox::new(10, 20, 30, 40);
        assert_eq!(b.rescale_from_detection(scale), expected);
    }

    #[test]
    fn test_rescale_ignores_non_positive_scale() {
        let b = BoundingBox::new(1, 2, 3, 4);
        assert_eq!(b.rescale_from_detection(0.0), b);
    }

    // ── Clamping ─────────────────────────────────────────────────────

    #[test]
    fn test_clamped_inside_is_unchanged() {
        let b = BoundingBox::new(10, 10, 20, 20);
        assert_eq!(b.clamped(100, 100), b);
    }

    #[test]
    fn test_clamped_cuts_overhang() {
        let b = BoundingBox::new(-5, 90, 20, 20).clamped(100, 100);
        assert_eq!(b, BoundingBox::new(0, 90, 15, 10));
    }

    #[test]
    fn test_clamped_outside_is_empty() {
        assert!(BoundingBox::new(200, 200, 10, 10).clamped(100, 100).is_empty());
    }

    // ── IoU ──────────────────────────────────────────────────────────

    #[test]
    fn test_iou_identical() {
        let b = BoundingBox::new(0, 0, 10, 10);
        assert_relative_eq!(b.iou(&b), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, 0, 10, 10);
        assert_relative_eq!(a.iou(&b), 50.0 / 150.0);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(10, 0, 10, 10);
        assert_eq!(a.iou(&b), 0.0);
    }
}
