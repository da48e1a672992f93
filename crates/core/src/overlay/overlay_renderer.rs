use super::glyphs::{draw_text, text_height};
use crate::config::settings::Settings;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

const BORDER_COLOR: [u8; 3] = [255, 255, 255];
const LABEL_COLOR: [u8; 3] = [255, 255, 255];
const LABEL_SCALE: u32 = 2;
/// Gap between the box edge and the label.
const LABEL_GAP: i32 = 4;
/// Labels never sit closer than this to the bottom edge.
const BOTTOM_MARGIN: i32 = 5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub color: [u8; 3],
    /// 0 = solid overlay colour, 1 = untouched pixels.
    pub transparency: f64,
    pub border: u32,
}

impl OverlayStyle {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            color: settings.overlay_color,
            transparency: settings.overlay_transparency,
            border: settings.overlay_border,
        }
    }
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: [220, 220, 200],
            transparency: 0.5,
            border: 1,
        }
    }
}

/// Face annotation with a style that follows the live config.
#[derive(Clone, Debug, Default)]
pub struct OverlayRenderer {
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn set_style(&mut self, style: OverlayStyle) {
        self.style = style;
    }

    pub fn draw(&self, frame: &mut Frame, bbox: BoundingBox, label: &str) -> bool {
        draw_face(frame, bbox, label, &self.style)
    }
}

/// Draw a tinted face box with a border and a name label.
///
/// Only the box, its border ring and the label area are written. Returns
/// `false` (frame untouched) when the box does not overlap the frame.
pub fn draw_face(frame: &mut Frame, bbox: BoundingBox, label: &str, style: &OverlayStyle) -> bool {
    let (fw, fh) = (frame.width(), frame.height());
    let b = bbox.clamped(fw, fh);
    if b.is_empty() || frame.channels() < 3 {
        return false;
    }
    let t = style.transparency.clamp(0.0, 1.0);
    let border = style.border as i32;

    if border > 0 {
        let outer = BoundingBox::new(
            b.left - border,
            b.top - border,
            b.width + 2 * border,
            b.height + 2 * border,
        )
        .clamped(fw, fh);
        fill_ring(frame, outer, b, BORDER_COLOR);
    }
    blend_rect(frame, b, style.color, t);

    let label_h = text_height(LABEL_SCALE) as i32;
    let below = b.bottom() + border + LABEL_GAP;
    let label_top = if below + label_h > fh as i32 - BOTTOM_MARGIN {
        (b.top - border - LABEL_GAP - label_h).max(0)
    } else {
        below
    };
    draw_text(frame, b.left, label_top, label, LABEL_SCALE, LABEL_COLOR);
    true
}

/// `out = color * (1 - t) + src * t` over `rect` only.
fn blend_rect(frame: &mut Frame, rect: BoundingBox, color: [u8; 3], t: f64) {
    let stride = frame.width() as usize;
    let channels = frame.channels() as usize;
    let data = frame.data_mut();
    for y in rect.top..rect.bottom() {
        let row = y as usize * stride;
        for x in rect.left..rect.right() {
            let idx = (row + x as usize) * channels;
            for c in 0..3 {
                let src = data[idx + c] as f64;
                let v = color[c] as f64 * (1.0 - t) + src * t;
                data[idx + c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Paint pixels inside `outer` but outside `inner`.
fn fill_ring(frame: &mut Frame, outer: BoundingBox, inner: BoundingBox, color: [u8; 3]) {
    let stride = frame.width() as usize;
    let channels = frame.channels() as usize;
    let data = frame.data_mut();
    for y in outer.top..outer.bottom() {
        let inside_rows = y >= inner.top && y < inner.bottom();
        for x in outer.left..outer.right() {
            if inside_rows && x >= inner.left && x < inner.right() {
                continue;
            }
            let idx = (y as usize * stride + x as usize) * channels;
            data[idx..idx + 3].copy_from_slice(&color);
        }
    }
}
