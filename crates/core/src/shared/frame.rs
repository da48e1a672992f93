use std::time::SystemTime;

use ndarray::ArrayView3;

/// A captured video frame: contiguous RGB bytes in row-major order.
///
/// Once a frame has been handed to a queue nobody mutates it; stages that
/// annotate a frame draw on a clone.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
    captured_at: SystemTime,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        Self::captured(data, width, height, channels, index, SystemTime::now())
    }

    pub fn captured(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        index: usize,
        captured_at: SystemTime,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
            captured_at,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn as_ndarray(&self) -> Option<ArrayView3<'_, u8>> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .ok()
    }

    /// Borrow the pixels as an `image` buffer (RGB frames only).
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        if self.channels != 3 {
            return None;
        }
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub fn from_rgb_image(img: image::RgbImage, index: usize, captured_at: SystemTime) -> Self {
        let (w, h) = img.dimensions();
        Self::captured(img.into_raw(), w, h, 3, index, captured_at)
    }

    /// Resample to `width` x `height` keeping index and capture time.
    ///
    /// Returns a clone when the size already matches.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        match self.to_rgb_image() {
            Some(img) => {
                let out = image::imageops::resize(
                    &img,
                    width.max(1),
                    height.max(1),
                    image::imageops::FilterType::Triangle,
                );
                Frame::from_rgb_image(out, self.index, self.captured_at)
            }
            None => self.clone(),
        }
    }

    /// Luma plane (BT.601 weights), one byte per pixel.
    pub fn to_gray(&self) -> Vec<u8> {
        let c = self.channels as usize;
        if c < 3 {
            return self.data.iter().step_by(c.max(1)).copied().collect();
        }
        self.data
            .chunks_exact(c)
            .map(|px| {
                let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Replace the luma of every pixel with `gray`, preserving chroma offsets.
    pub fn with_luma(&self, gray: &[u8]) -> Frame {
        let mut out = self.clone();
        let c = self.channels as usize;
        if c < 3 || gray.len() * c != self.data.len() {
            return out;
        }
        let old = self.to_gray();
        for (i, px) in out.data.chunks_exact_mut(c).enumerate() {
            let delta = gray[i] as i16 - old[i] as i16;
            for v in px.iter_mut().take(3) {
                *v = (*v as i16 + delta).clamp(0, 255) as u8;
            }
        }
        out
    }
}

/// Single-channel luma plane of a [`Frame`], computed once and shared by
/// every consumer of that frame.
#[derive(Clone, Debug)]
pub struct GrayFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl GrayFrame {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            data: frame.to_gray(),
            width: frame.width(),
            height: frame.height(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
