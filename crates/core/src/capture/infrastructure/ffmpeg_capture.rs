use crate::capture::domain::video_capture::VideoCapture;
use crate::shared::frame::Frame;

/// Socket timeout for network sources, in microseconds.
const NETWORK_TIMEOUT_US: &str = "5000000";

/// Live stream capture via ffmpeg-next (libavformat + libavcodec).
///
/// `grab` decodes but skips colour conversion; `retrieve` scales the last
/// decoded picture to RGB24.
pub struct FfmpegCapture {
    input: Option<ffmpeg_next::format::context::Input>,
    decoder: Option<ffmpeg_next::decoder::Video>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    decoded: ffmpeg_next::util::frame::video::Video,
    stream_index: usize,
    has_frame: bool,
}

// Safety: FfmpegCapture is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCapture {}

impl FfmpegCapture {
    pub fn new() -> Self {
        Self {
            input: None,
            decoder: None,
            scaler: None,
            decoded: ffmpeg_next::util::frame::video::Video::empty(),
            stream_index: 0,
            has_frame: false,
        }
    }
}

impl Default for FfmpegCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoCapture for FfmpegCapture {
    fn open(&mut self, url: &str) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        self.release();

        let mut options = ffmpeg_next::Dictionary::new();
        if url.starts_with("rtsp://") {
            options.set("rtsp_transport", "tcp");
        }
        if url.contains("://") {
            options.set("timeout", NETWORK_TIMEOUT_US);
        }
        let ictx = ffmpeg_next::format::input_with_dictionary(&url, options)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        self.stream_index = stream_index;
        self.decoder = Some(decoder);
        self.input = Some(ictx);
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.input.is_some() && self.decoder.is_some()
    }

    fn grab(&mut self) -> Result<bool, Box<dyn std::error::Error>> {
        let (Some(ictx), Some(decoder)) = (self.input.as_mut(), self.decoder.as_mut()) else {
            return Err("FfmpegCapture: not opened".into());
        };
        loop {
            if decoder.receive_frame(&mut self.decoded).is_ok() {
                self.has_frame = true;
                return Ok(true);
            }
            let Some((stream, packet)) = ictx.packets().next() else {
                return Ok(false);
            };
            if stream.index() != self.stream_index {
                continue;
            }
            decoder.send_packet(&packet)?;
        }
    }

    fn retrieve(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if !self.has_frame {
            return Ok(None);
        }
        self.has_frame = false;
        let (w, h) = (self.decoded.width(), self.decoded.height());
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        rgb_scaler(&mut self.scaler, &self.decoded)?.run(&self.decoded, &mut rgb)?;
        Ok(Some(Frame::new(extract_rgb_pixels(&rgb, w, h), w, h, 3, 0)))
    }

    fn release(&mut self) {
        self.scaler = None;
        self.decoder = None;
        self.input = None;
        self.has_frame = false;
    }
}

/// Reuse the cached scaler unless the source geometry or format changed.
fn rgb_scaler<'a>(
    cached: &'a mut Option<ffmpeg_next::software::scaling::Context>,
    src: &ffmpeg_next::util::frame::video::Video,
) -> Result<&'a mut ffmpeg_next::software::scaling::Context, ffmpeg_next::Error> {
    let (format, w, h) = (src.format(), src.width(), src.height());
    let stale = cached.as_ref().map_or(true, |s| {
        let input = s.input();
        input.format != format || input.width != w || input.height != h
    });
    if stale {
        *cached = Some(ffmpeg_next::software::scaling::Context::get(
            format,
            w,
            h,
            ffmpeg_next::format::Pixel::RGB24,
            w,
            h,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?);
    }
    cached.as_mut().ok_or(ffmpeg_next::Error::Bug)
}

/// Copy an RGB24 picture into a tightly packed buffer, dropping row padding.
fn extract_rgb_pixels(rgb: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_len = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Encode a short grey-level MPEG-4 clip.
    fn write_clip(path: &Path, frames: usize, width: u32, height: u32) {
        ffmpeg_next::init().unwrap();
        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut enc_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        enc_ctx.set_width(width);
        enc_ctx.set_height(height);
        enc_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        enc_ctx.set_time_base(ffmpeg_next::Rational(1, 10));
        enc_ctx.set_frame_rate(Some(ffmpeg_next::Rational(10, 1)));
        if global_header {
            enc_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = enc_ctx.open_with(ffmpeg_next::Dictionary::new()).unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let tb = octx.stream(0).unwrap().time_base();

        for i in 0..frames {
            let mut yuv = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::YUV420P,
                width,
                height,
            );
            for plane in 0..3 {
                let fill = if plane == 0 { (i * 40 % 200) as u8 + 20 } else { 128 };
                yuv.data_mut(plane).fill(fill);
            }
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            let mut packet = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut packet).is_ok() {
                packet.set_stream(0);
                packet.rescale_ts(ffmpeg_next::Rational(1, 10), tb);
                packet.write_interleaved(&mut octx).unwrap();
            }
        }
        encoder.send_eof().unwrap();
        let mut packet = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(ffmpeg_next::Rational(1, 10), tb);
            packet.write_interleaved(&mut octx).unwrap();
        }
        octx.write_trailer().unwrap();
    }

    #[test]
    fn test_grab_and_retrieve_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_clip(&path, 5, 64, 48);

        let mut cap = FfmpegCapture::new();
        cap.open(path.to_str().unwrap()).unwrap();
        assert!(cap.is_opened());
        assert!(cap.grab().unwrap());
        let frame = cap.retrieve().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height(), frame.channels()), (64, 48, 3));
        assert_eq!(frame.data().len(), 64 * 48 * 3);
        assert!(cap.retrieve().unwrap().is_none());
    }

    #[test]
    fn test_grab_reports_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_clip(&path, 3, 32, 32);

        let mut cap = FfmpegCapture::new();
        cap.open(path.to_str().unwrap()).unwrap();
        let mut grabbed = 0;
        while cap.grab().unwrap() {
            grabbed += 1;
            assert!(grabbed < 100, "stream never ended");
        }
        assert!(grabbed >= 1);
    }

    #[test]
    fn test_open_missing_source_fails() {
        let mut cap = FfmpegCapture::new();
        assert!(cap.open("/nonexistent/stream.mp4").is_err());
        assert!(!cap.is_opened());
    }

    #[test]
    fn test_grab_before_open_fails() {
        let mut cap = FfmpegCapture::new();
        assert!(cap.grab().is_err());
        assert!(cap.retrieve().unwrap().is_none());
        cap.release();
    }
}
