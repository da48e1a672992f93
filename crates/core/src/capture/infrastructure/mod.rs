pub mod ffmpeg_capture;
