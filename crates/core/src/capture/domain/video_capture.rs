use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no input stream url configured")]
    MissingSource,
    #[error("could not open {url} after {attempts} attempts")]
    OpenFailed { url: String, attempts: u32 },
}

/// Port for a live camera connection.
///
/// `grab` advances the stream by one frame with as little work as the
/// backend allows; `retrieve` converts the last grabbed frame.
pub trait VideoCapture: Send {
    fn open(&mut self, url: &str) -> Result<(), Box<dyn std::error::Error>>;

    fn is_opened(&self) -> bool;

    /// `Ok(false)` when the stream produced nothing (end of stream).
    fn grab(&mut self) -> Result<bool, Box<dyn std::error::Error>>;

    /// The last grabbed frame as RGB, `None` if nothing was grabbed.
    fn retrieve(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    fn release(&mut self);
}
