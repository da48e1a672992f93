use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ImageStoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("frame buffer does not describe an RGB image")]
    InvalidFrame,
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Directory of JPEG snapshots, one per fired notification.
#[derive(Clone, Debug)]
pub struct EventImageStore {
    dir: PathBuf,
}

impl EventImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<identity>_<whole epoch seconds>.jpg` with the identity made filesystem-safe.
    pub fn file_name(identity: &str, epoch_seconds: f64) -> String {
        candidate(identity, epoch_seconds, 0)
    }

    /// Encode `frame` as JPEG and return the stored file name.
    ///
    /// A second image for the same identity within the same second gets a
    /// `_1`, `_2`, ... suffix instead of replacing the first. The image is
    /// written beside its final name and renamed into place.
    pub fn save(&self, identity: &str, frame: &Frame, epoch_seconds: f64) -> Result<String, ImageStoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| self.io_err(&self.dir, e))?;
        let name = (0u32..)
            .map(|n| candidate(identity, epoch_seconds, n))
            .find(|name| !self.dir.join(name).exists())
            .unwrap_or_else(|| Self::file_name(identity, epoch_seconds));
        let path = self.dir.join(&name);
        let part = path.with_extension("part");

        let img = frame.to_rgb_image().ok_or(ImageStoreError::InvalidFrame)?;
        img.save_with_format(&part, image::ImageFormat::Jpeg)?;
        fs::rename(&part, &path).map_err(|e| self.io_err(&path, e))?;
        Ok(name)
    }

    pub fn contains(&self, file_name: &str) -> bool {
        !file_name.contains(['/', '\\']) && self.dir.join(file_name).is_file()
    }

    fn io_err(&self, path: &Path, source: io::Error) -> ImageStoreError {
        ImageStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn candidate(identity: &str, epoch_seconds: f64, n: u32) -> String {
    let secs = epoch_seconds.floor() as i64;
    match n {
        0 => format!("{}_{secs}.jpg", sanitize(identity)),
        n => format!("{}_{secs}_{n}.jpg", sanitize(identity)),
    }
}

fn sanitize(identity: &str) -> String {
    let cleaned: String = identity
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "face".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("alice", 1700000000.9, "alice_1700000000.jpg")]
    #[case("Jane Doe", 5.0, "Jane_Doe_5.jpg")]
    #[case("../etc/passwd", 1.0, "_etc_passwd_1.jpg")]
    #[case("", 2.0, "face_2.jpg")]
    fn test_file_name(#[case] identity: &str, #[case] at: f64, #[case] expected: &str) {
        assert_eq!(EventImageStore::file_name(identity, at), expected);
    }

    #[test]
    fn test_save_writes_decodable_jpeg() {
        let dir = TempDir::new().unwrap();
        let store = EventImageStore::new(dir.path().join("faces"));
        let frame = Frame::new(vec![90u8; 16 * 8 * 3], 16, 8, 3, 0);
        let name = store.save("bob", &frame, 42.0).unwrap();
        assert_eq!(name, "bob_42.jpg");
        assert!(store.contains(&name));
        let img = image::open(store.dir().join(&name)).unwrap();
        assert_eq!((img.width(), img.height()), (16, 8));
        assert!(!store.dir().join("bob_42.part").exists());
    }

    #[test]
    fn test_same_second_saves_keep_both_images() {
        let dir = TempDir::new().unwrap();
        let store = EventImageStore::new(dir.path());
        let frame = Frame::new(vec![90u8; 4 * 4 * 3], 4, 4, 3, 0);

        let first = store.save("alice", &frame, 1000.2).unwrap();
        let second = store.save("alice", &frame, 1000.7).unwrap();
        let third = store.save("alice", &frame, 1000.9).unwrap();

        assert_eq!(first, "alice_1000.jpg");
        assert_eq!(second, "alice_1000_1.jpg");
        assert_eq!(third, "alice_1000_2.jpg");
        for name in [&first, &second, &third] {
            assert!(store.contains(name));
        }
    }

    #[test]
    fn test_contains_rejects_paths() {
        let dir = TempDir::new().unwrap();
        let store = EventImageStore::new(dir.path());
        assert!(!store.contains("../x.jpg"));
        assert!(!store.contains("missing.jpg"));
    }
}
