use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::trigger::domain::trigger_channel::{TriggerChannel, TriggerEvent};
use crate::trigger::domain::trigger_descriptor::TriggerDescriptor;

/// Trigger channel over a JSON descriptor file.
///
/// Keyed on the file's modification time: an unchanged mtime costs a single
/// `stat` and reports nothing.
pub struct FileTriggerChannel {
    path: PathBuf,
    last_mtime: Option<SystemTime>,
    present: bool,
}

impl FileTriggerChannel {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            last_mtime: None,
            present: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn vanished(&mut self) -> Option<TriggerEvent> {
        self.last_mtime = None;
        if std::mem::take(&mut self.present) {
            Some(TriggerEvent::Cleared)
        } else {
            None
        }
    }
}

impl TriggerChannel for FileTriggerChannel {
    fn poll(&mut self) -> Option<TriggerEvent> {
        let mtime = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return self.vanished(),
        };
        if self.last_mtime == Some(mtime) {
            return None;
        }
        self.last_mtime = Some(mtime);
        self.present = true;

        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Cannot read trigger {}: {e}", self.path.display());
                return Some(TriggerEvent::Cleared);
            }
        };
        match TriggerDescriptor::parse(&raw) {
            Ok(descriptor) => Some(TriggerEvent::Activated(descriptor)),
            Err(e) => {
                log::warn!("Ignoring trigger {}: {e}", self.path.display());
                Some(TriggerEvent::Cleared)
            }
        }
    }

    fn clear(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed trigger {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Cannot remove trigger {}: {e}", self.path.display()),
        }
        self.last_mtime = None;
        self.present = false;
    }
}

/// Publish `descriptor` at `path`, replacing any previous one atomically.
pub fn write_descriptor(path: &Path, descriptor: &TriggerDescriptor) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec(&descriptor.to_json()).map_err(io::Error::other)?;
    let temp_path = path.with_extension("part");
    fs::write(&temp_path, body)?;
    fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn bump_mtime(path: &Path, secs: u64) {
        let file = fs::OpenOptions::new().append(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_missing_file_reports_nothing() {
        let dir = TempDir::new().unwrap();
        let mut channel = FileTriggerChannel::new(&dir.path().join("trigger.json"));
        assert_eq!(channel.poll(), None);
    }

    #[test]
    fn test_new_descriptor_activates_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trigger.json");
        let descriptor = TriggerDescriptor::new(1_000.0, 2.0, 4.0, true);
        write_descriptor(&path, &descriptor).unwrap();

        let mut channel = FileTriggerChannel::new(&path);
        assert_eq!(channel.poll(), Some(TriggerEvent::Activated(descriptor)));
        assert_eq!(channel.poll(), None);
    }

    #[test]
    fn test_rewrite_activates_again() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trigger.json");
        write_descriptor(&path, &TriggerDescriptor::new(1.0, 2.0, 4.0, false)).unwrap();
        let mut channel = FileTriggerChannel::new(&path);
        channel.poll();

        let second = TriggerDescriptor::new(2.0, 3.0, 4.0, false);
        write_descriptor(&path, &second).unwrap();
        bump_mtime(&path, 5);
        assert_eq!(channel.poll(), Some(TriggerEvent::Activated(second)));
    }

    #[test]
    fn test_malformed_descriptor_clears() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trigger.json");
        fs::write(&path, "{\"duration\": 3}").unwrap();
        let mut channel = FileTriggerChannel::new(&path);
        assert_eq!(channel.poll(), Some(TriggerEvent::Cleared));
        assert_eq!(channel.poll(), None);
    }

    #[test]
    fn test_removed_file_clears_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trigger.json");
        write_descriptor(&path, &TriggerDescriptor::new(1.0, 2.0, 4.0, false)).unwrap();
        let mut channel = FileTriggerChannel::new(&path);
        channel.poll();

        fs::remove_file(&path).unwrap();
        assert_eq!(channel.poll(), Some(TriggerEvent::Cleared));
        assert_eq!(channel.poll(), None);
    }

    #[test]
    fn test_clear_deletes_file_for_other_readers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trigger.json");
        write_descriptor(&path, &TriggerDescriptor::new(1.0, 2.0, 4.0, false)).unwrap();
        let mut processor_side = FileTriggerChannel::new(&path);
        let mut capture_side = FileTriggerChannel::new(&path);
        processor_side.poll();
        capture_side.poll();

        processor_side.clear();
        assert!(!path.exists());
        assert_eq!(processor_side.poll(), None);
        assert_eq!(capture_side.poll(), Some(TriggerEvent::Cleared));
    }

    #[test]
    fn test_clear_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut channel = FileTriggerChannel::new(&dir.path().join("none.json"));
        channel.clear();
    }

    #[test]
    fn test_write_descriptor_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("trigger.json");
        write_descriptor(&path, &TriggerDescriptor::new(1.0, 2.0, 4.0, false)).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("part").exists());
    }
}
