use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use thiserror::Error;

use super::domain::event_log::{EventLog, EventLogError, RetainReport};
use super::infrastructure::event_image_store::EventImageStore;
use crate::shared::constants::IMAGE_EXTENSIONS;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("cannot sweep {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Log(#[from] EventLogError),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    pub pruned: Option<RetainReport>,
}

/// Keeps the event image directory and the event log consistent.
pub struct RetentionSweeper {
    images: EventImageStore,
    log: EventLog,
}

impl RetentionSweeper {
    pub fn new(images: EventImageStore, log: EventLog) -> Self {
        Self { images, log }
    }

    /// Delete event images last modified before `now - max_age_days`.
    ///
    /// Returns the deleted file names. A non-positive age disables the
    /// sweep and a missing directory has nothing to delete.
    pub fn sweep(&self, max_age_days: i64, now: SystemTime) -> Result<Vec<String>, RetentionError> {
        if max_age_days <= 0 {
            return Ok(Vec::new());
        }
        let dir = self.images.dir();
        let cutoff = now
            .checked_sub(Duration::from_secs(max_age_days as u64 * SECONDS_PER_DAY))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let entries = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(RetentionError::Io {
                    path: dir.to_path_buf(),
                    source: e,
                })
            }
        };

        let mut deleted = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if !is_image {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if modified >= cutoff {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => deleted.push(entry.file_name().to_string_lossy().into_owned()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to delete {}: {e}", path.display()),
            }
        }
        deleted.sort();
        if !deleted.is_empty() {
            log::info!("Deleted {} event images older than {max_age_days} days", deleted.len());
        }
        Ok(deleted)
    }

    /// Drop log entries whose image no longer exists. Idempotent.
    pub fn prune_log(&self) -> Result<RetainReport, RetentionError> {
        let report = self.log.retain(|entry| {
            entry
                .image_file_name()
                .is_some_and(|name| self.images.contains(name))
        })?;
        if report.removed > 0 {
            log::info!("Pruned {} event log entries", report.removed);
        }
        Ok(report)
    }

    /// Sweep, then prune the log if anything was deleted.
    pub fn sweep_and_prune(&self, max_age_days: i64, now: SystemTime) -> Result<SweepReport, RetentionError> {
        let deleted = self.sweep(max_age_days, now)?;
        let pruned = if deleted.is_empty() {
            None
        } else {
            Some(self.prune_log()?)
        };
        Ok(SweepReport { deleted, pruned })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::domain::event_log::EventLogEntry;
    use std::fs::File;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(SECONDS_PER_DAY);

    struct Fixture {
        _dir: TempDir,
        images: PathBuf,
        log: EventLog,
        sweeper: RetentionSweeper,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("faces");
        fs::create_dir_all(&images).unwrap();
        let log = EventLog::new(dir.path().join("events.json"));
        let sweeper = RetentionSweeper::new(EventImageStore::new(&images), log.clone());
        Fixture { _dir: dir, images, log, sweeper }
    }

    fn touch(path: &std::path::Path, age: Duration) {
        fs::write(path, b"jpeg").unwrap();
        let f = File::options().write(true).open(path).unwrap();
        f.set_modified(SystemTime::now() - age).unwrap();
    }

    fn log_image(log: &EventLog, name: &str, file: &str) {
        log.append(&EventLogEntry {
            timestamp: "2024-01-01 00:00:00".into(),
            name: name.into(),
            image_path: format!("http://cam/event-image/{file}"),
        })
        .unwrap();
    }

    // ── Sweep ──

    #[test]
    fn test_sweep_disabled_for_non_positive_days() {
        let fx = fixture();
        touch(&fx.images.join("old.jpg"), DAY * 100);
        assert!(fx.sweeper.sweep(0, SystemTime::now()).unwrap().is_empty());
        assert!(fx.sweeper.sweep(-3, SystemTime::now()).unwrap().is_empty());
        assert!(fx.images.join("old.jpg").exists());
    }

    #[test]
    fn test_sweep_deletes_only_old_images() {
        let fx = fixture();
        touch(&fx.images.join("old.jpg"), DAY * 10);
        touch(&fx.images.join("old.PNG"), DAY * 10);
        touch(&fx.images.join("fresh.jpg"), DAY);
        touch(&fx.images.join("notes.txt"), DAY * 10);

        let deleted = fx.sweeper.sweep(7, SystemTime::now()).unwrap();
        assert_eq!(deleted, vec!["old.PNG".to_string(), "old.jpg".to_string()]);
        assert!(fx.images.join("fresh.jpg").exists());
        assert!(fx.images.join("notes.txt").exists());
    }

    #[test]
    fn test_sweep_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let sweeper = RetentionSweeper::new(
            EventImageStore::new(dir.path().join("none")),
            EventLog::new(dir.path().join("events.json")),
        );
        assert!(sweeper.sweep(1, SystemTime::now()).unwrap().is_empty());
    }

    // ── Prune ──

    #[test]
    fn test_prune_after_out_of_band_delete_is_idempotent() {
        let fx = fixture();
        for file in ["A.jpg", "X.jpg", "B.jpg"] {
            touch(&fx.images.join(file), Duration::ZERO);
        }
        log_image(&fx.log, "a", "A.jpg");
        log_image(&fx.log, "x", "X.jpg");
        log_image(&fx.log, "b", "B.jpg");
        log_image(&fx.log, "x", "X.jpg");
        fs::remove_file(fx.images.join("X.jpg")).unwrap();

        let first = fx.sweeper.prune_log().unwrap();
        assert_eq!(first, RetainReport { kept: 2, removed: 2 });
        let after_first = fs::read_to_string(fx.log.path()).unwrap();
        let files: Vec<String> = fx
            .log
            .entries()
            .unwrap()
            .iter()
            .filter_map(|e| e.image_file_name().map(String::from))
            .collect();
        assert_eq!(files, vec!["A.jpg", "B.jpg"]);

        let second = fx.sweeper.prune_log().unwrap();
        assert_eq!(second, RetainReport { kept: 2, removed: 0 });
        assert_eq!(fs::read_to_string(fx.log.path()).unwrap(), after_first);
    }

    #[test]
    fn test_sweep_and_prune_keeps_log_consistent() {
        let fx = fixture();
        touch(&fx.images.join("old.jpg"), DAY * 30);
        touch(&fx.images.join("new.jpg"), Duration::ZERO);
        log_image(&fx.log, "old", "old.jpg");
        log_image(&fx.log, "new", "new.jpg");

        let report = fx.sweeper.sweep_and_prune(7, SystemTime::now()).unwrap();
        assert_eq!(report.deleted, vec!["old.jpg".to_string()]);
        assert_eq!(report.pruned, Some(RetainReport { kept: 1, removed: 1 }));
        let names: Vec<String> = fx.log.entries().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["new"]);
    }

    #[test]
    fn test_nothing_deleted_leaves_log_untouched() {
        let fx = fixture();
        log_image(&fx.log, "ghost", "gone.jpg");
        let report = fx.sweeper.sweep_and_prune(7, SystemTime::now()).unwrap();
        assert_eq!(report, SweepReport::default());
        assert_eq!(fx.log.entries().unwrap().len(), 1);
    }
}
