use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("event log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode event log entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One persisted notification. Valid only while its image exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub timestamp: String,
    pub name: String,
    pub image_path: String,
}

impl EventLogEntry {
    /// Entry stamped with local time for `epoch_seconds`.
    pub fn at(epoch_seconds: f64, name: &str, image_url: &str) -> Self {
        Self {
            timestamp: format_local(epoch_seconds, LOG_TIMESTAMP_FORMAT),
            name: name.to_string(),
            image_path: image_url.to_string(),
        }
    }

    /// Last path segment of the image URL.
    pub fn image_file_name(&self) -> Option<&str> {
        self.image_path
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
    }
}

/// Format an epoch time in the local zone. Out-of-range times format as epoch 0.
pub fn format_local(epoch_seconds: f64, fmt: &str) -> String {
    let secs = epoch_seconds.floor();
    let nanos = ((epoch_seconds - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
        .unwrap_or_default()
        .with_timezone(&Local)
        .format(fmt)
        .to_string()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetainReport {
    pub kept: usize,
    pub removed: usize,
}

/// Newline-delimited JSON event log.
#[derive(Clone, Debug)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &EventLogEntry) -> Result<(), EventLogError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        file.write_all(line.as_bytes()).map_err(|e| self.io_err(e))
    }

    /// All well-formed entries in file order. Malformed lines are skipped.
    pub fn entries(&self) -> Result<Vec<EventLogEntry>, EventLogError> {
        Ok(self
            .read_lines()?
            .into_iter()
            .filter_map(|line| parse_line(&line))
            .collect())
    }

    /// Rewrite the log keeping only entries for which `keep` returns true.
    ///
    /// Malformed lines are dropped. The new content is written to
    /// `<log>.tmp` and renamed over the log, so readers never see a
    /// partial file. A missing log is left missing.
    pub fn retain<F>(&self, mut keep: F) -> Result<RetainReport, EventLogError>
    where
        F: FnMut(&EventLogEntry) -> bool,
    {
        if !self.path.exists() {
            return Ok(RetainReport::default());
        }
        let mut report = RetainReport::default();
        let mut out = String::new();
        for line in self.read_lines()? {
            match parse_line(&line) {
                Some(entry) if keep(&entry) => {
                    out.push_str(&serde_json::to_string(&entry)?);
                    out.push('\n');
                    report.kept += 1;
                }
                _ => report.removed += 1,
            }
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, out).map_err(|e| EventLogError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        Ok(report)
    }

    fn read_lines(&self) -> Result<Vec<String>, EventLogError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_err(&self, source: io::Error) -> EventLogError {
        EventLogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_line(line: &str) -> Option<EventLogEntry> {
    match serde_json::from_str(line) {
        Ok(entry) => Some(entry),
        Err(e) => {
            log::debug!("Skipping malformed event log line: {e}");
            None
        }
    }
}
