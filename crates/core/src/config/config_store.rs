use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use serde_json::{Map, Value};
use thiserror::Error;

use super::settings::{default_document, Settings};

pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config file {0} must contain a JSON object")]
    NotAnObject(PathBuf),
}

/// Read side of the configuration store as seen by pipeline stages.
pub trait ConfigSource: Send + Sync {
    /// Current settings. Cheap enough to call once per frame.
    fn snapshot(&self) -> Arc<Settings>;
}

/// Fixed settings, for tests and one-shot commands.
pub struct StaticConfig(Arc<Settings>);

impl StaticConfig {
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(settings))
    }
}

impl ConfigSource for StaticConfig {
    fn snapshot(&self) -> Arc<Settings> {
        Arc::clone(&self.0)
    }
}

struct StoreState {
    document: Map<String, Value>,
    snapshot: Arc<Settings>,
    mtime: Option<SystemTime>,
    last_check: Instant,
}

/// JSON-file-backed configuration with throttled live reload.
///
/// The file's modification time is checked at most once per
/// `reload_interval`. Writes go straight to disk and replace the cached
/// snapshot immediately.
pub struct FileConfigStore {
    path: PathBuf,
    data_dir: PathBuf,
    reload_interval: Duration,
    state: Mutex<StoreState>,
}

impl FileConfigStore {
    /// Open `path`, creating it with defaults when missing.
    pub fn open(path: &Path, data_dir: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("Config file {} not found, writing defaults", path.display());
            write_document(path, &default_document(data_dir))?;
        }
        let document = read_document(path)?;
        let snapshot = Arc::new(Settings::from_map(&document, data_dir));
        Ok(Self {
            path: path.to_path_buf(),
            data_dir: data_dir.to_path_buf(),
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            state: Mutex::new(StoreState {
                document,
                snapshot,
                mtime: modified(path),
                last_check: Instant::now(),
            }),
        })
    }

    pub fn with_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw value for `key`, or `default` when absent.
    pub fn get(&self, key: &str, default: Value) -> Value {
        let mut state = self.lock();
        self.reload_if_changed(&mut state);
        state.document.get(key).cloned().unwrap_or(default)
    }

    /// Persist `value` under `key` and refresh the snapshot.
    pub fn set(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let mut state = self.lock();
        state.document.insert(key.to_string(), value);
        write_document(&self.path, &state.document)?;
        state.snapshot = Arc::new(Settings::from_map(&state.document, &self.data_dir));
        state.mtime = modified(&self.path);
        state.last_check = Instant::now();
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reload_if_changed(&self, state: &mut StoreState) {
        if state.last_check.elapsed() < self.reload_interval {
            return;
        }
        state.last_check = Instant::now();

        let mtime = modified(&self.path);
        if mtime.is_none() || mtime == state.mtime {
            return;
        }
        state.mtime = mtime;

        match read_document(&self.path) {
            Ok(document) => {
                state.snapshot = Arc::new(Settings::from_map(&document, &self.data_dir));
                state.document = document;
                log::info!("Reloaded config from {}", self.path.display());
            }
            Err(e) => log::warn!("Keeping previous config: {e}"),
        }
    }
}

impl ConfigSource for FileConfigStore {
    fn snapshot(&self) -> Arc<Settings> {
        let mut state = self.lock();
        self.reload_if_changed(&mut state);
        Arc::clone(&state.snapshot)
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn read_document(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    match serde_json::from_str(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ConfigError::NotAnObject(path.to_path_buf())),
        Err(e) => Err(ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_document(path: &Path, document: &Map<String, Value>) -> Result<(), ConfigError> {
    let io_err = |e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let body = serde_json::to_string_pretty(document).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    let temp_path = path.with_extension("part");
    fs::write(&temp_path, body).map_err(io_err)?;
    fs::rename(&temp_path, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileConfigStore {
        FileConfigStore::open(&dir.path().join("config.json"), dir.path()).unwrap()
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        assert!(s.path().exists());
        assert_eq!(s.snapshot().output_width, 640);
        assert_eq!(s.get("notification_delay", json!(0)), json!(60));
    }

    #[test]
    fn test_malformed_file_fails_at_startup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        let err = FileConfigStore::open(&path, dir.path()).err().unwrap();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_non_object_document_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "[1, 2]").unwrap();
        let err = FileConfigStore::open(&path, dir.path()).err().unwrap();
        assert!(matches!(err, ConfigError::NotAnObject(_)));
    }

    #[test]
    fn test_set_persists_and_refreshes_immediately() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.set("face_scale_factor", json!(0.5)).unwrap();
        assert_relative_eq!(s.snapshot().face_scale_factor, 0.5);

        let reopened = store(&dir);
        assert_relative_eq!(reopened.snapshot().face_scale_factor, 0.5);
        assert!(!dir.path().join("config.part").exists());
    }

    #[test]
    fn test_external_edit_picked_up_after_interval() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).with_reload_interval(Duration::ZERO);
        let mut doc = read_document(s.path()).unwrap();
        doc.insert("output_width".into(), json!(320));
        fs::write(s.path(), serde_json::to_string(&doc).unwrap()).unwrap();
        filetime_bump(s.path());

        assert_eq!(s.snapshot().output_width, 320);
    }

    #[test]
    fn test_reload_throttled_within_interval() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).with_reload_interval(Duration::from_secs(3600));
        fs::write(s.path(), r#"{"output_width": 320}"#).unwrap();
        filetime_bump(s.path());

        assert_eq!(s.snapshot().output_width, 640);
    }

    #[test]
    fn test_malformed_reload_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).with_reload_interval(Duration::ZERO);
        fs::write(s.path(), "garbage").unwrap();
        filetime_bump(s.path());

        assert_eq!(s.snapshot().output_width, 640);
    }

    /// Push the mtime forward so coarse filesystem timestamps still differ.
    fn filetime_bump(path: &Path) {
        let file = fs::OpenOptions::new().append(true).open(path).unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        file.set_modified(later).unwrap();
    }
}
