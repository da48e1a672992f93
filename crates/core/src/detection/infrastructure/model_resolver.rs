use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create model directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Locate a model file, downloading it on first use.
///
/// Looks in `models_dir` (operator-provided models), then the user cache,
/// and only then fetches `url` into the cache.
pub fn resolve(name: &str, url: &str, models_dir: Option<&Path>) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = models_dir.map(|d| d.join(name)).filter(|p| p.exists()) {
        return Ok(path);
    }

    let cache_dir = model_cache_dir()?;
    let cached = cache_dir.join(name);
    if cached.exists() {
        return Ok(cached);
    }

    fs::create_dir_all(&cache_dir).map_err(|e| ModelResolveError::CreateDir {
        path: cache_dir.clone(),
        source: e,
    })?;
    log::info!("Downloading {name} from {url}");
    download(url, &cached)?;
    Ok(cached)
}

/// `<platform cache dir>/facestream/models`.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    dirs::cache_dir()
        .map(|d| d.join("facestream").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Fetch into `<dest>.part`, then rename so a partial file is never picked up.
fn download(url: &str, dest: &Path) -> Result<(), ModelResolveError> {
    let download_err = |e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    };
    let response = reqwest::blocking::get(url).map_err(download_err)?;
    if !response.status().is_success() {
        return Err(ModelResolveError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    let bytes = response.bytes().map_err(download_err)?;

    let temp_path = dest.with_extension("part");
    let write_err = |path: &Path, e| ModelResolveError::Write {
        path: path.to_path_buf(),
        source: e,
    };
    fs::write(&temp_path, &bytes).map_err(|e| write_err(&temp_path, e))?;
    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        write_err(dest, e)
    })?;
    log::info!("Saved {} ({} bytes)", dest.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_models_dir_wins() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("detector.onnx");
        fs::write(&local, b"model").unwrap();
        let found = resolve("detector.onnx", "http://invalid.invalid/x", Some(tmp.path())).unwrap();
        assert_eq!(found, local);
    }

    #[test]
    fn test_model_cache_dir_is_namespaced() {
        let dir = model_cache_dir().unwrap();
        assert!(dir.ends_with("facestream/models"));
    }

    #[test]
    fn test_failed_download_leaves_nothing_behind() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        assert!(download("http://invalid.nonexistent.example.com/model", &dest).is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
