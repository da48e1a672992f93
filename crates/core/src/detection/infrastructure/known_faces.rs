use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_encoder::FaceEncoder;
use crate::detection::domain::face_matcher::Gallery;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Build the gallery from a directory of reference photos.
///
/// Two layouts are accepted side by side:
/// - `dir/<person>/*.jpg`: one sub-directory per person;
/// - `dir/<person>[.vN].jpg`: flat files, a trailing `.vN` is dropped.
///
/// Entries are visited in name order. Each photo contributes the
/// descriptor of its largest detected face; unreadable photos and photos
/// without a face are skipped with a warning.
pub fn load_gallery(
    dir: &Path,
    detector: &mut dyn FaceDetector,
    encoder: &mut dyn FaceEncoder,
) -> Gallery {
    let mut gallery = Gallery::new();
    if !dir.is_dir() {
        log::warn!("Known faces directory {} does not exist", dir.display());
        return gallery;
    }

    for entry in sorted_entries(dir) {
        let file_name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if entry.is_dir() {
            let person = normalize_person_name(&file_name);
            if person.is_empty() {
                continue;
            }
            for photo in sorted_entries(&entry).into_iter().filter(|p| is_image(p)) {
                add_photo(&mut gallery, &photo, &person, detector, encoder);
            }
        } else if is_image(&entry) {
            let person = person_name_from_file(&file_name);
            if !person.is_empty() {
                add_photo(&mut gallery, &entry, &person, detector, encoder);
            }
        }
    }

    log::info!(
        "Loaded {} reference faces from {}",
        gallery.len(),
        dir.display()
    );
    gallery
}

fn add_photo(
    gallery: &mut Gallery,
    path: &Path,
    person: &str,
    detector: &mut dyn FaceDetector,
    encoder: &mut dyn FaceEncoder,
) {
    let result = (|| -> Result<bool, Box<dyn std::error::Error>> {
        let img = image::open(path)?.to_rgb8();
        let frame = Frame::from_rgb_image(img, 0, SystemTime::now());
        let boxes = detector.detect(&frame)?;
        let Some(largest) = boxes.into_iter().max_by_key(|b| b.area()) else {
            return Ok(false);
        };
        let descriptor = encoder.encode(&frame, &[largest])?.into_iter().next();
        match descriptor {
            Some(d) => {
                gallery.add(person, d);
                Ok(true)
            }
            None => Ok(false),
        }
    })();

    match result {
        Ok(true) => log::debug!("Added {} from {}", person, path.display()),
        Ok(false) => log::warn!("No face found in {}", path.display()),
        Err(e) => log::warn!("Failed to load face {}: {e}", path.display()),
    }
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(e) => {
            log::warn!("Cannot list {}: {e}", dir.display());
            Vec::new()
        }
    };
    entries.sort();
    entries
}

fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Trim whitespace and surrounding quotes.
pub fn normalize_person_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// `"alice.v2.jpg"` → `"alice"`.
pub fn person_name_from_file(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = normalize_person_name(&stem);
    strip_version_suffix(&name).to_string()
}

fn strip_version_suffix(name: &str) -> &str {
    if let Some(pos) = name.rfind('.') {
        let suffix = &name[pos + 1..];
        let mut chars = suffix.chars();
        let is_version = matches!(chars.next(), Some('v' | 'V'))
            && suffix.len() > 1
            && chars.all(|c| c.is_ascii_digit());
        if is_version {
            return &name[..pos];
        }
    }
    name
}
