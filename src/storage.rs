// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for saved photos

use crate::constants::app_info;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Photo folder under the user's pictures directory
pub fn photo_library_dir() -> Option<PathBuf> {
    dirs::picture_dir().map(|dir| dir.join(app_info::PHOTO_FOLDER))
}

/// Default file name for a photo taken at `unix_secs`
pub fn photo_file_name(unix_secs: i64, extension: &str) -> String {
    format!("{}-{}.{}", app_info::PHOTO_PREFIX, unix_secs, extension)
}

/// Path for a new photo in `dir` that does not clash with an existing file
///
/// Two shots in the same second get `-1`, `-2`... suffixes.
pub fn unique_photo_path(dir: &Path, extension: &str) -> PathBuf {
    let secs = chrono::Utc::now().timestamp();
    let candidate = dir.join(photo_file_name(secs, extension));
    if !candidate.exists() {
        return candidate;
    }

    (1..)
        .map(|n| {
            dir.join(format!(
                "{}-{}-{}.{}",
                app_info::PHOTO_PREFIX,
                secs,
                n,
                extension
            ))
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Most recently modified JPEG or PNG in `dir`
pub async fn latest_photo(dir: PathBuf) -> Option<PathBuf> {
    let mut entries = tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if let Some(ext) = path.extension() {
                    let ext_str = ext.to_string_lossy();
                    if ext_str.eq_ignore_ascii_case("jpg")
                        || ext_str.eq_ignore_ascii_case("jpeg")
                        || ext_str.eq_ignore_ascii_case("png")
                    {
                        files.push(entry);
                    }
                }
            }
        }
        files
    })
    .await
    .ok()?;

    // Sort by modification time (newest first)
    entries.sort_by_key(|e| {
        e.metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(std::cmp::Reverse)
    });

    let latest = entries.first()?.path();
    debug!(path = ?latest, "Latest photo");
    Some(latest)
}
