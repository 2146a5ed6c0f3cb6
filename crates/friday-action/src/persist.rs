//! JSON file persistence shared by the trigger and to-do stores.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

/// Load a JSON list from `path`.
///
/// A missing file yields an empty list. An unreadable or corrupt file is moved
/// aside to `<name>.corrupt-<unix-ts>` so the next write does not destroy it.
pub(crate) fn load_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, String> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(format!("Failed to read {}: {}", path.display(), e)),
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str(&content) {
        Ok(items) => Ok(items),
        Err(e) => {
            let aside = corrupt_path(path);
            error!(
                error = %e,
                "Corrupt store file {}, moving it to {}",
                path.display(),
                aside.display()
            );
            std::fs::rename(path, &aside)
                .map_err(|e| format!("Failed to move corrupt file aside: {}", e))?;
            Ok(Vec::new())
        }
    }
}

/// Write `items` as pretty JSON via a temporary file and rename.
pub(crate) fn write_list<T: Serialize>(path: &Path, items: &[T]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
    }
    let json = serde_json::to_string_pretty(items)
        .map_err(|e| format!("Failed to serialize store: {}", e))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| format!("Failed to write {}: {}", tmp.display(), e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        warn!(error = %e, "Rename of {} failed", tmp.display());
        let _ = std::fs::remove_file(&tmp);
        return Err(format!("Failed to replace {}: {}", path.display(), e));
    }
    Ok(())
}

fn corrupt_path(path: &Path) -> PathBuf {
    let ts = chrono::Utc::now().timestamp();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    path.with_file_name(format!("{}.corrupt-{}", name, ts))
}
