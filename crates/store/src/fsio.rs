//! JSON file helpers shared by the store and the notifier.

use std::path::Path;

use plotty_core::{PlotError, PlotResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize `value` as pretty JSON and replace `path` with it.
///
/// The payload goes to a sibling `*.tmp` file first and is renamed over
/// the target, so readers see either the old or the new contents.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> PlotResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| PlotError::Unexpected(format!("Failed to serialize {}: {e}", path.display())))?;

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json).map_err(|e| PlotError::from_io(e, Some(&tmp_path)))?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(PlotError::from_io(e, Some(path)));
    }
    Ok(())
}

/// Read and parse a JSON file.
///
/// A missing file and unparseable contents are both reported as
/// [`PlotError::NotFound`]: callers treat either as "no usable record".
pub fn read_json<T: DeserializeOwned>(path: &Path) -> PlotResult<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| PlotError::from_io(e, Some(path)))?;
    serde_json::from_str(&raw).map_err(|e| {
        PlotError::not_found(
            format!("Corrupt record {}: {e}", path.display()),
            Some(path.display().to_string()),
        )
    })
}
