//! Release receipts — sidecar JSON that records what a release directory
//! holds and whether the deploy that created it completed.
//!
//! Persists a [`ReleaseReceipt`] at `<deploy_to>/releases/<name>.json`.
//! Writes use the atomic `.tmp` + rename pattern so a crash never leaves a
//! half-written receipt that could mark a release as deployed.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::{io_err, HistoryError};
use crate::types::ReleaseReceipt;

/// Load the receipt at `path`.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_at(path: &Path) -> Result<Option<ReleaseReceipt>, HistoryError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| HistoryError::Receipt {
            path: path.to_path_buf(),
            source,
        })
}

/// Save `receipt` to `path` atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(path: &Path, receipt: &ReleaseReceipt) -> Result<(), HistoryError> {
    let json = serde_json::to_string_pretty(receipt).map_err(|source| HistoryError::Receipt {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Remove the receipt at `path`; a missing file is not an error.
pub fn remove_at(path: &Path) -> Result<(), HistoryError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}
