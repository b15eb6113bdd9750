//! Writes recorded tracks to disk, one CSV file per device per session.
//!
//! File naming follows `mousetrack-<device>.csv`, where `<device>` is the
//! numeric platform handle. Content comes verbatim from
//! `mousetrace_core::Track::to_csv`, so exporting the same store twice
//! produces byte-identical files.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use mousetrace_core::TrackStore;

/// Error type for track export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A file system I/O error occurred.
    #[error("I/O error writing track to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes every track in `store` under `dir`, creating the directory if
/// needed. Returns the written paths in device order.
///
/// # Errors
///
/// Returns [`ExportError::Io`] on the first file-system failure; already
/// written files are left in place.
pub fn write_tracks(store: &TrackStore, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(store.device_count());
    for (device, track) in store.iter() {
        let path = dir.join(format!("mousetrack-{device}.csv"));
        std::fs::write(&path, track.to_csv()).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        info!(device = %device, samples = track.len(), path = %path.display(), "track exported");
        written.push(path);
    }
    Ok(written)
}
