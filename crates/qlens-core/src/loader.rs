//! Reading trace files from disk
//!
//! Files are read in full before parsing; parsing itself is synchronous.

use crate::error::{TraceError, TraceResult};
use crate::trace_file::{ParseOptions, TraceFile};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Load and parse one trace file. The file name (last path component) names the trace.
pub async fn load_trace_file(path: &Path, options: &ParseOptions) -> TraceResult<TraceFile> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    TraceFile::parse(&name, &content, options)
}

/// Load many files. One failing file never aborts the others.
pub async fn load_trace_files(
    paths: &[PathBuf],
    options: &ParseOptions,
) -> Vec<(PathBuf, TraceResult<TraceFile>)> {
    let mut results = Vec::with_capacity(paths.len());

    for path in paths {
        let result = load_trace_file(path, options).await;
        if let Err(e) = &result {
            warn!("Skipping {}: {}", path.display(), e);
        }
        results.push((path.clone(), result));
    }

    let loaded = results.iter().filter(|(_, r)| r.is_ok()).count();
    info!("Loaded {} of {} trace files", loaded, paths.len());

    results
}
