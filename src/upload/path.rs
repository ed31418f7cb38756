//! Upload destination resolution
//!
//! Destination is `root / <request path minus prefix> / <filename>`, built
//! from cleaned segments so it cannot climb out of the root.

use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use super::error::UploadError;

/// Reduce a client-supplied file name to its final path segment.
///
/// Browsers on some platforms send full paths (`C:\dir\report.pdf`), so
/// both separators are honored.
pub fn sanitize_filename(filename: &str) -> Result<&str, UploadError> {
    match filename.rsplit(['/', '\\']).find(|s| !s.is_empty()) {
        Some("." | "..") | None => Err(UploadError::InvalidFilename),
        Some(name) if name.contains('\0') => Err(UploadError::InvalidFilename),
        Some(name) => Ok(name),
    }
}

/// Storage-relative segments of a request path, with the prefix stripped.
///
/// The path is percent-decoded first; `.` and empty segments are dropped,
/// and any `..` is rejected rather than resolved.
pub fn sub_path_segments(request_path: &str, prefix: &str) -> Result<Vec<String>, UploadError> {
    let decoded = percent_decode_str(request_path).decode_utf8_lossy();
    let relative = decoded.strip_prefix(prefix).unwrap_or(&decoded);

    let mut segments = Vec::new();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            s if s == ".." || s.contains('\\') || s.contains('\0') => {
                return Err(UploadError::PathTraversal {
                    path: request_path.to_string(),
                });
            }
            s => segments.push(s.to_string()),
        }
    }
    Ok(segments)
}

/// Join root, request sub-path and file name.
///
/// When the request path already ends in the file name
/// (`POST /files/docs/a.txt` carrying `a.txt`) the name is not appended a
/// second time, unless that path is an existing directory.
pub async fn resolve_destination(
    root: &Path,
    prefix: &str,
    request_path: &str,
    filename: &str,
) -> Result<PathBuf, UploadError> {
    let name = sanitize_filename(filename)?;
    let segments = sub_path_segments(request_path, prefix)?;

    let mut destination = root.to_path_buf();
    destination.extend(&segments);

    let names_file = segments.last().is_some_and(|last| last == name)
        && !tokio::fs::metadata(&destination)
            .await
            .is_ok_and(|m| m.is_dir());
    if !names_file {
        destination.push(name);
    }
    Ok(destination)
}

/// Create `dir` and any missing parents under `root`, one segment at a time.
///
/// Every segment is resolved before the next is created, so a symlink that
/// leads out of the root is refused before anything is created past it.
pub async fn create_dirs_within_root(root: &Path, dir: &Path) -> Result<(), UploadError> {
    let traversal = |path: &Path| UploadError::PathTraversal {
        path: path.display().to_string(),
    };

    tokio::fs::create_dir_all(root).await?;
    let root_canonical = tokio::fs::canonicalize(root).await?;
    let relative = dir.strip_prefix(root).map_err(|_| traversal(dir))?;

    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match tokio::fs::create_dir(&current).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }
        if !tokio::fs::canonicalize(&current)
            .await?
            .starts_with(&root_canonical)
        {
            return Err(traversal(&current));
        }
    }
    Ok(())
}
