//! Static file serving module
//!
//! Maps a request path under the prefix onto the storage root and answers
//! with the file, an index file, a directory listing, or an error status.

use std::io;
use std::path::Path;

use hyper::Response;
use percent_encoding::percent_decode_str;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::handler::listing;
use crate::handler::router::RequestContext;
use crate::http::{self, cache::Validators, mime, ResponseBody};
use crate::logger;

/// Serve whatever `ctx.path` names under `root`
pub async fn serve_path(
    ctx: &RequestContext<'_>,
    root: &Path,
    prefix: &str,
    index_files: &[String],
) -> Response<ResponseBody> {
    let Some(relative) = ctx.path.strip_prefix(prefix) else {
        return http::build_404_response();
    };

    let mut target = root.to_path_buf();
    target.extend(clean_segments(relative));

    let metadata = match fs::metadata(&target).await {
        Ok(m) => m,
        Err(e) => return stat_error_response(&e, &target),
    };

    // Security: ensure the resolved path is within root after symlinks
    if !is_within_root(root, &target).await {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            ctx.path,
            target.display()
        ));
        return http::build_404_response();
    }

    if metadata.is_dir() {
        if !ctx.path.ends_with('/') {
            return http::build_redirect_response(&format!("{}/", ctx.path));
        }
        return serve_directory(ctx, &target, index_files).await;
    }

    serve_file(ctx, &target, &metadata).await
}

/// Index file if one exists, listing otherwise
async fn serve_directory(
    ctx: &RequestContext<'_>,
    dir: &Path,
    index_files: &[String],
) -> Response<ResponseBody> {
    for index_file in index_files {
        let candidate = dir.join(index_file);
        if let Ok(metadata) = fs::metadata(&candidate).await {
            if metadata.is_file() {
                return serve_file(ctx, &candidate, &metadata).await;
            }
        }
    }

    match listing::read_entries(dir).await {
        Ok(entries) => http::response::build_html_response(listing::render(&entries), ctx.is_head),
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read directory '{}': {e}",
                dir.display()
            ));
            http::build_500_response()
        }
    }
}

async fn serve_file(
    ctx: &RequestContext<'_>,
    path: &Path,
    metadata: &std::fs::Metadata,
) -> Response<ResponseBody> {
    let validators = Validators::new(metadata.len(), metadata.modified().ok());
    if validators.is_not_modified(ctx.if_none_match.as_deref(), ctx.if_modified_since.as_deref()) {
        return http::build_304_response(&validators);
    }

    match open_for_streaming(path).await {
        Ok((file, head)) => {
            let content_type = mime::content_type_for(path, &head);
            http::response::build_file_response(
                file,
                metadata.len(),
                content_type,
                &validators,
                ctx.is_head,
            )
        }
        Err(e) => read_error_response(&e, path),
    }
}

/// Open `path` and read its leading bytes for sniffing, leaving the file
/// positioned at the start
async fn open_for_streaming(path: &Path) -> io::Result<(fs::File, Vec<u8>)> {
    let mut file = fs::File::open(path).await?;
    let mut head = Vec::with_capacity(mime::SNIFF_LEN);
    (&mut file).take(mime::SNIFF_LEN as u64).read_to_end(&mut head).await?;
    file.seek(io::SeekFrom::Start(0)).await?;
    Ok((file, head))
}

/// Percent-decode and clean a request path into storage-relative segments.
///
/// `.` and empty segments are dropped; `..` pops the previous segment and
/// never rises above the root.
pub fn clean_segments(relative: &str) -> Vec<String> {
    let decoded = percent_decode_str(relative).decode_utf8_lossy();
    let mut segments: Vec<String> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s if s.contains('\0') => {}
            s => segments.push(s.to_string()),
        }
    }
    segments
}

async fn is_within_root(root: &Path, target: &Path) -> bool {
    let (Ok(root_canonical), Ok(target_canonical)) =
        (fs::canonicalize(root).await, fs::canonicalize(target).await)
    else {
        return false;
    };
    target_canonical.starts_with(root_canonical)
}

/// Stat failures mean the path names nothing servable; only a permission
/// problem is worth telling apart
fn stat_error_response(err: &io::Error, path: &Path) -> Response<ResponseBody> {
    if err.kind() == io::ErrorKind::PermissionDenied {
        logger::log_warning(&format!("Permission denied: {}", path.display()));
        return http::build_403_response();
    }
    http::build_404_response()
}

fn read_error_response(err: &io::Error, path: &Path) -> Response<ResponseBody> {
    match err.kind() {
        io::ErrorKind::NotFound => http::build_404_response(),
        io::ErrorKind::PermissionDenied => {
            logger::log_warning(&format!("Permission denied: {}", path.display()));
            http::build_403_response()
        }
        _ => {
            logger::log_error(&format!("Failed to read '{}': {err}", path.display()));
            http::build_500_response()
        }
    }
}
