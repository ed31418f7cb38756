//! Multipart upload handling
//!
//! Reads the file part of a `multipart/form-data` request, checks it, and
//! stores it under the storage root. The flow is linear: parse, pick the
//! part, probe its size, validate the name, create directories, write.

mod error;
mod path;
mod spool;

pub use error::{human_bytes, UploadError};
pub use path::resolve_destination;

use std::io;
use std::path::{Path, PathBuf};

use http_body_util::BodyDataStream;
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::Request;
use multer::Multipart;
use tokio::fs::File;
use tokio::io::AsyncRead;

use path::create_dirs_within_root;
use spool::{probe_size, SpooledFile};

/// Everything an upload needs to know about the server, fixed at startup
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Storage root
    pub root: PathBuf,
    /// Normalized URL prefix (`/files/`)
    pub prefix: String,
    /// Multipart part holding the file
    pub field_name: String,
    /// Largest accepted file in bytes
    pub max_size: u64,
    /// Bytes kept in memory before spilling to a temporary file
    pub max_memory: usize,
    /// Retry delay attached to oversized uploads
    pub retry_after: Option<u64>,
}

/// A stored upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedUpload {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
}

/// Store the file part of `req` under the storage root.
///
/// The destination is written through a temporary file in the same
/// directory and renamed into place, so readers never see a partial file
/// and a failed upload leaves nothing behind. An existing file at the
/// destination is replaced.
pub async fn save_upload<B>(
    options: &UploadOptions,
    req: Request<B>,
) -> Result<SavedUpload, UploadError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let request_path = req.uri().path().to_string();
    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or(multer::Error::NoMultipart)
        .and_then(multer::parse_boundary)?;

    let mut multipart = Multipart::new(BodyDataStream::new(req.into_body()), boundary);
    let (client_name, mut content) =
        read_file_part(&mut multipart, &options.field_name, options.max_memory).await?;

    let size = probe_size(&mut content).await?;
    if size > options.max_size {
        return Err(UploadError::PayloadTooLarge {
            size,
            limit: options.max_size,
            retry_after: options.retry_after,
        });
    }

    let destination =
        resolve_destination(&options.root, &options.prefix, &request_path, &client_name)
            .await?;
    let parent = destination
        .parent()
        .map_or_else(|| options.root.clone(), Path::to_path_buf);
    create_dirs_within_root(&options.root, &parent).await?;

    write_atomically(&mut content, &destination).await?;

    let filename = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tracing::debug!(
        path = %destination.display(),
        size,
        spilled = content.is_spilled(),
        "upload stored"
    );

    Ok(SavedUpload {
        path: destination,
        filename,
        size,
    })
}

/// Find the first part named `field_name` that carries a file name and
/// spool its content. Parts without a file name are plain form values.
async fn read_file_part(
    multipart: &mut Multipart<'_>,
    field_name: &str,
    max_memory: usize,
) -> Result<(String, SpooledFile), UploadError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        let Some(client_name) = field.file_name().map(ToString::to_string) else {
            continue;
        };

        let mut content = SpooledFile::new(max_memory);
        while let Some(chunk) = field.chunk().await? {
            content.write_chunk(&chunk).await?;
        }
        content.finish().await?;
        return Ok((client_name, content));
    }

    Err(UploadError::MissingFilePart {
        field: field_name.to_string(),
    })
}

/// Copy `content` to a temporary sibling of `destination`, then rename it
/// over `destination`.
async fn write_atomically<R>(content: &mut R, destination: &Path) -> io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let dir = destination
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let temp = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(dir)
    })
    .await
    .map_err(io::Error::other)??;

    let (std_file, temp_path) = temp.into_parts();
    let mut file = File::from_std(std_file);
    tokio::io::copy(content, &mut file).await?;
    file.sync_all().await?;
    drop(file);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o644)).await?;
    }

    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || temp_path.persist(destination))
        .await
        .map_err(io::Error::other)??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{multipart_request, Part, BOUNDARY};

    fn options(root: &Path) -> UploadOptions {
        UploadOptions {
            root: root.to_path_buf(),
            prefix: "/files/".to_string(),
            field_name: "file".to_string(),
            max_size: 100 << 20,
            max_memory: 1 << 20,
            retry_after: None,
        }
    }

    #[tokio::test]
    async fn test_saves_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = dir.path().join("store");
        let req = multipart_request("/files/docs/a.txt", &[Part::file("file", "a.txt", b"hello")]);

        let saved = save_upload(&options(&store), req).await.expect("upload");

        assert_eq!(saved.path, store.join("docs").join("a.txt"));
        assert_eq!(saved.filename, "a.txt");
        assert_eq!(saved.size, 5);
        assert_eq!(std::fs::read(&saved.path).expect("read back"), b"hello");
    }

    #[tokio::test]
    async fn test_saves_into_directory_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let req = multipart_request(
            "/files/reports/2024/",
            &[
                Part::value("note", "quarterly"),
                Part::file("file", "q1.csv", b"a,b\n1,2\n"),
            ],
        );

        let saved = save_upload(&options(dir.path()), req).await.expect("upload");

        assert_eq!(saved.path, dir.path().join("reports/2024/q1.csv"));
        assert_eq!(std::fs::read(&saved.path).expect("read back"), b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_spilled_content_is_byte_exact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let payload: Vec<u8> = (0..50_000_u32).map(|i| (i % 251) as u8).collect();
        let mut opts = options(dir.path());
        opts.max_memory = 1024;

        let req = multipart_request("/files/", &[Part::file("file", "blob.bin", &payload)]);
        let saved = save_upload(&opts, req).await.expect("upload");

        assert_eq!(saved.size, payload.len() as u64);
        assert_eq!(std::fs::read(&saved.path).expect("read back"), payload);
    }

    #[tokio::test]
    async fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let opts = options(dir.path());

        let first = multipart_request("/files/", &[Part::file("file", "same.txt", b"first version")]);
        save_upload(&opts, first).await.expect("first upload");
        let second = multipart_request("/files/", &[Part::file("file", "same.txt", b"second")]);
        let saved = save_upload(&opts, second).await.expect("second upload");

        assert_eq!(std::fs::read(&saved.path).expect("read back"), b"second");
        // Only the destination remains, no temporary leftovers
        let entries = std::fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_rejects_oversized_payload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut opts = options(dir.path());
        opts.max_size = 4;
        opts.retry_after = Some(30);

        let req = multipart_request("/files/", &[Part::file("file", "big.txt", b"hello")]);
        let err = save_upload(&opts, req).await.expect_err("too large");

        assert!(matches!(
            err,
            UploadError::PayloadTooLarge {
                size: 5,
                limit: 4,
                retry_after: Some(30)
            }
        ));
        assert!(!dir.path().join("big.txt").exists());
    }

    #[tokio::test]
    async fn test_rejects_empty_filename() {
        let dir = tempfile::tempdir().expect("tempdir");
        let req = multipart_request("/files/", &[Part::file("file", "", b"data")]);

        let err = save_upload(&options(dir.path()), req).await.expect_err("no name");
        assert!(matches!(err, UploadError::InvalidFilename));
    }

    #[tokio::test]
    async fn test_missing_file_part() {
        let dir = tempfile::tempdir().expect("tempdir");
        let req = multipart_request(
            "/files/",
            &[
                Part::file("attachment", "a.txt", b"wrong field"),
                Part::value("file", "not a file"),
            ],
        );

        let err = save_upload(&options(dir.path()), req).await.expect_err("no part");
        assert!(matches!(err, UploadError::MissingFilePart { ref field } if field == "file"));
    }

    #[tokio::test]
    async fn test_rejects_non_multipart_body() {
        let dir = tempfile::tempdir().expect("tempdir");
        let req = Request::builder()
            .method("POST")
            .uri("/files/")
            .header(CONTENT_TYPE, "text/plain")
            .body(http_body_util::Full::new(Bytes::from_static(b"hello")))
            .expect("request");

        let err = save_upload(&options(dir.path()), req).await.expect_err("malformed");
        assert!(matches!(err, UploadError::MalformedRequest(_)));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = dir.path().join("store");
        let req = multipart_request("/files/../escape/", &[Part::file("file", "a.txt", b"x")]);

        let err = save_upload(&options(&store), req).await.expect_err("traversal");
        assert!(matches!(err, UploadError::PathTraversal { .. }));
        assert!(!dir.path().join("escape").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rejects_symlink_escape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("tempdir");
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).expect("symlink");

        let req = multipart_request("/files/link/", &[Part::file("file", "a.txt", b"x")]);
        let err = save_upload(&options(dir.path()), req).await.expect_err("escape");

        assert!(matches!(err, UploadError::PathTraversal { .. }));
        assert!(!outside.path().join("a.txt").exists());

        // Nothing is created past the symlink either
        let req = multipart_request("/files/link/a/b/c/", &[Part::file("file", "x.txt", b"x")]);
        let err = save_upload(&options(dir.path()), req).await.expect_err("escape");

        assert!(matches!(err, UploadError::PathTraversal { .. }));
        assert!(!outside.path().join("a").exists());
    }

    #[tokio::test]
    async fn test_directory_creation_failure_is_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("docs"), b"a file, not a directory").expect("write");

        let req = multipart_request("/files/docs/sub/", &[Part::file("file", "a.txt", b"x")]);
        let err = save_upload(&options(dir.path()), req).await.expect_err("mkdir fails");

        assert!(matches!(err, UploadError::Io(_)));
        assert_eq!(err.status_code(), hyper::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_existing_directory_gets_file_inside() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("docs/a.txt")).expect("mkdir");

        let req = multipart_request("/files/docs/a.txt", &[Part::file("file", "a.txt", b"hello")]);
        let saved = save_upload(&options(dir.path()), req).await.expect("upload");

        assert_eq!(saved.path, dir.path().join("docs/a.txt/a.txt"));
        assert_eq!(std::fs::read(&saved.path).expect("read back"), b"hello");
    }

    /// Yields the start of a file part, then fails like a dropped connection
    struct BrokenBody {
        sent: bool,
    }

    impl Body for BrokenBody {
        type Data = Bytes;
        type Error = io::Error;

        fn poll_frame(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Result<hyper::body::Frame<Bytes>, io::Error>>> {
            if self.sent {
                let reset = io::Error::new(io::ErrorKind::ConnectionReset, "connection reset");
                return std::task::Poll::Ready(Some(Err(reset)));
            }
            self.sent = true;
            let head = format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\r\npartial"
            );
            std::task::Poll::Ready(Some(Ok(hyper::body::Frame::data(Bytes::from(head)))))
        }
    }

    #[tokio::test]
    async fn test_interrupted_body_is_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let req = Request::builder()
            .method("POST")
            .uri("/files/")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(BrokenBody { sent: false })
            .expect("request");

        let err = save_upload(&options(dir.path()), req).await.expect_err("interrupted");

        assert!(matches!(err, UploadError::Io(_)));
        assert_eq!(err.status_code(), hyper::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 0);
    }
}
