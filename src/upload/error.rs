//! Upload errors
//!
//! Every variant is request-scoped: it aborts the current upload and is
//! turned into exactly one HTTP response.

use hyper::StatusCode;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum UploadError {
    /// Body is not multipart form data, or the multipart framing is broken
    #[error("malformed multipart request: {0}")]
    MalformedRequest(multer::Error),

    /// No file part under the expected field name
    #[error("request has no file part named `{field}`")]
    MissingFilePart { field: String },

    /// Client supplied an empty (or unusable) file name
    #[error("missing file name")]
    InvalidFilename,

    /// Destination would land outside the storage root
    #[error("path escapes the storage root: {path}")]
    PathTraversal { path: String },

    /// File exceeds the configured maximum
    #[error("received {}, limit {}", human_bytes(*.size), human_bytes(*.limit))]
    PayloadTooLarge {
        size: u64,
        limit: u64,
        retry_after: Option<u64>,
    },

    /// Filesystem or stream failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A body that fails mid-read is a transport problem, not a malformed request
impl From<multer::Error> for UploadError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::StreamReadFailed(source) => Self::Io(std::io::Error::other(source)),
            other => Self::MalformedRequest(other),
        }
    }
}

impl UploadError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) | Self::MissingFilePart { .. } | Self::InvalidFilename => {
                StatusCode::BAD_REQUEST
            }
            Self::PathTraversal { .. } => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable reason reported in status bodies
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) | Self::MissingFilePart { .. } | Self::InvalidFilename => {
                "BadRequest"
            }
            Self::PathTraversal { .. } => "Forbidden",
            Self::PayloadTooLarge { .. } => "RequestEntityTooLarge",
            Self::Io(_) => "InternalError",
        }
    }

    /// Suggested retry delay in seconds, if any
    pub const fn retry_after(&self) -> Option<u64> {
        match self {
            Self::PayloadTooLarge { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Render a byte count in SI units: `104857600` is `105 MB`.
#[allow(clippy::cast_precision_loss)]
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

    if bytes < 10 {
        return format!("{bytes} B");
    }

    let mut exp = 0;
    let mut scale = 1.0_f64;
    while exp + 1 < UNITS.len() && bytes as f64 >= scale * 1000.0 {
        scale *= 1000.0;
        exp += 1;
    }

    let value = (bytes as f64 / scale * 10.0 + 0.5).floor() / 10.0;
    if value < 10.0 {
        format!("{value:.1} {}", UNITS[exp])
    } else {
        format!("{value:.0} {}", UNITS[exp])
    }
}
