//! Log writer module
//!
//! Owns the access log target. Diagnostics go through `tracing`; only
//! access lines, which have their own formats, are written here.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

/// Global access log target
static ACCESS_WRITER: OnceLock<AccessWriter> = OnceLock::new();

/// Access log output target
enum AccessWriter {
    Stdout,
    File(Mutex<File>),
}

impl AccessWriter {
    fn new(access_log_file: Option<&str>) -> io::Result<Self> {
        Ok(match access_log_file {
            Some(path) => Self::File(Mutex::new(open_log_file(path)?)),
            None => Self::Stdout,
        })
    }

    fn write_line(&self, message: &str) {
        match self {
            Self::Stdout => {
                let mut out = io::stdout().lock();
                let _ = writeln!(out, "{message}");
            }
            Self::File(file) => {
                // A poisoned lock still holds a usable file handle
                let mut f = file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                let _ = writeln!(f, "{message}");
            }
        }
    }
}

/// Open or create a log file for appending
pub fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize the global access log target.
///
/// Returns error if the log file cannot be opened or if called twice.
pub fn init(access_log_file: Option<&str>) -> io::Result<()> {
    let writer = AccessWriter::new(access_log_file)?;
    ACCESS_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Access log writer already initialized",
        )
    })
}

/// Write one access line, falling back to stdout before `init`
pub fn write_access(message: &str) {
    match ACCESS_WRITER.get() {
        Some(writer) => writer.write_line(message),
        None => AccessWriter::Stdout.write_line(message),
    }
}
