// Application state module
// Holds the configuration and the per-request settings derived from it

use std::path::PathBuf;

use super::types::Config;
use crate::logger::AccessLogFormat;
use crate::upload::UploadOptions;

/// Application state, shared by every connection
pub struct AppState {
    pub config: Config,
    /// Storage root every request resolves against
    pub root: PathBuf,
    pub upload: UploadOptions,
    pub access_log_format: AccessLogFormat,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let root = PathBuf::from(&config.storage.root);
        let upload = UploadOptions {
            root: root.clone(),
            prefix: config.storage.prefix.clone(),
            field_name: config.upload.field_name.clone(),
            max_size: config.upload.max_size,
            max_memory: config.upload.max_memory,
            retry_after: (config.upload.retry_after_seconds > 0)
                .then_some(config.upload.retry_after_seconds),
        };

        Self {
            config: config.clone(),
            root,
            upload,
            access_log_format: AccessLogFormat::parse(&config.logging.access_log_format),
        }
    }

    #[inline]
    pub fn prefix(&self) -> &str {
        &self.config.storage.prefix
    }

    #[inline]
    pub const fn access_log(&self) -> bool {
        self.config.logging.access_log
    }
}
