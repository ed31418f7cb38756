// Configuration module entry point
// Manages application configuration and runtime state

mod state;
mod types;

use std::net::SocketAddr;

use crate::cli::Cli;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HttpConfig, LoggingConfig, PerformanceConfig, ResponseFormat, ServerConfig,
    StorageConfig, UploadConfig,
};

/// Prefix for environment overrides, e.g. `FILESERVE_SERVER__PORT=9000`
const ENV_PREFIX: &str = "FILESERVE";

impl Config {
    /// Load configuration: defaults, then the config file named by `--config`
    /// (missing file is fine), then environment, then command line flags.
    pub fn load(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(&cli.config).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8100)?
            .set_default("storage.root", "files")?
            .set_default("storage.prefix", "/files/")?
            .set_default("upload.field_name", "file")?
            .set_default("upload.max_size", 104_857_600)? // 100MB
            .set_default("upload.max_memory", 1_048_576)? // 1MB
            .set_default("upload.retry_after_seconds", 0)?
            .set_default("upload.response_format", "json")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.connection_timeout", 0)?
            .set_default("http.server_name", "fileserve")?
            .set_default("http.enable_cors", false)?;

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(ref host) = cli.host {
            builder = builder.set_override("server.host", host.as_str())?;
        }
        if let Some(ref dir) = cli.dir {
            builder = builder.set_override("storage.root", dir.as_str())?;
        }
        if let Some(ref prefix) = cli.prefix {
            builder = builder.set_override("storage.prefix", prefix.as_str())?;
        }

        let mut cfg: Self = builder.build()?.try_deserialize()?;
        cfg.storage.prefix = normalize_prefix(&cfg.storage.prefix);
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

/// Give the prefix exactly one leading and one trailing slash.
/// `files` becomes `/files/`, an empty prefix becomes `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_without_file() -> Cli {
        Cli {
            config: "fileserve-test-config-that-does-not-exist".to_string(),
            ..Cli::default()
        }
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("files"), "/files/");
        assert_eq!(normalize_prefix("/files"), "/files/");
        assert_eq!(normalize_prefix("/files/"), "/files/");
        assert_eq!(normalize_prefix("a/b"), "/a/b/");
        assert_eq!(normalize_prefix(""), "/");
        assert_eq!(normalize_prefix("/"), "/");
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::load(&cli_without_file()).expect("defaults load");
        assert_eq!(cfg.server.port, 8100);
        assert_eq!(cfg.storage.root, "files");
        assert_eq!(cfg.storage.prefix, "/files/");
        assert_eq!(cfg.upload.field_name, "file");
        assert_eq!(cfg.upload.max_size, 100 << 20);
        assert_eq!(cfg.upload.max_memory, 1 << 20);
        assert_eq!(cfg.upload.response_format, ResponseFormat::Json);
        assert_eq!(cfg.storage.index_files, vec!["index.html", "index.htm"]);
        assert_eq!(cfg.performance.connection_timeout, 0);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli {
            port: Some(9100),
            dir: Some(".".to_string()),
            prefix: Some("static".to_string()),
            host: Some("127.0.0.1".to_string()),
            ..cli_without_file()
        };
        let cfg = Config::load(&cli).expect("overrides load");
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.storage.root, ".");
        assert_eq!(cfg.storage.prefix, "/static/");
        assert_eq!(
            cfg.get_socket_addr().expect("valid address").to_string(),
            "127.0.0.1:9100"
        );
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fileserve.toml");
        std::fs::write(
            &path,
            "[upload]\nmax_size = 10\nresponse_format = \"text\"\n[storage]\nroot = \"/srv\"\nprefix = \"/\"\n",
        )
        .expect("write config");

        let cli = Cli {
            config: path.to_string_lossy().into_owned(),
            ..Cli::default()
        };
        let cfg = Config::load(&cli).expect("file load");
        assert_eq!(cfg.upload.max_size, 10);
        assert_eq!(cfg.upload.response_format, ResponseFormat::Text);
        assert_eq!(cfg.storage.root, "/srv");
        assert_eq!(cfg.storage.prefix, "/");
        // Untouched keys keep their defaults
        assert_eq!(cfg.server.port, 8100);
    }
}
