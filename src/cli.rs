//! Command line flags
//!
//! Flags override the configuration file and environment.

use clap::Parser;

/// Serve a directory over HTTP and accept multipart uploads into it.
#[derive(Parser, Debug, Default)]
#[command(name = "fileserve", version, about)]
pub struct Cli {
    /// Port to serve on
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// The directory of static files to host and store uploads in
    #[arg(short = 'd', long)]
    pub dir: Option<String>,

    /// URL path prefix files are served and uploaded under
    #[arg(long)]
    pub prefix: Option<String>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Configuration file (extension optional, may be absent)
    #[arg(short = 'c', long, env = "FILESERVE_CONFIG", default_value = "fileserve")]
    pub config: String,
}
