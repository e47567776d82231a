use std::path::PathBuf;

use clap::Parser;
use doctemplate::DEFAULT_COPY_PREFIX;

/// Configuration for the doctemplate HTTP server.
#[derive(Parser, Debug, Clone)]
#[command(name = "doctemplate-server")]
#[command(about = "HTTP server for document placeholder templating")]
pub struct Config {
    /// TCP host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "DOCTEMPLATE_HOST")]
    pub host: String,

    /// TCP port to bind to
    #[arg(long, default_value = "8787", env = "DOCTEMPLATE_PORT")]
    pub port: u16,

    /// Directory holding documents and properties
    /// (defaults to the platform data directory)
    #[arg(long, env = "DOCTEMPLATE_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Name prefix of generated documents
    #[arg(long, default_value = DEFAULT_COPY_PREFIX, env = "DOCTEMPLATE_COPY_PREFIX")]
    pub copy_prefix: String,
}

impl Config {
    /// Get the effective storage directory.
    pub fn effective_storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("doctemplate")
        })
    }
}
