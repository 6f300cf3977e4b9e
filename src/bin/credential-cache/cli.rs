//! Command-line interface definition.

use clap::{Parser, Subcommand};
use credential_cache::CacheConfig;
use std::path::PathBuf;

/// Inspect and maintain a credential-cache log.
#[derive(Parser, Debug)]
#[command(name = "credential-cache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root directory for cache data.
    #[arg(long, env = "CREDENTIAL_CACHE_ROOT_DIR")]
    pub root_dir: Option<PathBuf>,

    /// Credential log file, relative to the root directory unless absolute.
    #[arg(long, env = "CREDENTIAL_CACHE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Fail instead of starting empty when the log is corrupt.
    #[arg(long)]
    pub strict_load: bool,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Maintenance commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the fingerprint of a document.
    Fingerprint {
        /// Document to fingerprint.
        file: PathBuf,
    },

    /// Show the record for a subject and document.
    Lookup {
        /// Subject identifier.
        #[arg(long, short)]
        subject: String,
        /// Document file.
        file: PathBuf,
    },

    /// Check a record by its id.
    Audit {
        /// Record id (hex).
        record_id: String,
    },

    /// Remove the record for a subject and document.
    Evict {
        /// Subject identifier.
        #[arg(long, short)]
        subject: String,
        /// Document file.
        file: PathBuf,
    },

    /// Print every record as JSON.
    List,

    /// Print store statistics.
    Stats,
}

impl Cli {
    /// Build the cache configuration from file and flags.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<CacheConfig> {
        let mut config = if let Some(ref path) = self.config {
            CacheConfig::from_file(path)?
        } else {
            CacheConfig::default()
        };

        if let Some(ref root_dir) = self.root_dir {
            config.root_dir.clone_from(root_dir);
        }
        if let Some(ref log_file) = self.log_file {
            config.log_file.clone_from(log_file);
        }
        config.strict_load |= self.strict_load;
        config.log_level.clone_from(&self.log_level);

        Ok(config)
    }
}
