//! Error types for the ypbank-watcher library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while watching and transforming statements.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error outside of a specific pipeline step (directory bootstrap, scanning).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input file could not be read. The file stays in the input directory.
    #[error("failed to read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: io::Error,
    },

    /// The output copy could not be written.
    #[error("failed to write output for {file}: {source}")]
    Write {
        file: String,
        #[source]
        source: io::Error,
    },

    /// The input file could not be moved into the archive after a successful transform.
    #[error("failed to archive {file}: {source}")]
    Archive {
        file: String,
        #[source]
        source: io::Error,
    },

    /// The audit log could not be appended to.
    #[error("failed to append to audit log: {0}")]
    AuditLog(#[source] io::Error),

    /// Invalid date format.
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Another processing attempt for the same file name has not finished yet.
    #[error("{0} is already being processed")]
    AlreadyInFlight(String),

    /// The file was gone by the time a watcher event for it was handled.
    #[error("{0} no longer exists")]
    Vanished(String),

    /// The path does not end in a usable file name.
    #[error("Invalid file name: {}", .0.display())]
    InvalidFileName(PathBuf),

    /// Error reported by the filesystem watcher.
    #[error("File watching error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error parsing the TOML configuration file.
    #[error("Configuration parsing error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
