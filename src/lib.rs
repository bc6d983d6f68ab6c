//! YP Bank Statement Watcher Library
//!
//! Watches a directory for incoming MT940 statements and rewrites the `:20:`
//! transaction reference with the date found in the first `:61:` statement line.
//!
//! # Pipeline
//!
//! For every file that appears in the input directory:
//!
//! 1. The unmodified text is mirrored to the output directory.
//! 2. The leading `YYMMDD` of the `:61:` value is reformatted as `YYYYMMDD`.
//! 3. The `:20:` value is replaced and the output copy overwritten.
//! 4. The input file is moved to the archive directory.
//! 5. One line is appended to the audit log.
//!
//! Files without a usable `:61:` date are rejected: they stay in the input
//! directory and the audit log records `<file>: Missing or invalid tag 61.`.
//!
//! # Examples
//!
//! ## Rewriting a statement in memory
//!
//! ```
//! use ypbank_watcher::mt940_format::{extract, reference_value, reformat_date, rewrite, Tag};
//!
//! let text = ":20:MT940/\n:61:250101C1000,\n";
//! let value = extract(text, &Tag::STATEMENT_LINE).unwrap();
//! let date = reformat_date(value)?;
//! let rewritten = rewrite(text, &Tag::REFERENCE, &reference_value(&date));
//! assert!(rewritten.contains(":20:20250101"));
//! # Ok::<(), ypbank_watcher::Error>(())
//! ```
//!
//! ## Watching a directory
//!
//! ```no_run
//! use std::sync::Arc;
//! use ypbank_watcher::{DirectoryWatcher, FileProcessor, WatchConfig};
//!
//! # async fn run() -> ypbank_watcher::Result<()> {
//! let config = WatchConfig::from_root("/var/spool/statements");
//! config.ensure_dirs()?;
//!
//! let processor = Arc::new(FileProcessor::new(Arc::new(config)));
//! let watcher = DirectoryWatcher::start(processor)?;
//! watcher
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod audit_log;
pub mod config;
pub mod error;
pub mod logging;
pub mod mt940_format;
pub mod processor;
pub mod types;
pub mod watcher;

// Re-export commonly used types
pub use audit_log::AuditLog;
pub use config::WatchConfig;
pub use error::{Error, Result};
pub use processor::FileProcessor;
pub use types::{LogEntry, LogSummary, ProcessingOutcome, RejectReason, TransactionDate};
pub use watcher::DirectoryWatcher;
