//! Per-file transformation pipeline.
//!
//! One call to [`FileProcessor::process`] runs the whole sequence for a single
//! file: read, mirror to the output directory, extract the statement line date,
//! rewrite the reference field, overwrite the output copy, archive the input and
//! append to the audit log. Steps run strictly in that order.
//!
//! A file whose statement line is missing or carries an invalid date is rejected:
//! the unmodified mirror stays in the output directory and the input file is left
//! where it is. Errors are not retried.

use crate::audit_log::AuditLog;
use crate::config::WatchConfig;
use crate::error::{Error, Result};
use crate::mt940_format::{extract_bytes, reference_value, reformat_date, rewrite_bytes, Tag};
use crate::types::{LogEntry, LogSummary, ProcessingOutcome, RejectReason};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// Runs the transformation pipeline, at most once at a time per file name.
#[derive(Debug)]
pub struct FileProcessor {
    config: Arc<WatchConfig>,
    audit: AuditLog,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks a file name as being processed until dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    file_name: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.file_name);
    }
}

impl FileProcessor {
    pub fn new(config: Arc<WatchConfig>) -> Self {
        let audit = AuditLog::new(config.log_file());
        Self {
            config,
            audit,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Whether a processing attempt for `file_name` is currently running.
    pub fn is_in_flight(&self, file_name: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(file_name)
    }

    fn claim(&self, file_name: &str) -> Result<InFlightGuard<'_>> {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !set.insert(file_name.to_string()) {
            return Err(Error::AlreadyInFlight(file_name.to_string()));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            file_name: file_name.to_string(),
        })
    }

    /// Process the file named `file_name` inside the input directory.
    ///
    /// Returns the terminal outcome on success or rejection. I/O failures are
    /// returned as errors after being recorded in the audit log where possible;
    /// logging them operationally is left to the caller.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidFileName`] if `file_name` is not a plain file name
    /// * [`Error::AlreadyInFlight`] if the same name is being processed already
    /// * [`Error::Read`], [`Error::Write`] or [`Error::Archive`] when the matching step fails
    pub async fn process(&self, file_name: &str) -> Result<ProcessingOutcome> {
        self.run(file_name, Duration::ZERO, false).await
    }

    /// Event-driven variant of [`process`](Self::process): waits `delay` before reading.
    ///
    /// The file name is claimed before the delay starts, so repeated events for
    /// the same file during the delay are refused with [`Error::AlreadyInFlight`].
    /// A file that no longer exists after the delay yields [`Error::Vanished`]
    /// and leaves no audit line, since the event may describe a move out of the
    /// input directory.
    pub async fn process_after(&self, file_name: &str, delay: Duration) -> Result<ProcessingOutcome> {
        self.run(file_name, delay, true).await
    }

    async fn run(
        &self,
        file_name: &str,
        delay: Duration,
        skip_vanished: bool,
    ) -> Result<ProcessingOutcome> {
        if Path::new(file_name).file_name().and_then(|n| n.to_str()) != Some(file_name) {
            return Err(Error::InvalidFileName(file_name.into()));
        }
        let _guard = self.claim(file_name)?;

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let input = self.config.input_dir.join(file_name);
        let output = self.config.output_dir.join(file_name);
        let archive = self.config.archive_dir.join(file_name);

        if skip_vanished && !fs::try_exists(&input).await.unwrap_or(true) {
            return Err(Error::Vanished(file_name.to_string()));
        }

        // Raw bytes: statements are not required to be UTF-8.
        let text = match fs::read(&input).await {
            Ok(text) => text,
            Err(source) => {
                self.record(LogEntry::new(file_name, LogSummary::ReadFailed)).await;
                return Err(Error::Read {
                    file: file_name.to_string(),
                    source,
                });
            }
        };

        // Mirror first so that even a rejected file leaves an output artifact.
        self.write_output(file_name, &output, &text).await?;
        debug!(file = %file_name, "Mirrored input to {}", output.display());

        let date = match extract_bytes(&text, &Tag::STATEMENT_LINE) {
            None => return Ok(self.reject(file_name, RejectReason::MissingTag).await),
            Some(value) => match reformat_date(&String::from_utf8_lossy(value)) {
                Ok(date) => date,
                Err(e) => {
                    debug!(file = %file_name, "{}", e);
                    return Ok(self.reject(file_name, RejectReason::InvalidDate).await);
                }
            },
        };

        if extract_bytes(&text, &Tag::REFERENCE).is_none() {
            warn!(file = %file_name, "No :{}: value to rewrite, output left unchanged", Tag::REFERENCE.label);
        }
        let replacement = reference_value(&date);
        let content = rewrite_bytes(&text, &Tag::REFERENCE, replacement.as_bytes()).into_owned();

        self.write_output(file_name, &output, &content).await?;

        if let Err(source) = fs::rename(&input, &archive).await {
            self.record(LogEntry::new(
                file_name,
                LogSummary::ArchiveFailed {
                    target: Tag::REFERENCE.label.to_string(),
                },
            ))
            .await;
            return Err(Error::Archive {
                file: file_name.to_string(),
                source,
            });
        }
        info!(file = %file_name, "File processed and moved to archive");

        self.record(LogEntry::new(
            file_name,
            LogSummary::Transformed {
                target: Tag::REFERENCE.label.to_string(),
                source: Tag::STATEMENT_LINE.label.to_string(),
            },
        ))
        .await;

        Ok(ProcessingOutcome::Transformed {
            file_name: file_name.to_string(),
            content,
        })
    }

    async fn reject(&self, file_name: &str, reason: RejectReason) -> ProcessingOutcome {
        warn!(file = %file_name, %reason, "Missing or invalid tag {}", Tag::STATEMENT_LINE.label);
        self.record(LogEntry::new(
            file_name,
            LogSummary::Rejected {
                tag: Tag::STATEMENT_LINE.label.to_string(),
            },
        ))
        .await;

        ProcessingOutcome::Rejected {
            file_name: file_name.to_string(),
            reason,
        }
    }

    async fn write_output(&self, file_name: &str, path: &Path, contents: &[u8]) -> Result<()> {
        if let Err(source) = write_durable(path, contents).await {
            self.record(LogEntry::new(file_name, LogSummary::WriteFailed)).await;
            return Err(Error::Write {
                file: file_name.to_string(),
                source,
            });
        }
        Ok(())
    }

    /// Audit log failures never change the outcome of an attempt.
    async fn record(&self, entry: LogEntry) {
        if let Err(e) = self.audit.append(&entry).await {
            error!(file = %entry.file_name, "{}", e);
        }
    }
}

/// Replace `path` with `contents` and flush it to disk.
async fn write_durable(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}
