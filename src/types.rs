//! Common types shared by the transformation pipeline.

use crate::error::Error;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction date taken from a `:61:` statement line.
///
/// Parsed from the six-character `YYMMDD` form and rendered as `YYYYMMDD`.
/// Two-digit years are always placed in the 21st century.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionDate(NaiveDate);

impl TransactionDate {
    /// Century prefix applied to every two-digit year.
    pub const CENTURY: i32 = 2000;

    /// The underlying calendar date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl FromStr for TransactionDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidDate(s.to_string()));
        }

        // Slicing is safe: all six bytes are ASCII digits.
        let year = s[0..2].parse::<i32>().map_err(|_| Error::InvalidDate(s.to_string()))?;
        let month = s[2..4].parse::<u32>().map_err(|_| Error::InvalidDate(s.to_string()))?;
        let day = s[4..6].parse::<u32>().map_err(|_| Error::InvalidDate(s.to_string()))?;

        NaiveDate::from_ymd_opt(Self::CENTURY + year, month, day)
            .map(TransactionDate)
            .ok_or_else(|| Error::InvalidDate(s.to_string()))
    }
}

impl fmt::Display for TransactionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}{:02}", self.0.year(), self.0.month(), self.0.day())
    }
}

/// Reason code attached to a rejected statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The statement line tag is absent.
    MissingTag,
    /// The statement line tag is present but does not start with a valid date.
    InvalidDate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingTag => write!(f, "missing tag"),
            RejectReason::InvalidDate => write!(f, "invalid date"),
        }
    }
}

/// Terminal result of processing one statement file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// The reference field was rewritten and the input was archived.
    Transformed {
        /// Name of the processed file.
        file_name: String,
        /// Rewritten statement bytes, as written to the output directory.
        content: Vec<u8>,
    },
    /// The file was left in the input directory for manual review.
    Rejected {
        /// Name of the processed file.
        file_name: String,
        /// Why the file was rejected.
        reason: RejectReason,
    },
}

impl ProcessingOutcome {
    /// Name of the file this outcome belongs to.
    pub fn file_name(&self) -> &str {
        match self {
            ProcessingOutcome::Transformed { file_name, .. }
            | ProcessingOutcome::Rejected { file_name, .. } => file_name,
        }
    }

    pub fn is_transformed(&self) -> bool {
        matches!(self, ProcessingOutcome::Transformed { .. })
    }
}

/// Summary recorded in the audit log for one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSummary {
    /// `target` tag rewritten from the value of `source` tag.
    Transformed { target: String, source: String },
    /// `tag` was absent or held an invalid date.
    Rejected { tag: String },
    /// The input file could not be read.
    ReadFailed,
    /// The output copy could not be written.
    WriteFailed,
    /// Transform written but the input could not be archived; `target` tag was rewritten.
    ArchiveFailed { target: String },
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub file_name: String,
    pub summary: LogSummary,
}

impl LogEntry {
    pub fn new(file_name: impl Into<String>, summary: LogSummary) -> Self {
        Self {
            file_name: file_name.into(),
            summary,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.file_name)?;
        match &self.summary {
            LogSummary::Transformed { target, source } => {
                write!(f, "Tag {} transformed using Tag {}.", target, source)
            }
            LogSummary::Rejected { tag } => write!(f, "Missing or invalid tag {}.", tag),
            LogSummary::ReadFailed => write!(f, "Failed to read file."),
            LogSummary::WriteFailed => write!(f, "Failed to write output."),
            LogSummary::ArchiveFailed { target } => {
                write!(f, "Tag {} transformed but archiving failed.", target)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_date_century() {
        let date = "250101".parse::<TransactionDate>().unwrap();
        assert_eq!(date.date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(date.to_string(), "20250101");
    }

    #[test]
    fn test_transaction_date_leap_day_year_00() {
        let date = "000229".parse::<TransactionDate>().unwrap();
        assert_eq!(date.to_string(), "20000229");
    }

    #[test]
    fn test_transaction_date_rejects_bad_input() {
        assert!("991301".parse::<TransactionDate>().is_err());
        assert!("250132".parse::<TransactionDate>().is_err());
        assert!("250230".parse::<TransactionDate>().is_err());
        assert!("2501".parse::<TransactionDate>().is_err());
        assert!("25-1-1".parse::<TransactionDate>().is_err());
        assert!("+50101".parse::<TransactionDate>().is_err());
    }

    #[test]
    fn test_log_entry_lines() {
        let ok = LogEntry::new(
            "STMT1.txt",
            LogSummary::Transformed { target: "20".into(), source: "61".into() },
        );
        assert_eq!(ok.to_string(), "STMT1.txt: Tag 20 transformed using Tag 61.");

        let rejected = LogEntry::new("STMT2.txt", LogSummary::Rejected { tag: "61".into() });
        assert_eq!(rejected.to_string(), "STMT2.txt: Missing or invalid tag 61.");

        let unwritable = LogEntry::new("STMT3.txt", LogSummary::WriteFailed);
        assert_eq!(unwritable.to_string(), "STMT3.txt: Failed to write output.");
    }

    #[test]
    fn test_outcome_file_name() {
        let outcome = ProcessingOutcome::Rejected {
            file_name: "a.txt".into(),
            reason: RejectReason::InvalidDate,
        };
        assert_eq!(outcome.file_name(), "a.txt");
        assert!(!outcome.is_transformed());
    }
}
