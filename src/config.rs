//! Directory layout and watcher settings.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where statements arrive, where results go, and how the watcher behaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Source of new statement files.
    pub input_dir: PathBuf,

    /// Receives the mirrored or transformed copy of every file.
    pub output_dir: PathBuf,

    /// Receives successfully transformed input files.
    pub archive_dir: PathBuf,

    /// Holds the audit log.
    pub log_dir: PathBuf,

    /// Audit log file name inside `log_dir`.
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,

    /// Delay between a file appearing and reading it.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Process files already present in `input_dir` at startup.
    #[serde(default)]
    pub process_existing: bool,
}

fn default_log_file_name() -> String {
    "transform_log.txt".to_string()
}

fn default_settle_delay_ms() -> u64 {
    100
}

impl WatchConfig {
    /// Default layout below `root`.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            input_dir: root.join("inputFolder"),
            output_dir: root.join("outputFolder"),
            archive_dir: root.join("archiveFolder"),
            log_dir: root.join("logFolder"),
            log_file_name: default_log_file_name(),
            settle_delay_ms: default_settle_delay_ms(),
            process_existing: false,
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// Relative directories are resolved against the file's parent directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config: WatchConfig = toml::from_str(&contents)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for dir in config.dirs_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject layouts the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.log_file_name.trim().is_empty() {
            return Err(Error::Config("log_file_name must not be empty".into()));
        }
        if self.log_file_name.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "log_file_name must be a plain file name: {}",
                self.log_file_name
            )));
        }
        if self.input_dir == self.output_dir || self.input_dir == self.archive_dir {
            return Err(Error::Config(
                "input_dir must differ from output_dir and archive_dir".into(),
            ));
        }
        Ok(())
    }

    /// Create every configured directory that does not exist yet.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.input_dir, &self.output_dir, &self.archive_dir, &self.log_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(&self.log_file_name)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    fn dirs_mut(&mut self) -> [&mut PathBuf; 4] {
        [
            &mut self.input_dir,
            &mut self.output_dir,
            &mut self.archive_dir,
            &mut self.log_dir,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_root_layout() {
        let config = WatchConfig::from_root("/data");
        assert_eq!(config.input_dir, PathBuf::from("/data/inputFolder"));
        assert_eq!(config.archive_dir, PathBuf::from("/data/archiveFolder"));
        assert_eq!(config.log_file(), PathBuf::from("/data/logFolder/transform_log.txt"));
        assert!(!config.process_existing);
    }

    #[test]
    fn test_load_resolves_relative_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watcher.toml");
        fs::write(
            &path,
            r#"
input_dir = "in"
output_dir = "out"
archive_dir = "/srv/archive"
log_dir = "log"
settle_delay_ms = 0
"#,
        )
        .unwrap();

        let config = WatchConfig::load(&path).unwrap();
        assert_eq!(config.input_dir, dir.path().join("in"));
        assert_eq!(config.archive_dir, PathBuf::from("/srv/archive"));
        assert_eq!(config.log_file_name, "transform_log.txt");
        assert_eq!(config.settle_delay(), Duration::ZERO);
    }

    #[test]
    fn test_load_rejects_missing_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watcher.toml");
        fs::write(&path, "input_dir = \"in\"\n").unwrap();

        assert!(matches!(WatchConfig::load(&path), Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_validate_rejects_shared_input_dir() {
        let mut config = WatchConfig::from_root("/data");
        config.output_dir = config.input_dir.clone();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = WatchConfig::from_root("/data");
        config.log_file_name = "nested/log.txt".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_ensure_dirs_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = WatchConfig::from_root(dir.path().join("root"));
        config.ensure_dirs().unwrap();
        // Second call is a no-op.
        config.ensure_dirs().unwrap();

        assert!(config.input_dir.is_dir());
        assert!(config.output_dir.is_dir());
        assert!(config.archive_dir.is_dir());
        assert!(config.log_dir.is_dir());
    }
}
