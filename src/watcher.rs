//! Input directory watcher.
//!
//! Filesystem events from `notify` are forwarded into a tokio channel. Every new
//! file in the input directory becomes one task running the
//! [`FileProcessor`] pipeline. A failing file never stops the watcher.

use crate::error::{Error, Result};
use crate::processor::FileProcessor;
use crate::types::ProcessingOutcome;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

type TaskResult = (String, Result<ProcessingOutcome>);

/// Watches the input directory and dispatches new files to the processor.
///
/// The watch is registered by [`start`](Self::start), so files created after it
/// returns are never missed even if [`run_until`](Self::run_until) is polled later.
pub struct DirectoryWatcher {
    processor: Arc<FileProcessor>,
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl DirectoryWatcher {
    /// Register a non-recursive watch on the processor's input directory.
    pub fn start(processor: Arc<FileProcessor>) -> Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the watcher is shutting down.
            let _ = tx.send(res);
        })?;
        watcher.watch(&processor.config().input_dir, RecursiveMode::NonRecursive)?;

        info!(
            "Watching for changes in {} folder...",
            processor.config().input_dir.display()
        );

        Ok(Self {
            processor,
            watcher,
            events,
        })
    }

    pub fn processor(&self) -> &Arc<FileProcessor> {
        &self.processor
    }

    /// Dispatch events until `shutdown` completes, then wait for in-flight files.
    ///
    /// # Errors
    ///
    /// Returns an error only if the startup scan of existing files fails.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let DirectoryWatcher {
            processor,
            watcher,
            mut events,
        } = self;
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();

        if processor.config().process_existing {
            for file_name in existing_files(&processor.config().input_dir)? {
                schedule(&processor, &mut tasks, file_name);
            }
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting new files");
                    break;
                }
                event = events.recv() => match event {
                    Some(Ok(event)) => {
                        for file_name in arrivals(&event) {
                            info!(file = %file_name, "File added");
                            schedule(&processor, &mut tasks, file_name);
                        }
                    }
                    Some(Err(e)) => error!("Error watching input folder: {}", e),
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => report(joined),
            }
        }

        drop(watcher);
        if !tasks.is_empty() {
            info!("Waiting for {} file(s) still in progress", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            report(joined);
        }

        info!("Watcher stopped");
        Ok(())
    }
}

fn schedule(processor: &Arc<FileProcessor>, tasks: &mut JoinSet<TaskResult>, file_name: String) {
    let processor = Arc::clone(processor);
    tasks.spawn(async move {
        let delay = processor.config().settle_delay();
        let result = processor.process_after(&file_name, delay).await;
        (file_name, result)
    });
}

fn report(joined: std::result::Result<TaskResult, JoinError>) {
    match joined {
        Ok((_, Ok(outcome))) => debug!(file = %outcome.file_name(), ?outcome, "Finished"),
        Ok((file_name, Err(Error::AlreadyInFlight(_)))) => {
            debug!(file = %file_name, "Duplicate event ignored, file already in progress")
        }
        Ok((file_name, Err(Error::Vanished(_)))) => {
            debug!(file = %file_name, "File gone before it was read, ignored")
        }
        Ok((file_name, Err(e))) => error!(file = %file_name, "{}", e),
        Err(e) => error!("Processing task failed: {}", e),
    }
}

/// Names of files that newly appeared in the watched directory.
///
/// A file counts as new when it is created or renamed into the directory.
/// Backends that cannot tell rename sides apart (FSEvents) report
/// `RenameMode::Any`, which is accepted as well. Paths that are already gone
/// are skipped by [`FileProcessor::process_after`], not here.
fn arrivals(event: &Event) -> Vec<String> {
    let is_arrival = match event.kind {
        EventKind::Create(CreateKind::Folder) => false,
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => true,
        _ => false,
    };
    if !is_arrival {
        return Vec::new();
    }

    event.paths.iter().filter_map(|path| file_name_of(path)).collect()
}

fn file_name_of(path: &Path) -> Option<String> {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => Some(name.to_string()),
        None => {
            warn!("{}", Error::InvalidFileName(path.to_path_buf()));
            None
        }
    }
}

/// Regular files already sitting in `dir`, sorted by name.
fn existing_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.extend(file_name_of(&entry.path()));
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchConfig;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::oneshot;

    const STMT: &str = ":20:MT940/\n:61:250101C1000,\n";

    fn config_in(root: &Path) -> WatchConfig {
        let mut config = WatchConfig::from_root(root);
        config.settle_delay_ms = 20;
        config.ensure_dirs().unwrap();
        config
    }

    /// Write outside the input directory, then move in so the file appears complete.
    fn deliver(root: &Path, config: &WatchConfig, name: &str, contents: &str) {
        let staging = root.join("staging");
        fs::create_dir_all(&staging).unwrap();
        let staged = staging.join(name);
        fs::write(&staged, contents).unwrap();
        fs::rename(&staged, config.input_dir.join(name)).unwrap();
    }

    async fn wait_for_log_lines(path: &Path, count: usize) -> String {
        for _ in 0..200 {
            let log = fs::read_to_string(path).unwrap_or_default();
            if log.lines().count() >= count {
                return log;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("timed out waiting for {} log line(s) in {}", count, path.display());
    }

    #[test]
    fn test_arrivals_filters_event_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, STMT).unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());
        assert_eq!(arrivals(&created), vec!["a.txt".to_string()]);

        let moved_in = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(file.clone());
        assert_eq!(arrivals(&moved_in), vec!["a.txt".to_string()]);

        let moved_out = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(file.clone());
        assert!(arrivals(&moved_out).is_empty());

        let folder = Event::new(EventKind::Create(CreateKind::Folder)).add_path(sub);
        assert!(arrivals(&folder).is_empty());

        let renamed_any = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)))
            .add_path(dir.path().join("moved.txt"));
        assert_eq!(arrivals(&renamed_any), vec!["moved.txt".to_string()]);

        let renamed_both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(dir.path().join("old.txt"))
            .add_path(file.clone());
        assert!(arrivals(&renamed_both).is_empty());
    }

    #[test]
    fn test_existing_files_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(existing_files(dir.path()).unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_watcher_processes_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let processor = Arc::new(FileProcessor::new(Arc::new(config.clone())));

        let watcher = DirectoryWatcher::start(Arc::clone(&processor)).unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(watcher.run_until(async {
            let _ = stopped.await;
        }));

        deliver(dir.path(), &config, "A.txt", STMT);
        deliver(dir.path(), &config, "B.txt", ":20:REF\n:61:240229D1,\n");

        let log = wait_for_log_lines(&config.log_file(), 2).await;
        stop.send(()).unwrap();
        handle.await.unwrap().unwrap();

        let mut lines: Vec<&str> = log.lines().collect();
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "A.txt: Tag 20 transformed using Tag 61.",
                "B.txt: Tag 20 transformed using Tag 61.",
            ]
        );
        assert!(config.archive_dir.join("A.txt").exists());
        assert!(config.archive_dir.join("B.txt").exists());
        let output = fs::read_to_string(config.output_dir.join("B.txt")).unwrap();
        assert_eq!(output, ":20:20:20240229\n:61:240229D1,\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_watcher_survives_rejected_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let processor = Arc::new(FileProcessor::new(Arc::new(config.clone())));

        let watcher = DirectoryWatcher::start(processor).unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(watcher.run_until(async {
            let _ = stopped.await;
        }));

        deliver(dir.path(), &config, "bad.txt", ":20:MT940/\n:86:none\n");
        wait_for_log_lines(&config.log_file(), 1).await;
        deliver(dir.path(), &config, "good.txt", STMT);
        let log = wait_for_log_lines(&config.log_file(), 2).await;

        stop.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(
            log,
            "bad.txt: Missing or invalid tag 61.\ngood.txt: Tag 20 transformed using Tag 61.\n"
        );
        assert!(config.input_dir.join("bad.txt").exists());
    }

    #[tokio::test]
    async fn test_process_existing_on_startup() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.process_existing = true;
        fs::write(config.input_dir.join("early.txt"), STMT).unwrap();

        let processor = Arc::new(FileProcessor::new(Arc::new(config.clone())));
        let watcher = DirectoryWatcher::start(processor).unwrap();

        // Shutdown right away: the startup batch must still finish.
        watcher.run_until(async {}).await.unwrap();

        assert!(config.archive_dir.join("early.txt").exists());
        let log = fs::read_to_string(config.log_file()).unwrap();
        assert_eq!(log, "early.txt: Tag 20 transformed using Tag 61.\n");
    }

    #[tokio::test]
    async fn test_existing_files_ignored_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(config.input_dir.join("early.txt"), STMT).unwrap();

        let processor = Arc::new(FileProcessor::new(Arc::new(config.clone())));
        let watcher = DirectoryWatcher::start(processor).unwrap();
        watcher.run_until(async {}).await.unwrap();

        assert!(config.input_dir.join("early.txt").exists());
        assert!(!config.log_file().exists());
    }
}
