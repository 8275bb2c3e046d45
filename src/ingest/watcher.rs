use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::Context;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::queue::QueueHandle;

/// A csv file as seen by one directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listed {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

struct Candidate {
    size: u64,
    modified: Option<SystemTime>,
    stable_since: Instant,
}

/// Polls a directory tree and queues each csv file once it has stopped
/// changing. Files under the processed directory are never looked at.
/// Cancelling the token stops the scan loop.
pub struct DirectoryWatcher {
    root: PathBuf,
    processed: PathBuf,
    poll_interval: Duration,
    write_settle: Duration,
    queue: QueueHandle,
    cancel: CancellationToken,
    candidates: HashMap<PathBuf, Candidate>,
    seen: HashSet<PathBuf>,
}

impl DirectoryWatcher {
    pub fn new(
        root: PathBuf,
        processed: PathBuf,
        poll_interval: Duration,
        write_settle: Duration,
        queue: QueueHandle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            root,
            processed,
            poll_interval,
            write_settle,
            queue,
            cancel,
            candidates: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn run(mut self) -> anyhow::Result<()> {
        tracing::info!("watching, ignoring {}", self.processed.display());

        loop {
            let root = self.root.clone();
            let processed = self.processed.clone();
            let listing = tokio::task::spawn_blocking(move || list_csv_files(&root, &processed))
                .await
                .context("error scanning watch directory")?;

            for path in self.observe(listing, Instant::now()) {
                if let Err(err) = self.queue.enqueue(path) {
                    tracing::warn!("stopping watcher: {err}");
                    return Ok(());
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!("watcher stopped");

        Ok(())
    }

    /// Files from `listing` that just became ready. A file is ready once its
    /// size and mtime have held for the settle window, and is handed out once
    /// for as long as it stays in the tree.
    pub fn observe(&mut self, listing: Vec<Listed>, now: Instant) -> Vec<PathBuf> {
        let present: HashSet<&PathBuf> = listing.iter().map(|f| &f.path).collect();
        self.seen.retain(|path| present.contains(path));
        self.candidates.retain(|path, _| present.contains(path));

        let mut ready = Vec::new();

        for file in &listing {
            if self.seen.contains(&file.path) {
                continue;
            }

            let candidate = self
                .candidates
                .entry(file.path.clone())
                .or_insert_with(|| Candidate {
                    size: file.size,
                    modified: file.modified,
                    stable_since: now,
                });

            if candidate.size != file.size || candidate.modified != file.modified {
                candidate.size = file.size;
                candidate.modified = file.modified;
                candidate.stable_since = now;
            }

            if now.duration_since(candidate.stable_since) >= self.write_settle {
                ready.push(file.path.clone());
            }
        }

        for path in &ready {
            self.candidates.remove(path);
            self.seen.insert(path.clone());
        }

        ready
    }
}

/// Every `.csv` (any case) under `root`, outside `processed`, in path order.
pub fn list_csv_files(root: &Path, processed: &Path) -> Vec<Listed> {
    let mut files: Vec<Listed> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !entry.path().starts_with(processed))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            Some(Listed {
                size: metadata.len(),
                modified: metadata.modified().ok(),
                path: entry.into_path(),
            })
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc;

    use super::*;

    fn watcher(root: &Path, write_settle: Duration) -> (DirectoryWatcher, mpsc::UnboundedReceiver<PathBuf>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = DirectoryWatcher::new(
            root.to_path_buf(),
            root.join("processed"),
            Duration::from_millis(20),
            write_settle,
            QueueHandle::new(tx),
            CancellationToken::new(),
        );
        (watcher, rx)
    }

    fn listed(path: &str, size: u64) -> Listed {
        Listed {
            path: PathBuf::from(path),
            size,
            modified: None,
        }
    }

    #[test]
    fn only_csv_outside_processed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("processed/2023")).unwrap();
        std::fs::create_dir_all(root.join("chase")).unwrap();

        std::fs::write(root.join("bankwest.csv"), "a").unwrap();
        std::fs::write(root.join("chase/Chase7316.CSV"), "a").unwrap();
        std::fs::write(root.join("notes.txt"), "a").unwrap();
        std::fs::write(root.join("processed/old.csv"), "a").unwrap();
        std::fs::write(root.join("processed/2023/older.csv"), "a").unwrap();

        let paths: Vec<PathBuf> = list_csv_files(root, &root.join("processed"))
            .into_iter()
            .map(|f| f.path)
            .collect();

        assert_eq!(
            paths,
            vec![root.join("bankwest.csv"), root.join("chase/Chase7316.CSV")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn files_wait_until_they_stop_growing() {
        let (mut watcher, _rx) = watcher(Path::new("/in"), Duration::from_secs(2));
        let t0 = Instant::now();

        assert!(watcher.observe(vec![listed("/in/a.csv", 10)], t0).is_empty());
        assert!(
            watcher
                .observe(vec![listed("/in/a.csv", 20)], t0 + Duration::from_secs(1))
                .is_empty()
        );
        // grew at 1s, so 2s is still too early
        assert!(
            watcher
                .observe(vec![listed("/in/a.csv", 20)], t0 + Duration::from_secs(2))
                .is_empty()
        );
        assert_eq!(
            watcher.observe(vec![listed("/in/a.csv", 20)], t0 + Duration::from_secs(3)),
            vec![PathBuf::from("/in/a.csv")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn a_file_is_handed_out_once() {
        let (mut watcher, _rx) = watcher(Path::new("/in"), Duration::ZERO);
        let now = Instant::now();

        assert_eq!(watcher.observe(vec![listed("/in/a.csv", 1)], now).len(), 1);
        assert!(watcher.observe(vec![listed("/in/a.csv", 1)], now).is_empty());
        assert!(watcher.observe(vec![listed("/in/a.csv", 5)], now).is_empty());

        // archived, then dropped again later
        assert!(watcher.observe(vec![], now).is_empty());
        assert_eq!(watcher.observe(vec![listed("/in/a.csv", 1)], now).len(), 1);
    }

    #[tokio::test]
    async fn run_queues_new_files_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let (watcher, mut rx) = watcher(dir.path(), Duration::ZERO);
        let cancel = watcher.cancel.clone();
        let task = tokio::spawn(watcher.run());

        let path = dir.path().join("ubank.csv");
        std::fs::write(&path, "Date,Description,Debit,Credit,Balance\n").unwrap();

        let queued = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(queued, Some(path));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
