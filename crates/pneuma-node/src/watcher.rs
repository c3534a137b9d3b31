//! # Directory Watcher
//!
//! Polls `base/pending/` for `*.json` files and feeds each one through the
//! anchoring workflow. Successful files are renamed into
//! `base/processed/` with a UTC-timestamp prefix; failing files stay
//! pending and retry with exponential backoff until `max_attempts`, after
//! which they are renamed into `base/deadletter/` for operator attention.
//!
//! ## Ordering
//!
//! Pending files are processed in lexicographic filename order each tick.
//! Producers that need records anchored in sequence should name files
//! accordingly (e.g., zero-padded sequence numbers).
//!
//! ## Concurrency
//!
//! Files within a tick are processed concurrently, bounded by a
//! semaphore, so one slow ledger confirmation does not stall the rest of
//! the batch. Retry bookkeeping is updated on the watcher task after the
//! batch joins; the spawned tasks share no mutable state.
//!
//! If the anchor succeeds but the rename into `processed/` fails, the
//! file stays pending; the next attempt short-circuits on the fingerprint
//! and only the rename is retried.
//!
//! ## Deployment Constraint
//!
//! Single instance per directory. Two watchers race on renames; there is
//! no distributed lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use pneuma_core::AnalysisRecord;

use crate::config::{StorageSettings, WatcherSettings};
use crate::workflow::{AnchorOutcome, AnchoringWorkflow, WorkflowError};

/// Why one processing attempt failed.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The file could not be read or renamed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The workflow rejected or failed the record.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before a file is dead-lettered.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub backoff_base: Duration,
    /// Upper bound on the delay.
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    /// Delay before the next attempt, given the number of failed attempts
    /// so far (doubling per attempt, capped).
    fn delay_after(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        let delay = self
            .backoff_base
            .saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.backoff_cap)
    }
}

impl From<&WatcherSettings> for RetryPolicy {
    fn from(settings: &WatcherSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff_base: Duration::from_secs(settings.backoff_base_secs),
            backoff_cap: Duration::from_secs(settings.backoff_cap_secs),
        }
    }
}

#[derive(Debug)]
struct FileState {
    attempts: u32,
    next_attempt_at: Instant,
}

/// Polls the pending directory and drives files through the workflow.
pub struct DirectoryWatcher {
    workflow: Arc<AnchoringWorkflow>,
    pending_dir: PathBuf,
    processed_dir: PathBuf,
    deadletter_dir: PathBuf,
    policy: RetryPolicy,
    semaphore: Arc<Semaphore>,
    states: HashMap<PathBuf, FileState>,
}

impl DirectoryWatcher {
    /// Create a watcher over the configured storage layout.
    pub fn new(
        workflow: Arc<AnchoringWorkflow>,
        storage: &StorageSettings,
        settings: &WatcherSettings,
    ) -> Self {
        Self {
            workflow,
            pending_dir: storage.pending_dir(),
            processed_dir: storage.processed_dir(),
            deadletter_dir: storage.deadletter_dir(),
            policy: RetryPolicy::from(settings),
            semaphore: Arc::new(Semaphore::new(settings.max_concurrency.max(1))),
            states: HashMap::new(),
        }
    }

    /// Run the watch loop forever.
    pub async fn run(mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let anchored = self.tick().await;
            if anchored > 0 {
                tracing::debug!(anchored, "watch tick complete");
            }
        }
    }

    /// Run one watch tick; returns the number of files anchored.
    pub async fn tick(&mut self) -> usize {
        if let Err(e) = self.ensure_directories() {
            tracing::error!("cannot create storage directories: {e}");
            return 0;
        }

        let pending = match self.collect_pending() {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(dir = %self.pending_dir.display(), "cannot list pending directory: {e}");
                return 0;
            }
        };

        let now = Instant::now();
        let eligible: Vec<PathBuf> = pending
            .into_iter()
            .filter(|path| {
                self.states
                    .get(path)
                    .map_or(true, |state| now >= state.next_attempt_at)
            })
            .collect();

        let mut tasks = JoinSet::new();
        for path in eligible {
            let semaphore = self.semaphore.clone();
            let workflow = self.workflow.clone();
            let processed_dir = self.processed_dir.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        // The semaphore is never closed while the watcher lives.
                        return (path, Err(ProcessError::Io(std::io::Error::other(
                            "concurrency limiter closed",
                        ))));
                    }
                };
                let result = process_file(&workflow, &path, &processed_dir).await;
                (path, result)
            });
        }

        let mut anchored = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((path, Ok(_outcome))) => {
                    self.states.remove(&path);
                    anchored += 1;
                }
                Ok((path, Err(error))) => self.note_failure(path, &error),
                Err(e) => tracing::error!("file task panicked: {e}"),
            }
        }
        anchored
    }

    /// Pending `*.json` files in lexicographic filename order.
    fn collect_pending(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.pending_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.pending_dir)?;
        std::fs::create_dir_all(&self.processed_dir)?;
        std::fs::create_dir_all(&self.deadletter_dir)?;
        Ok(())
    }

    fn note_failure(&mut self, path: PathBuf, error: &ProcessError) {
        let state = self.states.entry(path.clone()).or_insert(FileState {
            attempts: 0,
            next_attempt_at: Instant::now(),
        });
        state.attempts += 1;
        let attempts = state.attempts;

        if attempts >= self.policy.max_attempts {
            self.states.remove(&path);
            let dest = match path.file_name() {
                Some(name) => self.deadletter_dir.join(name),
                None => {
                    tracing::error!(file = %path.display(), "pending file has no file name");
                    return;
                }
            };
            tracing::error!(
                file = %path.display(),
                attempts,
                "giving up, moving to dead letter: {error}"
            );
            if let Err(e) = std::fs::rename(&path, &dest) {
                tracing::error!(
                    file = %path.display(),
                    dest = %dest.display(),
                    "dead-letter rename failed: {e}"
                );
            }
        } else {
            let delay = self.policy.delay_after(attempts);
            state.next_attempt_at = Instant::now() + delay;
            tracing::warn!(
                file = %path.display(),
                attempts,
                max_attempts = self.policy.max_attempts,
                "processing failed, next attempt in {delay:?}: {error}"
            );
        }
    }
}

/// Read, parse, anchor, and archive one pending file.
async fn process_file(
    workflow: &AnchoringWorkflow,
    path: &Path,
    processed_dir: &Path,
) -> Result<AnchorOutcome, ProcessError> {
    let contents = tokio::fs::read_to_string(path).await?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    let record = AnalysisRecord::from_value(value).map_err(WorkflowError::from)?;

    let outcome = workflow.anchor(record).await?;

    let dest = processed_destination(processed_dir, path);
    tokio::fs::rename(path, &dest).await?;
    tracing::info!(
        file = %path.display(),
        dest = %dest.display(),
        device_id = %outcome.device_id(),
        "file anchored and archived"
    );
    Ok(outcome)
}

/// `processed/<UTC timestamp>_<original name>`.
fn processed_destination(processed_dir: &Path, path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed.json");
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    processed_dir.join(format!("{stamp}_{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatcherSettings;
    use pneuma_ledger::MockLedger;
    use pneuma_store::MemoryContentStore;
    use serde_json::json;

    struct Fixture {
        _dir: tempfile::TempDir,
        storage: StorageSettings,
        store: Arc<MemoryContentStore>,
        ledger: Arc<MockLedger>,
        workflow: Arc<AnchoringWorkflow>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageSettings {
            base_dir: dir.path().to_path_buf(),
        };
        let store = Arc::new(MemoryContentStore::new());
        let ledger = Arc::new(MockLedger::new());
        let workflow = Arc::new(AnchoringWorkflow::new(store.clone(), ledger.clone()));
        std::fs::create_dir_all(storage.pending_dir()).unwrap();
        Fixture {
            _dir: dir,
            storage,
            store,
            ledger,
            workflow,
        }
    }

    fn watcher_with(fixture: &Fixture, settings: &WatcherSettings) -> DirectoryWatcher {
        DirectoryWatcher::new(fixture.workflow.clone(), &fixture.storage, settings)
    }

    fn fast_settings(max_attempts: u32, backoff_base_secs: u64) -> WatcherSettings {
        WatcherSettings {
            max_attempts,
            backoff_base_secs,
            backoff_cap_secs: 3_600,
            ..WatcherSettings::default()
        }
    }

    fn write_pending(fixture: &Fixture, name: &str, contents: &str) -> PathBuf {
        let path = fixture.storage.pending_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn valid_record_json(device: &str) -> String {
        json!({
            "metadata": {"device_id": device},
            "breathing_rate": 15.8
        })
        .to_string()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn tick_anchors_valid_file_and_archives() {
        let fixture = fixture();
        let mut watcher = watcher_with(&fixture, &fast_settings(5, 0));
        write_pending(&fixture, "a.json", &valid_record_json("dev-1"));

        let anchored = watcher.tick().await;
        assert_eq!(anchored, 1);

        assert!(dir_entries(&fixture.storage.pending_dir()).is_empty());
        let processed = dir_entries(&fixture.storage.processed_dir());
        assert_eq!(processed.len(), 1);
        assert!(processed[0].ends_with("_a.json"), "got {:?}", processed[0]);
        assert_eq!(fixture.ledger.submit_count(), 1);
        assert_eq!(fixture.workflow.count().await, 1);
    }

    #[tokio::test]
    async fn tick_leaves_invalid_json_pending() {
        let fixture = fixture();
        let mut watcher = watcher_with(&fixture, &fast_settings(5, 3_600));
        let path = write_pending(&fixture, "bad.json", "{not json");

        let anchored = watcher.tick().await;
        assert_eq!(anchored, 0);

        // File remains pending, byte-identical; no writes happened.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
        assert_eq!(fixture.ledger.submit_count(), 0);
        assert_eq!(fixture.store.put_count(), 0);
    }

    #[tokio::test]
    async fn backoff_defers_retry_within_window() {
        let fixture = fixture();
        let mut watcher = watcher_with(&fixture, &fast_settings(5, 3_600));
        let path = write_pending(&fixture, "bad.json", "{not json");

        watcher.tick().await;
        assert_eq!(watcher.states.get(&path).map(|s| s.attempts), Some(1));

        // Second tick inside the backoff window: no second attempt.
        watcher.tick().await;
        assert_eq!(watcher.states.get(&path).map(|s| s.attempts), Some(1));
    }

    #[tokio::test]
    async fn exhausted_file_moves_to_deadletter() {
        let fixture = fixture();
        let mut watcher = watcher_with(&fixture, &fast_settings(2, 0));
        write_pending(&fixture, "bad.json", "{not json");

        watcher.tick().await;
        watcher.tick().await;

        assert!(dir_entries(&fixture.storage.pending_dir()).is_empty());
        assert_eq!(
            dir_entries(&fixture.storage.deadletter_dir()),
            vec!["bad.json".to_string()]
        );
        assert!(watcher.states.is_empty());
    }

    #[tokio::test]
    async fn ledger_outage_eventually_deadletters_valid_file() {
        let fixture = fixture();
        fixture.ledger.set_failing(true);
        let mut watcher = watcher_with(&fixture, &fast_settings(2, 0));
        write_pending(&fixture, "a.json", &valid_record_json("dev-1"));

        watcher.tick().await;
        watcher.tick().await;

        assert_eq!(
            dir_entries(&fixture.storage.deadletter_dir()),
            vec!["a.json".to_string()]
        );
        assert_eq!(fixture.ledger.submit_count(), 0);
    }

    #[tokio::test]
    async fn pending_files_processed_in_filename_order() {
        let fixture = fixture();
        let watcher = watcher_with(&fixture, &fast_settings(5, 0));
        write_pending(&fixture, "b.json", &valid_record_json("dev-2"));
        write_pending(&fixture, "a.json", &valid_record_json("dev-1"));
        write_pending(&fixture, "notes.txt", "ignored");

        let pending = watcher.collect_pending().unwrap();
        let names: Vec<_> = pending
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[tokio::test]
    async fn batch_of_files_all_anchor() {
        let fixture = fixture();
        let mut watcher = watcher_with(&fixture, &fast_settings(5, 0));
        for i in 0..6 {
            write_pending(
                &fixture,
                &format!("r{i}.json"),
                &valid_record_json(&format!("dev-{i}")),
            );
        }

        let anchored = watcher.tick().await;
        assert_eq!(anchored, 6);
        assert_eq!(fixture.workflow.count().await, 6);
        assert_eq!(dir_entries(&fixture.storage.processed_dir()).len(), 6);
    }

    #[test]
    fn retry_policy_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_base: Duration::from_secs(60),
            backoff_cap: Duration::from_secs(300),
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(60));
        assert_eq!(policy.delay_after(2), Duration::from_secs(120));
        assert_eq!(policy.delay_after(3), Duration::from_secs(240));
        assert_eq!(policy.delay_after(4), Duration::from_secs(300));
        assert_eq!(policy.delay_after(30), Duration::from_secs(300));
    }
}
