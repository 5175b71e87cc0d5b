// src/pipeline/sync.rs

//! Sync orchestration.
//!
//! One `run()` is one attempt: fetch → parse → diff → notify → persist →
//! checkpoint. The orchestrator owns the run's recovery contract:
//! - fetch and schema failures abort before any mutation
//! - channel failures are recorded, never fatal
//! - a persistence failure skips checkpointing, so the stale checkpoint
//!   forces the next run to re-detect the same records
//! - a checkpoint failure after a successful persist downgrades to a logged
//!   warning (documented at-least-once notification)
//!
//! Re-invocation cadence belongs to the external scheduler, which must also
//! keep at most one run in flight.

use chrono::Utc;
use futures::future::join_all;

use crate::error::Result;
use crate::models::Violation;
use crate::notify::{NotificationChannel, NotifyError};
use crate::pipeline::diff::{detect_new, filter_new};
use crate::pipeline::fetch::SourceFetcher;
use crate::pipeline::parse::parse_violations;
use crate::storage::{CheckpointFile, ViolationStore};

/// Outcome of one notification channel attempt.
#[derive(Debug)]
pub struct ChannelOutcome {
    pub channel: &'static str,
    pub result: std::result::Result<(), NotifyError>,
}

/// Report of a completed sync run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Rows in the just-persisted snapshot
    pub record_count: usize,
    /// Records absent from the checkpoint at run start
    pub new_count: usize,
    /// Per-channel notification outcomes (empty when nothing was new)
    pub channels: Vec<ChannelOutcome>,
    /// Whether the known-identity checkpoint was written
    pub checkpoint_saved: bool,
}

/// One sync run over injected dependencies.
pub struct SyncPipeline {
    fetcher: Box<dyn SourceFetcher>,
    store: Box<dyn ViolationStore>,
    checkpoint: CheckpointFile,
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl SyncPipeline {
    pub fn new(
        fetcher: Box<dyn SourceFetcher>,
        store: Box<dyn ViolationStore>,
        checkpoint: CheckpointFile,
        channels: Vec<Box<dyn NotificationChannel>>,
    ) -> Self {
        Self {
            fetcher,
            store,
            checkpoint,
            channels,
        }
    }

    /// Execute one full sync attempt.
    pub async fn run(&self) -> Result<RunReport> {
        let started = Utc::now();
        log::info!("Sync starting...");

        let raw = self.fetcher.fetch().await?;
        log::info!("Downloaded {} bytes", raw.len());

        let outcome = parse_violations(&raw)?;
        log::info!(
            "Parsed {} records ({} unique identity keys)",
            outcome.records.len(),
            outcome.ids.len()
        );

        let known = self.checkpoint.load().await?;
        log::info!("{} identity keys known from the last successful run", known.len());

        let new_ids = detect_new(&outcome.ids, &known);
        let new_records = filter_new(&outcome.records, &new_ids);
        log::info!("{} new records detected", new_records.len());

        let channels = if new_records.is_empty() {
            Vec::new()
        } else {
            self.dispatch_notifications(&new_records).await
        };

        self.store.replace_all(&outcome.records).await?;
        log::info!("Dataset replaced: {} rows", outcome.records.len());

        let checkpoint_saved = match self.checkpoint.save(&outcome.ids).await {
            Ok(()) => {
                log::info!("Checkpoint saved: {} identity keys", outcome.ids.len());
                true
            }
            Err(e) => {
                // The dataset is correct; the next run will just re-detect
                // (and possibly re-notify) the records synced here.
                log::warn!("Checkpoint save failed: {}", e);
                false
            }
        };

        let elapsed = Utc::now() - started;
        log::info!("Sync complete in {} ms", elapsed.num_milliseconds());

        Ok(RunReport {
            record_count: outcome.records.len(),
            new_count: new_records.len(),
            channels,
            checkpoint_saved,
        })
    }

    /// Dispatch all channels concurrently; failures are logged and recorded,
    /// never propagated.
    async fn dispatch_notifications(&self, new_records: &[Violation]) -> Vec<ChannelOutcome> {
        let attempts = self.channels.iter().map(|channel| async move {
            let result = channel.notify(new_records).await;
            match &result {
                Ok(()) => log::info!("Channel '{}' notified", channel.name()),
                Err(NotifyError::ConfigIncomplete(reason)) => {
                    log::warn!("Channel '{}' skipped: {}", channel.name(), reason)
                }
                Err(e) => log::warn!("Channel '{}' failed: {}", channel.name(), e),
            }
            ChannelOutcome {
                channel: channel.name(),
                result,
            }
        });

        join_all(attempts).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::error::{AppError, FetchError, PersistenceError};

    const HEADER: &str = "id_poursuite,business_id,date,description,adresse,date_jugement,etablissement,montant,proprietaire,ville,statut,date_statut,categorie";

    fn row(id: &str, etablissement: &str) -> String {
        format!(
            "{id},57,2024-03-14,Insalubrite,123 Rue Exemple,2024-06-01,{etablissement},500,PROPRIO INC.,Montréal,Fermé,2024-06-15,Restaurant"
        )
    }

    fn payload(rows: &[(&str, &str)]) -> String {
        let mut text = format!("{HEADER}\n");
        for (id, etablissement) in rows {
            text.push_str(&row(id, etablissement));
            text.push('\n');
        }
        text
    }

    /// Fetcher returning a fixed payload.
    struct StaticFetcher {
        payload: String,
    }

    #[async_trait]
    impl SourceFetcher for StaticFetcher {
        async fn fetch(&self) -> std::result::Result<String, FetchError> {
            Ok(self.payload.clone())
        }
    }

    /// In-memory store recording the last replace, shareable across runs.
    #[derive(Clone, Default)]
    struct MemoryStore {
        rows: Arc<Mutex<Vec<Violation>>>,
    }

    #[async_trait]
    impl ViolationStore for MemoryStore {
        async fn replace_all(
            &self,
            records: &[Violation],
        ) -> std::result::Result<(), PersistenceError> {
            let mut rows = self.rows.lock().unwrap();
            rows.clear();
            rows.extend_from_slice(records);
            Ok(())
        }
    }

    /// Store that always fails, for injection tests.
    struct FailingStore;

    #[async_trait]
    impl ViolationStore for FailingStore {
        async fn replace_all(
            &self,
            _records: &[Violation],
        ) -> std::result::Result<(), PersistenceError> {
            Err(PersistenceError(sqlx::Error::PoolClosed))
        }
    }

    /// Channel recording every batch of new records it is handed.
    #[derive(Clone, Default)]
    struct RecordingChannel {
        batches: Arc<Mutex<Vec<Vec<String>>>>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(
            &self,
            new_records: &[Violation],
        ) -> std::result::Result<(), NotifyError> {
            let ids = new_records.iter().map(|v| v.id_poursuite.clone()).collect();
            self.batches.lock().unwrap().push(ids);
            Ok(())
        }
    }

    /// Channel that always fails with a transport error.
    struct BrokenChannel;

    #[async_trait]
    impl NotificationChannel for BrokenChannel {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn notify(
            &self,
            _new_records: &[Violation],
        ) -> std::result::Result<(), NotifyError> {
            Err(NotifyError::Transport("connection refused".into()))
        }
    }

    fn pipeline(
        payload: String,
        store: Box<dyn ViolationStore>,
        checkpoint: CheckpointFile,
        channels: Vec<Box<dyn NotificationChannel>>,
    ) -> SyncPipeline {
        SyncPipeline::new(Box::new(StaticFetcher { payload }), store, checkpoint, channels)
    }

    #[tokio::test]
    async fn first_run_treats_everything_as_new() {
        let tmp = TempDir::new().unwrap();
        let checkpoint = CheckpointFile::new(tmp.path().join("known_ids.txt"));
        let store = MemoryStore::default();
        let mail = RecordingChannel::default();
        let feed = RecordingChannel::default();

        let report = pipeline(
            payload(&[("101", "A"), ("102", "B"), ("103", "C")]),
            Box::new(store.clone()),
            checkpoint.clone(),
            vec![Box::new(mail.clone()), Box::new(feed.clone())],
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.record_count, 3);
        assert_eq!(report.new_count, 3);
        assert_eq!(report.channels.len(), 2);
        assert!(report.checkpoint_saved);

        // Both channels saw the full batch.
        assert_eq!(mail.batches.lock().unwrap().len(), 1);
        assert_eq!(feed.batches.lock().unwrap().len(), 1);

        // The dataset holds exactly the three rows.
        assert_eq!(store.rows.lock().unwrap().len(), 3);

        // The checkpoint holds exactly the three keys, sorted.
        let content = std::fs::read_to_string(checkpoint.path()).unwrap();
        assert_eq!(content, "101\n102\n103\n");
    }

    #[tokio::test]
    async fn second_run_detects_only_the_addition() {
        let tmp = TempDir::new().unwrap();
        let checkpoint = CheckpointFile::new(tmp.path().join("known_ids.txt"));
        let store = MemoryStore::default();

        pipeline(
            payload(&[("101", "A"), ("102", "B"), ("103", "C")]),
            Box::new(store.clone()),
            checkpoint.clone(),
            Vec::new(),
        )
        .run()
        .await
        .unwrap();

        let mail = RecordingChannel::default();
        let report = pipeline(
            payload(&[("101", "A"), ("102", "B"), ("103", "C"), ("104", "D")]),
            Box::new(store.clone()),
            checkpoint.clone(),
            vec![Box::new(mail.clone())],
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.new_count, 1);
        // Full replace, not append.
        assert_eq!(report.record_count, 4);
        assert_eq!(store.rows.lock().unwrap().len(), 4);

        let batches = mail.batches.lock().unwrap();
        assert_eq!(batches.as_slice(), &[vec!["104".to_string()]]);
    }

    #[tokio::test]
    async fn unchanged_dataset_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let checkpoint = CheckpointFile::new(tmp.path().join("known_ids.txt"));
        let store = MemoryStore::default();
        let data = payload(&[("101", "A"), ("102", "B")]);

        pipeline(data.clone(), Box::new(store.clone()), checkpoint.clone(), Vec::new())
            .run()
            .await
            .unwrap();
        let first_checkpoint = std::fs::read_to_string(checkpoint.path()).unwrap();

        let mail = RecordingChannel::default();
        let report = pipeline(
            data,
            Box::new(store.clone()),
            checkpoint.clone(),
            vec![Box::new(mail.clone())],
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.new_count, 0);
        // Nothing new: no channel was invoked at all.
        assert!(report.channels.is_empty());
        assert!(mail.batches.lock().unwrap().is_empty());
        assert_eq!(store.rows.lock().unwrap().len(), 2);
        assert_eq!(
            std::fs::read_to_string(checkpoint.path()).unwrap(),
            first_checkpoint
        );
    }

    #[tokio::test]
    async fn channel_failure_never_blocks_persistence() {
        let tmp = TempDir::new().unwrap();
        let checkpoint = CheckpointFile::new(tmp.path().join("known_ids.txt"));
        let store = MemoryStore::default();

        let report = pipeline(
            payload(&[("101", "A")]),
            Box::new(store.clone()),
            checkpoint.clone(),
            vec![Box::new(BrokenChannel)],
        )
        .run()
        .await
        .unwrap();

        assert!(matches!(
            report.channels[0].result,
            Err(NotifyError::Transport(_))
        ));
        assert_eq!(store.rows.lock().unwrap().len(), 1);
        assert!(report.checkpoint_saved);
    }

    #[tokio::test]
    async fn persistence_failure_leaves_checkpoint_stale_for_retry() {
        let tmp = TempDir::new().unwrap();
        let checkpoint = CheckpointFile::new(tmp.path().join("known_ids.txt"));
        let store = MemoryStore::default();

        // Establish a baseline checkpoint with one known record.
        pipeline(
            payload(&[("101", "A")]),
            Box::new(store.clone()),
            checkpoint.clone(),
            Vec::new(),
        )
        .run()
        .await
        .unwrap();
        let baseline = std::fs::read_to_string(checkpoint.path()).unwrap();

        // Two new records arrive but persistence fails.
        let grown = payload(&[("101", "A"), ("102", "B"), ("103", "C")]);
        let mail = RecordingChannel::default();
        let err = pipeline(
            grown.clone(),
            Box::new(FailingStore),
            checkpoint.clone(),
            vec![Box::new(mail.clone())],
        )
        .run()
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));

        // Checkpoint is untouched.
        assert_eq!(
            std::fs::read_to_string(checkpoint.path()).unwrap(),
            baseline
        );

        // The retry recomputes the same two records as new.
        let retry = pipeline(
            grown,
            Box::new(store.clone()),
            checkpoint.clone(),
            vec![Box::new(mail.clone())],
        )
        .run()
        .await
        .unwrap();
        assert_eq!(retry.new_count, 2);

        let batches = mail.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        let expected: HashSet<String> = ["102".to_string(), "103".to_string()].into();
        assert_eq!(
            batches[0].iter().cloned().collect::<HashSet<_>>(),
            expected
        );
        assert_eq!(batches[0], batches[1]);
    }

    #[tokio::test]
    async fn schema_failure_aborts_before_any_mutation() {
        let tmp = TempDir::new().unwrap();
        let checkpoint = CheckpointFile::new(tmp.path().join("known_ids.txt"));
        let store = MemoryStore::default();

        let err = pipeline(
            format!("{HEADER}\n101,57\n"),
            Box::new(store.clone()),
            checkpoint.clone(),
            Vec::new(),
        )
        .run()
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Schema(_)));
        assert!(store.rows.lock().unwrap().is_empty());
        assert!(!checkpoint.path().exists());
    }

    #[tokio::test]
    async fn empty_payload_syncs_to_an_empty_snapshot() {
        let tmp = TempDir::new().unwrap();
        let checkpoint = CheckpointFile::new(tmp.path().join("known_ids.txt"));
        let store = MemoryStore::default();

        let report = pipeline(
            format!("{HEADER}\n"),
            Box::new(store.clone()),
            checkpoint.clone(),
            Vec::new(),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.record_count, 0);
        assert_eq!(report.new_count, 0);
        assert_eq!(std::fs::read_to_string(checkpoint.path()).unwrap(), "");
    }
}
