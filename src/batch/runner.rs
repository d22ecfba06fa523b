use crate::batch::BatchProgress;
use crate::discovery::EntityRecord;
use crate::extractor::output_manager::UNKNOWN_ENTITY;
use crate::extractor::{DetailExtractor, DetailOutcome};
use crate::ui::GracefulShutdown;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum Slot {
    Ready(DetailOutcome),
    Running {
        handle: JoinHandle<DetailOutcome>,
        name: String,
        directory: String,
        url: Option<String>,
    },
}

impl Slot {
    fn is_settled(&self) -> bool {
        match self {
            Slot::Ready(_) => true,
            Slot::Running { handle, .. } => handle.is_finished(),
        }
    }

    fn directory(&self) -> &str {
        match self {
            Slot::Ready(outcome) => &outcome.directory,
            Slot::Running { directory, .. } => directory,
        }
    }

    async fn settle(self) -> DetailOutcome {
        match self {
            Slot::Ready(outcome) => outcome,
            Slot::Running {
                handle,
                name,
                directory,
                url,
            } => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(entity = %name, error = %e, "Extraction task aborted");
                    DetailOutcome::aborted(name, directory, url.as_deref(), e.to_string())
                }
            },
        }
    }
}

/// Runs the detail extractor over every discovered record.
///
/// At most `concurrency` entities are in flight. Outcomes are recorded in
/// input order, and one entity's failure never stops the batch.
pub struct BatchRunner {
    extractor: Arc<DetailExtractor>,
    concurrency: usize,
    shutdown: GracefulShutdown,
}

impl BatchRunner {
    pub fn new(extractor: Arc<DetailExtractor>, concurrency: usize, shutdown: GracefulShutdown) -> Self {
        Self {
            extractor,
            concurrency: concurrency.max(1),
            shutdown,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run(
        &self,
        records: &[EntityRecord],
        progress_callback: Option<&(dyn Fn(&BatchProgress) + Sync)>,
    ) -> BatchProgress {
        let mut progress = BatchProgress::new(records.len());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut pending: VecDeque<Slot> = VecDeque::new();
        let mut claimed: HashSet<String> = HashSet::new();

        info!(
            entities = records.len(),
            concurrency = self.concurrency,
            "Starting detail extraction"
        );

        for record in records {
            if !self.shutdown.is_running() {
                warn!(
                    remaining = records.len() - progress.processed - pending.len(),
                    "Cancellation requested, not dispatching further entities"
                );
                progress.cancelled = true;
                break;
            }

            let name = self
                .extractor
                .display_name(record)
                .unwrap_or(UNKNOWN_ENTITY)
                .to_string();
            let directory = self.extractor.directory_name(record);

            let Some(url) = record.url() else {
                warn!(entity = %name, "Record has no detail URL, skipping");
                pending.push_back(Slot::Ready(DetailOutcome::skipped(name, directory)));
                Self::drain_settled(&mut pending, &mut progress, progress_callback).await;
                continue;
            };

            if !claimed.insert(directory.clone()) {
                progress.collisions += 1;
                warn!(
                    entity = %name,
                    directory = %directory,
                    "Directory already used by another entity, last write wins"
                );
                if pending.iter().any(|slot| slot.directory() == directory) {
                    Self::drain_all(&mut pending, &mut progress, progress_callback).await;
                }
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(error = %e, "Worker pool closed");
                    break;
                }
            };

            debug!(entity = %name, url = %url, "Dispatching entity");
            let extractor = Arc::clone(&self.extractor);
            let task_record = record.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                extractor.extract(&task_record).await
            });

            pending.push_back(Slot::Running {
                handle,
                name,
                directory,
                url: Some(url.to_string()),
            });
            Self::drain_settled(&mut pending, &mut progress, progress_callback).await;
        }

        Self::drain_all(&mut pending, &mut progress, progress_callback).await;

        info!(
            extracted = progress.extracted,
            degraded = progress.degraded,
            failed = progress.failed,
            skipped = progress.skipped,
            "Detail extraction finished"
        );
        progress
    }

    /// Records leading slots that have already finished.
    async fn drain_settled(
        pending: &mut VecDeque<Slot>,
        progress: &mut BatchProgress,
        progress_callback: Option<&(dyn Fn(&BatchProgress) + Sync)>,
    ) {
        while pending.front().is_some_and(Slot::is_settled) {
            if let Some(slot) = pending.pop_front() {
                Self::record(slot, progress, progress_callback).await;
            }
        }
    }

    async fn drain_all(
        pending: &mut VecDeque<Slot>,
        progress: &mut BatchProgress,
        progress_callback: Option<&(dyn Fn(&BatchProgress) + Sync)>,
    ) {
        while let Some(slot) = pending.pop_front() {
            Self::record(slot, progress, progress_callback).await;
        }
    }

    async fn record(
        slot: Slot,
        progress: &mut BatchProgress,
        progress_callback: Option<&(dyn Fn(&BatchProgress) + Sync)>,
    ) {
        let outcome = slot.settle().await;
        progress.record(outcome);
        if let Some(callback) = progress_callback {
            callback(progress);
        }
    }
}
