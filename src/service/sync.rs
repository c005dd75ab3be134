use crate::error::TransitError;
use crate::remote::sheets::SheetsApi;
use crate::service::registry::Registry;

use futures::stream::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PullSummary {
    pub fetched: usize,
    pub skipped_rows: usize,
}

/// Per-record push result. Partial failure is reportable but not fatal:
/// already-applied appends are never rolled back.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PushOutcome {
    pub pushed: Vec<String>,
    pub failed: Vec<PushFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug)]
enum SyncJob {
    Pull {
        respond_to: oneshot::Sender<Result<PullSummary, TransitError>>,
    },
    Push {
        respond_to: oneshot::Sender<Result<PushOutcome, TransitError>>,
    },
}

/// Channel-driven sync worker. Jobs are processed strictly in order, so a
/// pull and a push can never interleave their storage writes; per-record
/// appends inside one push run with bounded concurrency.
#[derive(Clone)]
pub struct SyncService {
    job_tx: mpsc::Sender<SyncJob>,
}

impl SyncService {
    pub fn spawn(
        registry: Registry,
        sheets: Arc<SheetsApi>,
        push_concurrency: usize,
        auto_pull_interval: Option<Duration>,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<SyncJob>(64);

        {
            let registry = registry.clone();
            let sheets = sheets.clone();
            tokio::spawn(async move {
                info!("sync worker started");
                let mut jobs = ReceiverStream::new(job_rx);
                while let Some(job) = jobs.next().await {
                    match job {
                        SyncJob::Pull { respond_to } => {
                            let _ = respond_to.send(run_pull(&registry, &sheets).await);
                        }
                        SyncJob::Push { respond_to } => {
                            let _ = respond_to
                                .send(run_push(&registry, &sheets, push_concurrency).await);
                        }
                    }
                }
                info!("sync worker stopped");
            });
        }

        if let Some(period) = auto_pull_interval {
            let job_tx = job_tx.clone();
            tokio::spawn(async move {
                info!(period_secs = period.as_secs(), "background pull scheduled");
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                ticker.tick().await; // the first tick fires immediately
                loop {
                    ticker.tick().await;
                    let (tx, rx) = oneshot::channel();
                    if job_tx.send(SyncJob::Pull { respond_to: tx }).await.is_err() {
                        break;
                    }
                    match rx.await {
                        Ok(Ok(summary)) => {
                            debug!(fetched = summary.fetched, "background pull completed")
                        }
                        // The next scheduled attempt is unaffected by a failure.
                        Ok(Err(e)) => warn!(error = %e, "background pull failed"),
                        Err(_) => break,
                    }
                }
            });
        }

        Self { job_tx }
    }

    /// Pull from the remote sheet and overwrite the local passenger
    /// collection wholesale.
    pub async fn pull(&self) -> Result<PullSummary, TransitError> {
        let (tx, rx) = oneshot::channel();
        self.job_tx
            .send(SyncJob::Pull { respond_to: tx })
            .await
            .map_err(|e| TransitError::ChannelClosed(format!("sync job send failed: {e}")))?;
        rx.await
            .map_err(|e| TransitError::ChannelClosed(format!("sync result dropped: {e}")))?
    }

    /// Push the local collection to the remote sheet, best-effort per record.
    pub async fn push(&self) -> Result<PushOutcome, TransitError> {
        let (tx, rx) = oneshot::channel();
        self.job_tx
            .send(SyncJob::Push { respond_to: tx })
            .await
            .map_err(|e| TransitError::ChannelClosed(format!("sync job send failed: {e}")))?;
        rx.await
            .map_err(|e| TransitError::ChannelClosed(format!("sync result dropped: {e}")))?
    }
}

async fn run_pull(registry: &Registry, sheets: &SheetsApi) -> Result<PullSummary, TransitError> {
    let (passengers, skipped_rows) = sheets.fetch_passengers().await?;
    let fetched = registry.replace_passengers(passengers).await?;
    info!(fetched, skipped_rows, "pull replaced local passenger collection");
    Ok(PullSummary {
        fetched,
        skipped_rows,
    })
}

async fn run_push(
    registry: &Registry,
    sheets: &Arc<SheetsApi>,
    concurrency: usize,
) -> Result<PushOutcome, TransitError> {
    let passengers = registry.list_passengers().await?;
    sheets.clear().await?;

    let results: Vec<(String, Result<(), TransitError>)> =
        futures::stream::iter(passengers.into_iter().map(|passenger| {
            let sheets = sheets.clone();
            async move {
                let result = sheets.append_passenger(&passenger).await;
                (passenger.id, result)
            }
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = PushOutcome::default();
    for (id, result) in results {
        match result {
            Ok(()) => outcome.pushed.push(id),
            Err(e) => outcome.failed.push(PushFailure {
                id,
                error: e.to_string(),
            }),
        }
    }
    if outcome.failed.is_empty() {
        info!(pushed = outcome.pushed.len(), "push completed");
    } else {
        warn!(
            pushed = outcome.pushed.len(),
            failed = outcome.failed.len(),
            "push completed with per-record failures"
        );
    }
    Ok(outcome)
}
