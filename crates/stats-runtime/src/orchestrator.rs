//! Async analysis orchestrator.
//!
//! Normalizes a batch of raw events once, shares the records through an
//! `Arc` and runs every [`AnalysisTask`] on the blocking pool. The batch is
//! all-or-nothing: a timeout or a failed task yields an error and no report.
//!
//! Blocking jobs share an abort flag. On timeout the flag is raised and the
//! batch is drained, so no job outlives [`AnalysisOrchestrator::run`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use stats_core::error::{Result, StatsError};
use stats_core::models::{NormalizedPlayEvent, RawPlayEvent};
use stats_data::analysis::{
    AnalysisMetadata, AnalysisOptions, AnalysisReport, AnalysisTask, ReportBuilder, TaskOutput,
};
use stats_data::normalizer::Normalizer;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, info, warn};

// ── JobGuard ──────────────────────────────────────────────────────────────────

/// Counts one blocking job as active until dropped.
struct JobGuard(Arc<AtomicUsize>);

impl JobGuard {
    fn enter(active_jobs: &Arc<AtomicUsize>) -> Self {
        active_jobs.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(active_jobs))
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

// ── AnalysisOrchestrator ──────────────────────────────────────────────────────

/// Concurrent runner for the analysis pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisOrchestrator {
    options: AnalysisOptions,
    /// Limit for the whole batch, normalization included.
    timeout: Option<Duration>,
    active_jobs: Arc<AtomicUsize>,
}

impl AnalysisOrchestrator {
    pub fn new(options: AnalysisOptions, timeout: Option<Duration>) -> Self {
        Self {
            options,
            timeout,
            active_jobs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Number of blocking jobs currently running for this orchestrator.
    pub fn active_jobs(&self) -> usize {
        self.active_jobs.load(Ordering::Relaxed)
    }

    /// Normalize `raw` and compute the full report concurrently.
    pub async fn run(&self, raw: Vec<RawPlayEvent>) -> Result<AnalysisReport> {
        let start = Instant::now();
        let abort = Arc::new(AtomicBool::new(false));
        let batch = self.run_batch(raw, Arc::clone(&abort));
        tokio::pin!(batch);

        let report = match self.timeout {
            Some(limit) => match time::timeout(limit, batch.as_mut()).await {
                Ok(report) => report?,
                Err(_) => {
                    abort.store(true, Ordering::Release);
                    // Wait for in-flight jobs to observe the flag.
                    let _ = batch.await;
                    warn!(
                        "Analysis timed out after {:?}, stopped in {:.3}s",
                        limit,
                        start.elapsed().as_secs_f64()
                    );
                    return Err(StatsError::Timeout(limit));
                }
            },
            None => batch.await?,
        };

        info!(
            "Analyzed {} records in {:.3}s",
            report.records.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn run_batch(
        &self,
        raw: Vec<RawPlayEvent>,
        abort: Arc<AtomicBool>,
    ) -> Result<AnalysisReport> {
        let raw_count = raw.len();
        let guard = JobGuard::enter(&self.active_jobs);
        let flag = Arc::clone(&abort);
        let normalized = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            Normalizer::normalize_abortable(&raw, &flag)
        })
        .await
        .map_err(|e| StatsError::Task(format!("normalize: {e}")))?;
        let (records, coercion) = normalized.ok_or(StatsError::Aborted)?;

        let records = Arc::new(records);
        let outputs = self.run_tasks(Arc::clone(&records), &abort).await?;

        let mut builder = ReportBuilder::new();
        for output in outputs {
            builder.add(output);
        }

        // Every task has been joined, so this is normally the last reference.
        let records = Arc::try_unwrap(records).unwrap_or_else(|shared| shared.as_ref().clone());
        let metadata =
            AnalysisMetadata::new(raw_count, records.len(), coercion, self.options.timezone);
        builder.finish(records, metadata, &self.options)
    }

    /// Run every task on the blocking pool and wait for all of them, even
    /// after one has failed.
    async fn run_tasks(
        &self,
        records: Arc<Vec<NormalizedPlayEvent>>,
        abort: &Arc<AtomicBool>,
    ) -> Result<Vec<TaskOutput>> {
        let tasks = AnalysisTask::all();
        let mut set = JoinSet::new();

        for task in &tasks {
            let task = *task;
            let records = Arc::clone(&records);
            let abort = Arc::clone(abort);
            let guard = JobGuard::enter(&self.active_jobs);
            let options = self.options;
            set.spawn_blocking(move || {
                let _guard = guard;
                (task, task.run_abortable(&records, &options, &abort))
            });
        }

        let mut outputs = Vec::with_capacity(tasks.len());
        let mut failure = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((task, Some(output))) => {
                    debug!("task {} finished", task.name());
                    outputs.push(output);
                }
                Ok((task, None)) => {
                    debug!("task {} aborted", task.name());
                    failure.get_or_insert(StatsError::Aborted);
                }
                Err(e) => {
                    abort.store(true, Ordering::Release);
                    failure.get_or_insert(StatsError::Task(e.to_string()));
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(outputs),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
