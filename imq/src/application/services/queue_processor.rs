// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Queue Processor
//!
//! The single long-lived control loop. Each cycle:
//!
//! 1. Fetch all queues; record per-branch depth gauges and sweep the cache.
//! 2. Submit every non-empty queue to a fresh WDRR scheduler.
//! 3. Drain the scheduler, launching one pipeline task per queue, gated by
//!    the processing semaphore and wrapped in the processing deadline.
//! 4. Sleep `processing_interval` and repeat.
//!
//! An unexpected error in the loop body is logged, counted, and followed by
//! a short backoff; the loop never exits on transient failure. `start` twice
//! is `ProcessorAlreadyRunning`; `shutdown` without `start` is
//! `ProcessorNotRunning`.
//!
//! ## Graceful shutdown
//!
//! `shutdown` flips the cancellation token (no new dispatches), waits up to
//! `shutdown_timeout` for in-flight pipeline tasks, then aborts stragglers
//! and records them in the forced-shutdown counter. Cancellation is
//! signalled, not guaranteed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use imq_bootstrap::shutdown::CancellationToken;
use imq_domain::repositories::QueueRepository;
use imq_domain::{MergeQueueError, QueueEvent};

use crate::application::services::entry_pipeline::EntryPipeline;
use crate::infrastructure::cache::ResultCache;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::runtime::{ProcessingGate, WdrrScheduler};

/// Tunables for the processor loop.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Concurrent pipeline tasks (semaphore capacity).
    pub max_concurrent_processing: usize,
    /// Sleep between cycles.
    pub processing_interval: Duration,
    /// Hard deadline per pipeline task.
    pub processing_timeout: Duration,
    /// How long `shutdown` waits for in-flight tasks.
    pub shutdown_timeout: Duration,
    /// Backoff after an unexpected loop error.
    pub error_backoff: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_processing: 3,
            processing_interval: Duration::from_secs(30),
            processing_timeout: Duration::from_secs(300),
            shutdown_timeout: Duration::from_secs(60),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// The autonomous queue-processing loop.
pub struct QueueProcessor {
    queue_repository: Arc<dyn QueueRepository>,
    pipeline: Arc<EntryPipeline>,
    cache: Arc<ResultCache>,
    event_bus: Arc<EventBus>,
    metrics: Arc<MetricsService>,
    gate: ProcessingGate,
    config: ProcessorConfig,
    running: AtomicBool,
    token: CancellationToken,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl QueueProcessor {
    pub fn new(
        queue_repository: Arc<dyn QueueRepository>,
        pipeline: Arc<EntryPipeline>,
        cache: Arc<ResultCache>,
        event_bus: Arc<EventBus>,
        metrics: Arc<MetricsService>,
        token: CancellationToken,
        config: ProcessorConfig,
    ) -> Self {
        let gate = ProcessingGate::new(config.max_concurrent_processing);
        Self {
            queue_repository,
            pipeline,
            cache,
            event_bus,
            metrics,
            gate,
            config,
            running: AtomicBool::new(false),
            token,
            loop_handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the control loop. Call as `processor.clone().start()`; the
    /// clone is consumed by the loop task.
    ///
    /// # Errors
    ///
    /// Returns `ProcessorAlreadyRunning` when the loop is already live.
    pub async fn start(self: Arc<Self>) -> Result<(), MergeQueueError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MergeQueueError::ProcessorAlreadyRunning);
        }

        let processor = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            processor.run_loop().await;
        });
        *self.loop_handle.lock().await = Some(handle);

        self.event_bus.publish(QueueEvent::processor_started());
        info!(
            interval_secs = self.config.processing_interval.as_secs(),
            max_concurrent = self.config.max_concurrent_processing,
            "queue processor started"
        );
        Ok(())
    }

    /// Stops dispatching, drains in-flight work, and stops the loop.
    ///
    /// # Errors
    ///
    /// Returns `ProcessorNotRunning` when `start` was never called (or the
    /// processor already stopped).
    pub async fn shutdown(&self) -> Result<(), MergeQueueError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(MergeQueueError::ProcessorNotRunning);
        }

        self.event_bus.publish(QueueEvent::processor_shutting_down());
        info!(
            timeout_secs = self.config.shutdown_timeout.as_secs(),
            "queue processor shutting down"
        );
        self.token.cancel();

        if let Some(handle) = self.loop_handle.lock().await.take() {
            // The loop drains its own in-flight tasks within the shutdown
            // deadline; give it that long plus a small grace for bookkeeping.
            let deadline = self.config.shutdown_timeout + Duration::from_secs(2);
            if tokio::time::timeout(deadline, handle).await.is_err() {
                warn!("processor loop exceeded the shutdown deadline");
            }
        }

        self.event_bus.publish(QueueEvent::processor_stopped());
        info!("queue processor stopped");
        Ok(())
    }

    async fn run_loop(self: Arc<Self>) {
        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            if self.token.is_cancelled() {
                break;
            }

            // Reap tasks that finished since the last cycle.
            while in_flight.try_join_next().is_some() {}

            if let Err(error) = self.cycle(&mut in_flight).await {
                error!(error = %error, "processor cycle failed");
                self.metrics.record_processor_error();
                tokio::select! {
                    _ = self.token.cancelled() => break,
                    _ = tokio::time::sleep(self.config.error_backoff) => {}
                }
                continue;
            }

            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.config.processing_interval) => {}
            }
        }

        self.drain(in_flight).await;
    }

    /// One scheduling cycle: snapshot queues, schedule, dispatch.
    async fn cycle(&self, in_flight: &mut JoinSet<()>) -> Result<(), MergeQueueError> {
        let queues = self.queue_repository.find_all().await?;
        debug!(queues = queues.len(), "processing cycle");

        let swept = self.cache.purge_expired();
        if swept > 0 {
            debug!(swept, "expired cache entries purged");
        }
        self.metrics.set_cache_entries(self.cache.len() as i64);

        let mut scheduler = WdrrScheduler::new();
        for queue in queues {
            self.metrics
                .set_queue_depth(queue.base_branch(), queue.len() as i64);
            scheduler.schedule(queue);
        }

        while let Some(queue) = scheduler.next_queue() {
            if self.token.is_cancelled() {
                debug!("shutdown in progress, not dispatching further queues");
                break;
            }

            let permit = self.gate.acquire().await?;
            self.metrics.record_queue_selected(queue.priority());

            let pipeline = Arc::clone(&self.pipeline);
            let metrics = Arc::clone(&self.metrics);
            let deadline = self.config.processing_timeout;
            in_flight.spawn(async move {
                let _permit = permit;
                metrics.pipeline_started();

                let queue_id = *queue.id();
                let branch = queue.base_branch().to_string();
                let outcome =
                    tokio::time::timeout(deadline, pipeline.process_queue(queue)).await;

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        warn!(branch = %branch, error = %error, "pipeline run failed");
                    }
                    Err(_elapsed) => {
                        warn!(
                            branch = %branch,
                            timeout_secs = deadline.as_secs(),
                            "pipeline run exceeded the processing deadline"
                        );
                        if let Err(error) = pipeline
                            .fail_in_flight(&queue_id, "processing deadline exceeded", false)
                            .await
                        {
                            error!(error = %error, "failed to record deadline expiry");
                        }
                    }
                }
                metrics.pipeline_finished();
            });
        }
        Ok(())
    }

    /// Waits for in-flight pipeline tasks within the shutdown deadline, then
    /// aborts and counts the stragglers.
    async fn drain(&self, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }
        info!(tasks = in_flight.len(), "waiting for in-flight pipeline tasks");

        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            let abandoned = in_flight.len() as u64;
            warn!(abandoned, "shutdown deadline expired, aborting pipeline tasks");
            self.metrics.record_forced_shutdown(abandoned);
            in_flight.abort_all();
        }
    }
}
