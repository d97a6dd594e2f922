// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service Implementation
//!
//! Prometheus-based metrics collection for merge-queue observability:
//! processor throughput and errors, merge outcomes, webhook traffic, check
//! executions, cache effectiveness, scheduler selections, and per-branch
//! queue depth. Thread-safe with low overhead; `export` renders the text
//! exposition format for whatever endpoint the embedding process serves.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;
use tracing::debug;

use imq_domain::{CheckStatus, MergeQueueError, QueuePriority};

const NAMESPACE: &str = "imq";

/// Prometheus metrics service for the merge-queue system.
#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<Registry>,

    // Processor metrics
    entries_processed_total: IntCounter,
    entries_failed_total: IntCounter,
    processor_errors_total: IntCounter,
    forced_shutdown_total: IntCounter,
    active_pipelines: IntGauge,
    entry_processing_duration: Histogram,

    // Merge metrics
    merges_total: IntCounter,
    merge_failures_total: IntCounter,

    // Webhook metrics
    webhook_events_total: IntCounterVec,
    webhook_rejected_total: IntCounterVec,
    webhook_handling_duration: Histogram,

    // Check metrics
    checks_executed_total: IntCounterVec,
    check_duration: Histogram,

    // Cache metrics
    cache_hits_total: IntCounter,
    cache_misses_total: IntCounter,
    cache_entries: IntGauge,

    // Scheduler metrics
    scheduler_selections_total: IntCounterVec,
    queue_depth: IntGaugeVec,
}

fn metrics_err(what: &str, e: impl std::fmt::Display) -> MergeQueueError {
    MergeQueueError::metrics_error(format!("failed to create or register {}: {}", what, e))
}

impl MetricsService {
    /// Creates the service and registers every metric with a fresh registry.
    pub fn new() -> Result<Self, MergeQueueError> {
        let registry = Registry::new();

        let entries_processed_total = IntCounter::with_opts(
            Opts::new("entries_processed_total", "Queue entries that completed the pipeline")
                .namespace(NAMESPACE),
        )
        .map_err(|e| metrics_err("entries_processed_total", e))?;

        let entries_failed_total = IntCounter::with_opts(
            Opts::new("entries_failed_total", "Queue entries that failed the pipeline")
                .namespace(NAMESPACE),
        )
        .map_err(|e| metrics_err("entries_failed_total", e))?;

        let processor_errors_total = IntCounter::with_opts(
            Opts::new("processor_errors_total", "Unexpected errors in the processor loop")
                .namespace(NAMESPACE),
        )
        .map_err(|e| metrics_err("processor_errors_total", e))?;

        let forced_shutdown_total = IntCounter::with_opts(
            Opts::new(
                "forced_shutdown_total",
                "Pipeline tasks still running when the shutdown deadline expired",
            )
            .namespace(NAMESPACE),
        )
        .map_err(|e| metrics_err("forced_shutdown_total", e))?;

        let active_pipelines = IntGauge::with_opts(
            Opts::new("active_pipelines", "Pipeline tasks currently running").namespace(NAMESPACE),
        )
        .map_err(|e| metrics_err("active_pipelines", e))?;

        let entry_processing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "entry_processing_duration_seconds",
                "Wall-clock time to process one queue entry",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.5, 1.0, 5.0, 15.0, 60.0, 120.0, 300.0]),
        )
        .map_err(|e| metrics_err("entry_processing_duration_seconds", e))?;

        let merges_total = IntCounter::with_opts(
            Opts::new("merges_total", "Pull requests merged by the queue").namespace(NAMESPACE),
        )
        .map_err(|e| metrics_err("merges_total", e))?;

        let merge_failures_total = IntCounter::with_opts(
            Opts::new("merge_failures_total", "Merge attempts that failed").namespace(NAMESPACE),
        )
        .map_err(|e| metrics_err("merge_failures_total", e))?;

        let webhook_events_total = IntCounterVec::new(
            Opts::new("webhook_events_total", "Webhook deliveries by event type")
                .namespace(NAMESPACE),
            &["event"],
        )
        .map_err(|e| metrics_err("webhook_events_total", e))?;

        let webhook_rejected_total = IntCounterVec::new(
            Opts::new("webhook_rejected_total", "Webhook deliveries rejected, by reason")
                .namespace(NAMESPACE),
            &["reason"],
        )
        .map_err(|e| metrics_err("webhook_rejected_total", e))?;

        let webhook_handling_duration = Histogram::with_opts(
            HistogramOpts::new(
                "webhook_handling_duration_seconds",
                "Time to translate one webhook delivery into queue mutations",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )
        .map_err(|e| metrics_err("webhook_handling_duration_seconds", e))?;

        let checks_executed_total = IntCounterVec::new(
            Opts::new("checks_executed_total", "Check executions by terminal status")
                .namespace(NAMESPACE),
            &["status"],
        )
        .map_err(|e| metrics_err("checks_executed_total", e))?;

        let check_duration = Histogram::with_opts(
            HistogramOpts::new("check_duration_seconds", "Time to run one check")
                .namespace(NAMESPACE)
                .buckets(vec![0.1, 1.0, 10.0, 30.0, 60.0, 300.0, 600.0]),
        )
        .map_err(|e| metrics_err("check_duration_seconds", e))?;

        let cache_hits_total = IntCounter::with_opts(
            Opts::new("cache_hits_total", "Result-cache hits").namespace(NAMESPACE),
        )
        .map_err(|e| metrics_err("cache_hits_total", e))?;

        let cache_misses_total = IntCounter::with_opts(
            Opts::new("cache_misses_total", "Result-cache misses").namespace(NAMESPACE),
        )
        .map_err(|e| metrics_err("cache_misses_total", e))?;

        let cache_entries = IntGauge::with_opts(
            Opts::new("cache_entries", "Entries currently in the result cache")
                .namespace(NAMESPACE),
        )
        .map_err(|e| metrics_err("cache_entries", e))?;

        let scheduler_selections_total = IntCounterVec::new(
            Opts::new("scheduler_selections_total", "Queue selections by priority class")
                .namespace(NAMESPACE),
            &["priority"],
        )
        .map_err(|e| metrics_err("scheduler_selections_total", e))?;

        let queue_depth = IntGaugeVec::new(
            Opts::new("queue_depth", "Entries queued per base branch").namespace(NAMESPACE),
            &["branch"],
        )
        .map_err(|e| metrics_err("queue_depth", e))?;

        for collector in [
            Box::new(entries_processed_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(entries_failed_total.clone()),
            Box::new(processor_errors_total.clone()),
            Box::new(forced_shutdown_total.clone()),
            Box::new(active_pipelines.clone()),
            Box::new(entry_processing_duration.clone()),
            Box::new(merges_total.clone()),
            Box::new(merge_failures_total.clone()),
            Box::new(webhook_events_total.clone()),
            Box::new(webhook_rejected_total.clone()),
            Box::new(webhook_handling_duration.clone()),
            Box::new(checks_executed_total.clone()),
            Box::new(check_duration.clone()),
            Box::new(cache_hits_total.clone()),
            Box::new(cache_misses_total.clone()),
            Box::new(cache_entries.clone()),
            Box::new(scheduler_selections_total.clone()),
            Box::new(queue_depth.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|e| metrics_err("collector", e))?;
        }

        debug!("MetricsService initialized with Prometheus registry");

        Ok(Self {
            registry: Arc::new(registry),
            entries_processed_total,
            entries_failed_total,
            processor_errors_total,
            forced_shutdown_total,
            active_pipelines,
            entry_processing_duration,
            merges_total,
            merge_failures_total,
            webhook_events_total,
            webhook_rejected_total,
            webhook_handling_duration,
            checks_executed_total,
            check_duration,
            cache_hits_total,
            cache_misses_total,
            cache_entries,
            scheduler_selections_total,
            queue_depth,
        })
    }

    // Processor

    pub fn record_entry_completed(&self, duration_secs: f64) {
        self.entries_processed_total.inc();
        self.entry_processing_duration.observe(duration_secs);
    }

    pub fn record_entry_failed(&self) {
        self.entries_failed_total.inc();
    }

    pub fn record_processor_error(&self) {
        self.processor_errors_total.inc();
    }

    pub fn record_forced_shutdown(&self, abandoned_tasks: u64) {
        self.forced_shutdown_total.inc_by(abandoned_tasks);
    }

    pub fn pipeline_started(&self) {
        self.active_pipelines.inc();
    }

    pub fn pipeline_finished(&self) {
        self.active_pipelines.dec();
    }

    // Merging

    pub fn record_merge_completed(&self) {
        self.merges_total.inc();
    }

    pub fn record_merge_failed(&self) {
        self.merge_failures_total.inc();
    }

    // Webhook

    pub fn record_webhook_event(&self, event: &str) {
        self.webhook_events_total.with_label_values(&[event]).inc();
    }

    pub fn record_webhook_rejected(&self, reason: &str) {
        self.webhook_rejected_total.with_label_values(&[reason]).inc();
    }

    pub fn record_webhook_duration(&self, duration_secs: f64) {
        self.webhook_handling_duration.observe(duration_secs);
    }

    // Checks

    pub fn record_check_executed(&self, status: CheckStatus, duration_secs: f64) {
        self.checks_executed_total
            .with_label_values(&[status.as_str()])
            .inc();
        self.check_duration.observe(duration_secs);
    }

    // Cache

    pub fn record_cache_hit(&self) {
        self.cache_hits_total.inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses_total.inc();
    }

    pub fn set_cache_entries(&self, entries: i64) {
        self.cache_entries.set(entries);
    }

    // Scheduler

    pub fn record_queue_selected(&self, priority: QueuePriority) {
        let label = match priority {
            QueuePriority::Critical => "critical",
            QueuePriority::High => "high",
            QueuePriority::Normal => "normal",
            QueuePriority::Low => "low",
        };
        self.scheduler_selections_total
            .with_label_values(&[label])
            .inc();
    }

    pub fn set_queue_depth(&self, branch: &str, depth: i64) {
        self.queue_depth.with_label_values(&[branch]).set(depth);
    }

    /// Renders the text exposition format.
    pub fn export(&self) -> Result<String, MergeQueueError> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .map_err(|e| MergeQueueError::metrics_error(format!("encode failed: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| MergeQueueError::metrics_error(format!("non-utf8 exposition: {}", e)))
    }
}
