// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Event Handler
//!
//! Event-bus subscriber that turns lifecycle events into Prometheus updates.
//! Subscribed at wiring time, it keeps the merge and failure counters
//! accurate without the pipeline having to call the metrics service at every
//! emission site.

use std::sync::Arc;

use async_trait::async_trait;

use imq_domain::{MergeQueueError, QueueEvent};

use crate::infrastructure::event_bus::EventHandler;
use crate::infrastructure::metrics::MetricsService;

/// Feeds the metrics service from lifecycle events.
pub struct MetricsEventHandler {
    metrics: Arc<MetricsService>,
}

impl MetricsEventHandler {
    pub fn new(metrics: Arc<MetricsService>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl EventHandler for MetricsEventHandler {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn handle(&self, event: &QueueEvent) -> Result<(), MergeQueueError> {
        match event {
            QueueEvent::MergeCompleted { .. } => self.metrics.record_merge_completed(),
            QueueEvent::MergeFailed { .. } => self.metrics.record_merge_failed(),
            _ => {}
        }
        Ok(())
    }
}
