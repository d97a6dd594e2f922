// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Process Event Bus
//!
//! Pub/sub fan-out of [`QueueEvent`] lifecycle events to arbitrary
//! subscribers: the metrics handler, the external WebSocket broadcaster, or
//! anything else registered at wiring time.
//!
//! ## Contract
//!
//! - Subscription mutates the registry behind a lock; `publish` snapshots the
//!   subscriber list and spawns one task per handler, so a slow subscriber
//!   never delays the publisher or its siblings.
//! - Handler errors are logged and swallowed; they never propagate back to
//!   the publisher.
//! - Delivery is at-most-once per subscriber with no ordering guarantee
//!   across handlers. Handlers must be idempotent; subscribers that need
//!   buffering own it locally.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use imq_domain::{MergeQueueError, QueueEvent};

/// A subscriber on the event bus.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in log lines when the handler fails.
    fn name(&self) -> &str;

    /// Handles one event. Must be idempotent and non-blocking; errors are
    /// logged by the bus and dropped.
    async fn handle(&self, event: &QueueEvent) -> Result<(), MergeQueueError>;
}

/// Registry of event handlers with spawn-per-handler delivery.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for all subsequent events.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        debug!(handler = handler.name(), "event handler subscribed");
        self.subscribers.write().push(handler);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Delivers an event to every subscriber concurrently.
    ///
    /// Must be called from within a tokio runtime; each handler runs as its
    /// own task and its result is dropped after logging.
    pub fn publish(&self, event: QueueEvent) {
        let handlers: Vec<Arc<dyn EventHandler>> = self.subscribers.read().clone();
        debug!(
            event = event.event_type(),
            subscribers = handlers.len(),
            "publishing event"
        );

        for handler in handlers {
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(error) = handler.handle(&event).await {
                    warn!(
                        handler = handler.name(),
                        event = event.event_type(),
                        error = %error,
                        "event handler failed"
                    );
                }
            });
        }
    }
}
