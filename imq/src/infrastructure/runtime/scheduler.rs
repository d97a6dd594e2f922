// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Weighted Deficit Round Robin Scheduler
//!
//! Fairness scheme across merge queues. Each scheduled queue carries a
//! deficit counter; selection picks the greatest deficit (ties broken by the
//! higher priority class), removes that queue, and credits every remaining
//! queue its own weight. Two guarantees follow:
//!
//! - **Weighted fairness**: with queues permanently backlogged, selection
//!   frequency approaches the ratio of their weights.
//! - **Starvation freedom**: every queue left behind accrues deficit each
//!   round, so its selection count grows without bound.
//!
//! The scheduler is rebuilt each processor cycle: `schedule` everything
//! non-empty, then drain with `next_queue`. State is mutated only inside
//! these two methods.

use imq_domain::{Queue, QueuePriority};
use tracing::trace;

#[derive(Debug)]
struct ScheduledQueue {
    queue: Queue,
    priority: QueuePriority,
    weight: u32,
    deficit: u32,
}

/// WDRR scheduler over merge queues.
#[derive(Debug, Default)]
pub struct WdrrScheduler {
    items: Vec<ScheduledQueue>,
}

impl WdrrScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a queue to the current round. Empty queues are skipped.
    pub fn schedule(&mut self, queue: Queue) {
        if queue.is_empty() {
            trace!(queue = %queue.id(), "skipping empty queue");
            return;
        }
        let priority = queue.priority();
        self.items.push(ScheduledQueue {
            weight: priority.weight(),
            priority,
            queue,
            deficit: 0,
        });
    }

    /// Selects the next queue: greatest deficit, ties to the higher priority
    /// class. Every queue left behind accrues its weight.
    pub fn next_queue(&mut self) -> Option<Queue> {
        if self.items.is_empty() {
            return None;
        }

        let mut selected = 0;
        for (index, item) in self.items.iter().enumerate().skip(1) {
            let best = &self.items[selected];
            if item.deficit > best.deficit
                || (item.deficit == best.deficit && item.priority < best.priority)
            {
                selected = index;
            }
        }

        let chosen = self.items.remove(selected);
        for item in &mut self.items {
            item.deficit += item.weight;
        }

        trace!(
            queue = %chosen.queue.id(),
            branch = chosen.queue.base_branch(),
            priority = ?chosen.priority,
            "queue selected"
        );
        Some(chosen.queue)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
