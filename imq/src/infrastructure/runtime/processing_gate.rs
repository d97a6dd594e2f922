// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processing Gate
//!
//! Counting-semaphore gate bounding how many pipeline tasks run at once.
//! `acquire` suspends while the gate is saturated; the returned RAII permit
//! releases its slot on drop, including when a pipeline task panics or is
//! aborted by the shutdown deadline. Waiters are released FIFO by the
//! underlying tokio semaphore.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use imq_domain::MergeQueueError;

/// Bounded gate for concurrent pipeline runs.
#[derive(Clone)]
pub struct ProcessingGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ProcessingGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot. The permit holds the slot until dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, MergeQueueError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| MergeQueueError::cancelled("processing gate closed"))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
