// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Queue Repository Port
//!
//! Persistence contract for merge queues and their entries. The repository is
//! the source of truth for queue state: the pipeline's in-memory view of an
//! entry is a snapshot, and every status transition writes back through
//! [`QueueRepository::update_entry`].
//!
//! ## Consistency requirements
//!
//! - At most one queue per `(repository, base branch)` (unique index).
//! - [`QueueRepository::remove_entry`] must delete the entry *and* compact
//!   the remaining positions back to `0, 1, 2, ...` atomically with respect
//!   to concurrent `find` calls. The webhook ingress and the pipeline mutate
//!   entries concurrently; serialization happens here.

use async_trait::async_trait;

use crate::entities::queue::Queue;
use crate::entities::queue_entry::QueueEntry;
use crate::error::MergeQueueError;
use crate::value_objects::{QueueEntryId, QueueId, RepositoryId};

/// Persistence port for merge queues.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Fetches every queue with its entries, entries ordered by position.
    async fn find_all(&self) -> Result<Vec<Queue>, MergeQueueError>;

    /// Fetches the queue for a `(repository, base branch)` pair.
    async fn find(
        &self,
        repository_id: &RepositoryId,
        base_branch: &str,
    ) -> Result<Option<Queue>, MergeQueueError>;

    /// Fetches a queue by id.
    async fn find_by_id(&self, id: &QueueId) -> Result<Option<Queue>, MergeQueueError>;

    /// Upserts the queue and its full entry set.
    async fn save(&self, queue: &Queue) -> Result<(), MergeQueueError>;

    /// Deletes a queue and (cascade) its entries. Returns whether it existed.
    async fn delete(&self, id: &QueueId) -> Result<bool, MergeQueueError>;

    /// Writes back a single entry's status, position, and timestamps.
    async fn update_entry(&self, entry: &QueueEntry) -> Result<(), MergeQueueError>;

    /// Deletes one entry and compacts the remaining positions atomically.
    /// Returns whether the entry existed.
    async fn remove_entry(
        &self,
        queue_id: &QueueId,
        entry_id: &QueueEntryId,
    ) -> Result<bool, MergeQueueError>;

    /// Fetches the entries of one queue ordered by position.
    async fn get_entries(&self, queue_id: &QueueId) -> Result<Vec<QueueEntry>, MergeQueueError>;

    /// Rewrites entry positions to match the given id order (0, 1, 2, ...).
    async fn reorder_entries(
        &self,
        queue_id: &QueueId,
        ordered: &[QueueEntryId],
    ) -> Result<(), MergeQueueError>;
}
