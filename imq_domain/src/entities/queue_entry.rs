// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Queue Entry Entity
//!
//! One pull request's place in a merge queue. The entry carries the status
//! lifecycle the pipeline advances through and the timestamps observers use
//! to render progress.
//!
//! ## Status lifecycle
//!
//! ```text
//! pending -> updating -> checking -> ready -> completed
//!      \________\___________\_________\
//!                                      +--> failed | cancelled
//! ```
//!
//! Transitions are monotonic: forward jumps are legal (an entry with no
//! configured checks completes straight from `checking`), but no entry ever
//! moves backwards, and `completed`, `failed`, `cancelled` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MergeQueueError;
use crate::value_objects::{PullRequestId, QueueEntryId, QueueId};

/// Lifecycle status of a queue entry.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Waiting for its turn at the head of the queue.
    Pending,
    /// Branch update against the target in progress.
    Updating,
    /// Configured checks executing.
    Checking,
    /// Checks passed; merge imminent.
    Ready,
    /// Merged.
    Completed,
    /// A stage failed; the entry left the queue.
    Failed,
    /// Removed by shutdown or an operator before reaching a verdict.
    Cancelled,
}

impl EntryStatus {
    /// Whether this status ends the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryStatus::Completed | EntryStatus::Failed | EntryStatus::Cancelled
        )
    }

    /// Whether the entry is actively being processed. At most one entry per
    /// queue may be in flight, and it must sit at position 0.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            EntryStatus::Updating | EntryStatus::Checking | EntryStatus::Ready
        )
    }

    /// Rank along the happy path, used to enforce monotonic transitions.
    fn rank(&self) -> u8 {
        match self {
            EntryStatus::Pending => 0,
            EntryStatus::Updating => 1,
            EntryStatus::Checking => 2,
            EntryStatus::Ready => 3,
            EntryStatus::Completed => 4,
            // Terminal failures sit outside the happy path
            EntryStatus::Failed | EntryStatus::Cancelled => 5,
        }
    }

    /// Whether the lifecycle DAG permits moving from `self` to `to`.
    pub fn can_transition_to(&self, to: EntryStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            EntryStatus::Failed | EntryStatus::Cancelled => true,
            EntryStatus::Pending => false,
            _ => to.rank() > self.rank(),
        }
    }

    /// Stable string form used in the database and in events.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Updating => "updating",
            EntryStatus::Checking => "checking",
            EntryStatus::Ready => "ready",
            EntryStatus::Completed => "completed",
            EntryStatus::Failed => "failed",
            EntryStatus::Cancelled => "cancelled",
        }
    }

    /// Parses the stable string form.
    pub fn parse(s: &str) -> Result<Self, MergeQueueError> {
        match s {
            "pending" => Ok(EntryStatus::Pending),
            "updating" => Ok(EntryStatus::Updating),
            "checking" => Ok(EntryStatus::Checking),
            "ready" => Ok(EntryStatus::Ready),
            "completed" => Ok(EntryStatus::Completed),
            "failed" => Ok(EntryStatus::Failed),
            "cancelled" => Ok(EntryStatus::Cancelled),
            other => Err(MergeQueueError::validation(format!(
                "unknown entry status '{}'",
                other
            ))),
        }
    }
}

/// A pull request's position and progress within one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    // Identity fields (always first)
    id: QueueEntryId,
    queue_id: QueueId,
    pull_request_id: PullRequestId,

    // Core business fields
    position: u32,
    status: EntryStatus,

    // Metadata fields (always last)
    enqueued_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// Raw stored fields for reconstituting a [`QueueEntry`] (repository use).
#[derive(Debug, Clone)]
pub struct QueueEntryData {
    pub id: QueueEntryId,
    pub queue_id: QueueId,
    pub pull_request_id: PullRequestId,
    pub position: u32,
    pub status: EntryStatus,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Creates a new pending entry at the given position.
    pub fn new(queue_id: QueueId, pull_request_id: PullRequestId, position: u32) -> Self {
        Self {
            id: QueueEntryId::new(),
            queue_id,
            pull_request_id,
            position,
            status: EntryStatus::Pending,
            enqueued_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Reconstitutes an entry from stored fields.
    pub fn from_database(data: QueueEntryData) -> Self {
        Self {
            id: data.id,
            queue_id: data.queue_id,
            pull_request_id: data.pull_request_id,
            position: data.position,
            status: data.status,
            enqueued_at: data.enqueued_at,
            started_at: data.started_at,
            completed_at: data.completed_at,
        }
    }

    pub fn id(&self) -> &QueueEntryId {
        &self.id
    }

    pub fn queue_id(&self) -> &QueueId {
        &self.queue_id
    }

    pub fn pull_request_id(&self) -> &PullRequestId {
        &self.pull_request_id
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn enqueued_at(&self) -> &DateTime<Utc> {
        &self.enqueued_at
    }

    pub fn started_at(&self) -> Option<&DateTime<Utc>> {
        self.started_at.as_ref()
    }

    pub fn completed_at(&self) -> Option<&DateTime<Utc>> {
        self.completed_at.as_ref()
    }

    /// Advances the entry to a new status.
    ///
    /// Stamps `started_at` on the first move out of `pending` and
    /// `completed_at` on any terminal move.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the lifecycle DAG forbids the move.
    pub fn transition_to(&mut self, status: EntryStatus) -> Result<(), MergeQueueError> {
        if !self.status.can_transition_to(status) {
            return Err(MergeQueueError::InvalidTransition(format!(
                "entry {}: {} -> {}",
                self.id,
                self.status.as_str(),
                status.as_str()
            )));
        }
        if self.status == EntryStatus::Pending && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.status = status;
        Ok(())
    }

    /// Moves the entry to a new position (compaction after a removal).
    pub fn set_position(&mut self, position: u32) {
        self.position = position;
    }
}
