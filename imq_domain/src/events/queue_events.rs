// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Merge-Queue Domain Events
//!
//! Immutable lifecycle events published to the in-process event bus and, via
//! the external broadcaster, to connected observers. Each event carries a
//! unique id, an occurrence timestamp, and enough context for a subscriber to
//! render progress without further lookups.
//!
//! ## Event Categories
//!
//! - **Entry lifecycle**: `QueueEntryAdded`, `QueueEntryStarted`,
//!   `QueueEntryCompleted`, `QueueEntryFailed`, `QueueEntryRemoved`
//! - **Check execution**: `CheckStarted`, `CheckCompleted`, `CheckFailed`
//! - **Queue processing**: `QueueProcessingStarted`, `QueueProcessingCompleted`,
//!   `QueueProcessingEmpty`
//! - **Merging**: `MergeStarted`, `MergeCompleted`, `MergeFailed`
//! - **Conflicts**: `ConflictDetected`, `ConflictResolved`
//! - **Processor lifecycle**: `ProcessorStarted`, `ProcessorStopped`,
//!   `ProcessorShuttingDown`
//!
//! Handlers must be idempotent: the bus delivers concurrently and never
//! retries, so an event is at-most-once per subscriber.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::check::CheckStatus;
use crate::entities::queue_entry::EntryStatus;
use crate::value_objects::{CommitSha, QueueEntryId, QueueId};

/// Common envelope fields stamped on every event at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl EventMeta {
    fn now() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }
}

impl Default for EventMeta {
    fn default() -> Self {
        Self::now()
    }
}

/// Context identifying one entry across entry-lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryContext {
    pub queue_id: QueueId,
    pub entry_id: QueueEntryId,
    pub pr_number: u64,
    pub base_branch: String,
}

/// All lifecycle events emitted by the merge-queue system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    QueueEntryAdded {
        #[serde(flatten)]
        meta: EventMeta,
        #[serde(flatten)]
        entry: EntryContext,
        position: u32,
    },
    QueueEntryStarted {
        #[serde(flatten)]
        meta: EventMeta,
        #[serde(flatten)]
        entry: EntryContext,
    },
    QueueEntryCompleted {
        #[serde(flatten)]
        meta: EventMeta,
        #[serde(flatten)]
        entry: EntryContext,
        status: EntryStatus,
    },
    QueueEntryFailed {
        #[serde(flatten)]
        meta: EventMeta,
        #[serde(flatten)]
        entry: EntryContext,
        reason: String,
    },
    QueueEntryRemoved {
        #[serde(flatten)]
        meta: EventMeta,
        #[serde(flatten)]
        entry: EntryContext,
    },
    CheckStarted {
        #[serde(flatten)]
        meta: EventMeta,
        pr_number: u64,
        check: String,
        head_sha: CommitSha,
    },
    CheckCompleted {
        #[serde(flatten)]
        meta: EventMeta,
        pr_number: u64,
        check: String,
        status: CheckStatus,
    },
    CheckFailed {
        #[serde(flatten)]
        meta: EventMeta,
        pr_number: u64,
        check: String,
        output: String,
    },
    QueueProcessingStarted {
        #[serde(flatten)]
        meta: EventMeta,
        queue_id: QueueId,
        base_branch: String,
    },
    QueueProcessingCompleted {
        #[serde(flatten)]
        meta: EventMeta,
        queue_id: QueueId,
        base_branch: String,
    },
    QueueProcessingEmpty {
        #[serde(flatten)]
        meta: EventMeta,
        queue_id: QueueId,
        base_branch: String,
    },
    MergeStarted {
        #[serde(flatten)]
        meta: EventMeta,
        pr_number: u64,
        base_branch: String,
    },
    MergeCompleted {
        #[serde(flatten)]
        meta: EventMeta,
        pr_number: u64,
        base_branch: String,
        merge_sha: Option<CommitSha>,
    },
    MergeFailed {
        #[serde(flatten)]
        meta: EventMeta,
        pr_number: u64,
        base_branch: String,
        reason: String,
    },
    ConflictDetected {
        #[serde(flatten)]
        meta: EventMeta,
        pr_number: u64,
        base_branch: String,
    },
    ConflictResolved {
        #[serde(flatten)]
        meta: EventMeta,
        pr_number: u64,
        base_branch: String,
    },
    ProcessorStarted {
        #[serde(flatten)]
        meta: EventMeta,
    },
    ProcessorStopped {
        #[serde(flatten)]
        meta: EventMeta,
    },
    ProcessorShuttingDown {
        #[serde(flatten)]
        meta: EventMeta,
    },
}

impl QueueEvent {
    /// Stable event-type name for logging, metrics labels, and wire framing.
    pub fn event_type(&self) -> &'static str {
        match self {
            QueueEvent::QueueEntryAdded { .. } => "queue_entry_added",
            QueueEvent::QueueEntryStarted { .. } => "queue_entry_started",
            QueueEvent::QueueEntryCompleted { .. } => "queue_entry_completed",
            QueueEvent::QueueEntryFailed { .. } => "queue_entry_failed",
            QueueEvent::QueueEntryRemoved { .. } => "queue_entry_removed",
            QueueEvent::CheckStarted { .. } => "check_started",
            QueueEvent::CheckCompleted { .. } => "check_completed",
            QueueEvent::CheckFailed { .. } => "check_failed",
            QueueEvent::QueueProcessingStarted { .. } => "queue_processing_started",
            QueueEvent::QueueProcessingCompleted { .. } => "queue_processing_completed",
            QueueEvent::QueueProcessingEmpty { .. } => "queue_processing_empty",
            QueueEvent::MergeStarted { .. } => "merge_started",
            QueueEvent::MergeCompleted { .. } => "merge_completed",
            QueueEvent::MergeFailed { .. } => "merge_failed",
            QueueEvent::ConflictDetected { .. } => "conflict_detected",
            QueueEvent::ConflictResolved { .. } => "conflict_resolved",
            QueueEvent::ProcessorStarted { .. } => "processor_started",
            QueueEvent::ProcessorStopped { .. } => "processor_stopped",
            QueueEvent::ProcessorShuttingDown { .. } => "processor_shutting_down",
        }
    }

    /// The envelope stamped at construction.
    pub fn meta(&self) -> &EventMeta {
        match self {
            QueueEvent::QueueEntryAdded { meta, .. }
            | QueueEvent::QueueEntryStarted { meta, .. }
            | QueueEvent::QueueEntryCompleted { meta, .. }
            | QueueEvent::QueueEntryFailed { meta, .. }
            | QueueEvent::QueueEntryRemoved { meta, .. }
            | QueueEvent::CheckStarted { meta, .. }
            | QueueEvent::CheckCompleted { meta, .. }
            | QueueEvent::CheckFailed { meta, .. }
            | QueueEvent::QueueProcessingStarted { meta, .. }
            | QueueEvent::QueueProcessingCompleted { meta, .. }
            | QueueEvent::QueueProcessingEmpty { meta, .. }
            | QueueEvent::MergeStarted { meta, .. }
            | QueueEvent::MergeCompleted { meta, .. }
            | QueueEvent::MergeFailed { meta, .. }
            | QueueEvent::ConflictDetected { meta, .. }
            | QueueEvent::ConflictResolved { meta, .. }
            | QueueEvent::ProcessorStarted { meta, .. }
            | QueueEvent::ProcessorStopped { meta, .. }
            | QueueEvent::ProcessorShuttingDown { meta, .. } => meta,
        }
    }

    pub fn occurred_at(&self) -> &DateTime<Utc> {
        &self.meta().occurred_at
    }

    // Factory functions keep call sites terse and guarantee every event gets
    // a fresh envelope.

    pub fn entry_added(entry: EntryContext, position: u32) -> Self {
        QueueEvent::QueueEntryAdded {
            meta: EventMeta::now(),
            entry,
            position,
        }
    }

    pub fn entry_started(entry: EntryContext) -> Self {
        QueueEvent::QueueEntryStarted {
            meta: EventMeta::now(),
            entry,
        }
    }

    pub fn entry_completed(entry: EntryContext, status: EntryStatus) -> Self {
        QueueEvent::QueueEntryCompleted {
            meta: EventMeta::now(),
            entry,
            status,
        }
    }

    pub fn entry_failed(entry: EntryContext, reason: impl Into<String>) -> Self {
        QueueEvent::QueueEntryFailed {
            meta: EventMeta::now(),
            entry,
            reason: reason.into(),
        }
    }

    pub fn entry_removed(entry: EntryContext) -> Self {
        QueueEvent::QueueEntryRemoved {
            meta: EventMeta::now(),
            entry,
        }
    }

    pub fn check_started(pr_number: u64, check: impl Into<String>, head_sha: CommitSha) -> Self {
        QueueEvent::CheckStarted {
            meta: EventMeta::now(),
            pr_number,
            check: check.into(),
            head_sha,
        }
    }

    pub fn check_completed(pr_number: u64, check: impl Into<String>, status: CheckStatus) -> Self {
        QueueEvent::CheckCompleted {
            meta: EventMeta::now(),
            pr_number,
            check: check.into(),
            status,
        }
    }

    pub fn check_failed(
        pr_number: u64,
        check: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        QueueEvent::CheckFailed {
            meta: EventMeta::now(),
            pr_number,
            check: check.into(),
            output: output.into(),
        }
    }

    pub fn processing_started(queue_id: QueueId, base_branch: impl Into<String>) -> Self {
        QueueEvent::QueueProcessingStarted {
            meta: EventMeta::now(),
            queue_id,
            base_branch: base_branch.into(),
        }
    }

    pub fn processing_completed(queue_id: QueueId, base_branch: impl Into<String>) -> Self {
        QueueEvent::QueueProcessingCompleted {
            meta: EventMeta::now(),
            queue_id,
            base_branch: base_branch.into(),
        }
    }

    pub fn processing_empty(queue_id: QueueId, base_branch: impl Into<String>) -> Self {
        QueueEvent::QueueProcessingEmpty {
            meta: EventMeta::now(),
            queue_id,
            base_branch: base_branch.into(),
        }
    }

    pub fn merge_started(pr_number: u64, base_branch: impl Into<String>) -> Self {
        QueueEvent::MergeStarted {
            meta: EventMeta::now(),
            pr_number,
            base_branch: base_branch.into(),
        }
    }

    pub fn merge_completed(
        pr_number: u64,
        base_branch: impl Into<String>,
        merge_sha: Option<CommitSha>,
    ) -> Self {
        QueueEvent::MergeCompleted {
            meta: EventMeta::now(),
            pr_number,
            base_branch: base_branch.into(),
            merge_sha,
        }
    }

    pub fn merge_failed(
        pr_number: u64,
        base_branch: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        QueueEvent::MergeFailed {
            meta: EventMeta::now(),
            pr_number,
            base_branch: base_branch.into(),
            reason: reason.into(),
        }
    }

    pub fn conflict_detected(pr_number: u64, base_branch: impl Into<String>) -> Self {
        QueueEvent::ConflictDetected {
            meta: EventMeta::now(),
            pr_number,
            base_branch: base_branch.into(),
        }
    }

    pub fn conflict_resolved(pr_number: u64, base_branch: impl Into<String>) -> Self {
        QueueEvent::ConflictResolved {
            meta: EventMeta::now(),
            pr_number,
            base_branch: base_branch.into(),
        }
    }

    pub fn processor_started() -> Self {
        QueueEvent::ProcessorStarted {
            meta: EventMeta::now(),
        }
    }

    pub fn processor_stopped() -> Self {
        QueueEvent::ProcessorStopped {
            meta: EventMeta::now(),
        }
    }

    pub fn processor_shutting_down() -> Self {
        QueueEvent::ProcessorShuttingDown {
            meta: EventMeta::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> EntryContext {
        EntryContext {
            queue_id: QueueId::new(),
            entry_id: QueueEntryId::new(),
            pr_number: 42,
            base_branch: "main".into(),
        }
    }

    #[test]
    fn events_carry_fresh_envelopes() {
        let a = QueueEvent::entry_started(context());
        let b = QueueEvent::entry_started(context());
        assert_ne!(a.meta().event_id, b.meta().event_id);
    }

    #[test]
    fn event_type_names_are_stable() {
        assert_eq!(
            QueueEvent::entry_added(context(), 0).event_type(),
            "queue_entry_added"
        );
        assert_eq!(QueueEvent::processor_started().event_type(), "processor_started");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = QueueEvent::merge_failed(42, "main", "branch protection");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "merge_failed");
        assert_eq!(json["pr_number"], 42);
        assert_eq!(json["reason"], "branch protection");
    }
}
