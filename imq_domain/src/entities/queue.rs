// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Queue Entity
//!
//! The per-branch merge queue: an ordered sequence of [`QueueEntry`] values
//! for one `(repository, base branch)` pair. The queue owns its entries and
//! is the aggregate root that enforces the ordering invariants:
//!
//! - **Position contiguity** -- positions are exactly `0, 1, 2, ...` with no
//!   gaps
//! - **No duplicate PR** -- a pull request appears at most once
//! - **Single in flight** -- at most one entry is in a non-terminal,
//!   non-pending state, and it sits at position 0
//!
//! Mutation goes through [`Queue::add_entry`] and [`Queue::remove_entry`];
//! both leave the invariants intact, and [`Queue::validate`] re-checks them
//! for entries reconstituted from storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::queue_entry::QueueEntry;
use crate::error::MergeQueueError;
use crate::value_objects::{PullRequestId, QueueEntryId, QueueId, QueuePriority, RepositoryId};

/// A merge queue for one target branch of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    // Identity fields (always first)
    id: QueueId,
    repository_id: RepositoryId,
    base_branch: String,

    // Core business fields
    entries: Vec<QueueEntry>,

    // Metadata fields (always last)
    created_at: DateTime<Utc>,
}

/// Raw stored fields for reconstituting a [`Queue`] (repository use).
#[derive(Debug, Clone)]
pub struct QueueData {
    pub id: QueueId,
    pub repository_id: RepositoryId,
    pub base_branch: String,
    pub entries: Vec<QueueEntry>,
    pub created_at: DateTime<Utc>,
}

impl Queue {
    /// Creates a new empty queue for a `(repository, base branch)` pair.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the branch name is empty.
    pub fn new(
        repository_id: RepositoryId,
        base_branch: impl Into<String>,
    ) -> Result<Self, MergeQueueError> {
        let base_branch = base_branch.into();
        if base_branch.is_empty() {
            return Err(MergeQueueError::invalid_config(
                "queue base branch cannot be empty",
            ));
        }
        Ok(Self {
            id: QueueId::new(),
            repository_id,
            base_branch,
            entries: Vec::new(),
            created_at: Utc::now(),
        })
    }

    /// Reconstitutes a queue from stored fields. Entries are sorted by
    /// position and the invariants re-validated.
    pub fn from_database(data: QueueData) -> Result<Self, MergeQueueError> {
        let mut entries = data.entries;
        entries.sort_by_key(|e| e.position());
        let queue = Self {
            id: data.id,
            repository_id: data.repository_id,
            base_branch: data.base_branch,
            entries,
            created_at: data.created_at,
        };
        queue.validate()?;
        Ok(queue)
    }

    pub fn id(&self) -> &QueueId {
        &self.id
    }

    pub fn repository_id(&self) -> &RepositoryId {
        &self.repository_id
    }

    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Scheduling priority, derived from the base-branch name.
    pub fn priority(&self) -> QueuePriority {
        QueuePriority::from_branch(&self.base_branch)
    }

    /// The entry at position 0, if any.
    pub fn head(&self) -> Option<&QueueEntry> {
        self.entries.first()
    }

    /// Mutable access to the head entry (pipeline use).
    pub fn head_mut(&mut self) -> Option<&mut QueueEntry> {
        self.entries.first_mut()
    }

    /// Finds the entry for a pull request, if present.
    pub fn entry_for_pull_request(&self, pull_request_id: &PullRequestId) -> Option<&QueueEntry> {
        self.entries
            .iter()
            .find(|e| e.pull_request_id() == pull_request_id)
    }

    /// Appends a new pending entry for a pull request at the tail.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the pull request already has an entry.
    pub fn add_entry(
        &mut self,
        pull_request_id: PullRequestId,
    ) -> Result<&QueueEntry, MergeQueueError> {
        if self.entry_for_pull_request(&pull_request_id).is_some() {
            return Err(MergeQueueError::validation(format!(
                "pull request {} is already queued on {}",
                pull_request_id, self.base_branch
            )));
        }
        let position = self.entries.len() as u32;
        let entry = QueueEntry::new(self.id, pull_request_id, position);
        self.entries.push(entry);
        Ok(self.entries.last().expect("just pushed"))
    }

    /// Removes the entry for a pull request and compacts positions so they
    /// stay contiguous from 0.
    ///
    /// Returns the removed entry, or `None` when the pull request was not
    /// queued.
    pub fn remove_entry(&mut self, pull_request_id: &PullRequestId) -> Option<QueueEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.pull_request_id() == pull_request_id)?;
        let removed = self.entries.remove(index);
        self.compact_positions();
        Some(removed)
    }

    /// Removes an entry by its id, compacting positions.
    pub fn remove_entry_by_id(&mut self, entry_id: &QueueEntryId) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.id() == entry_id)?;
        let removed = self.entries.remove(index);
        self.compact_positions();
        Some(removed)
    }

    fn compact_positions(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            entry.set_position(index as u32);
        }
    }

    /// Re-checks the queue invariants.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming the violated invariant.
    pub fn validate(&self) -> Result<(), MergeQueueError> {
        // Position contiguity: 0, 1, 2, ... with no gaps
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.position() != index as u32 {
                return Err(MergeQueueError::validation(format!(
                    "queue {}: entry at index {} has position {}",
                    self.id,
                    index,
                    entry.position()
                )));
            }
        }

        // No duplicate PR
        for (i, a) in self.entries.iter().enumerate() {
            if self.entries[i + 1..]
                .iter()
                .any(|b| b.pull_request_id() == a.pull_request_id())
            {
                return Err(MergeQueueError::validation(format!(
                    "queue {}: pull request {} appears more than once",
                    self.id,
                    a.pull_request_id()
                )));
            }
        }

        // Single in flight, and only at position 0
        let in_flight: Vec<&QueueEntry> = self
            .entries
            .iter()
            .filter(|e| e.status().is_in_flight())
            .collect();
        if in_flight.len() > 1 {
            return Err(MergeQueueError::validation(format!(
                "queue {}: {} entries in flight",
                self.id,
                in_flight.len()
            )));
        }
        if let Some(entry) = in_flight.first() {
            if entry.position() != 0 {
                return Err(MergeQueueError::validation(format!(
                    "queue {}: in-flight entry at position {}",
                    self.id,
                    entry.position()
                )));
            }
        }

        Ok(())
    }

    /// Replaces the head entry snapshot after the pipeline persisted a
    /// transition (keeps the in-memory aggregate consistent).
    pub fn replace_entry(&mut self, entry: QueueEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.id() == entry.id()) {
            *existing = entry;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::queue_entry::EntryStatus;
    use proptest::prelude::*;

    fn queue() -> Queue {
        Queue::new(RepositoryId::new(), "main").unwrap()
    }

    #[test]
    fn entries_are_appended_at_the_tail() {
        let mut q = queue();
        let a = PullRequestId::new();
        let b = PullRequestId::new();
        assert_eq!(q.add_entry(a).unwrap().position(), 0);
        assert_eq!(q.add_entry(b).unwrap().position(), 1);
        q.validate().unwrap();
    }

    #[test]
    fn duplicate_pull_request_is_rejected() {
        let mut q = queue();
        let pr = PullRequestId::new();
        q.add_entry(pr).unwrap();
        assert!(q.add_entry(pr).is_err());
    }

    #[test]
    fn removal_compacts_positions() {
        let mut q = queue();
        let prs: Vec<PullRequestId> = (0..4).map(|_| PullRequestId::new()).collect();
        for pr in &prs {
            q.add_entry(*pr).unwrap();
        }

        let removed = q.remove_entry(&prs[1]).unwrap();
        assert_eq!(removed.position(), 1);
        let positions: Vec<u32> = q.entries().iter().map(|e| e.position()).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        q.validate().unwrap();
    }

    #[test]
    fn enqueue_then_remove_is_identity_on_positions() {
        let mut q = queue();
        let stable = PullRequestId::new();
        q.add_entry(stable).unwrap();

        let transient = PullRequestId::new();
        q.add_entry(transient).unwrap();
        q.remove_entry(&transient).unwrap();

        assert_eq!(q.len(), 1);
        assert_eq!(q.head().unwrap().pull_request_id(), &stable);
        assert_eq!(q.head().unwrap().position(), 0);
    }

    #[test]
    fn removing_unknown_pull_request_is_none() {
        let mut q = queue();
        assert!(q.remove_entry(&PullRequestId::new()).is_none());
    }

    #[test]
    fn validate_rejects_second_in_flight_entry() {
        let mut q = queue();
        q.add_entry(PullRequestId::new()).unwrap();
        q.add_entry(PullRequestId::new()).unwrap();
        q.entries[0].transition_to(EntryStatus::Updating).unwrap();
        q.validate().unwrap();

        q.entries[1].transition_to(EntryStatus::Updating).unwrap();
        assert!(q.validate().is_err());
    }

    proptest! {
        /// Positions stay contiguous under any interleaving of adds and
        /// removals.
        #[test]
        fn positions_stay_contiguous(ops in proptest::collection::vec(0u8..3, 1..40)) {
            let mut q = queue();
            let mut known: Vec<PullRequestId> = Vec::new();

            for op in ops {
                match op {
                    0 | 1 => {
                        let pr = PullRequestId::new();
                        q.add_entry(pr).unwrap();
                        known.push(pr);
                    }
                    _ => {
                        if let Some(pr) = known.pop() {
                            q.remove_entry(&pr);
                        }
                    }
                }
                q.validate().unwrap();
            }
        }
    }
}
