// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Remove From Queue Use Case
//!
//! Takes a pull request out of whichever queue holds it. Deletion compacts
//! the remaining positions (handled atomically by the repository) and emits
//! `QueueEntryRemoved`. Unknown repositories, PRs, or absent entries are
//! quiet no-ops: webhook deliveries are at-least-once and frequently arrive
//! for PRs the queue never tracked.

use std::sync::Arc;

use tracing::{debug, info};

use imq_domain::events::{EntryContext, QueueEvent};
use imq_domain::repositories::{PullRequestRepository, QueueRepository};
use imq_domain::MergeQueueError;

use crate::infrastructure::event_bus::EventBus;

/// Removes a pull request's entry from its queue.
pub struct RemoveFromQueue {
    queue_repository: Arc<dyn QueueRepository>,
    pull_request_repository: Arc<dyn PullRequestRepository>,
    event_bus: Arc<EventBus>,
}

impl RemoveFromQueue {
    pub fn new(
        queue_repository: Arc<dyn QueueRepository>,
        pull_request_repository: Arc<dyn PullRequestRepository>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            queue_repository,
            pull_request_repository,
            event_bus,
        }
    }

    /// Removes the PR's entry. With `prune`, the stored PR row goes too
    /// (used for the `closed` action).
    pub async fn execute(
        &self,
        owner: &str,
        repo_name: &str,
        number: u64,
        prune: bool,
    ) -> Result<(), MergeQueueError> {
        let Some(repository) = self
            .pull_request_repository
            .find_repository(owner, repo_name)
            .await?
        else {
            debug!(owner, repo_name, "repository not tracked, nothing to remove");
            return Ok(());
        };

        let Some(pull_request) = self
            .pull_request_repository
            .find_by_number(repository.id(), number)
            .await?
        else {
            debug!(pr = number, "pull request not tracked, nothing to remove");
            return Ok(());
        };

        // The stored base branch usually names the right queue, but a PR can
        // be retargeted on the hosting service; scan as the fallback.
        let mut removed_from = None;
        for queue in self.queue_repository.find_all().await? {
            if let Some(entry) = queue.entry_for_pull_request(pull_request.id()) {
                let context = EntryContext {
                    queue_id: *queue.id(),
                    entry_id: *entry.id(),
                    pr_number: number,
                    base_branch: queue.base_branch().to_string(),
                };
                self.queue_repository
                    .remove_entry(queue.id(), entry.id())
                    .await?;
                removed_from = Some(context);
                break;
            }
        }

        if let Some(context) = removed_from {
            info!(pr = number, branch = %context.base_branch, "pull request removed from queue");
            self.event_bus.publish(QueueEvent::entry_removed(context));
        }

        if prune {
            self.pull_request_repository.delete(pull_request.id()).await?;
        }
        Ok(())
    }
}
