// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Enqueue Pull Request Use Case
//!
//! Adds a labeled pull request to the queue for its target branch:
//!
//! 1. Upsert the repository identity and the pull request snapshot.
//! 2. Find or create the queue for `(repository, base branch)`.
//! 3. If the PR already has an entry, do nothing (idempotent re-delivery).
//! 4. Otherwise append a `pending` entry at `max(position) + 1` and emit
//!    `QueueEntryAdded`.

use std::sync::Arc;

use tracing::{debug, info};

use imq_domain::entities::{PullRequest, Queue, Repository};
use imq_domain::events::{EntryContext, QueueEvent};
use imq_domain::repositories::{PullRequestRepository, QueueRepository};
use imq_domain::value_objects::CommitSha;
use imq_domain::MergeQueueError;

use crate::infrastructure::event_bus::EventBus;

/// Everything the webhook payload contributes to an enqueue.
#[derive(Debug, Clone)]
pub struct EnqueueInput {
    pub owner: String,
    pub repo_name: String,
    pub default_branch: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub base_branch: String,
    pub head_branch: String,
    pub head_sha: String,
}

/// Adds a pull request to its per-branch queue.
pub struct EnqueuePullRequest {
    queue_repository: Arc<dyn QueueRepository>,
    pull_request_repository: Arc<dyn PullRequestRepository>,
    event_bus: Arc<EventBus>,
}

impl EnqueuePullRequest {
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

    pub async fn execute(&self, input: EnqueueInput) -> Result<(), MergeQueueError> {
        let head_sha = CommitSha::new(input.head_sha.clone())?;
        let repository = self.upsert_repository(&input).await?;
        let pull_request = self.upsert_pull_request(&input, &repository, head_sha).await?;

        let mut queue = match self
            .queue_repository
            .find(repository.id(), &input.base_branch)
            .await?
        {
            Some(queue) => queue,
            None => Queue::new(*repository.id(), input.base_branch.clone())?,
        };

        if queue.entry_for_pull_request(pull_request.id()).is_some() {
            debug!(
                pr = input.number,
                branch = %input.base_branch,
                "pull request already queued, ignoring"
            );
            return Ok(());
        }

        let (entry_id, position) = {
            let entry = queue.add_entry(*pull_request.id())?;
            (*entry.id(), entry.position())
        };
        self.queue_repository.save(&queue).await?;
        info!(
            pr = input.number,
            branch = %input.base_branch,
            position,
            "pull request enqueued"
        );
        self.event_bus.publish(QueueEvent::entry_added(
            EntryContext {
                queue_id: *queue.id(),
                entry_id,
                pr_number: input.number,
                base_branch: input.base_branch.clone(),
            },
            position,
        ));
        Ok(())
    }

    async fn upsert_repository(&self, input: &EnqueueInput) -> Result<Repository, MergeQueueError> {
        if let Some(existing) = self
            .pull_request_repository
            .find_repository(&input.owner, &input.repo_name)
            .await?
        {
            return Ok(existing);
        }
        let repository = Repository::new(
            input.owner.clone(),
            input.repo_name.clone(),
            input.default_branch.clone(),
        )?;
        self.pull_request_repository
            .save_repository(&repository)
            .await?;
        Ok(repository)
    }

    async fn upsert_pull_request(
        &self,
        input: &EnqueueInput,
        repository: &Repository,
        head_sha: CommitSha,
    ) -> Result<PullRequest, MergeQueueError> {
        match self
            .pull_request_repository
            .find_by_number(repository.id(), input.number)
            .await?
        {
            Some(mut existing) => {
                let was_conflicted = existing.is_conflicted();
                let head_moved = existing.head_sha() != &head_sha;
                existing.update_head(head_sha);
                existing.update_details(
                    input.title.clone(),
                    input.base_branch.clone(),
                    input.head_branch.clone(),
                );
                self.pull_request_repository.save(&existing).await?;

                // A new head supersedes a recorded conflict; tell observers.
                if was_conflicted && head_moved {
                    self.event_bus.publish(QueueEvent::conflict_resolved(
                        input.number,
                        input.base_branch.clone(),
                    ));
                }
                Ok(existing)
            }
            None => {
                let pull_request = PullRequest::new(
                    *repository.id(),
                    input.number,
                    input.title.clone(),
                    input.author.clone(),
                    input.base_branch.clone(),
                    input.head_branch.clone(),
                    head_sha,
                );
                self.pull_request_repository.save(&pull_request).await?;
                Ok(pull_request)
            }
        }
    }
}
