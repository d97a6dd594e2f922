// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory Repositories
//!
//! Map-backed implementations of the repository ports. They keep the same
//! consistency semantics as the SQLite adapters (atomic remove-and-compact,
//! single-row configuration) and back the integration tests, where a real
//! database would only slow the suite down.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use imq_domain::entities::{PullRequest, Queue, Repository, SystemConfiguration};
use imq_domain::repositories::{
    ConfigurationRepository, PullRequestRepository, QueueRepository,
};
use imq_domain::value_objects::{PullRequestId, QueueEntryId, QueueId, RepositoryId};
use imq_domain::{MergeQueueError, QueueEntry};

/// In-memory queue persistence.
#[derive(Default)]
pub struct InMemoryQueueRepository {
    queues: RwLock<HashMap<QueueId, Queue>>,
}

impl InMemoryQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn find_all(&self) -> Result<Vec<Queue>, MergeQueueError> {
        let mut queues: Vec<Queue> = self.queues.read().values().cloned().collect();
        queues.sort_by_key(|q| *q.created_at());
        Ok(queues)
    }

    async fn find(
        &self,
        repository_id: &RepositoryId,
        base_branch: &str,
    ) -> Result<Option<Queue>, MergeQueueError> {
        Ok(self
            .queues
            .read()
            .values()
            .find(|q| q.repository_id() == repository_id && q.base_branch() == base_branch)
            .cloned())
    }

    async fn find_by_id(&self, id: &QueueId) -> Result<Option<Queue>, MergeQueueError> {
        Ok(self.queues.read().get(id).cloned())
    }

    async fn save(&self, queue: &Queue) -> Result<(), MergeQueueError> {
        self.queues.write().insert(*queue.id(), queue.clone());
        Ok(())
    }

    async fn delete(&self, id: &QueueId) -> Result<bool, MergeQueueError> {
        Ok(self.queues.write().remove(id).is_some())
    }

    async fn update_entry(&self, entry: &QueueEntry) -> Result<(), MergeQueueError> {
        let mut queues = self.queues.write();
        let queue = queues.get_mut(entry.queue_id()).ok_or_else(|| {
            MergeQueueError::QueueNotFound(entry.queue_id().to_string())
        })?;
        queue.replace_entry(entry.clone());
        Ok(())
    }

    async fn remove_entry(
        &self,
        queue_id: &QueueId,
        entry_id: &QueueEntryId,
    ) -> Result<bool, MergeQueueError> {
        let mut queues = self.queues.write();
        let Some(queue) = queues.get_mut(queue_id) else {
            return Ok(false);
        };
        Ok(queue.remove_entry_by_id(entry_id).is_some())
    }

    async fn get_entries(&self, queue_id: &QueueId) -> Result<Vec<QueueEntry>, MergeQueueError> {
        Ok(self
            .queues
            .read()
            .get(queue_id)
            .map(|q| q.entries().to_vec())
            .unwrap_or_default())
    }

    async fn reorder_entries(
        &self,
        queue_id: &QueueId,
        ordered: &[QueueEntryId],
    ) -> Result<(), MergeQueueError> {
        let mut queues = self.queues.write();
        let queue = queues
            .get_mut(queue_id)
            .ok_or_else(|| MergeQueueError::QueueNotFound(queue_id.to_string()))?;

        for (position, entry_id) in ordered.iter().enumerate() {
            if let Some(entry) = queue
                .entries()
                .iter()
                .find(|e| e.id() == entry_id)
                .cloned()
            {
                let mut entry = entry;
                entry.set_position(position as u32);
                queue.replace_entry(entry);
            }
        }
        Ok(())
    }
}

/// In-memory pull-request and repository-identity persistence.
#[derive(Default)]
pub struct InMemoryPullRequestRepository {
    pull_requests: RwLock<HashMap<PullRequestId, PullRequest>>,
    repositories: RwLock<HashMap<RepositoryId, Repository>>,
}

impl InMemoryPullRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PullRequestRepository for InMemoryPullRequestRepository {
    async fn find_by_id(
        &self,
        id: &PullRequestId,
    ) -> Result<Option<PullRequest>, MergeQueueError> {
        Ok(self.pull_requests.read().get(id).cloned())
    }

    async fn find_by_number(
        &self,
        repository_id: &RepositoryId,
        number: u64,
    ) -> Result<Option<PullRequest>, MergeQueueError> {
        Ok(self
            .pull_requests
            .read()
            .values()
            .find(|pr| pr.repository_id() == repository_id && pr.number() == number)
            .cloned())
    }

    async fn save(&self, pull_request: &PullRequest) -> Result<(), MergeQueueError> {
        self.pull_requests
            .write()
            .insert(*pull_request.id(), pull_request.clone());
        Ok(())
    }

    async fn delete(&self, id: &PullRequestId) -> Result<bool, MergeQueueError> {
        Ok(self.pull_requests.write().remove(id).is_some())
    }

    async fn find_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Repository>, MergeQueueError> {
        Ok(self
            .repositories
            .read()
            .values()
            .find(|r| r.owner() == owner && r.name() == name)
            .cloned())
    }

    async fn find_repository_by_id(
        &self,
        id: &RepositoryId,
    ) -> Result<Option<Repository>, MergeQueueError> {
        Ok(self.repositories.read().get(id).cloned())
    }

    async fn save_repository(&self, repository: &Repository) -> Result<(), MergeQueueError> {
        let mut repositories = self.repositories.write();
        // Identity is insert-once, matching the SQLite unique index.
        let exists = repositories
            .values()
            .any(|r| r.owner() == repository.owner() && r.name() == repository.name());
        if !exists {
            repositories.insert(*repository.id(), repository.clone());
        }
        Ok(())
    }
}

/// In-memory single-row configuration persistence.
#[derive(Default)]
pub struct InMemoryConfigurationRepository {
    configuration: RwLock<Option<SystemConfiguration>>,
}

impl InMemoryConfigurationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the stored configuration (test setup).
    pub fn with_configuration(configuration: SystemConfiguration) -> Self {
        Self {
            configuration: RwLock::new(Some(configuration)),
        }
    }
}

#[async_trait]
impl ConfigurationRepository for InMemoryConfigurationRepository {
    async fn get(&self) -> Result<SystemConfiguration, MergeQueueError> {
        Ok(self
            .configuration
            .read()
            .clone()
            .unwrap_or_default())
    }

    async fn save(&self, configuration: &SystemConfiguration) -> Result<(), MergeQueueError> {
        *self.configuration.write() = Some(configuration.clone());
        Ok(())
    }
}
