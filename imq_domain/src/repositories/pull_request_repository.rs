// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pull Request Repository Port
//!
//! Persistence contract for tracked pull requests and the repository
//! identities they belong to. Repository rows are written once (identity is
//! immutable); pull-request rows are upserted whenever the hosting service
//! reports a change and deleted when a PR closes or is pruned.

use async_trait::async_trait;

use crate::entities::pull_request::PullRequest;
use crate::entities::repository::Repository;
use crate::error::MergeQueueError;
use crate::value_objects::{PullRequestId, RepositoryId};

/// Persistence port for pull requests and repository identities.
#[async_trait]
pub trait PullRequestRepository: Send + Sync {
    /// Fetches a pull request by id.
    async fn find_by_id(&self, id: &PullRequestId)
        -> Result<Option<PullRequest>, MergeQueueError>;

    /// Fetches a pull request by its hosting-service number.
    async fn find_by_number(
        &self,
        repository_id: &RepositoryId,
        number: u64,
    ) -> Result<Option<PullRequest>, MergeQueueError>;

    /// Upserts a pull request.
    async fn save(&self, pull_request: &PullRequest) -> Result<(), MergeQueueError>;

    /// Deletes a pull request. Returns whether it existed.
    async fn delete(&self, id: &PullRequestId) -> Result<bool, MergeQueueError>;

    /// Fetches a repository identity by `(owner, name)`.
    async fn find_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Repository>, MergeQueueError>;

    /// Fetches a repository identity by id.
    async fn find_repository_by_id(
        &self,
        id: &RepositoryId,
    ) -> Result<Option<Repository>, MergeQueueError>;

    /// Inserts a repository identity if absent (identity is immutable).
    async fn save_repository(&self, repository: &Repository) -> Result<(), MergeQueueError>;
}
