// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pull Request Entity
//!
//! The domain's view of a hosting-service pull request. It is a snapshot:
//! the webhook ingress updates it when the hosting service reports a new head
//! SHA or a mergeability change, and the pipeline rewrites it after a branch
//! update. The entity is destroyed when the PR closes or is explicitly
//! pruned.
//!
//! ## Mutability
//!
//! Mutators (`update_head`, `mark_conflicted`, `mark_up_to_date`,
//! `update_details`) bump `updated_at` so repositories can detect staleness;
//! identity (`id`, `repository_id`, `number`) never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{CommitSha, PullRequestId, RepositoryId};

/// A pull request tracked by the merge queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    // Identity fields (always first)
    id: PullRequestId,
    repository_id: RepositoryId,
    number: u64,

    // Core business fields
    title: String,
    author: String,
    base_branch: String,
    head_branch: String,
    head_sha: CommitSha,
    is_conflicted: bool,
    is_up_to_date: bool,

    // Metadata fields (always last)
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Raw stored fields for reconstituting a [`PullRequest`] (repository use).
#[derive(Debug, Clone)]
pub struct PullRequestData {
    pub id: PullRequestId,
    pub repository_id: RepositoryId,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub base_branch: String,
    pub head_branch: String,
    pub head_sha: CommitSha,
    pub is_conflicted: bool,
    pub is_up_to_date: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PullRequest {
    /// Creates a new tracked pull request.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository_id: RepositoryId,
        number: u64,
        title: impl Into<String>,
        author: impl Into<String>,
        base_branch: impl Into<String>,
        head_branch: impl Into<String>,
        head_sha: CommitSha,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PullRequestId::new(),
            repository_id,
            number,
            title: title.into(),
            author: author.into(),
            base_branch: base_branch.into(),
            head_branch: head_branch.into(),
            head_sha,
            is_conflicted: false,
            is_up_to_date: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes a pull request from stored fields.
    pub fn from_database(data: PullRequestData) -> Self {
        Self {
            id: data.id,
            repository_id: data.repository_id,
            number: data.number,
            title: data.title,
            author: data.author,
            base_branch: data.base_branch,
            head_branch: data.head_branch,
            head_sha: data.head_sha,
            is_conflicted: data.is_conflicted,
            is_up_to_date: data.is_up_to_date,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    pub fn id(&self) -> &PullRequestId {
        &self.id
    }

    pub fn repository_id(&self) -> &RepositoryId {
        &self.repository_id
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    pub fn head_branch(&self) -> &str {
        &self.head_branch
    }

    pub fn head_sha(&self) -> &CommitSha {
        &self.head_sha
    }

    pub fn is_conflicted(&self) -> bool {
        self.is_conflicted
    }

    pub fn is_up_to_date(&self) -> bool {
        self.is_up_to_date
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn updated_at(&self) -> &DateTime<Utc> {
        &self.updated_at
    }

    /// Records a new head commit. A new head invalidates any previous
    /// conflict and up-to-date knowledge until the pipeline re-derives it.
    pub fn update_head(&mut self, head_sha: CommitSha) {
        if head_sha != self.head_sha {
            self.head_sha = head_sha;
            self.is_conflicted = false;
            self.is_up_to_date = false;
            self.updated_at = Utc::now();
        }
    }

    /// Marks the PR as conflicting with its base branch.
    pub fn mark_conflicted(&mut self) {
        self.is_conflicted = true;
        self.updated_at = Utc::now();
    }

    /// Marks the PR branch as current with its base branch, clearing any
    /// recorded conflict.
    pub fn mark_up_to_date(&mut self) {
        self.is_conflicted = false;
        self.is_up_to_date = true;
        self.updated_at = Utc::now();
    }

    /// Refreshes mutable details from a webhook payload (title and branch
    /// names can change on the hosting service).
    pub fn update_details(
        &mut self,
        title: impl Into<String>,
        base_branch: impl Into<String>,
        head_branch: impl Into<String>,
    ) {
        self.title = title.into();
        self.base_branch = base_branch.into();
        self.head_branch = head_branch.into();
        self.updated_at = Utc::now();
    }
}
