// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hosting Gateway Port
//!
//! The domain's interface to the Git hosting service. Every method may fail
//! with a classified [`MergeQueueError`] variant (`Unauthorized`,
//! `Forbidden`, `NotFound`, `RateLimitExceeded`, `HttpError`,
//! `NetworkError`); the retry policy re-runs the retriable subset.
//!
//! The DTOs here are the *gateway's* view of the hosting service, distinct
//! from the domain [`PullRequest`](crate::entities::PullRequest) entity: they
//! carry mergeability fields the entity does not persist, and they exist only
//! for the duration of a pipeline stage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::repository::Repository;
use crate::error::MergeQueueError;

/// Relationship of a head commit to its base branch.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareStatus {
    Identical,
    Ahead,
    Behind,
    Diverged,
}

/// Result of comparing `base...head`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CompareResult {
    pub status: CompareStatus,
    pub ahead_by: u32,
    pub behind_by: u32,
}

/// Aggregated mergeability string reported by the hosting service.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeableState {
    Clean,
    Unstable,
    HasHooks,
    Behind,
    Dirty,
    Blocked,
    Draft,
    #[serde(other)]
    Unknown,
}

impl MergeableState {
    /// States the status-aggregate check accepts.
    pub fn is_acceptable_aggregate(&self) -> bool {
        matches!(
            self,
            MergeableState::Clean | MergeableState::Unstable | MergeableState::HasHooks
        )
    }
}

/// Gateway view of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPullRequest {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub base_branch: String,
    pub head_branch: String,
    pub head_sha: String,
    /// `None` while the hosting service is still computing mergeability.
    pub mergeable: Option<bool>,
    pub mergeable_state: MergeableState,
    pub labels: Vec<String>,
}

/// How the merge commit is produced.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    Squash,
    Merge,
    Rebase,
}

/// Result of a merge call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub merged: bool,
    pub sha: Option<String>,
    pub message: String,
}

/// Lifecycle status of a workflow run.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    Queued,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

/// A hosting-service workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub status: WorkflowRunStatus,
    /// Only meaningful once `status` is `Completed`; `"success"` means pass.
    pub conclusion: Option<String>,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status == WorkflowRunStatus::Completed
    }

    pub fn succeeded(&self) -> bool {
        self.is_completed() && self.conclusion.as_deref() == Some("success")
    }
}

/// Interface to the Git hosting service.
#[async_trait]
pub trait HostingGateway: Send + Sync {
    /// Fetches the current state of a pull request.
    async fn get_pull_request(
        &self,
        repository: &Repository,
        number: u64,
    ) -> Result<GatewayPullRequest, MergeQueueError>;

    /// Updates the PR branch with the latest base commits. Returns the new
    /// head SHA when the branch actually moved.
    async fn update_pull_request_branch(
        &self,
        repository: &Repository,
        number: u64,
        expected_head_sha: &str,
    ) -> Result<Option<String>, MergeQueueError>;

    /// Compares `base...head`.
    async fn compare_commits(
        &self,
        repository: &Repository,
        base: &str,
        head: &str,
    ) -> Result<CompareResult, MergeQueueError>;

    /// Merges the pull request.
    async fn merge_pull_request(
        &self,
        repository: &Repository,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeOutcome, MergeQueueError>;

    /// Posts a comment on the pull request.
    async fn post_comment(
        &self,
        repository: &Repository,
        number: u64,
        body: &str,
    ) -> Result<(), MergeQueueError>;

    /// Dispatches a workflow at the given ref.
    async fn trigger_workflow(
        &self,
        repository: &Repository,
        workflow: &str,
        git_ref: &str,
        inputs: serde_json::Value,
    ) -> Result<(), MergeQueueError>;

    /// Fetches a workflow run by id.
    async fn get_workflow_run(
        &self,
        repository: &Repository,
        run_id: u64,
    ) -> Result<WorkflowRun, MergeQueueError>;

    /// Finds the most recent run of a workflow for a head SHA, if any exists
    /// yet. Dispatch is asynchronous on the hosting service, so polling may
    /// observe `None` for a short while after `trigger_workflow`.
    async fn latest_workflow_run(
        &self,
        repository: &Repository,
        workflow: &str,
        head_sha: &str,
    ) -> Result<Option<WorkflowRun>, MergeQueueError>;
}
