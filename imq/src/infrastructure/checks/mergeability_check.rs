// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Mergeability-Probe Check Executor
//!
//! Passes iff the hosting service reports `mergeable == true` and the
//! aggregate state is neither `dirty` (conflicts) nor `blocked` (branch
//! protection). Catches conflicts that appeared after the conflict-detection
//! stage ran, before the merge attempt burns an API call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use imq_domain::entities::{Check, CheckResult, CheckStatus, PullRequest, Repository};
use imq_domain::services::check_executor::CheckExecutor;
use imq_domain::services::hosting_gateway::{HostingGateway, MergeableState};
use imq_domain::MergeQueueError;

/// Probes whether a pull request can be merged right now.
pub struct MergeabilityProbeExecutor {
    gateway: Arc<dyn HostingGateway>,
}

impl MergeabilityProbeExecutor {
    pub fn new(gateway: Arc<dyn HostingGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl CheckExecutor for MergeabilityProbeExecutor {
    async fn execute(
        &self,
        check: &Check,
        pull_request: &PullRequest,
        repository: &Repository,
    ) -> Result<CheckResult, MergeQueueError> {
        let started_at = Utc::now();
        let fresh = self
            .gateway
            .get_pull_request(repository, pull_request.number())
            .await?;

        let blocked = matches!(
            fresh.mergeable_state,
            MergeableState::Dirty | MergeableState::Blocked
        );
        let status = if fresh.mergeable == Some(true) && !blocked {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        };
        Ok(CheckResult::finished(
            check,
            status,
            format!(
                "mergeable: {:?}, state: {:?}",
                fresh.mergeable, fresh.mergeable_state
            ),
            started_at,
        ))
    }
}
