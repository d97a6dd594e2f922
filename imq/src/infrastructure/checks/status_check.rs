// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Status-Aggregate Check Executor
//!
//! Passes iff the hosting service's aggregated mergeable state is one of
//! `clean`, `unstable`, `has_hooks`. This is the cheap "are external status
//! checks green" probe: no workflow dispatch, a single PR fetch.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use imq_domain::entities::{Check, CheckResult, CheckStatus, PullRequest, Repository};
use imq_domain::services::check_executor::CheckExecutor;
use imq_domain::services::hosting_gateway::HostingGateway;
use imq_domain::MergeQueueError;

/// Verifies the aggregated status of a pull request.
pub struct StatusAggregateExecutor {
    gateway: Arc<dyn HostingGateway>,
}

impl StatusAggregateExecutor {
    pub fn new(gateway: Arc<dyn HostingGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl CheckExecutor for StatusAggregateExecutor {
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

        let status = if fresh.mergeable_state.is_acceptable_aggregate() {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        };
        Ok(CheckResult::finished(
            check,
            status,
            format!("aggregate state: {:?}", fresh.mergeable_state),
            started_at,
        ))
    }
}
