// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Check Executor Factory
//!
//! Resolves the executor for each [`CheckKind`]. Executors are built once at
//! construction and shared; an unknown kind resolves to a permissive
//! executor that passes by default (configuration additions on the hosting
//! service must never wedge the queue).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use imq_domain::entities::{Check, CheckKind, CheckResult, CheckStatus, PullRequest, Repository};
use imq_domain::services::check_executor::{CheckExecutor, CheckExecutorFactory};
use imq_domain::services::hosting_gateway::HostingGateway;
use imq_domain::MergeQueueError;

use crate::infrastructure::checks::{
    MergeabilityProbeExecutor, StatusAggregateExecutor, WorkflowCheckExecutor,
    WorkflowPollSettings,
};

/// Passes any check handed to it.
struct PermissiveExecutor;

#[async_trait]
impl CheckExecutor for PermissiveExecutor {
    async fn execute(
        &self,
        check: &Check,
        _pull_request: &PullRequest,
        _repository: &Repository,
    ) -> Result<CheckResult, MergeQueueError> {
        Ok(CheckResult::finished(
            check,
            CheckStatus::Passed,
            "unknown check kind, passing by default",
            Utc::now(),
        ))
    }
}

/// Gateway-backed executor factory.
pub struct GatewayExecutorFactory {
    workflow: Arc<dyn CheckExecutor>,
    status_aggregate: Arc<dyn CheckExecutor>,
    mergeability: Arc<dyn CheckExecutor>,
    permissive: Arc<dyn CheckExecutor>,
}

impl GatewayExecutorFactory {
    pub fn new(gateway: Arc<dyn HostingGateway>) -> Self {
        Self::with_poll_settings(gateway, WorkflowPollSettings::default())
    }

    pub fn with_poll_settings(
        gateway: Arc<dyn HostingGateway>,
        poll: WorkflowPollSettings,
    ) -> Self {
        Self {
            workflow: Arc::new(
                WorkflowCheckExecutor::new(Arc::clone(&gateway)).with_poll_settings(poll),
            ),
            status_aggregate: Arc::new(StatusAggregateExecutor::new(Arc::clone(&gateway))),
            mergeability: Arc::new(MergeabilityProbeExecutor::new(gateway)),
            permissive: Arc::new(PermissiveExecutor),
        }
    }
}

impl CheckExecutorFactory for GatewayExecutorFactory {
    fn executor_for(&self, kind: &CheckKind) -> Arc<dyn CheckExecutor> {
        match kind {
            CheckKind::Workflow { .. } => Arc::clone(&self.workflow),
            CheckKind::StatusAggregate => Arc::clone(&self.status_aggregate),
            CheckKind::MergeabilityProbe => Arc::clone(&self.mergeability),
            CheckKind::Unknown => Arc::clone(&self.permissive),
        }
    }
}
