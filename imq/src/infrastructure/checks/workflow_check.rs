// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Check Executor
//!
//! Dispatches the configured workflow with `ref = PR head SHA`, then polls
//! the resulting run at a bounded cadence (default every 10 s, at most 60
//! polls) until it completes. The check passes iff the run concludes with
//! `success`. Dispatch is asynchronous on the hosting service, so early
//! polls may not find a run yet; those count against the poll budget.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use imq_domain::entities::{Check, CheckKind, CheckResult, CheckStatus, PullRequest, Repository};
use imq_domain::services::check_executor::CheckExecutor;
use imq_domain::services::hosting_gateway::HostingGateway;
use imq_domain::MergeQueueError;

use std::sync::Arc;

/// Poll cadence for workflow runs.
#[derive(Debug, Clone)]
pub struct WorkflowPollSettings {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for WorkflowPollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_polls: 60,
        }
    }
}

/// Runs a hosting-service workflow to completion.
pub struct WorkflowCheckExecutor {
    gateway: Arc<dyn HostingGateway>,
    poll: WorkflowPollSettings,
}

impl WorkflowCheckExecutor {
    pub fn new(gateway: Arc<dyn HostingGateway>) -> Self {
        Self {
            gateway,
            poll: WorkflowPollSettings::default(),
        }
    }

    /// Overrides the poll cadence (tests use millisecond intervals).
    pub fn with_poll_settings(mut self, poll: WorkflowPollSettings) -> Self {
        self.poll = poll;
        self
    }
}

#[async_trait]
impl CheckExecutor for WorkflowCheckExecutor {
    async fn execute(
        &self,
        check: &Check,
        pull_request: &PullRequest,
        repository: &Repository,
    ) -> Result<CheckResult, MergeQueueError> {
        let started_at = Utc::now();
        let CheckKind::Workflow { workflow } = &check.kind else {
            return Err(MergeQueueError::invalid_config(format!(
                "check '{}' routed to the workflow executor without a workflow",
                check.id
            )));
        };

        let head_sha = pull_request.head_sha().as_str();
        self.gateway
            .trigger_workflow(repository, workflow, head_sha, serde_json::json!({}))
            .await?;
        debug!(workflow, sha = head_sha, "workflow dispatched");

        for poll in 0..self.poll.max_polls {
            tokio::time::sleep(self.poll.interval).await;

            let run = self
                .gateway
                .latest_workflow_run(repository, workflow, head_sha)
                .await?;
            match run {
                Some(run) if run.is_completed() => {
                    let status = if run.succeeded() {
                        CheckStatus::Passed
                    } else {
                        CheckStatus::Failed
                    };
                    let conclusion = run.conclusion.unwrap_or_else(|| "none".into());
                    return Ok(CheckResult::finished(
                        check,
                        status,
                        format!("workflow '{}' concluded: {}", workflow, conclusion),
                        started_at,
                    ));
                }
                Some(_) => {
                    debug!(workflow, poll, "workflow run still in progress");
                }
                None => {
                    debug!(workflow, poll, "workflow run not visible yet");
                }
            }
        }

        Ok(CheckResult::finished(
            check,
            CheckStatus::Failed,
            format!(
                "workflow '{}' did not complete within {} polls",
                workflow, self.poll.max_polls
            ),
            started_at,
        ))
    }
}
