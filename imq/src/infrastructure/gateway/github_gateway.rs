// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # GitHub Gateway
//!
//! reqwest-based implementation of [`HostingGateway`] against the GitHub
//! REST API. Every HTTP failure is classified into a domain error variant at
//! this boundary (`Unauthorized`, `Forbidden`, `NotFound`,
//! `RateLimitExceeded`, `HttpError`, `NetworkError`), so nothing above the
//! gateway ever sees a raw status code.
//!
//! ## Endpoint map
//!
//! | Port method | Endpoint |
//! |---|---|
//! | `get_pull_request` | `GET /repos/{owner}/{repo}/pulls/{n}` |
//! | `update_pull_request_branch` | `PUT /repos/{owner}/{repo}/pulls/{n}/update-branch` |
//! | `compare_commits` | `GET /repos/{owner}/{repo}/compare/{base}...{head}` |
//! | `merge_pull_request` | `PUT /repos/{owner}/{repo}/pulls/{n}/merge` |
//! | `post_comment` | `POST /repos/{owner}/{repo}/issues/{n}/comments` |
//! | `trigger_workflow` | `POST /repos/{owner}/{repo}/actions/workflows/{wf}/dispatches` |
//! | `get_workflow_run` | `GET /repos/{owner}/{repo}/actions/runs/{id}` |
//! | `latest_workflow_run` | `GET /repos/{owner}/{repo}/actions/workflows/{wf}/runs?head_sha=...` |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use imq_domain::entities::Repository;
use imq_domain::services::hosting_gateway::{
    CompareResult, CompareStatus, GatewayPullRequest, HostingGateway, MergeMethod, MergeOutcome,
    MergeableState, WorkflowRun, WorkflowRunStatus,
};
use imq_domain::MergeQueueError;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// GitHub REST API adapter.
pub struct GitHubGateway {
    client: reqwest::Client,
    api_base: String,
}

impl GitHubGateway {
    /// Builds the adapter with a bearer token.
    pub fn new(token: &str) -> Result<Self, MergeQueueError> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Builds the adapter against a non-default API base (enterprise hosts
    /// and test servers).
    pub fn with_api_base(token: &str, api_base: &str) -> Result<Self, MergeQueueError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| MergeQueueError::invalid_config("token contains invalid characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("imq-merge-queue"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                MergeQueueError::invalid_config(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Classifies a non-success response into a domain error.
    async fn classify(response: Response) -> MergeQueueError {
        let status = response.status();
        let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN
                && response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    == Some("0"));
        let reset_at: Option<DateTime<Utc>> = response
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|epoch| DateTime::<Utc>::from_timestamp(epoch, 0));
        let message = response.text().await.unwrap_or_default();

        if rate_limited {
            return MergeQueueError::RateLimitExceeded { reset_at };
        }
        match status {
            StatusCode::UNAUTHORIZED => MergeQueueError::Unauthorized(message),
            StatusCode::FORBIDDEN => MergeQueueError::Forbidden(message),
            StatusCode::NOT_FOUND => MergeQueueError::NotFound(message),
            other => MergeQueueError::HttpError {
                status: other.as_u16(),
                message,
            },
        }
    }

    fn transport_error(error: reqwest::Error) -> MergeQueueError {
        if error.is_timeout() {
            MergeQueueError::timeout(error.to_string())
        } else {
            MergeQueueError::network_error(error.to_string())
        }
    }
}

// ---- API response shapes -------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    branch: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: String,
    user: ApiUser,
    base: ApiRef,
    head: ApiRef,
    mergeable: Option<bool>,
    #[serde(default)]
    mergeable_state: Option<MergeableState>,
    #[serde(default)]
    labels: Vec<ApiLabel>,
}

impl From<ApiPullRequest> for GatewayPullRequest {
    fn from(api: ApiPullRequest) -> Self {
        Self {
            number: api.number,
            title: api.title,
            author: api.user.login,
            base_branch: api.base.branch,
            head_branch: api.head.branch,
            head_sha: api.head.sha,
            mergeable: api.mergeable,
            mergeable_state: api.mergeable_state.unwrap_or(MergeableState::Unknown),
            labels: api.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiCompare {
    status: CompareStatus,
    #[serde(default)]
    ahead_by: u32,
    #[serde(default)]
    behind_by: u32,
}

#[derive(Debug, Deserialize)]
struct ApiMerge {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiWorkflowRun {
    id: u64,
    status: WorkflowRunStatus,
    conclusion: Option<String>,
}

impl From<ApiWorkflowRun> for WorkflowRun {
    fn from(api: ApiWorkflowRun) -> Self {
        Self {
            id: api.id,
            status: api.status,
            conclusion: api.conclusion,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiWorkflowRuns {
    #[serde(default)]
    workflow_runs: Vec<ApiWorkflowRun>,
}

// ---- Port implementation -------------------------------------------------

#[async_trait]
impl HostingGateway for GitHubGateway {
    async fn get_pull_request(
        &self,
        repository: &Repository,
        number: u64,
    ) -> Result<GatewayPullRequest, MergeQueueError> {
        let url = self.url(&format!(
            "/repos/{}/{}/pulls/{}",
            repository.owner(),
            repository.name(),
            number
        ));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::transport_error)?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        let api: ApiPullRequest = response.json().await.map_err(Self::transport_error)?;
        Ok(api.into())
    }

    async fn update_pull_request_branch(
        &self,
        repository: &Repository,
        number: u64,
        expected_head_sha: &str,
    ) -> Result<Option<String>, MergeQueueError> {
        let url = self.url(&format!(
            "/repos/{}/{}/pulls/{}/update-branch",
            repository.owner(),
            repository.name(),
            number
        ));
        let response = self
            .client
            .put(url)
            .json(&serde_json::json!({ "expected_head_sha": expected_head_sha }))
            .send()
            .await
            .map_err(Self::transport_error)?;

        match response.status() {
            StatusCode::ACCEPTED => {
                // The update lands asynchronously; re-fetch for the new head.
                let fresh = self.get_pull_request(repository, number).await?;
                if fresh.head_sha != expected_head_sha {
                    debug!(pr = number, sha = %fresh.head_sha, "branch update produced new head");
                    Ok(Some(fresh.head_sha))
                } else {
                    Ok(None)
                }
            }
            // Already up to date with the base branch.
            StatusCode::UNPROCESSABLE_ENTITY => Ok(None),
            _ => Err(Self::classify(response).await),
        }
    }

    async fn compare_commits(
        &self,
        repository: &Repository,
        base: &str,
        head: &str,
    ) -> Result<CompareResult, MergeQueueError> {
        let url = self.url(&format!(
            "/repos/{}/{}/compare/{}...{}",
            repository.owner(),
            repository.name(),
            base,
            head
        ));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::transport_error)?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        let api: ApiCompare = response.json().await.map_err(Self::transport_error)?;
        Ok(CompareResult {
            status: api.status,
            ahead_by: api.ahead_by,
            behind_by: api.behind_by,
        })
    }

    async fn merge_pull_request(
        &self,
        repository: &Repository,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeOutcome, MergeQueueError> {
        let method_name = match method {
            MergeMethod::Squash => "squash",
            MergeMethod::Merge => "merge",
            MergeMethod::Rebase => "rebase",
        };
        let url = self.url(&format!(
            "/repos/{}/{}/pulls/{}/merge",
            repository.owner(),
            repository.name(),
            number
        ));
        let response = self
            .client
            .put(url)
            .json(&serde_json::json!({ "merge_method": method_name }))
            .send()
            .await
            .map_err(Self::transport_error)?;

        match response.status() {
            status if status.is_success() => {
                let api: ApiMerge = response.json().await.map_err(Self::transport_error)?;
                Ok(MergeOutcome {
                    merged: api.merged,
                    sha: api.sha,
                    message: api.message,
                })
            }
            // 405: not mergeable; 409: head moved under us.
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::CONFLICT => {
                let message = response.text().await.unwrap_or_default();
                Err(MergeQueueError::NotMergeable(message))
            }
            _ => Err(Self::classify(response).await),
        }
    }

    async fn post_comment(
        &self,
        repository: &Repository,
        number: u64,
        body: &str,
    ) -> Result<(), MergeQueueError> {
        let url = self.url(&format!(
            "/repos/{}/{}/issues/{}/comments",
            repository.owner(),
            repository.name(),
            number
        ));
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .map_err(Self::transport_error)?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Ok(())
    }

    async fn trigger_workflow(
        &self,
        repository: &Repository,
        workflow: &str,
        git_ref: &str,
        inputs: serde_json::Value,
    ) -> Result<(), MergeQueueError> {
        let url = self.url(&format!(
            "/repos/{}/{}/actions/workflows/{}/dispatches",
            repository.owner(),
            repository.name(),
            workflow
        ));
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "ref": git_ref, "inputs": inputs }))
            .send()
            .await
            .map_err(Self::transport_error)?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Ok(())
    }

    async fn get_workflow_run(
        &self,
        repository: &Repository,
        run_id: u64,
    ) -> Result<WorkflowRun, MergeQueueError> {
        let url = self.url(&format!(
            "/repos/{}/{}/actions/runs/{}",
            repository.owner(),
            repository.name(),
            run_id
        ));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::transport_error)?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        let api: ApiWorkflowRun = response.json().await.map_err(Self::transport_error)?;
        Ok(api.into())
    }

    async fn latest_workflow_run(
        &self,
        repository: &Repository,
        workflow: &str,
        head_sha: &str,
    ) -> Result<Option<WorkflowRun>, MergeQueueError> {
        let url = self.url(&format!(
            "/repos/{}/{}/actions/workflows/{}/runs",
            repository.owner(),
            repository.name(),
            workflow
        ));
        let response = self
            .client
            .get(url)
            .query(&[("head_sha", head_sha), ("per_page", "1")])
            .send()
            .await
            .map_err(Self::transport_error)?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        let api: ApiWorkflowRuns = response.json().await.map_err(Self::transport_error)?;
        Ok(api.workflow_runs.into_iter().next().map(Into::into))
    }
}
