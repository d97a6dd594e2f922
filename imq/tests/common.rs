// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Common Test Helpers
//!
//! Shared fixtures for the integration suites: a scripted hosting-service
//! gateway, a recording queue repository, an event collector, scripted check
//! executors, and webhook payload builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use imq_domain::entities::{
    Check, CheckResult, CheckStatus, EntryStatus, PullRequest, Queue, QueueEntry, Repository,
};
use imq_domain::repositories::QueueRepository;
use imq_domain::services::check_executor::{CheckExecutor, CheckExecutorFactory};
use imq_domain::services::hosting_gateway::{
    CompareResult, CompareStatus, GatewayPullRequest, HostingGateway, MergeMethod, MergeOutcome,
    MergeableState, WorkflowRun,
};
use imq_domain::value_objects::{CommitSha, QueueEntryId, QueueId, RepositoryId};
use imq_domain::{MergeQueueError, QueueEvent};

use imq::infrastructure::event_bus::{EventBus, EventHandler};
use imq::infrastructure::repositories::InMemoryQueueRepository;

pub const HEAD_SHA: &str = "a1b2c3d4e5f6a7b8c9d0a1b2c3d4e5f6a7b8c9d0";
pub const UPDATED_SHA: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c";

// ---- Scripted gateway ----------------------------------------------------

/// Hosting-service gateway with scripted responses and recorded calls.
pub struct MockGateway {
    pub compare: Mutex<Result<CompareResult, MergeQueueError>>,
    /// New head SHA returned by `update_pull_request_branch`.
    pub update_result: Mutex<Result<Option<String>, MergeQueueError>>,
    pub pull_request: Mutex<GatewayPullRequest>,
    pub merge_result: Mutex<Result<MergeOutcome, MergeQueueError>>,
    pub workflow_run: Mutex<Option<WorkflowRun>>,
    pub comments: Mutex<Vec<String>>,
    pub dispatched_workflows: Mutex<Vec<(String, String)>>,
}

impl MockGateway {
    /// A gateway whose every stage succeeds: ahead of base, update yields a
    /// new head, PR mergeable and clean, merge succeeds.
    pub fn happy() -> Arc<Self> {
        Arc::new(Self {
            compare: Mutex::new(Ok(CompareResult {
                status: CompareStatus::Ahead,
                ahead_by: 1,
                behind_by: 0,
            })),
            update_result: Mutex::new(Ok(Some(UPDATED_SHA.to_string()))),
            pull_request: Mutex::new(GatewayPullRequest {
                number: 42,
                title: "Add widgets".into(),
                author: "octocat".into(),
                base_branch: "main".into(),
                head_branch: "feature/widgets".into(),
                head_sha: UPDATED_SHA.into(),
                mergeable: Some(true),
                mergeable_state: MergeableState::Clean,
                labels: vec!["A-merge".into()],
            }),
            merge_result: Mutex::new(Ok(MergeOutcome {
                merged: true,
                sha: Some(UPDATED_SHA.to_string()),
                message: "merged".into(),
            })),
            workflow_run: Mutex::new(None),
            comments: Mutex::new(Vec::new()),
            dispatched_workflows: Mutex::new(Vec::new()),
        })
    }

    pub fn comment_count(&self) -> usize {
        self.comments.lock().len()
    }
}

#[async_trait]
impl HostingGateway for MockGateway {
    async fn get_pull_request(
        &self,
        _repository: &Repository,
        _number: u64,
    ) -> Result<GatewayPullRequest, MergeQueueError> {
        Ok(self.pull_request.lock().clone())
    }

    async fn update_pull_request_branch(
        &self,
        _repository: &Repository,
        _number: u64,
        _expected_head_sha: &str,
    ) -> Result<Option<String>, MergeQueueError> {
        self.update_result.lock().clone()
    }

    async fn compare_commits(
        &self,
        _repository: &Repository,
        _base: &str,
        _head: &str,
    ) -> Result<CompareResult, MergeQueueError> {
        self.compare.lock().clone()
    }

    async fn merge_pull_request(
        &self,
        _repository: &Repository,
        _number: u64,
        _method: MergeMethod,
    ) -> Result<MergeOutcome, MergeQueueError> {
        self.merge_result.lock().clone()
    }

    async fn post_comment(
        &self,
        _repository: &Repository,
        _number: u64,
        body: &str,
    ) -> Result<(), MergeQueueError> {
        self.comments.lock().push(body.to_string());
        Ok(())
    }

    async fn trigger_workflow(
        &self,
        _repository: &Repository,
        workflow: &str,
        git_ref: &str,
        _inputs: serde_json::Value,
    ) -> Result<(), MergeQueueError> {
        self.dispatched_workflows
            .lock()
            .push((workflow.to_string(), git_ref.to_string()));
        Ok(())
    }

    async fn get_workflow_run(
        &self,
        _repository: &Repository,
        _run_id: u64,
    ) -> Result<WorkflowRun, MergeQueueError> {
        self.workflow_run
            .lock()
            .clone()
            .ok_or_else(|| MergeQueueError::NotFound("no scripted run".into()))
    }

    async fn latest_workflow_run(
        &self,
        _repository: &Repository,
        _workflow: &str,
        _head_sha: &str,
    ) -> Result<Option<WorkflowRun>, MergeQueueError> {
        Ok(self.workflow_run.lock().clone())
    }
}

// ---- Recording queue repository -----------------------------------------

/// Queue repository that records every status written through
/// `update_entry`, for asserting the pipeline's persisted trace.
#[derive(Default)]
pub struct RecordingQueueRepository {
    inner: InMemoryQueueRepository,
    pub status_trace: Mutex<Vec<EntryStatus>>,
}

impl RecordingQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trace(&self) -> Vec<EntryStatus> {
        self.status_trace.lock().clone()
    }
}

#[async_trait]
impl QueueRepository for RecordingQueueRepository {
    async fn find_all(&self) -> Result<Vec<Queue>, MergeQueueError> {
        self.inner.find_all().await
    }

    async fn find(
        &self,
        repository_id: &RepositoryId,
        base_branch: &str,
    ) -> Result<Option<Queue>, MergeQueueError> {
        self.inner.find(repository_id, base_branch).await
    }

    async fn find_by_id(&self, id: &QueueId) -> Result<Option<Queue>, MergeQueueError> {
        self.inner.find_by_id(id).await
    }

    async fn save(&self, queue: &Queue) -> Result<(), MergeQueueError> {
        self.inner.save(queue).await
    }

    async fn delete(&self, id: &QueueId) -> Result<bool, MergeQueueError> {
        self.inner.delete(id).await
    }

    async fn update_entry(&self, entry: &QueueEntry) -> Result<(), MergeQueueError> {
        self.status_trace.lock().push(entry.status());
        self.inner.update_entry(entry).await
    }

    async fn remove_entry(
        &self,
        queue_id: &QueueId,
        entry_id: &QueueEntryId,
    ) -> Result<bool, MergeQueueError> {
        self.inner.remove_entry(queue_id, entry_id).await
    }

    async fn get_entries(&self, queue_id: &QueueId) -> Result<Vec<QueueEntry>, MergeQueueError> {
        self.inner.get_entries(queue_id).await
    }

    async fn reorder_entries(
        &self,
        queue_id: &QueueId,
        ordered: &[QueueEntryId],
    ) -> Result<(), MergeQueueError> {
        self.inner.reorder_entries(queue_id, ordered).await
    }
}

// ---- Event collector -----------------------------------------------------

/// Event-bus subscriber that records everything it sees.
#[derive(Default)]
pub struct EventCollector {
    events: Mutex<Vec<QueueEvent>>,
}

impl EventCollector {
    pub fn subscribe_to(bus: &EventBus) -> Arc<Self> {
        let collector = Arc::new(Self::default());
        bus.subscribe(collector.clone());
        collector
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(QueueEvent::event_type).collect()
    }

    pub fn count_of(&self, event_type: &str) -> usize {
        self.event_types()
            .iter()
            .filter(|t| **t == event_type)
            .count()
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl EventHandler for EventCollector {
    fn name(&self) -> &str {
        "collector"
    }

    async fn handle(&self, event: &QueueEvent) -> Result<(), MergeQueueError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Lets spawn-per-handler event deliveries land before asserting.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ---- Scripted check executors --------------------------------------------

/// Outcome scripted for one check id.
#[derive(Debug, Clone)]
pub struct ScriptedOutcome {
    pub status: CheckStatus,
    pub delay: Duration,
}

impl ScriptedOutcome {
    pub fn instant(status: CheckStatus) -> Self {
        Self {
            status,
            delay: Duration::ZERO,
        }
    }

    pub fn after(status: CheckStatus, delay: Duration) -> Self {
        Self { status, delay }
    }
}

/// Executor + factory producing scripted outcomes by check id. Unknown ids
/// pass instantly.
#[derive(Default)]
pub struct ScriptedFactory {
    outcomes: Mutex<HashMap<String, ScriptedOutcome>>,
}

impl ScriptedFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, check_id: &str, outcome: ScriptedOutcome) {
        self.outcomes.lock().insert(check_id.to_string(), outcome);
    }
}

struct ScriptedExecutor {
    outcomes: HashMap<String, ScriptedOutcome>,
}

#[async_trait]
impl CheckExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        check: &Check,
        _pull_request: &PullRequest,
        _repository: &Repository,
    ) -> Result<CheckResult, MergeQueueError> {
        let outcome = self
            .outcomes
            .get(check.id.as_str())
            .cloned()
            .unwrap_or_else(|| ScriptedOutcome::instant(CheckStatus::Passed));
        if outcome.delay > Duration::ZERO {
            tokio::time::sleep(outcome.delay).await;
        }
        Ok(CheckResult::finished(
            check,
            outcome.status,
            "scripted",
            Utc::now(),
        ))
    }
}

impl CheckExecutorFactory for ScriptedFactory {
    fn executor_for(&self, _kind: &imq_domain::CheckKind) -> Arc<dyn CheckExecutor> {
        Arc::new(ScriptedExecutor {
            outcomes: self.outcomes.lock().clone(),
        })
    }
}

// ---- Fixtures ------------------------------------------------------------

/// A tracked repository + pull request + single-entry queue, ready for the
/// pipeline.
pub struct SeededQueue {
    pub repository: Repository,
    pub pull_request: PullRequest,
    pub queue: Queue,
}

pub fn seed_queue(base_branch: &str) -> SeededQueue {
    let repository = Repository::new("octo", "hello", "main").unwrap();
    let pull_request = PullRequest::new(
        *repository.id(),
        42,
        "Add widgets",
        "octocat",
        base_branch,
        "feature/widgets",
        CommitSha::new(HEAD_SHA).unwrap(),
    );
    let mut queue = Queue::new(*repository.id(), base_branch).unwrap();
    queue.add_entry(*pull_request.id()).unwrap();
    SeededQueue {
        repository,
        pull_request,
        queue,
    }
}

// ---- Pipeline harness ----------------------------------------------------

use imq::application::services::{CheckEngine, EntryPipeline};
use imq::infrastructure::cache::{CacheConfig, ResultCache};
use imq::infrastructure::metrics::MetricsService;
use imq::infrastructure::runtime::RetryPolicy;
use imq_domain::entities::{CheckConfiguration, SystemConfiguration};
use imq_domain::repositories::{ConfigurationRepository, PullRequestRepository};
use imq::infrastructure::repositories::{
    InMemoryConfigurationRepository, InMemoryPullRequestRepository,
};

/// Fully wired pipeline over in-memory repositories and the scripted
/// gateway/executors.
pub struct PipelineHarness {
    pub queue_repository: Arc<RecordingQueueRepository>,
    pub pull_request_repository: Arc<InMemoryPullRequestRepository>,
    pub configuration_repository: Arc<InMemoryConfigurationRepository>,
    pub gateway: Arc<MockGateway>,
    pub factory: Arc<ScriptedFactory>,
    pub cache: Arc<ResultCache>,
    pub event_bus: Arc<EventBus>,
    pub events: Arc<EventCollector>,
    pub metrics: Arc<MetricsService>,
    pub pipeline: Arc<EntryPipeline>,
    pub engine: Arc<CheckEngine>,
}

impl PipelineHarness {
    pub fn new() -> Self {
        Self::with_checks(CheckConfiguration::empty())
    }

    pub fn with_checks(checks: CheckConfiguration) -> Self {
        let queue_repository = Arc::new(RecordingQueueRepository::new());
        let pull_request_repository = Arc::new(InMemoryPullRequestRepository::new());
        let mut configuration = SystemConfiguration::default();
        configuration.set_check_configuration(checks);
        let configuration_repository =
            Arc::new(InMemoryConfigurationRepository::with_configuration(configuration));
        let gateway = MockGateway::happy();
        let factory = ScriptedFactory::new();
        let cache = Arc::new(ResultCache::new(CacheConfig::default()));
        let event_bus = Arc::new(EventBus::new());
        let events = EventCollector::subscribe_to(&event_bus);
        let metrics = Arc::new(MetricsService::new().unwrap());

        let engine = Arc::new(CheckEngine::new(
            factory.clone() as Arc<dyn CheckExecutorFactory>,
            Arc::clone(&cache),
            Arc::clone(&event_bus),
            Arc::clone(&metrics),
        ));
        let pipeline = Arc::new(EntryPipeline::new(
            queue_repository.clone() as Arc<dyn QueueRepository>,
            pull_request_repository.clone() as Arc<dyn PullRequestRepository>,
            configuration_repository.clone() as Arc<dyn ConfigurationRepository>,
            gateway.clone() as Arc<dyn HostingGateway>,
            Arc::clone(&engine),
            Arc::clone(&cache),
            Arc::clone(&event_bus),
            Arc::clone(&metrics),
            RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(2))
                .without_jitter(),
        ));

        Self {
            queue_repository,
            pull_request_repository,
            configuration_repository,
            gateway,
            factory,
            cache,
            event_bus,
            events,
            metrics,
            pipeline,
            engine,
        }
    }

    /// Persists the seeded fixtures so the pipeline can load them.
    pub async fn seed(&self, seeded: &SeededQueue) {
        self.pull_request_repository
            .save_repository(&seeded.repository)
            .await
            .unwrap();
        self.pull_request_repository
            .save(&seeded.pull_request)
            .await
            .unwrap();
        self.queue_repository.save(&seeded.queue).await.unwrap();
    }
}

impl Default for PipelineHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ---- Webhook payload builders --------------------------------------------

/// Builds a `pull_request` event body.
pub fn pull_request_event(
    action: &str,
    number: u64,
    labels: &[&str],
    base_branch: &str,
    head_sha: &str,
) -> Vec<u8> {
    let labels: Vec<serde_json::Value> = labels
        .iter()
        .map(|name| serde_json::json!({ "name": name }))
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "action": action,
        "pull_request": {
            "number": number,
            "title": "Add widgets",
            "user": { "login": "octocat" },
            "labels": labels,
            "head": { "ref": "feature/widgets", "sha": head_sha },
            "base": { "ref": base_branch, "sha": "0011223344556677" }
        },
        "repository": {
            "name": "hello",
            "owner": { "login": "octo" },
            "default_branch": "main"
        }
    }))
    .unwrap()
}
