// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Check-Execution Engine
//!
//! Runs a [`CheckConfiguration`] against one pull request head:
//!
//! 1. **Validation** -- cyclic graphs and unknown dependency ids are rejected
//!    with `InvalidConfiguration` before anything runs.
//! 2. **Level scheduling** -- checks are grouped by dependency depth; one
//!    level's checks run in parallel, the next level starts only when the
//!    previous one has terminated.
//! 3. **Skipping** -- a check whose dependency did not pass (failed, skipped,
//!    or cancelled) is recorded as `skipped`, never run.
//! 4. **Fail-fast** -- with `fail_fast`, the first `failed` result aborts the
//!    siblings still running at that level (recorded as `cancelled`) and no
//!    later level starts (recorded as `skipped`).
//! 5. **Caching** -- before dispatch the engine probes the result cache with
//!    `(head SHA, check name)` and serves hits; terminal pass/fail results
//!    are stored with the configured TTL.
//!
//! Results come back in the original configuration order regardless of
//! execution order. Per-check timeouts produce `failed` results naming the
//! deadline; executor infrastructure errors are folded into `failed` results
//! rather than aborting the whole run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use imq_domain::entities::{
    Check, CheckConfiguration, CheckExecutionResult, CheckId, CheckResult, CheckStatus,
    PullRequest, Repository,
};
use imq_domain::services::check_executor::CheckExecutorFactory;
use imq_domain::{MergeQueueError, QueueEvent};

use crate::infrastructure::cache::ResultCache;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::metrics::MetricsService;

/// Level-parallel check runner.
pub struct CheckEngine {
    factory: Arc<dyn CheckExecutorFactory>,
    cache: Arc<ResultCache>,
    event_bus: Arc<EventBus>,
    metrics: Arc<MetricsService>,
}

impl CheckEngine {
    pub fn new(
        factory: Arc<dyn CheckExecutorFactory>,
        cache: Arc<ResultCache>,
        event_bus: Arc<EventBus>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            factory,
            cache,
            event_bus,
            metrics,
        }
    }

    /// Executes the configuration for a pull request head.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a bad dependency graph. Individual
    /// check failures are reported through the result set, not as errors.
    pub async fn execute(
        &self,
        configuration: &CheckConfiguration,
        pull_request: &PullRequest,
        repository: &Repository,
    ) -> Result<CheckExecutionResult, MergeQueueError> {
        if configuration.is_empty() {
            debug!("no checks configured, skipping stage");
            return Ok(CheckExecutionResult::empty());
        }
        configuration.validate()?;

        let levels: Vec<Vec<Check>> = configuration
            .levels()?
            .into_iter()
            .map(|level| level.into_iter().cloned().collect())
            .collect();

        let mut results: HashMap<CheckId, CheckResult> = HashMap::new();
        let mut not_passed: HashSet<CheckId> = HashSet::new();
        let mut halted = false;

        for level in levels {
            if halted {
                for check in &level {
                    self.record_static(
                        &mut results,
                        &mut not_passed,
                        check,
                        CheckStatus::Skipped,
                        "not run: an earlier check failed with fail-fast enabled",
                        pull_request,
                    );
                }
                continue;
            }

            let mut join_set: JoinSet<(CheckId, CheckResult)> = JoinSet::new();
            let mut spawned: HashMap<tokio::task::Id, Check> = HashMap::new();

            for check in &level {
                if let Some(dep) = check.depends_on.iter().find(|d| not_passed.contains(d)) {
                    self.record_static(
                        &mut results,
                        &mut not_passed,
                        check,
                        CheckStatus::Skipped,
                        format!("dependency '{}' did not pass", dep),
                        pull_request,
                    );
                    continue;
                }

                let factory = Arc::clone(&self.factory);
                let cache = Arc::clone(&self.cache);
                let event_bus = Arc::clone(&self.event_bus);
                let metrics = Arc::clone(&self.metrics);
                let task_check = check.clone();
                let pull_request = pull_request.clone();
                let repository = repository.clone();

                let handle = join_set.spawn(async move {
                    let id = task_check.id.clone();
                    let result = run_single(
                        factory,
                        cache,
                        event_bus,
                        metrics,
                        &task_check,
                        &pull_request,
                        &repository,
                    )
                    .await;
                    (id, result)
                });
                spawned.insert(handle.id(), check.clone());
            }

            while let Some(joined) = join_set.join_next_with_id().await {
                match joined {
                    Ok((task_id, (check_id, result))) => {
                        spawned.remove(&task_id);
                        let failed = result.status == CheckStatus::Failed;
                        if !result.passed() {
                            not_passed.insert(check_id.clone());
                        }
                        results.insert(check_id, result);

                        if failed && configuration.fail_fast && !halted {
                            debug!("fail-fast triggered, aborting sibling checks");
                            halted = true;
                            join_set.abort_all();
                        }
                    }
                    Err(join_error) => {
                        // Aborted siblings land here; panics are demoted to
                        // failed results below via the spawned map.
                        if !join_error.is_cancelled() {
                            warn!(error = %join_error, "check task panicked");
                        }
                        if let Some(check) = spawned.remove(&join_error.id()) {
                            let status = if join_error.is_cancelled() {
                                CheckStatus::Cancelled
                            } else {
                                CheckStatus::Failed
                            };
                            let output = if join_error.is_cancelled() {
                                "cancelled by fail-fast".to_string()
                            } else {
                                format!("check task panicked: {}", join_error)
                            };
                            self.record_static(
                                &mut results,
                                &mut not_passed,
                                &check,
                                status,
                                output,
                                pull_request,
                            );
                        }
                    }
                }
            }
        }

        // Original input order, not level order.
        let ordered: Vec<CheckResult> = configuration
            .checks
            .iter()
            .filter_map(|check| results.remove(&check.id))
            .collect();
        Ok(CheckExecutionResult::from_results(ordered))
    }

    /// Records a result that did not come from an executor run (skips,
    /// cancellations, panics).
    fn record_static(
        &self,
        results: &mut HashMap<CheckId, CheckResult>,
        not_passed: &mut HashSet<CheckId>,
        check: &Check,
        status: CheckStatus,
        output: impl Into<String>,
        pull_request: &PullRequest,
    ) {
        let result = CheckResult::finished(check, status, output, Utc::now());
        self.metrics.record_check_executed(status, 0.0);
        self.event_bus.publish(QueueEvent::check_completed(
            pull_request.number(),
            check.name.clone(),
            status,
        ));
        not_passed.insert(check.id.clone());
        results.insert(check.id.clone(), result);
    }
}

/// Runs one check: cache probe, dispatch with optional timeout, cache store,
/// event emission. Never returns an error; infrastructure failures become
/// `failed` results so sibling checks keep their own verdicts.
async fn run_single(
    factory: Arc<dyn CheckExecutorFactory>,
    cache: Arc<ResultCache>,
    event_bus: Arc<EventBus>,
    metrics: Arc<MetricsService>,
    check: &Check,
    pull_request: &PullRequest,
    repository: &Repository,
) -> CheckResult {
    let started_at = Utc::now();
    let started = std::time::Instant::now();

    if let Some(status) = cache.get(pull_request.head_sha(), &check.name) {
        metrics.record_cache_hit();
        metrics.record_check_executed(status, 0.0);
        debug!(check = %check.name, sha = %pull_request.head_sha().short(), "served from result cache");
        event_bus.publish(QueueEvent::check_completed(
            pull_request.number(),
            check.name.clone(),
            status,
        ));
        return CheckResult::finished(check, status, "served from result cache", started_at);
    }
    metrics.record_cache_miss();

    event_bus.publish(QueueEvent::check_started(
        pull_request.number(),
        check.name.clone(),
        pull_request.head_sha().clone(),
    ));

    let executor = factory.executor_for(&check.kind);
    let execution = executor.execute(check, pull_request, repository);

    let result = match check.timeout_secs {
        Some(secs) => {
            match tokio::time::timeout(Duration::from_secs(secs), execution).await {
                Ok(outcome) => outcome,
                Err(_elapsed) => Ok(CheckResult::finished(
                    check,
                    CheckStatus::Failed,
                    format!("timed out after {}s", secs),
                    started_at,
                )),
            }
        }
        None => execution.await,
    };

    let result = match result {
        Ok(result) => result,
        Err(error) => CheckResult::finished(
            check,
            CheckStatus::Failed,
            format!("executor error: {}", error),
            started_at,
        ),
    };

    if matches!(result.status, CheckStatus::Passed | CheckStatus::Failed) {
        cache.set(
            pull_request.head_sha().clone(),
            check.name.clone(),
            result.status,
        );
    }

    metrics.record_check_executed(result.status, started.elapsed().as_secs_f64());
    match result.status {
        CheckStatus::Failed => event_bus.publish(QueueEvent::check_failed(
            pull_request.number(),
            check.name.clone(),
            result.output.clone(),
        )),
        status => event_bus.publish(QueueEvent::check_completed(
            pull_request.number(),
            check.name.clone(),
            status,
        )),
    }
    result
}
