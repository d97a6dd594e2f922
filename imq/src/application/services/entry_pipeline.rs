// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entry Pipeline
//!
//! The per-entry state machine. Given a queue chosen by the scheduler, the
//! pipeline operates on the head entry if (and only if) it is still
//! `pending`; an in-flight head means another cycle owns it and this one is
//! skipped.
//!
//! Stages run strictly in sequence, each persisting the entry transition
//! before the next begins:
//!
//! | Stage | Action |
//! |---|---|
//! | Start | `pending -> updating`, stamp `started_at`, emit `QueueEntryStarted` |
//! | Conflict detect | compare `base...head`; diverged or known-conflicted fails the entry with a PR comment and `ConflictDetected` |
//! | PR update | update the branch when stale, record the new head SHA, invalidate cached results for the old head |
//! | Checks | delegate to the check engine; any failure fails the entry with a comment naming the failed checks |
//! | Merge | re-fetch, require mergeability, squash-merge, post the success comment, emit `MergeCompleted` |
//!
//! A failed stage marks the entry `failed` (`cancelled` for shutdown), posts
//! a descriptive comment when the stage did not already post a specific one,
//! emits `QueueEntryFailed` + `QueueEntryCompleted`, and removes the entry so
//! the next PR advances to position 0. Gateway errors are translated at the
//! merge boundary: `Unauthorized` stays, `Forbidden` becomes
//! `BranchProtectionViolation`, `NotFound` becomes `NotMergeable`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use imq_domain::entities::{
    EntryStatus, NotificationTemplates, PullRequest, Queue, Repository, TemplateContext,
};
use imq_domain::events::EntryContext;
use imq_domain::repositories::{
    ConfigurationRepository, PullRequestRepository, QueueRepository,
};
use imq_domain::services::hosting_gateway::{CompareStatus, HostingGateway, MergeMethod};
use imq_domain::value_objects::{CommitSha, QueueId};
use imq_domain::{MergeQueueError, QueueEvent};

use crate::application::services::check_engine::CheckEngine;
use crate::infrastructure::cache::ResultCache;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::runtime::RetryPolicy;

/// Drives one queue entry through the fixed stage sequence.
pub struct EntryPipeline {
    queue_repository: Arc<dyn QueueRepository>,
    pull_request_repository: Arc<dyn PullRequestRepository>,
    configuration_repository: Arc<dyn ConfigurationRepository>,
    gateway: Arc<dyn HostingGateway>,
    check_engine: Arc<CheckEngine>,
    cache: Arc<ResultCache>,
    event_bus: Arc<EventBus>,
    metrics: Arc<MetricsService>,
    retry: RetryPolicy,
}

impl EntryPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue_repository: Arc<dyn QueueRepository>,
        pull_request_repository: Arc<dyn PullRequestRepository>,
        configuration_repository: Arc<dyn ConfigurationRepository>,
        gateway: Arc<dyn HostingGateway>,
        check_engine: Arc<CheckEngine>,
        cache: Arc<ResultCache>,
        event_bus: Arc<EventBus>,
        metrics: Arc<MetricsService>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            queue_repository,
            pull_request_repository,
            configuration_repository,
            gateway,
            check_engine,
            cache,
            event_bus,
            metrics,
            retry,
        }
    }

    /// Processes the head entry of a queue snapshot.
    ///
    /// Returns `Ok` for a handled cycle, including "nothing to do" cycles
    /// and cycles where the entry failed (the failure is persisted,
    /// commented, and emitted here). An `Err` means the bookkeeping itself
    /// could not be recorded, surfaced so the processor loop can log it.
    pub async fn process_queue(&self, mut queue: Queue) -> Result<(), MergeQueueError> {
        let Some(head) = queue.head().cloned() else {
            self.event_bus
                .publish(QueueEvent::processing_empty(*queue.id(), queue.base_branch()));
            return Ok(());
        };

        if head.status() != EntryStatus::Pending {
            debug!(
                queue = %queue.id(),
                status = head.status().as_str(),
                "head entry already in flight, skipping cycle"
            );
            return Ok(());
        }

        self.event_bus.publish(QueueEvent::processing_started(
            *queue.id(),
            queue.base_branch(),
        ));
        let started = Instant::now();

        let pull_request = self
            .pull_request_repository
            .find_by_id(head.pull_request_id())
            .await?;
        let repository = self
            .pull_request_repository
            .find_repository_by_id(queue.repository_id())
            .await?;

        let context = EntryContext {
            queue_id: *queue.id(),
            entry_id: *head.id(),
            pr_number: pull_request.as_ref().map(PullRequest::number).unwrap_or(0),
            base_branch: queue.base_branch().to_string(),
        };

        let outcome = match (pull_request, repository) {
            (Some(mut pull_request), Some(repository)) => {
                self.advance_entry(&mut queue, &mut pull_request, &repository)
                    .await
            }
            (None, _) => Err(MergeQueueError::PullRequestNotFound(format!(
                "entry {} references pull request {}",
                head.id(),
                head.pull_request_id()
            ))),
            (_, None) => Err(MergeQueueError::internal_error(format!(
                "queue {} references unknown repository {}",
                queue.id(),
                queue.repository_id()
            ))),
        };

        match outcome {
            Ok(()) => {
                self.queue_repository
                    .remove_entry(queue.id(), &context.entry_id)
                    .await?;
                self.metrics
                    .record_entry_completed(started.elapsed().as_secs_f64());
                self.event_bus
                    .publish(QueueEvent::entry_completed(context, EntryStatus::Completed));
            }
            Err(error) => {
                self.record_entry_failure(&queue, &context, &error).await?;
            }
        }

        self.event_bus.publish(QueueEvent::processing_completed(
            *queue.id(),
            queue.base_branch(),
        ));
        Ok(())
    }

    /// Fails whatever entry is in flight for a queue (processing deadline or
    /// shutdown). No-op when the queue is empty or its head is terminal.
    pub async fn fail_in_flight(
        &self,
        queue_id: &QueueId,
        reason: &str,
        as_cancelled: bool,
    ) -> Result<(), MergeQueueError> {
        let Some(queue) = self.queue_repository.find_by_id(queue_id).await? else {
            return Ok(());
        };
        let Some(head) = queue.head().cloned() else {
            return Ok(());
        };
        if head.status().is_terminal() {
            return Ok(());
        }

        let pr_number = self
            .pull_request_repository
            .find_by_id(head.pull_request_id())
            .await?
            .map(|pr| pr.number())
            .unwrap_or(0);
        let context = EntryContext {
            queue_id: *queue.id(),
            entry_id: *head.id(),
            pr_number,
            base_branch: queue.base_branch().to_string(),
        };

        let error = if as_cancelled {
            MergeQueueError::cancelled(reason)
        } else {
            MergeQueueError::timeout(reason)
        };
        self.record_entry_failure(&queue, &context, &error).await
    }

    /// Terminal bookkeeping for a failed (or cancelled) entry: persist the
    /// terminal status, post the generic comment when no stage-specific one
    /// went out, emit events, and remove the entry so position 1 becomes the
    /// new head.
    async fn record_entry_failure(
        &self,
        queue: &Queue,
        context: &EntryContext,
        error: &MergeQueueError,
    ) -> Result<(), MergeQueueError> {
        let status = if error.is_cancellation() {
            EntryStatus::Cancelled
        } else {
            EntryStatus::Failed
        };
        warn!(
            queue = %context.queue_id,
            pr = context.pr_number,
            error = %error,
            "marking entry {} {}",
            context.entry_id,
            status.as_str()
        );

        if let Some(entry) = queue
            .entries()
            .iter()
            .find(|e| e.id() == &context.entry_id)
        {
            let mut entry = entry.clone();
            if !entry.status().is_terminal() {
                entry.transition_to(status)?;
                self.queue_repository.update_entry(&entry).await?;
            }
        }

        if !stage_posted_comment(error) && context.pr_number != 0 {
            self.post_failure_comment(queue, context, error).await;
        }

        self.event_bus.publish(QueueEvent::entry_failed(
            context.clone(),
            error.to_string(),
        ));
        self.event_bus
            .publish(QueueEvent::entry_completed(context.clone(), status));
        self.queue_repository
            .remove_entry(&context.queue_id, &context.entry_id)
            .await?;
        self.metrics.record_entry_failed();
        Ok(())
    }

    async fn post_failure_comment(
        &self,
        queue: &Queue,
        context: &EntryContext,
        error: &MergeQueueError,
    ) {
        let Ok(Some(repository)) = self
            .pull_request_repository
            .find_repository_by_id(queue.repository_id())
            .await
        else {
            return;
        };
        let Ok(configuration) = self.configuration_repository.get().await else {
            return;
        };
        let body = NotificationTemplates::render(
            &configuration.templates().merge_failure,
            &TemplateContext {
                pr_number: context.pr_number,
                branch: context.base_branch.clone(),
                reason: error.to_string(),
            },
        );
        if let Err(comment_error) = self
            .gateway
            .post_comment(&repository, context.pr_number, &body)
            .await
        {
            warn!(error = %comment_error, "failed to post failure comment");
        }
    }

    /// The stage sequence proper. Any `Err` fails the entry; stage-specific
    /// comments and events are posted at the failing site.
    async fn advance_entry(
        &self,
        queue: &mut Queue,
        pull_request: &mut PullRequest,
        repository: &Repository,
    ) -> Result<(), MergeQueueError> {
        let configuration = self.configuration_repository.get().await?;
        let templates = configuration.templates();
        let base_branch = queue.base_branch().to_string();
        let pr_number = pull_request.number();

        // Stage: start
        let Some(mut entry) = queue.head().cloned() else {
            return Err(MergeQueueError::EntryNotFound(format!(
                "queue {} emptied before processing began",
                queue.id()
            )));
        };
        entry.transition_to(EntryStatus::Updating)?;
        self.queue_repository.update_entry(&entry).await?;
        queue.replace_entry(entry.clone());
        self.event_bus.publish(QueueEvent::entry_started(EntryContext {
            queue_id: *queue.id(),
            entry_id: *entry.id(),
            pr_number,
            base_branch: base_branch.clone(),
        }));
        info!(pr = pr_number, branch = %base_branch, "pipeline started");

        // Stage: conflict detection
        let compare = self
            .retry
            .run(|_| {
                self.gateway.compare_commits(
                    repository,
                    pull_request.base_branch(),
                    pull_request.head_sha().as_str(),
                )
            })
            .await?;
        if compare.status == CompareStatus::Diverged || pull_request.is_conflicted() {
            pull_request.mark_conflicted();
            self.pull_request_repository.save(pull_request).await?;

            let body = NotificationTemplates::render(
                &templates.conflict,
                &TemplateContext {
                    pr_number,
                    branch: base_branch.clone(),
                    reason: String::new(),
                },
            );
            if let Err(error) = self
                .gateway
                .post_comment(repository, pr_number, &body)
                .await
            {
                warn!(error = %error, "failed to post conflict comment");
            }
            self.event_bus
                .publish(QueueEvent::conflict_detected(pr_number, base_branch.clone()));
            return Err(MergeQueueError::ConflictDetected(format!(
                "pull request #{} diverged from {}",
                pr_number, base_branch
            )));
        }

        // Stage: PR update
        if !pull_request.is_up_to_date() {
            let new_head = self
                .retry
                .run(|_| {
                    self.gateway.update_pull_request_branch(
                        repository,
                        pr_number,
                        pull_request.head_sha().as_str(),
                    )
                })
                .await?;
            if let Some(new_sha) = new_head {
                let new_sha = CommitSha::new(new_sha)?;
                debug!(
                    pr = pr_number,
                    old = pull_request.head_sha().short(),
                    new = new_sha.short(),
                    "branch updated"
                );
                // Results for the superseded head are worthless now.
                self.cache.invalidate_sha(pull_request.head_sha());
                pull_request.update_head(new_sha);
            }
            pull_request.mark_up_to_date();
            self.pull_request_repository.save(pull_request).await?;
        }
        entry.transition_to(EntryStatus::Checking)?;
        self.queue_repository.update_entry(&entry).await?;
        queue.replace_entry(entry.clone());

        // Stage: check execution
        let check_configuration = configuration.check_configuration();
        let execution = self
            .check_engine
            .execute(check_configuration, pull_request, repository)
            .await?;
        if !execution.all_passed {
            let reason = if execution.failed_checks.is_empty() {
                "checks did not pass".to_string()
            } else {
                execution.failed_checks.join(", ")
            };
            let body = NotificationTemplates::render(
                &templates.checks_failed,
                &TemplateContext {
                    pr_number,
                    branch: base_branch.clone(),
                    reason: reason.clone(),
                },
            );
            if let Err(error) = self
                .gateway
                .post_comment(repository, pr_number, &body)
                .await
            {
                warn!(error = %error, "failed to post checks-failed comment");
            }
            return Err(MergeQueueError::ChecksFailed(reason));
        }
        if !check_configuration.is_empty() {
            entry.transition_to(EntryStatus::Ready)?;
            self.queue_repository.update_entry(&entry).await?;
            queue.replace_entry(entry.clone());
        }

        // Stage: merge
        self.event_bus
            .publish(QueueEvent::merge_started(pr_number, base_branch.clone()));

        let fresh = self
            .retry
            .run(|_| self.gateway.get_pull_request(repository, pr_number))
            .await
            .map_err(translate_merge_error)?;
        if fresh.mergeable != Some(true) {
            let reason = format!(
                "pull request is not mergeable (state: {:?})",
                fresh.mergeable_state
            );
            self.report_merge_failure(repository, templates, pr_number, &base_branch, &reason)
                .await;
            return Err(MergeQueueError::NotMergeable(reason));
        }

        let outcome = self
            .retry
            .run(|_| {
                self.gateway
                    .merge_pull_request(repository, pr_number, MergeMethod::Squash)
            })
            .await
            .map_err(translate_merge_error);
        let outcome = match outcome {
            Ok(outcome) if outcome.merged => outcome,
            Ok(outcome) => {
                self.report_merge_failure(
                    repository,
                    templates,
                    pr_number,
                    &base_branch,
                    &outcome.message,
                )
                .await;
                return Err(MergeQueueError::NotMergeable(outcome.message));
            }
            Err(error) => {
                self.report_merge_failure(
                    repository,
                    templates,
                    pr_number,
                    &base_branch,
                    &error.to_string(),
                )
                .await;
                return Err(error);
            }
        };

        let merge_sha = outcome
            .sha
            .as_deref()
            .and_then(|sha| CommitSha::new(sha).ok());
        let body = NotificationTemplates::render(
            &templates.merge_success,
            &TemplateContext {
                pr_number,
                branch: base_branch.clone(),
                reason: String::new(),
            },
        );
        if let Err(error) = self
            .gateway
            .post_comment(repository, pr_number, &body)
            .await
        {
            warn!(error = %error, "failed to post merge-success comment");
        }

        entry.transition_to(EntryStatus::Completed)?;
        self.queue_repository.update_entry(&entry).await?;
        queue.replace_entry(entry.clone());
        self.event_bus.publish(QueueEvent::merge_completed(
            pr_number,
            base_branch.clone(),
            merge_sha,
        ));
        info!(pr = pr_number, branch = %base_branch, "pull request merged");
        Ok(())
    }

    /// Posts the merge-failure comment and emits `MergeFailed`; the caller
    /// decides which error to surface.
    async fn report_merge_failure(
        &self,
        repository: &Repository,
        templates: &NotificationTemplates,
        pr_number: u64,
        base_branch: &str,
        reason: &str,
    ) {
        let body = NotificationTemplates::render(
            &templates.merge_failure,
            &TemplateContext {
                pr_number,
                branch: base_branch.to_string(),
                reason: reason.to_string(),
            },
        );
        if let Err(error) = self
            .gateway
            .post_comment(repository, pr_number, &body)
            .await
        {
            warn!(error = %error, "failed to post merge-failure comment");
        }
        self.event_bus.publish(QueueEvent::merge_failed(
            pr_number,
            base_branch.to_string(),
            reason.to_string(),
        ));
    }
}

/// Gateway-to-domain error translation at the merge boundary.
fn translate_merge_error(error: MergeQueueError) -> MergeQueueError {
    match error {
        MergeQueueError::Unauthorized(message) => MergeQueueError::Unauthorized(message),
        MergeQueueError::Forbidden(message) => {
            MergeQueueError::BranchProtectionViolation(message)
        }
        MergeQueueError::NotFound(_) => MergeQueueError::NotMergeable("not found".into()),
        other => other,
    }
}

/// Stages that already posted a PR comment for this error kind; the generic
/// failure handler must not post a second one.
fn stage_posted_comment(error: &MergeQueueError) -> bool {
    matches!(
        error,
        MergeQueueError::ConflictDetected(_)
            | MergeQueueError::ChecksFailed(_)
            | MergeQueueError::NotMergeable(_)
            | MergeQueueError::BranchProtectionViolation(_)
            | MergeQueueError::Unauthorized(_)
    )
}
