// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Webhook Event Processor
//!
//! Translates hosting-service webhook deliveries into queue mutations. The
//! embedding HTTP server hands over the raw body and the relevant headers;
//! this processor owns everything behind that:
//!
//! 1. **Signature verification** -- HMAC-SHA256 over the raw body against
//!    `X-Hub-Signature-256` when a secret is configured; mismatch is a 401.
//!    A missing event-type header is a 400.
//! 2. **Dispatch** -- `pull_request` events mutate the queue model; all other
//!    event types are logged and acknowledged.
//! 3. **`pull_request` actions** -- `labeled` with the trigger label
//!    enqueues; `unlabeled` without it removes; `synchronize` with it
//!    re-queues at the tail; `closed` removes and prunes; anything else is a
//!    no-op.
//!
//! The trigger label is re-read from the system configuration on every
//! delivery, so label changes take effect without restart. Handling is
//! bounded: no gateway calls, no pipeline work, only model mutations.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use imq_domain::repositories::ConfigurationRepository;
use imq_domain::MergeQueueError;

use crate::application::use_cases::{EnqueueInput, EnqueuePullRequest, RemoveFromQueue};
use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::webhook::payload::PullRequestEvent;
use crate::infrastructure::webhook::signature::verify_signature;

/// The pieces of an HTTP delivery the processor needs.
#[derive(Debug, Clone, Copy)]
pub struct WebhookRequest<'a> {
    /// `X-GitHub-Event` header.
    pub event: Option<&'a str>,
    /// `X-GitHub-Delivery` header (logging only).
    pub delivery: Option<&'a str>,
    /// `X-Hub-Signature-256` header.
    pub signature: Option<&'a str>,
    /// Raw request body, exactly as received.
    pub body: &'a [u8],
}

/// What the embedding HTTP server should answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// 200: accepted, including no-op actions.
    Accepted,
    /// 401: signature mismatch.
    BadSignature,
    /// 400: malformed delivery.
    BadRequest(String),
    /// 500: a repository or internal failure while mutating the model.
    InternalError(String),
}

impl WebhookOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookOutcome::Accepted => 200,
            WebhookOutcome::BadSignature => 401,
            WebhookOutcome::BadRequest(_) => 400,
            WebhookOutcome::InternalError(_) => 500,
        }
    }
}

/// HMAC-verified webhook receiver.
pub struct WebhookProcessor {
    configuration_repository: Arc<dyn ConfigurationRepository>,
    enqueue: EnqueuePullRequest,
    remove: RemoveFromQueue,
    /// Shared secret; `None` or empty disables signature verification.
    secret: Option<String>,
    metrics: Arc<MetricsService>,
}

impl WebhookProcessor {
    pub fn new(
        configuration_repository: Arc<dyn ConfigurationRepository>,
        enqueue: EnqueuePullRequest,
        remove: RemoveFromQueue,
        secret: Option<String>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        let secret = secret.filter(|s| !s.is_empty());
        Self {
            configuration_repository,
            enqueue,
            remove,
            secret,
            metrics,
        }
    }

    /// Processes one delivery and returns the outcome the HTTP layer should
    /// answer with.
    pub async fn process(&self, request: WebhookRequest<'_>) -> WebhookOutcome {
        let started = Instant::now();
        let outcome = self.process_inner(request).await;
        self.metrics
            .record_webhook_duration(started.elapsed().as_secs_f64());
        outcome
    }

    async fn process_inner(&self, request: WebhookRequest<'_>) -> WebhookOutcome {
        if let Some(secret) = &self.secret {
            if !verify_signature(secret, request.body, request.signature) {
                warn!(delivery = ?request.delivery, "webhook signature verification failed");
                self.metrics.record_webhook_rejected("bad_signature");
                return WebhookOutcome::BadSignature;
            }
        }

        let Some(event) = request.event else {
            self.metrics.record_webhook_rejected("missing_event_header");
            return WebhookOutcome::BadRequest("missing event-type header".into());
        };
        self.metrics.record_webhook_event(event);

        match event {
            "pull_request" => match serde_json::from_slice::<PullRequestEvent>(request.body) {
                Ok(payload) => match self.handle_pull_request(payload).await {
                    Ok(()) => WebhookOutcome::Accepted,
                    Err(error) => {
                        warn!(error = %error, "webhook handling failed");
                        WebhookOutcome::InternalError(error.to_string())
                    }
                },
                Err(error) => {
                    self.metrics.record_webhook_rejected("malformed_payload");
                    WebhookOutcome::BadRequest(format!("malformed pull_request payload: {}", error))
                }
            },
            other => {
                debug!(event = other, delivery = ?request.delivery, "ignoring event type");
                WebhookOutcome::Accepted
            }
        }
    }

    async fn handle_pull_request(&self, event: PullRequestEvent) -> Result<(), MergeQueueError> {
        let configuration = self.configuration_repository.get().await?;
        let trigger_label = configuration.trigger_label();
        let has_trigger_label = event.pull_request.has_label(trigger_label);

        let owner = event.repository.owner.login.as_str();
        let repo_name = event.repository.name.as_str();
        let number = event.pull_request.number;

        info!(
            action = %event.action,
            pr = number,
            has_trigger_label,
            "pull_request event"
        );

        match event.action.as_str() {
            "labeled" if has_trigger_label => {
                self.enqueue.execute(enqueue_input(&event)).await
            }
            "unlabeled" if !has_trigger_label => {
                self.remove.execute(owner, repo_name, number, false).await
            }
            "synchronize" if has_trigger_label => {
                // Re-queue at the tail: the new head must wait its turn again.
                self.remove.execute(owner, repo_name, number, false).await?;
                self.enqueue.execute(enqueue_input(&event)).await
            }
            "closed" => self.remove.execute(owner, repo_name, number, true).await,
            other => {
                debug!(action = other, pr = number, "no-op pull_request action");
                Ok(())
            }
        }
    }
}

fn enqueue_input(event: &PullRequestEvent) -> EnqueueInput {
    EnqueueInput {
        owner: event.repository.owner.login.clone(),
        repo_name: event.repository.name.clone(),
        default_branch: event.repository.default_branch.clone(),
        number: event.pull_request.number,
        title: event.pull_request.title.clone(),
        author: event.pull_request.user.login.clone(),
        base_branch: event.pull_request.base.branch.clone(),
        head_branch: event.pull_request.head.branch.clone(),
        head_sha: event.pull_request.head.sha.clone(),
    }
}
