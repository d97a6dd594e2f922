// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Webhook ingress end-to-end: signature verification, label-driven queue
//! mutation, and the re-queue and removal laws.

use std::sync::Arc;

use imq::application::use_cases::{EnqueuePullRequest, RemoveFromQueue};
use imq::infrastructure::event_bus::EventBus;
use imq::infrastructure::metrics::MetricsService;
use imq::infrastructure::repositories::{
    InMemoryConfigurationRepository, InMemoryPullRequestRepository, InMemoryQueueRepository,
};
use imq::infrastructure::webhook::{
    signature, WebhookOutcome, WebhookProcessor, WebhookRequest,
};
use imq_domain::repositories::{
    ConfigurationRepository, PullRequestRepository, QueueRepository,
};
use imq_domain::EntryStatus;

use crate::common::{pull_request_event, settle, EventCollector, HEAD_SHA, UPDATED_SHA};

struct WebhookHarness {
    queue_repository: Arc<InMemoryQueueRepository>,
    pull_request_repository: Arc<InMemoryPullRequestRepository>,
    events: Arc<EventCollector>,
    processor: WebhookProcessor,
}

fn harness(secret: Option<&str>) -> WebhookHarness {
    let queue_repository = Arc::new(InMemoryQueueRepository::new());
    let pull_request_repository = Arc::new(InMemoryPullRequestRepository::new());
    let configuration_repository = Arc::new(InMemoryConfigurationRepository::new());
    let event_bus = Arc::new(EventBus::new());
    let events = EventCollector::subscribe_to(&event_bus);
    let metrics = Arc::new(MetricsService::new().unwrap());

    let enqueue = EnqueuePullRequest::new(
        queue_repository.clone() as Arc<dyn QueueRepository>,
        pull_request_repository.clone() as Arc<dyn PullRequestRepository>,
        Arc::clone(&event_bus),
    );
    let remove = RemoveFromQueue::new(
        queue_repository.clone() as Arc<dyn QueueRepository>,
        pull_request_repository.clone() as Arc<dyn PullRequestRepository>,
        Arc::clone(&event_bus),
    );
    let processor = WebhookProcessor::new(
        configuration_repository as Arc<dyn ConfigurationRepository>,
        enqueue,
        remove,
        secret.map(str::to_string),
        metrics,
    );

    WebhookHarness {
        queue_repository,
        pull_request_repository,
        events,
        processor,
    }
}

fn request<'a>(event: Option<&'a str>, signature: Option<&'a str>, body: &'a [u8]) -> WebhookRequest<'a> {
    WebhookRequest {
        event,
        delivery: Some("delivery-1"),
        signature,
        body,
    }
}

#[tokio::test]
async fn labeled_event_creates_queue_and_pending_entry() {
    let h = harness(None);
    let body = pull_request_event("labeled", 42, &["A-merge"], "main", HEAD_SHA);

    let outcome = h.processor.process(request(Some("pull_request"), None, &body)).await;
    assert_eq!(outcome, WebhookOutcome::Accepted);
    assert_eq!(outcome.status_code(), 200);

    let queues = h.queue_repository.find_all().await.unwrap();
    assert_eq!(queues.len(), 1);
    let queue = &queues[0];
    assert_eq!(queue.base_branch(), "main");
    assert_eq!(queue.len(), 1);

    let entry = queue.head().unwrap();
    assert_eq!(entry.position(), 0);
    assert_eq!(entry.status(), EntryStatus::Pending);

    let pr = h
        .pull_request_repository
        .find_by_id(entry.pull_request_id())
        .await
        .unwrap()
        .expect("PR upserted");
    assert_eq!(pr.number(), 42);

    settle().await;
    assert_eq!(h.events.count_of("queue_entry_added"), 1);
}

#[tokio::test]
async fn labeled_redelivery_is_idempotent() {
    let h = harness(None);
    let body = pull_request_event("labeled", 42, &["A-merge"], "main", HEAD_SHA);

    for _ in 0..2 {
        let outcome = h.processor.process(request(Some("pull_request"), None, &body)).await;
        assert_eq!(outcome, WebhookOutcome::Accepted);
    }

    let queues = h.queue_repository.find_all().await.unwrap();
    assert_eq!(queues[0].len(), 1);
}

#[tokio::test]
async fn labeled_without_trigger_label_is_a_no_op() {
    let h = harness(None);
    let body = pull_request_event("labeled", 42, &["bug"], "main", HEAD_SHA);

    let outcome = h.processor.process(request(Some("pull_request"), None, &body)).await;
    assert_eq!(outcome, WebhookOutcome::Accepted);
    assert!(h.queue_repository.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn synchronize_requeues_at_the_tail() {
    let h = harness(None);
    let labeled = pull_request_event("labeled", 42, &["A-merge"], "main", HEAD_SHA);
    h.processor.process(request(Some("pull_request"), None, &labeled)).await;

    // Same PR, new head: removed then re-added, still alone at position 0.
    let synchronized = pull_request_event("synchronize", 42, &["A-merge"], "main", UPDATED_SHA);
    let outcome = h
        .processor
        .process(request(Some("pull_request"), None, &synchronized))
        .await;
    assert_eq!(outcome, WebhookOutcome::Accepted);

    let queues = h.queue_repository.find_all().await.unwrap();
    assert_eq!(queues.len(), 1);
    let queue = &queues[0];
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.head().unwrap().position(), 0);

    let pr = h
        .pull_request_repository
        .find_by_id(queue.head().unwrap().pull_request_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pr.number(), 42);
    assert_eq!(pr.head_sha().as_str(), UPDATED_SHA);

    settle().await;
    assert_eq!(h.events.count_of("queue_entry_removed"), 1);
    assert_eq!(h.events.count_of("queue_entry_added"), 2);
}

#[tokio::test]
async fn synchronize_places_requeued_pr_behind_existing_entries() {
    let h = harness(None);
    let first = pull_request_event("labeled", 42, &["A-merge"], "main", HEAD_SHA);
    h.processor.process(request(Some("pull_request"), None, &first)).await;
    let second = pull_request_event("labeled", 43, &["A-merge"], "main", UPDATED_SHA);
    h.processor.process(request(Some("pull_request"), None, &second)).await;

    // PR 42 gets new commits: it loses its place at the head.
    let synchronized = pull_request_event("synchronize", 42, &["A-merge"], "main", UPDATED_SHA);
    h.processor
        .process(request(Some("pull_request"), None, &synchronized))
        .await;

    let queues = h.queue_repository.find_all().await.unwrap();
    let queue = &queues[0];
    assert_eq!(queue.len(), 2);

    let head_pr = h
        .pull_request_repository
        .find_by_id(queue.entries()[0].pull_request_id())
        .await
        .unwrap()
        .unwrap();
    let tail_pr = h
        .pull_request_repository
        .find_by_id(queue.entries()[1].pull_request_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(head_pr.number(), 43);
    assert_eq!(tail_pr.number(), 42);
    assert_eq!(queue.entries()[1].position(), 1);
}

#[tokio::test]
async fn unlabeled_event_removes_the_entry() {
    let h = harness(None);
    let labeled = pull_request_event("labeled", 42, &["A-merge"], "main", HEAD_SHA);
    h.processor.process(request(Some("pull_request"), None, &labeled)).await;

    let unlabeled = pull_request_event("unlabeled", 42, &[], "main", HEAD_SHA);
    let outcome = h
        .processor
        .process(request(Some("pull_request"), None, &unlabeled))
        .await;
    assert_eq!(outcome, WebhookOutcome::Accepted);

    // labeled then unlabeled leaves no trace in the queue
    let queues = h.queue_repository.find_all().await.unwrap();
    assert!(queues[0].is_empty());

    settle().await;
    assert_eq!(h.events.count_of("queue_entry_removed"), 1);
}

#[tokio::test]
async fn closed_event_removes_and_prunes() {
    let h = harness(None);
    let labeled = pull_request_event("labeled", 42, &["A-merge"], "main", HEAD_SHA);
    h.processor.process(request(Some("pull_request"), None, &labeled)).await;

    let closed = pull_request_event("closed", 42, &["A-merge"], "main", HEAD_SHA);
    h.processor.process(request(Some("pull_request"), None, &closed)).await;

    let queues = h.queue_repository.find_all().await.unwrap();
    assert!(queues[0].is_empty());

    let repository = h
        .pull_request_repository
        .find_repository("octo", "hello")
        .await
        .unwrap()
        .unwrap();
    assert!(h
        .pull_request_repository
        .find_by_number(repository.id(), 42)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn bad_signature_is_rejected_without_mutation() {
    let h = harness(Some("s3cret"));
    let body = pull_request_event("labeled", 42, &["A-merge"], "main", HEAD_SHA);

    let outcome = h
        .processor
        .process(request(
            Some("pull_request"),
            Some("sha256=0000000000000000000000000000000000000000000000000000000000000000"),
            &body,
        ))
        .await;
    assert_eq!(outcome, WebhookOutcome::BadSignature);
    assert_eq!(outcome.status_code(), 401);

    assert!(h.queue_repository.find_all().await.unwrap().is_empty());
    settle().await;
    assert!(h.events.is_empty());
}

#[tokio::test]
async fn valid_signature_is_accepted() {
    let h = harness(Some("s3cret"));
    let body = pull_request_event("labeled", 42, &["A-merge"], "main", HEAD_SHA);
    let header = signature::sign("s3cret", &body);

    let outcome = h
        .processor
        .process(request(Some("pull_request"), Some(&header), &body))
        .await;
    assert_eq!(outcome, WebhookOutcome::Accepted);
    assert_eq!(h.queue_repository.find_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_event_header_is_bad_request() {
    let h = harness(None);
    let body = pull_request_event("labeled", 42, &["A-merge"], "main", HEAD_SHA);

    let outcome = h.processor.process(request(None, None, &body)).await;
    assert_eq!(outcome.status_code(), 400);
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let h = harness(None);
    let outcome = h
        .processor
        .process(request(Some("pull_request"), None, b"{not json"))
        .await;
    assert_eq!(outcome.status_code(), 400);
}

#[tokio::test]
async fn unhandled_event_types_are_acknowledged() {
    let h = harness(None);
    let outcome = h
        .processor
        .process(request(Some("issues"), None, b"{}"))
        .await;
    assert_eq!(outcome, WebhookOutcome::Accepted);
    assert!(h.queue_repository.find_all().await.unwrap().is_empty());
}
