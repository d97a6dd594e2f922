// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entry-pipeline end-to-end over scripted collaborators: the happy merge
//! path, conflict detection, failed checks, unmergeable PRs, and deadline
//! bookkeeping.

use imq_domain::entities::{Check, CheckConfiguration, CheckKind, CheckStatus, EntryStatus};
use imq_domain::repositories::{PullRequestRepository, QueueRepository};
use imq_domain::services::hosting_gateway::{CompareResult, CompareStatus};
use imq_domain::value_objects::CommitSha;
use imq_domain::MergeQueueError;

use crate::common::{seed_queue, settle, PipelineHarness, ScriptedOutcome, HEAD_SHA, UPDATED_SHA};

#[tokio::test]
async fn happy_path_updates_checks_and_merges() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");
    h.seed(&seeded).await;

    // Stale cache entry for the pre-update head; the branch update must
    // invalidate it.
    h.cache.set(
        CommitSha::new(HEAD_SHA).unwrap(),
        "ci",
        CheckStatus::Passed,
    );

    h.pipeline.process_queue(seeded.queue.clone()).await.unwrap();

    // Persisted status trace: pending entry advanced through the stages.
    assert_eq!(
        h.queue_repository.trace(),
        vec![
            EntryStatus::Updating,
            EntryStatus::Checking,
            EntryStatus::Completed
        ]
    );

    // Exactly one comment: the success notification.
    assert_eq!(h.gateway.comment_count(), 1);
    assert!(h.gateway.comments.lock()[0].contains("merged"));

    // Entry removed; queue drained.
    let queues = h.queue_repository.find_all().await.unwrap();
    assert!(queues[0].is_empty());

    // The in-store PR carries the post-update head.
    let pr = h
        .pull_request_repository
        .find_by_id(seeded.pull_request.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pr.head_sha().as_str(), UPDATED_SHA);
    assert!(pr.is_up_to_date());

    // Old head's cached results are gone.
    assert!(h
        .cache
        .get(&CommitSha::new(HEAD_SHA).unwrap(), "ci")
        .is_none());

    settle().await;
    assert_eq!(h.events.count_of("queue_entry_started"), 1);
    assert_eq!(h.events.count_of("merge_started"), 1);
    assert_eq!(h.events.count_of("merge_completed"), 1);
    assert_eq!(h.events.count_of("queue_entry_completed"), 1);
    assert_eq!(h.events.count_of("queue_processing_started"), 1);
    assert_eq!(h.events.count_of("queue_processing_completed"), 1);
}

#[tokio::test]
async fn checks_pass_through_ready_before_merging() {
    let config = CheckConfiguration {
        checks: vec![Check::new("ci", "CI", CheckKind::StatusAggregate)],
        fail_fast: false,
    };
    let h = PipelineHarness::with_checks(config);
    let seeded = seed_queue("main");
    h.seed(&seeded).await;

    h.pipeline.process_queue(seeded.queue.clone()).await.unwrap();

    // With a non-empty configuration the entry passes through ready.
    assert_eq!(
        h.queue_repository.trace(),
        vec![
            EntryStatus::Updating,
            EntryStatus::Checking,
            EntryStatus::Ready,
            EntryStatus::Completed
        ]
    );
}

#[tokio::test]
async fn diverged_compare_fails_the_entry_with_a_conflict_comment() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");
    h.seed(&seeded).await;

    *h.gateway.compare.lock() = Ok(CompareResult {
        status: CompareStatus::Diverged,
        ahead_by: 1,
        behind_by: 2,
    });

    h.pipeline.process_queue(seeded.queue.clone()).await.unwrap();

    assert_eq!(h.queue_repository.trace().last(), Some(&EntryStatus::Failed));
    assert_eq!(h.gateway.comment_count(), 1);
    assert!(h.gateway.comments.lock()[0].contains("conflict"));

    let queues = h.queue_repository.find_all().await.unwrap();
    assert!(queues[0].is_empty());

    let pr = h
        .pull_request_repository
        .find_by_id(seeded.pull_request.id())
        .await
        .unwrap()
        .unwrap();
    assert!(pr.is_conflicted());

    settle().await;
    assert_eq!(h.events.count_of("conflict_detected"), 1);
    assert_eq!(h.events.count_of("queue_entry_failed"), 1);
    assert_eq!(h.events.count_of("merge_started"), 0);
}

#[tokio::test]
async fn failed_check_fails_the_entry_and_cites_the_check() {
    let config = CheckConfiguration {
        checks: vec![
            Check::new("a", "A", CheckKind::StatusAggregate),
            Check::new("b", "B", CheckKind::StatusAggregate)
                .with_dependencies(vec!["a".into()]),
        ],
        fail_fast: true,
    };
    let h = PipelineHarness::with_checks(config);
    h.factory.script("a", ScriptedOutcome::instant(CheckStatus::Failed));
    let seeded = seed_queue("main");
    h.seed(&seeded).await;

    h.pipeline.process_queue(seeded.queue.clone()).await.unwrap();

    assert_eq!(h.queue_repository.trace().last(), Some(&EntryStatus::Failed));
    assert_eq!(h.gateway.comment_count(), 1);
    // The comment names the failed check.
    assert!(h.gateway.comments.lock()[0].contains('A'));

    settle().await;
    assert_eq!(h.events.count_of("check_failed"), 1);
    assert_eq!(h.events.count_of("merge_started"), 0);
}

#[tokio::test]
async fn unmergeable_pr_fails_with_a_merge_failure() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");
    h.seed(&seeded).await;

    h.gateway.pull_request.lock().mergeable = Some(false);

    h.pipeline.process_queue(seeded.queue.clone()).await.unwrap();

    assert_eq!(h.queue_repository.trace().last(), Some(&EntryStatus::Failed));
    assert_eq!(h.gateway.comment_count(), 1);

    settle().await;
    assert_eq!(h.events.count_of("merge_failed"), 1);
    assert_eq!(h.events.count_of("merge_completed"), 0);
}

#[tokio::test]
async fn gateway_merge_rejection_is_translated_and_recorded() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");
    h.seed(&seeded).await;

    *h.gateway.merge_result.lock() =
        Err(MergeQueueError::Forbidden("protected branch".into()));

    h.pipeline.process_queue(seeded.queue.clone()).await.unwrap();

    settle().await;
    assert_eq!(h.events.count_of("merge_failed"), 1);
    let failure = h
        .events
        .events()
        .into_iter()
        .find_map(|event| match event {
            imq_domain::QueueEvent::QueueEntryFailed { reason, .. } => Some(reason),
            _ => None,
        })
        .expect("entry failure recorded");
    assert!(failure.contains("Branch protection"));
}

#[tokio::test]
async fn in_flight_head_is_left_alone() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");
    h.seed(&seeded).await;

    // Another cycle owns the head.
    let mut queue = seeded.queue.clone();
    let mut entry = queue.head().unwrap().clone();
    entry.transition_to(EntryStatus::Updating).unwrap();
    queue.replace_entry(entry);
    h.queue_repository.save(&queue).await.unwrap();
    let trace_before = h.queue_repository.trace().len();

    h.pipeline.process_queue(queue.clone()).await.unwrap();

    assert_eq!(h.queue_repository.trace().len(), trace_before);
    assert_eq!(h.gateway.comment_count(), 0);
}

#[tokio::test]
async fn fail_in_flight_records_a_timeout_failure() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");
    h.seed(&seeded).await;

    h.pipeline
        .fail_in_flight(seeded.queue.id(), "processing deadline exceeded", false)
        .await
        .unwrap();

    assert_eq!(h.queue_repository.trace().last(), Some(&EntryStatus::Failed));
    let queues = h.queue_repository.find_all().await.unwrap();
    assert!(queues[0].is_empty());

    settle().await;
    assert_eq!(h.events.count_of("queue_entry_failed"), 1);
}

#[tokio::test]
async fn shutdown_cancellation_is_recorded_as_cancelled() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");
    h.seed(&seeded).await;

    h.pipeline
        .fail_in_flight(seeded.queue.id(), "shutting down", true)
        .await
        .unwrap();

    assert_eq!(
        h.queue_repository.trace().last(),
        Some(&EntryStatus::Cancelled)
    );
}
