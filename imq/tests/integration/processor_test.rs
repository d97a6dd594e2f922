// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Queue-processor loop: lifecycle guards, end-to-end cycle processing, and
//! graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use imq::application::services::{ProcessorConfig, QueueProcessor};
use imq_bootstrap::shutdown::ShutdownCoordinator;
use imq_domain::repositories::QueueRepository;
use imq_domain::MergeQueueError;

use crate::common::{seed_queue, settle, PipelineHarness};

fn fast_config() -> ProcessorConfig {
    ProcessorConfig {
        max_concurrent_processing: 2,
        processing_interval: Duration::from_millis(25),
        processing_timeout: Duration::from_secs(5),
        shutdown_timeout: Duration::from_secs(2),
        error_backoff: Duration::from_millis(10),
    }
}

fn processor_over(h: &PipelineHarness, coordinator: &ShutdownCoordinator) -> Arc<QueueProcessor> {
    Arc::new(QueueProcessor::new(
        h.queue_repository.clone() as Arc<dyn QueueRepository>,
        Arc::clone(&h.pipeline),
        Arc::clone(&h.cache),
        Arc::clone(&h.event_bus),
        Arc::clone(&h.metrics),
        coordinator.token(),
        fast_config(),
    ))
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let h = PipelineHarness::new();
    let coordinator = ShutdownCoordinator::default();
    let processor = processor_over(&h, &coordinator);

    processor.clone().start().await.unwrap();
    let error = processor.clone().start().await.unwrap_err();
    assert!(matches!(error, MergeQueueError::ProcessorAlreadyRunning));

    processor.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_without_start_is_rejected() {
    let h = PipelineHarness::new();
    let coordinator = ShutdownCoordinator::default();
    let processor = processor_over(&h, &coordinator);

    let error = processor.shutdown().await.unwrap_err();
    assert!(matches!(error, MergeQueueError::ProcessorNotRunning));
}

#[tokio::test]
async fn loop_processes_a_queued_entry_to_completion() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");
    h.seed(&seeded).await;

    let coordinator = ShutdownCoordinator::default();
    let processor = processor_over(&h, &coordinator);
    processor.clone().start().await.unwrap();

    // One short cycle is enough for the single entry.
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        if h.queue_repository.find_all().await.unwrap()[0].is_empty() {
            break;
        }
    }
    processor.shutdown().await.unwrap();

    let queues = h.queue_repository.find_all().await.unwrap();
    assert!(queues[0].is_empty(), "entry should have been merged away");
    assert_eq!(h.gateway.comment_count(), 1);

    settle().await;
    assert_eq!(h.events.count_of("processor_started"), 1);
    assert_eq!(h.events.count_of("merge_completed"), 1);
    assert_eq!(h.events.count_of("processor_shutting_down"), 1);
    assert_eq!(h.events.count_of("processor_stopped"), 1);
}

#[tokio::test]
async fn restart_after_shutdown_is_allowed() {
    let h = PipelineHarness::new();
    let coordinator = ShutdownCoordinator::default();
    let processor = processor_over(&h, &coordinator);

    processor.clone().start().await.unwrap();
    processor.shutdown().await.unwrap();

    // A fresh processor (the token is spent) starts cleanly.
    let coordinator = ShutdownCoordinator::default();
    let processor = processor_over(&h, &coordinator);
    processor.clone().start().await.unwrap();
    processor.shutdown().await.unwrap();
}
