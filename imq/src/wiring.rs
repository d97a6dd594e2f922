// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Component Wiring
//!
//! Plain bottom-up initialization: build the component graph once at startup
//! and return a record of handles. No container, no lazy singletons; the
//! dependency order is the function body.
//!
//! ```text
//! pool -> repositories -> gateway -> cache/factory -> engine
//!      -> event bus (+ metrics subscriber) -> pipeline -> processor
//!      -> webhook processor
//! ```

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use imq_bootstrap::shutdown::ShutdownCoordinator;
use imq_bootstrap::AppConfig;
use imq_domain::repositories::{
    ConfigurationRepository, PullRequestRepository, QueueRepository,
};
use imq_domain::services::hosting_gateway::HostingGateway;
use imq_domain::MergeQueueError;

use crate::application::services::{
    CheckEngine, EntryPipeline, ProcessorConfig, QueueProcessor,
};
use crate::application::use_cases::{EnqueuePullRequest, RemoveFromQueue};
use crate::infrastructure::cache::{CacheConfig, ResultCache};
use crate::infrastructure::checks::GatewayExecutorFactory;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::gateway::GitHubGateway;
use crate::infrastructure::metrics::{MetricsEventHandler, MetricsService};
use crate::infrastructure::repositories::{
    schema, SqliteConfigurationRepository, SqlitePullRequestRepository, SqliteQueueRepository,
};
use crate::infrastructure::runtime::RetryPolicy;
use crate::infrastructure::webhook::WebhookProcessor;

/// Handles to every component `main` (and the embedding HTTP server) needs.
pub struct App {
    pub processor: Arc<QueueProcessor>,
    pub webhook: Arc<WebhookProcessor>,
    pub event_bus: Arc<EventBus>,
    pub metrics: Arc<MetricsService>,
    pub configuration_repository: Arc<dyn ConfigurationRepository>,
    pub shutdown: ShutdownCoordinator,
    pub pool: SqlitePool,
}

/// Builds the component graph bottom-up.
pub async fn build_app(config: &AppConfig) -> Result<App, MergeQueueError> {
    // Persistence
    if let Some(parent) = config.database_path().parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            MergeQueueError::invalid_config(format!(
                "cannot create database directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    let pool = schema::initialize_database(&config.database_url(), config.database_pool_size())
        .await
        .map_err(|e| MergeQueueError::database_error(e.to_string()))?;
    info!(path = %config.database_path().display(), "database ready");

    let queue_repository: Arc<dyn QueueRepository> =
        Arc::new(SqliteQueueRepository::new(pool.clone()));
    let pull_request_repository: Arc<dyn PullRequestRepository> =
        Arc::new(SqlitePullRequestRepository::new(pool.clone()));
    let configuration_repository: Arc<dyn ConfigurationRepository> = Arc::new(
        SqliteConfigurationRepository::new(pool.clone())
            .with_default_trigger_label(config.trigger_label()),
    );

    // Gateway + observability
    let gateway: Arc<dyn HostingGateway> = Arc::new(GitHubGateway::new(config.github_token())?);
    let metrics = Arc::new(MetricsService::new()?);
    let event_bus = Arc::new(EventBus::new());
    event_bus.subscribe(Arc::new(MetricsEventHandler::new(Arc::clone(&metrics))));

    // Check execution
    let cache = Arc::new(ResultCache::new(CacheConfig::default()));
    let factory = Arc::new(GatewayExecutorFactory::new(Arc::clone(&gateway)));
    let check_engine = Arc::new(CheckEngine::new(
        factory,
        Arc::clone(&cache),
        Arc::clone(&event_bus),
        Arc::clone(&metrics),
    ));

    // Pipeline + processor
    let processor_config = ProcessorConfig::default();
    let pipeline = Arc::new(EntryPipeline::new(
        Arc::clone(&queue_repository),
        Arc::clone(&pull_request_repository),
        Arc::clone(&configuration_repository),
        Arc::clone(&gateway),
        check_engine,
        Arc::clone(&cache),
        Arc::clone(&event_bus),
        Arc::clone(&metrics),
        RetryPolicy::default(),
    ));
    let shutdown = ShutdownCoordinator::new(processor_config.shutdown_timeout);
    let processor = Arc::new(QueueProcessor::new(
        Arc::clone(&queue_repository),
        pipeline,
        Arc::clone(&cache),
        Arc::clone(&event_bus),
        Arc::clone(&metrics),
        shutdown.token(),
        processor_config,
    ));

    // Ingress
    let enqueue = EnqueuePullRequest::new(
        Arc::clone(&queue_repository),
        Arc::clone(&pull_request_repository),
        Arc::clone(&event_bus),
    );
    let remove = RemoveFromQueue::new(
        queue_repository,
        pull_request_repository,
        Arc::clone(&event_bus),
    );
    let webhook = Arc::new(WebhookProcessor::new(
        Arc::clone(&configuration_repository),
        enqueue,
        remove,
        config.webhook_secret().map(str::to_string),
        Arc::clone(&metrics),
    ));

    Ok(App {
        processor,
        webhook,
        event_bus,
        metrics,
        configuration_repository,
        shutdown,
        pool,
    })
}
