// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # IMQ Domain Layer
//!
//! Pure business logic for the IMQ merge-queue controller: entities, value
//! objects, domain events, errors, and the ports (repository and gateway
//! traits) that infrastructure adapters implement.
//!
//! ## Overview
//!
//! IMQ queues labeled pull requests per target branch and drives each entry
//! through a fixed pipeline (conflict detection, branch update, configurable
//! checks, merge). This crate owns the model that pipeline operates on:
//!
//! - **Entities**: [`Repository`], [`PullRequest`], [`Queue`], [`QueueEntry`],
//!   [`Check`] configuration types, and the [`SystemConfiguration`] singleton
//! - **Value objects**: ULID-backed typed identifiers, [`CommitSha`],
//!   [`QueuePriority`]
//! - **Events**: the [`QueueEvent`] lifecycle union published to observers
//! - **Ports**: async repository traits and the [`HostingGateway`] interface
//!   to the hosting service
//!
//! ## Domain purity
//!
//! This crate carries no runtime, no logging, and no I/O. Ports are `async`
//! because they abstract I/O, but every implementation lives in the `imq`
//! crate's infrastructure layer.

pub mod entities;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
// These exports provide a clean API surface for consumers of the domain layer
pub use entities::{
    Check, CheckConfiguration, CheckExecutionResult, CheckId, CheckKind, CheckResult, CheckStatus,
    EntryStatus, NotificationTemplates, PullRequest, Queue, QueueEntry, Repository,
    SystemConfiguration,
};
pub use error::MergeQueueError;
pub use events::*;
pub use services::hosting_gateway::{
    CompareResult, CompareStatus, GatewayPullRequest, HostingGateway, MergeMethod, MergeOutcome,
    MergeableState, WorkflowRun, WorkflowRunStatus,
};
pub use value_objects::{
    CommitSha, PullRequestId, QueueEntryId, QueueId, QueuePriority, RepositoryId,
};
