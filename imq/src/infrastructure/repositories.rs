// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence adapters: SQLite implementations of the repository ports,
//! the shared schema bootstrap, and in-memory implementations for tests.

pub mod in_memory;
pub mod schema;
pub mod sqlite_configuration_repository;
pub mod sqlite_pull_request_repository;
pub mod sqlite_queue_repository;

pub use in_memory::{
    InMemoryConfigurationRepository, InMemoryPullRequestRepository, InMemoryQueueRepository,
};
pub use sqlite_configuration_repository::SqliteConfigurationRepository;
pub use sqlite_pull_request_repository::SqlitePullRequestRepository;
pub use sqlite_queue_repository::SqliteQueueRepository;

use imq_domain::MergeQueueError;

/// Maps driver errors into the domain error at the persistence boundary.
pub(crate) fn db_err(error: sqlx::Error) -> MergeQueueError {
    MergeQueueError::database_error(error.to_string())
}
