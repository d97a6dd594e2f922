// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A single hierarchical error type for the merge-queue domain. Variants are
//! grouped into logical categories so callers can handle failures
//! systematically:
//!
//! - **Configuration errors** -- invalid environment or check configuration.
//!   Fatal at startup, terminal for the affected entry otherwise.
//! - **Gateway errors** -- classified hosting-service failures
//!   (`Unauthorized`, `Forbidden`, `NotFound`, `RateLimitExceeded`,
//!   `HttpError`, `NetworkError`). Only the retriable subset is re-run by the
//!   retry policy.
//! - **Domain errors** -- conflict detected, checks failed, branch
//!   protection, not mergeable. Terminal for the entry; reported via a PR
//!   comment and an event.
//! - **Infrastructure errors** -- database, serialization, timeouts.
//! - **Lifecycle errors** -- invalid status transitions, processor state
//!   misuse, cancellation.
//!
//! Classification lives on the type itself ([`MergeQueueError::is_retriable`],
//! [`MergeQueueError::category`]) so the retry policy and metrics never need
//! to pattern-match at a distance.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Domain-specific errors for the merge-queue system.
///
/// Each variant carries a descriptive message. Gateway variants mirror the
/// classification the hosting-service adapter performs at the HTTP boundary;
/// everything downstream works with these typed kinds only.
#[derive(Error, Debug, Clone)]
pub enum MergeQueueError {
    // Configuration / validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    // Lookups
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Queue entry not found: {0}")]
    EntryNotFound(String),

    #[error("Pull request not found: {0}")]
    PullRequestNotFound(String),

    // Gateway classification
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found upstream: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded (resets at {reset_at:?})")]
    RateLimitExceeded { reset_at: Option<DateTime<Utc>> },

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    // Domain failures (terminal for the entry)
    #[error("Merge conflict detected: {0}")]
    ConflictDetected(String),

    #[error("Checks failed: {0}")]
    ChecksFailed(String),

    #[error("Pull request is not mergeable: {0}")]
    NotMergeable(String),

    #[error("Branch protection violation: {0}")]
    BranchProtectionViolation(String),

    // Infrastructure
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    // Lifecycle
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Processor is already running")]
    ProcessorAlreadyRunning,

    #[error("Processor is not running")]
    ProcessorNotRunning,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl MergeQueueError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Creates a new database error
    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Creates a new serialization error
    pub fn serialization_error(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Creates a new network error
    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Creates a new timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Creates a new metrics error
    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::MetricsError(msg.into())
    }

    /// Whether the retry policy may re-run the failed operation.
    ///
    /// Retriable: transient network failures, timeouts, rate-limit signals,
    /// and 5xx responses. Everything else (auth failures, other 4xx,
    /// validation, cancellation) is terminal.
    pub fn is_retriable(&self) -> bool {
        match self {
            MergeQueueError::NetworkError(_)
            | MergeQueueError::TimeoutError(_)
            | MergeQueueError::RateLimitExceeded { .. } => true,
            MergeQueueError::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether this error represents a cancellation rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MergeQueueError::Cancelled(_))
    }

    /// Gets the error category (used as a metrics label)
    pub fn category(&self) -> &'static str {
        match self {
            MergeQueueError::InvalidConfiguration(_) => "configuration",
            MergeQueueError::ValidationError(_) => "validation",
            MergeQueueError::InvalidTransition(_) => "lifecycle",
            MergeQueueError::QueueNotFound(_)
            | MergeQueueError::EntryNotFound(_)
            | MergeQueueError::PullRequestNotFound(_) => "lookup",
            MergeQueueError::Unauthorized(_) | MergeQueueError::Forbidden(_) => "auth",
            MergeQueueError::NotFound(_) => "not-found",
            MergeQueueError::RateLimitExceeded { .. } => "rate-limit",
            MergeQueueError::HttpError { .. } => "http",
            MergeQueueError::NetworkError(_) => "network",
            MergeQueueError::ConflictDetected(_) => "conflict",
            MergeQueueError::ChecksFailed(_) => "checks",
            MergeQueueError::NotMergeable(_) => "merge",
            MergeQueueError::BranchProtectionViolation(_) => "branch-protection",
            MergeQueueError::DatabaseError(_) => "database",
            MergeQueueError::SerializationError(_) => "serialization",
            MergeQueueError::TimeoutError(_) => "timeout",
            MergeQueueError::MetricsError(_) => "metrics",
            MergeQueueError::Cancelled(_) => "cancellation",
            MergeQueueError::ProcessorAlreadyRunning | MergeQueueError::ProcessorNotRunning => {
                "processor"
            }
            MergeQueueError::InternalError(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for MergeQueueError {
    fn from(err: std::io::Error) -> Self {
        MergeQueueError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for MergeQueueError {
    fn from(err: serde_json::Error) -> Self {
        MergeQueueError::SerializationError(err.to_string())
    }
}
