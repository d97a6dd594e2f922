// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Check Executor Port
//!
//! One executor per [`CheckKind`]; the check-execution engine resolves the
//! executor for each configured check through the factory and runs it with
//! the pull request under test. Executors return a [`CheckResult`] for
//! expected verdicts (pass/fail with output) and an error only for
//! infrastructure failures the retry policy or the engine should see.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entities::check::{Check, CheckKind, CheckResult};
use crate::entities::pull_request::PullRequest;
use crate::entities::repository::Repository;
use crate::error::MergeQueueError;

/// Runs a single check against a pull request head.
#[async_trait]
pub trait CheckExecutor: Send + Sync {
    /// Executes the check and produces its terminal result.
    async fn execute(
        &self,
        check: &Check,
        pull_request: &PullRequest,
        repository: &Repository,
    ) -> Result<CheckResult, MergeQueueError>;
}

/// Resolves the executor responsible for a check kind.
pub trait CheckExecutorFactory: Send + Sync {
    fn executor_for(&self, kind: &CheckKind) -> Arc<dyn CheckExecutor>;
}
