// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Webhook-driven queue mutations, one struct per use case.

pub mod enqueue_pull_request;
pub mod remove_from_queue;

pub use enqueue_pull_request::{EnqueueInput, EnqueuePullRequest};
pub use remove_from_queue::RemoveFromQueue;
