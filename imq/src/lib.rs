// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # IMQ Application & Infrastructure
//!
//! The runnable half of the merge-queue controller. The `imq-domain` crate
//! defines the model; this crate supplies:
//!
//! - **Application services** -- the queue-processor control loop, the
//!   per-entry pipeline state machine, the check-execution engine, and the
//!   webhook-driven use cases
//! - **Infrastructure adapters** -- the reqwest GitHub gateway, SQLite
//!   repositories, the TTL-bounded result cache, the WDRR scheduler, the
//!   retry policy, the HMAC-verified webhook ingress, the event bus, and
//!   Prometheus metrics
//! - **Wiring** -- [`wiring::build_app`] constructs the component graph
//!   bottom-up and returns a record of handles
//!
//! The embedded HTTP front end and the WebSocket broadcaster are external
//! collaborators: mount [`infrastructure::webhook::WebhookProcessor::process`]
//! behind `POST /webhook/github` and subscribe a forwarder to the
//! [`infrastructure::event_bus::EventBus`] to integrate them.

// Production code safety enforced via CI lint profile
// (lib/bins checked separately from tests - tests may use unwrap/expect)

pub mod application;
pub mod infrastructure;
pub mod wiring;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: separate files in tests/ directory

// Re-export domain types for convenient access
pub use imq_domain::{MergeQueueError, QueueEvent};
