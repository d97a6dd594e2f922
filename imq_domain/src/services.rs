// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain service ports: the hosting-service gateway and the per-kind check
//! executors.

pub mod check_executor;
pub mod hosting_gateway;

pub use check_executor::{CheckExecutor, CheckExecutorFactory};
pub use hosting_gateway::HostingGateway;
