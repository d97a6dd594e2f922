// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration Repository Port
//!
//! Single-row persistence for the [`SystemConfiguration`] singleton. `get`
//! returns the defaults when no row has been written yet, so callers never
//! need a bootstrap step. The row is re-read per webhook request and per
//! pipeline run; implementations must not cache across calls.

use async_trait::async_trait;

use crate::entities::system_configuration::SystemConfiguration;
use crate::error::MergeQueueError;

/// Persistence port for the system configuration singleton.
#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    /// Reads the configuration row, falling back to
    /// [`SystemConfiguration::default`] when absent.
    async fn get(&self) -> Result<SystemConfiguration, MergeQueueError>;

    /// Writes the configuration row (logical id 1).
    async fn save(&self, configuration: &SystemConfiguration) -> Result<(), MergeQueueError>;
}
