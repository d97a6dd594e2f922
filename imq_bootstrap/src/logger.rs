// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging Setup
//!
//! tracing-subscriber initialization for the whole process. The level comes
//! from `IMQ_LOG_LEVEL` (any `EnvFilter` directive string works, so
//! `info,imq=debug` is valid); the format is pretty for terminals and JSON
//! for log pipelines.

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Initializes the global tracing subscriber. Call once, before any
/// component logs.
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_current_span(false)
                .init();
        }
    }
}
