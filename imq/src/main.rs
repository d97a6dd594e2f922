// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! IMQ service entry point: configuration, logging, wiring, signals, and
//! graceful shutdown. The embedding HTTP front end (webhook + REST) mounts
//! the handles exposed by [`imq::wiring::App`].

use tracing::{error, info};

use imq_bootstrap::{config::AppConfig, exit_code::ExitCode, logger, signals};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("configuration error: {error}");
            ExitCode::ConfigError.exit();
        }
    };
    logger::init_logging(config.log_level(), config.log_format());
    info!(
        repo = format!("{}/{}", config.repo_owner(), config.repo_name()),
        "starting imq"
    );

    let app = match imq::wiring::build_app(&config).await {
        Ok(app) => app,
        Err(error) => {
            error!(error = %error, "startup failed");
            ExitCode::StartupError.exit();
        }
    };

    if let Err(error) = app.processor.clone().start().await {
        error!(error = %error, "failed to start the queue processor");
        ExitCode::StartupError.exit();
    }
    info!(
        host = config.api_host(),
        port = config.api_port(),
        "processor running; webhook ingress ready for the HTTP front end"
    );

    signals::shutdown_signal().await;

    match app.processor.shutdown().await {
        Ok(()) => {
            app.pool.close().await;
            info!("shutdown complete");
            ExitCode::Success.exit();
        }
        Err(error) => {
            error!(error = %error, "shutdown failed");
            ExitCode::RuntimeError.exit();
        }
    }
}
