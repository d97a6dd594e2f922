// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Configuration
//!
//! Bootstrap-phase configuration from `IMQ_*` environment variables.
//!
//! All configuration is **immutable** after creation: validated once at
//! startup, then shared freely across tasks. Missing required keys and
//! malformed values are fatal ([`ConfigError`]), reported before anything
//! else starts.
//!
//! | Key | Effect | Default |
//! |---|---|---|
//! | `IMQ_GITHUB_TOKEN` | bearer token for the gateway | required |
//! | `IMQ_GITHUB_REPO` | `owner/name` of the managed repository | required |
//! | `IMQ_WEBHOOK_SECRET` | HMAC key; empty disables verification | empty |
//! | `IMQ_TRIGGER_LABEL` | label that enqueues a PR | `A-merge` |
//! | `IMQ_API_HOST` / `IMQ_API_PORT` | webhook + REST listen address | `0.0.0.0:8080` |
//! | `IMQ_DATABASE_PATH` | SQLite database location | `~/.imq/imq.db` |
//! | `IMQ_DATABASE_POOL_SIZE` | connection cap | `5` |
//! | `IMQ_LOG_LEVEL` / `IMQ_LOG_FORMAT` | observability | `info` / `pretty` |

use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems, reported at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVariable(&'static str),

    #[error("invalid value for {variable}: {message}")]
    InvalidValue {
        variable: &'static str,
        message: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-oriented colored output.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Validated, immutable application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    github_token: String,
    repo_owner: String,
    repo_name: String,
    webhook_secret: Option<String>,
    trigger_label: String,
    api_host: String,
    api_port: u16,
    database_path: PathBuf,
    database_pool_size: u32,
    log_level: String,
    log_format: LogFormat,
}

impl AppConfig {
    /// Loads and validates configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let github_token = require("IMQ_GITHUB_TOKEN")?;
        let repo = require("IMQ_GITHUB_REPO")?;
        let (repo_owner, repo_name) = match repo.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                (owner.to_string(), name.to_string())
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    variable: "IMQ_GITHUB_REPO",
                    message: format!("'{}' is not in owner/name form", repo),
                })
            }
        };

        let webhook_secret = optional("IMQ_WEBHOOK_SECRET").filter(|s| !s.is_empty());
        let trigger_label =
            optional("IMQ_TRIGGER_LABEL").unwrap_or_else(|| "A-merge".to_string());
        let api_host = optional("IMQ_API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let api_port = match optional("IMQ_API_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                variable: "IMQ_API_PORT",
                message: e.to_string(),
            })?,
            None => 8080,
        };

        let database_path = optional("IMQ_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);
        let database_pool_size = match optional("IMQ_DATABASE_POOL_SIZE") {
            Some(raw) => {
                let size = raw.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                    variable: "IMQ_DATABASE_POOL_SIZE",
                    message: e.to_string(),
                })?;
                if size == 0 {
                    return Err(ConfigError::InvalidValue {
                        variable: "IMQ_DATABASE_POOL_SIZE",
                        message: "pool size must be at least 1".into(),
                    });
                }
                size
            }
            None => 5,
        };

        let log_level = optional("IMQ_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_format = match optional("IMQ_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    variable: "IMQ_LOG_FORMAT",
                    message: format!("'{}' is neither 'pretty' nor 'json'", other),
                })
            }
        };

        Ok(Self {
            github_token,
            repo_owner,
            repo_name,
            webhook_secret,
            trigger_label,
            api_host,
            api_port,
            database_path,
            database_pool_size,
            log_level,
            log_format,
        })
    }

    pub fn github_token(&self) -> &str {
        &self.github_token
    }

    pub fn repo_owner(&self) -> &str {
        &self.repo_owner
    }

    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }

    pub fn trigger_label(&self) -> &str {
        &self.trigger_label
    }

    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    pub fn api_port(&self) -> u16 {
        self.api_port
    }

    pub fn database_path(&self) -> &PathBuf {
        &self.database_path
    }

    /// SQLite connection URL for the configured path.
    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.database_path.display())
    }

    pub fn database_pool_size(&self) -> u32 {
        self.database_pool_size
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

fn require(variable: &'static str) -> Result<String, ConfigError> {
    std::env::var(variable)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVariable(variable))
}

fn optional(variable: &'static str) -> Option<String> {
    std::env::var(variable).ok()
}

fn default_database_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".imq").join("imq.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment-variable tests mutate process state; keep them in one test
    // so they cannot race each other under the parallel test runner.
    #[test]
    fn from_env_validates_and_defaults() {
        let cleanup = [
            "IMQ_GITHUB_TOKEN",
            "IMQ_GITHUB_REPO",
            "IMQ_WEBHOOK_SECRET",
            "IMQ_TRIGGER_LABEL",
            "IMQ_API_PORT",
            "IMQ_DATABASE_POOL_SIZE",
            "IMQ_LOG_FORMAT",
        ];
        for key in cleanup {
            std::env::remove_var(key);
        }

        // Missing token is fatal
        assert!(matches!(
            AppConfig::from_env(),
            Err(ConfigError::MissingVariable("IMQ_GITHUB_TOKEN"))
        ));

        std::env::set_var("IMQ_GITHUB_TOKEN", "ghp_test");
        std::env::set_var("IMQ_GITHUB_REPO", "not-owner-name");
        assert!(matches!(
            AppConfig::from_env(),
            Err(ConfigError::InvalidValue {
                variable: "IMQ_GITHUB_REPO",
                ..
            })
        ));

        std::env::set_var("IMQ_GITHUB_REPO", "octo/hello");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.repo_owner(), "octo");
        assert_eq!(config.repo_name(), "hello");
        assert_eq!(config.trigger_label(), "A-merge");
        assert_eq!(config.api_port(), 8080);
        assert_eq!(config.database_pool_size(), 5);
        assert_eq!(config.log_format(), LogFormat::Pretty);
        assert!(config.webhook_secret().is_none());

        // Empty secret stays disabled; explicit values win
        std::env::set_var("IMQ_WEBHOOK_SECRET", "");
        std::env::set_var("IMQ_TRIGGER_LABEL", "ship-it");
        std::env::set_var("IMQ_API_PORT", "9090");
        std::env::set_var("IMQ_LOG_FORMAT", "json");
        let config = AppConfig::from_env().unwrap();
        assert!(config.webhook_secret().is_none());
        assert_eq!(config.trigger_label(), "ship-it");
        assert_eq!(config.api_port(), 9090);
        assert_eq!(config.log_format(), LogFormat::Json);

        std::env::set_var("IMQ_LOG_FORMAT", "xml");
        assert!(AppConfig::from_env().is_err());

        for key in cleanup {
            std::env::remove_var(key);
        }
    }
}
