// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Configuration Repository
//!
//! Single-row persistence for the system configuration. The check
//! configuration and notification templates are stored as JSON columns;
//! `get` returns defaults when the row has never been written, and is called
//! fresh on every webhook delivery (reload-without-restart).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use imq_domain::entities::{CheckConfiguration, NotificationTemplates, SystemConfiguration};
use imq_domain::repositories::ConfigurationRepository;
use imq_domain::MergeQueueError;

use crate::infrastructure::repositories::db_err;

/// SQLite-backed configuration persistence (logical row id 1).
pub struct SqliteConfigurationRepository {
    pool: SqlitePool,
    fallback: SystemConfiguration,
}

impl SqliteConfigurationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            fallback: SystemConfiguration::default(),
        }
    }

    /// Overrides the trigger label served while no configuration row exists
    /// (the `IMQ_TRIGGER_LABEL` environment default).
    pub fn with_default_trigger_label(mut self, label: &str) -> Self {
        self.fallback.set_trigger_label(label);
        self
    }
}

#[async_trait]
impl ConfigurationRepository for SqliteConfigurationRepository {
    async fn get(&self) -> Result<SystemConfiguration, MergeQueueError> {
        let row = sqlx::query(
            "SELECT trigger_label, check_configuration, notification_templates, updated_at \
             FROM system_configuration WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(self.fallback.clone());
        };

        let check_configuration: CheckConfiguration =
            serde_json::from_str(row.try_get("check_configuration").map_err(db_err)?)?;
        let templates: NotificationTemplates =
            serde_json::from_str(row.try_get("notification_templates").map_err(db_err)?)?;

        Ok(SystemConfiguration::from_database(
            row.try_get("trigger_label").map_err(db_err)?,
            check_configuration,
            templates,
            row.try_get::<DateTime<Utc>, _>("updated_at")
                .map_err(db_err)?,
        ))
    }

    async fn save(&self, configuration: &SystemConfiguration) -> Result<(), MergeQueueError> {
        let check_configuration = serde_json::to_string(configuration.check_configuration())?;
        let templates = serde_json::to_string(configuration.templates())?;

        sqlx::query(
            "INSERT INTO system_configuration \
             (id, trigger_label, check_configuration, notification_templates, updated_at) \
             VALUES (1, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
               trigger_label = excluded.trigger_label, \
               check_configuration = excluded.check_configuration, \
               notification_templates = excluded.notification_templates, \
               updated_at = excluded.updated_at",
        )
        .bind(configuration.trigger_label())
        .bind(check_configuration)
        .bind(templates)
        .bind(configuration.updated_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
