// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Queue Repository
//!
//! Persists queues and their entries. The contract's consistency-sensitive
//! operations run in transactions:
//!
//! - `save` replaces the queue's full entry set atomically
//! - `remove_entry` deletes and compacts positions in one transaction, so a
//!   concurrent `find` sees either the old contiguous ordering or the new
//!   one, never a gap

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use imq_domain::entities::queue::{Queue, QueueData};
use imq_domain::entities::queue_entry::{EntryStatus, QueueEntry, QueueEntryData};
use imq_domain::repositories::QueueRepository;
use imq_domain::value_objects::{PullRequestId, QueueEntryId, QueueId, RepositoryId};
use imq_domain::MergeQueueError;

use crate::infrastructure::repositories::db_err;

/// SQLite-backed queue persistence.
pub struct SqliteQueueRepository {
    pool: SqlitePool,
}

impl SqliteQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_entry(row: &sqlx::sqlite::SqliteRow) -> Result<QueueEntry, MergeQueueError> {
        let data = QueueEntryData {
            id: QueueEntryId::from_string(row.try_get("id").map_err(db_err)?)?,
            queue_id: QueueId::from_string(row.try_get("queue_id").map_err(db_err)?)?,
            pull_request_id: PullRequestId::from_string(
                row.try_get("pull_request_id").map_err(db_err)?,
            )?,
            position: row.try_get::<i64, _>("position").map_err(db_err)? as u32,
            status: EntryStatus::parse(row.try_get("status").map_err(db_err)?)?,
            enqueued_at: row
                .try_get::<DateTime<Utc>, _>("enqueued_at")
                .map_err(db_err)?,
            started_at: row
                .try_get::<Option<DateTime<Utc>>, _>("started_at")
                .map_err(db_err)?,
            completed_at: row
                .try_get::<Option<DateTime<Utc>>, _>("completed_at")
                .map_err(db_err)?,
        };
        Ok(QueueEntry::from_database(data))
    }

    async fn load_entries(&self, queue_id: &QueueId) -> Result<Vec<QueueEntry>, MergeQueueError> {
        let rows = sqlx::query(
            "SELECT id, queue_id, pull_request_id, position, status, enqueued_at, \
             started_at, completed_at \
             FROM queue_entries WHERE queue_id = ? ORDER BY position",
        )
        .bind(queue_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::map_entry).collect()
    }

    async fn hydrate(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Queue, MergeQueueError> {
        let id = QueueId::from_string(row.try_get("id").map_err(db_err)?)?;
        let entries = self.load_entries(&id).await?;
        Queue::from_database(QueueData {
            id,
            repository_id: RepositoryId::from_string(
                row.try_get("repository_id").map_err(db_err)?,
            )?,
            base_branch: row.try_get("base_branch").map_err(db_err)?,
            entries,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(db_err)?,
        })
    }
}

#[async_trait]
impl QueueRepository for SqliteQueueRepository {
    async fn find_all(&self) -> Result<Vec<Queue>, MergeQueueError> {
        let rows = sqlx::query(
            "SELECT id, repository_id, base_branch, created_at FROM queues ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut queues = Vec::with_capacity(rows.len());
        for row in &rows {
            queues.push(self.hydrate(row).await?);
        }
        Ok(queues)
    }

    async fn find(
        &self,
        repository_id: &RepositoryId,
        base_branch: &str,
    ) -> Result<Option<Queue>, MergeQueueError> {
        let row = sqlx::query(
            "SELECT id, repository_id, base_branch, created_at FROM queues \
             WHERE repository_id = ? AND base_branch = ?",
        )
        .bind(repository_id.to_string())
        .bind(base_branch)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: &QueueId) -> Result<Option<Queue>, MergeQueueError> {
        let row = sqlx::query(
            "SELECT id, repository_id, base_branch, created_at FROM queues WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn save(&self, queue: &Queue) -> Result<(), MergeQueueError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO queues (id, repository_id, base_branch, created_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(queue.id().to_string())
        .bind(queue.repository_id().to_string())
        .bind(queue.base_branch())
        .bind(queue.created_at())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        // Replace the entry set wholesale; the aggregate is the truth.
        sqlx::query("DELETE FROM queue_entries WHERE queue_id = ?")
            .bind(queue.id().to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for entry in queue.entries() {
            sqlx::query(
                "INSERT INTO queue_entries \
                 (id, queue_id, pull_request_id, position, status, enqueued_at, started_at, completed_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(entry.id().to_string())
            .bind(entry.queue_id().to_string())
            .bind(entry.pull_request_id().to_string())
            .bind(entry.position() as i64)
            .bind(entry.status().as_str())
            .bind(entry.enqueued_at())
            .bind(entry.started_at())
            .bind(entry.completed_at())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }

    async fn delete(&self, id: &QueueId) -> Result<bool, MergeQueueError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM queue_entries WHERE queue_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let result = sqlx::query("DELETE FROM queues WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_entry(&self, entry: &QueueEntry) -> Result<(), MergeQueueError> {
        sqlx::query(
            "UPDATE queue_entries \
             SET position = ?, status = ?, started_at = ?, completed_at = ? \
             WHERE id = ?",
        )
        .bind(entry.position() as i64)
        .bind(entry.status().as_str())
        .bind(entry.started_at())
        .bind(entry.completed_at())
        .bind(entry.id().to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn remove_entry(
        &self,
        queue_id: &QueueId,
        entry_id: &QueueEntryId,
    ) -> Result<bool, MergeQueueError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let position: Option<i64> =
            sqlx::query_scalar("SELECT position FROM queue_entries WHERE id = ? AND queue_id = ?")
                .bind(entry_id.to_string())
                .bind(queue_id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let Some(position) = position else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM queue_entries WHERE id = ?")
            .bind(entry_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        // Compact: close the gap so positions stay 0, 1, 2, ...
        sqlx::query(
            "UPDATE queue_entries SET position = position - 1 \
             WHERE queue_id = ? AND position > ?",
        )
        .bind(queue_id.to_string())
        .bind(position)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn get_entries(&self, queue_id: &QueueId) -> Result<Vec<QueueEntry>, MergeQueueError> {
        self.load_entries(queue_id).await
    }

    async fn reorder_entries(
        &self,
        queue_id: &QueueId,
        ordered: &[QueueEntryId],
    ) -> Result<(), MergeQueueError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for (position, entry_id) in ordered.iter().enumerate() {
            sqlx::query("UPDATE queue_entries SET position = ? WHERE id = ? AND queue_id = ?")
                .bind(position as i64)
                .bind(entry_id.to_string())
                .bind(queue_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }
}
