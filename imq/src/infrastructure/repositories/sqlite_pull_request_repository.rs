// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Pull Request Repository
//!
//! Persists pull-request snapshots and the immutable repository identities
//! they belong to. Pull requests are upserted on every webhook delivery and
//! pipeline rewrite; repository rows are insert-once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use imq_domain::entities::pull_request::{PullRequest, PullRequestData};
use imq_domain::entities::Repository;
use imq_domain::repositories::PullRequestRepository;
use imq_domain::value_objects::{CommitSha, PullRequestId, RepositoryId};
use imq_domain::MergeQueueError;

use crate::infrastructure::repositories::db_err;

/// SQLite-backed pull-request persistence.
pub struct SqlitePullRequestRepository {
    pool: SqlitePool,
}

impl SqlitePullRequestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_pull_request(row: &sqlx::sqlite::SqliteRow) -> Result<PullRequest, MergeQueueError> {
        let data = PullRequestData {
            id: PullRequestId::from_string(row.try_get("id").map_err(db_err)?)?,
            repository_id: RepositoryId::from_string(
                row.try_get("repository_id").map_err(db_err)?,
            )?,
            number: row.try_get::<i64, _>("number").map_err(db_err)? as u64,
            title: row.try_get("title").map_err(db_err)?,
            author: row.try_get("author").map_err(db_err)?,
            base_branch: row.try_get("base_branch").map_err(db_err)?,
            head_branch: row.try_get("head_branch").map_err(db_err)?,
            head_sha: CommitSha::new(row.try_get::<String, _>("head_sha").map_err(db_err)?)?,
            is_conflicted: row.try_get::<bool, _>("is_conflicted").map_err(db_err)?,
            is_up_to_date: row.try_get::<bool, _>("is_up_to_date").map_err(db_err)?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(db_err)?,
            updated_at: row
                .try_get::<DateTime<Utc>, _>("updated_at")
                .map_err(db_err)?,
        };
        Ok(PullRequest::from_database(data))
    }

    fn map_repository(row: &sqlx::sqlite::SqliteRow) -> Result<Repository, MergeQueueError> {
        Ok(Repository::from_database(
            RepositoryId::from_string(row.try_get("id").map_err(db_err)?)?,
            row.try_get("owner").map_err(db_err)?,
            row.try_get("name").map_err(db_err)?,
            row.try_get("default_branch").map_err(db_err)?,
            row.try_get::<DateTime<Utc>, _>("created_at")
                .map_err(db_err)?,
        ))
    }
}

const PR_COLUMNS: &str = "id, repository_id, number, title, author, base_branch, head_branch, \
                          head_sha, is_conflicted, is_up_to_date, created_at, updated_at";

#[async_trait]
impl PullRequestRepository for SqlitePullRequestRepository {
    async fn find_by_id(
        &self,
        id: &PullRequestId,
    ) -> Result<Option<PullRequest>, MergeQueueError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pull_requests WHERE id = ?",
            PR_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::map_pull_request).transpose()
    }

    async fn find_by_number(
        &self,
        repository_id: &RepositoryId,
        number: u64,
    ) -> Result<Option<PullRequest>, MergeQueueError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pull_requests WHERE repository_id = ? AND number = ?",
            PR_COLUMNS
        ))
        .bind(repository_id.to_string())
        .bind(number as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::map_pull_request).transpose()
    }

    async fn save(&self, pull_request: &PullRequest) -> Result<(), MergeQueueError> {
        sqlx::query(
            "INSERT INTO pull_requests \
             (id, repository_id, number, title, author, base_branch, head_branch, \
              head_sha, is_conflicted, is_up_to_date, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
               title = excluded.title, \
               base_branch = excluded.base_branch, \
               head_branch = excluded.head_branch, \
               head_sha = excluded.head_sha, \
               is_conflicted = excluded.is_conflicted, \
               is_up_to_date = excluded.is_up_to_date, \
               updated_at = excluded.updated_at",
        )
        .bind(pull_request.id().to_string())
        .bind(pull_request.repository_id().to_string())
        .bind(pull_request.number() as i64)
        .bind(pull_request.title())
        .bind(pull_request.author())
        .bind(pull_request.base_branch())
        .bind(pull_request.head_branch())
        .bind(pull_request.head_sha().as_str())
        .bind(pull_request.is_conflicted())
        .bind(pull_request.is_up_to_date())
        .bind(pull_request.created_at())
        .bind(pull_request.updated_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, id: &PullRequestId) -> Result<bool, MergeQueueError> {
        let result = sqlx::query("DELETE FROM pull_requests WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Repository>, MergeQueueError> {
        let row = sqlx::query(
            "SELECT id, owner, name, default_branch, created_at FROM repositories \
             WHERE owner = ? AND name = ?",
        )
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::map_repository).transpose()
    }

    async fn find_repository_by_id(
        &self,
        id: &RepositoryId,
    ) -> Result<Option<Repository>, MergeQueueError> {
        let row = sqlx::query(
            "SELECT id, owner, name, default_branch, created_at FROM repositories WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::map_repository).transpose()
    }

    async fn save_repository(&self, repository: &Repository) -> Result<(), MergeQueueError> {
        sqlx::query(
            "INSERT INTO repositories (id, owner, name, default_branch, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (owner, name) DO NOTHING",
        )
        .bind(repository.id().to_string())
        .bind(repository.owner())
        .bind(repository.name())
        .bind(repository.default_branch())
        .bind(repository.created_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
