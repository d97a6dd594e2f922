// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Repository Entity
//!
//! Identity of a managed hosting-service repository. Immutable after
//! creation: the entity owns nothing beyond `{owner, name}`, the default
//! branch name, and its creation timestamp. Queues and pull requests refer to
//! it by [`RepositoryId`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MergeQueueError;
use crate::value_objects::RepositoryId;

/// A hosting-service repository managed by the merge queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    // Identity fields (always first)
    id: RepositoryId,
    owner: String,
    name: String,

    // Core business fields
    default_branch: String,

    // Metadata fields (always last)
    created_at: DateTime<Utc>,
}

impl Repository {
    /// Creates a new repository identity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when owner or name is empty.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Result<Self, MergeQueueError> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() {
            return Err(MergeQueueError::invalid_config(
                "repository owner and name cannot be empty",
            ));
        }
        Ok(Self {
            id: RepositoryId::new(),
            owner,
            name,
            default_branch: default_branch.into(),
            created_at: Utc::now(),
        })
    }

    /// Parses the `owner/name` form used by configuration and the webhook
    /// payloads.
    pub fn from_full_name(
        full_name: &str,
        default_branch: impl Into<String>,
    ) -> Result<Self, MergeQueueError> {
        match full_name.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                Self::new(owner, name, default_branch)
            }
            _ => Err(MergeQueueError::invalid_config(format!(
                "repository '{}' is not in owner/name form",
                full_name
            ))),
        }
    }

    /// Reconstitutes a repository from stored fields (for repository
    /// implementations).
    pub fn from_database(
        id: RepositoryId,
        owner: String,
        name: String,
        default_branch: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            name,
            default_branch,
            created_at,
        }
    }

    pub fn id(&self) -> &RepositoryId {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    /// Renders the canonical `owner/name` form.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}
