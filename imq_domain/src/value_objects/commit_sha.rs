// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Commit SHA Value Object
//!
//! Validated wrapper around a Git commit identifier. Construction rejects
//! anything that is not 7-64 hexadecimal characters, so every `CommitSha`
//! held by the domain is well-formed. The value is also the first half of the
//! result-cache key `(sha, check name)`.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MergeQueueError;

/// A validated Git commit SHA.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitSha(String);

impl CommitSha {
    /// Creates a commit SHA, validating format.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the input is not 7-64 hex characters.
    pub fn new(sha: impl Into<String>) -> Result<Self, MergeQueueError> {
        let sha = sha.into();
        if !(7..=64).contains(&sha.len()) {
            return Err(MergeQueueError::validation(format!(
                "commit sha '{}' must be 7-64 characters",
                sha
            )));
        }
        if !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MergeQueueError::validation(format!(
                "commit sha '{}' contains non-hexadecimal characters",
                sha
            )));
        }
        Ok(Self(sha.to_ascii_lowercase()))
    }

    /// Full SHA string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated 7-character form for log lines and comments.
    pub fn short(&self) -> &str {
        &self.0[..7]
    }
}

impl Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitSha {
    type Err = MergeQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CommitSha {
    type Error = MergeQueueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommitSha> for String {
    fn from(sha: CommitSha) -> Self {
        sha.0
    }
}
