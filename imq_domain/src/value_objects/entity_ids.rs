// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entity Identifiers
//!
//! Strongly-typed identifiers for every aggregate in the merge-queue domain,
//! each a thin wrapper over [`GenericId`] with its own marker. The wrappers
//! keep function signatures honest: a queue lookup cannot silently receive a
//! pull-request id.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::MergeQueueError;
use crate::value_objects::generic_id::{GenericId, IdCategory};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident, $marker:ident, $category:literal) => {
        #[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
        struct $marker;

        impl IdCategory for $marker {
            fn category_name() -> &'static str {
                $category
            }
        }

        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
        )]
        pub struct $name(GenericId<$marker>);

        impl $name {
            /// Generates a new id with the current timestamp.
            pub fn new() -> Self {
                Self(GenericId::new())
            }

            /// Wraps an existing ULID.
            pub fn from_ulid(ulid: Ulid) -> Self {
                Self(GenericId::from_ulid(ulid))
            }

            /// Parses the canonical ULID string form.
            pub fn from_string(s: &str) -> Result<Self, MergeQueueError> {
                Ok(Self(GenericId::from_string(s)?))
            }

            /// Underlying ULID.
            pub fn as_ulid(&self) -> Ulid {
                self.0.as_ulid()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = MergeQueueError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_string(s)
            }
        }
    };
}

entity_id!(
    /// Identifier for a managed repository.
    RepositoryId,
    RepositoryMarker,
    "repository"
);

entity_id!(
    /// Identifier for a pull request tracked by the queue.
    PullRequestId,
    PullRequestMarker,
    "pull request"
);

entity_id!(
    /// Identifier for a per-branch merge queue.
    QueueId,
    QueueMarker,
    "queue"
);

entity_id!(
    /// Identifier for a single queue entry.
    QueueEntryId,
    QueueEntryMarker,
    "queue entry"
);
