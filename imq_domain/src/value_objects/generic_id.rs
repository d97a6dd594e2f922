// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Generic Typed Identifier
//!
//! ULID-backed identifier with a phantom marker type so identifiers for
//! different entities cannot be confused at compile time. A `QueueId` is not
//! assignable where a `PullRequestId` is expected even though both wrap the
//! same 128-bit ULID representation.
//!
//! ## Why ULID
//!
//! - Time-ordered: ids sort by creation instant, which gives audit trails and
//!   range queries for free
//! - No coordination: 80 bits of randomness per millisecond
//! - Stable text form: 26-character Crockford Base32, used verbatim as the
//!   database column value and in serialized events

use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

use crate::error::MergeQueueError;

/// Category metadata for a typed identifier.
///
/// Implemented by zero-sized marker types; `category_name` shows up in error
/// messages so a malformed `QueueId` reads differently from a malformed
/// `PullRequestId`.
pub trait IdCategory {
    /// Human-readable category, e.g. `"queue"`.
    fn category_name() -> &'static str;
}

/// ULID newtype parameterized by an [`IdCategory`] marker.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub struct GenericId<T: IdCategory> {
    ulid: Ulid,
    _marker: PhantomData<T>,
}

impl<T: IdCategory> GenericId<T> {
    /// Generates a new id with the current timestamp.
    pub fn new() -> Self {
        Self {
            ulid: Ulid::new(),
            _marker: PhantomData,
        }
    }

    /// Wraps an existing ULID.
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// Parses the canonical 26-character ULID string form.
    pub fn from_string(s: &str) -> Result<Self, MergeQueueError> {
        let ulid = Ulid::from_string(s).map_err(|e| {
            MergeQueueError::invalid_config(format!(
                "invalid {} id '{}': {}",
                T::category_name(),
                s,
                e
            ))
        })?;
        Ok(Self::from_ulid(ulid))
    }

    /// Underlying ULID.
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Creation timestamp encoded in the id, milliseconds since the epoch.
    pub fn timestamp_ms(&self) -> u64 {
        self.ulid.timestamp_ms()
    }
}

impl<T: IdCategory> Default for GenericId<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IdCategory> Display for GenericId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ulid)
    }
}

impl<T: IdCategory> Hash for GenericId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ulid.hash(state);
    }
}

impl<T: IdCategory> FromStr for GenericId<T> {
    type Err = MergeQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl<T: IdCategory> Serialize for GenericId<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.ulid.to_string())
    }
}

impl<'de, T: IdCategory> Deserialize<'de> for GenericId<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_string(&s).map_err(serde::de::Error::custom)
    }
}
