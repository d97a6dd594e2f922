// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Check Result Cache
//!
//! Concurrent-safe map from `(commit SHA, check name)` to a terminal check
//! status. The check engine probes the cache before dispatching a check and
//! stores terminal results afterwards, so re-processing the same head (after
//! a transient pipeline failure, say) does not re-run expensive workflows.
//!
//! ## Bounds
//!
//! - **TTL**: entries expire `ttl` after insertion (default 3600 s). Expired
//!   entries are evicted lazily on `get` and swept by `purge_expired`, which
//!   the processor loop calls each cycle.
//! - **Capacity**: once the map exceeds `max_entries`, the oldest 10% by
//!   insertion time are evicted.
//!
//! A branch update produces a new head SHA; `invalidate_sha` drops every
//! entry for the superseded commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use imq_domain::{CheckStatus, CommitSha};

/// Tuning knobs for the result cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a stored result stays valid.
    pub ttl: Duration,
    /// Hard cap on stored entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: 1024,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedResult {
    status: CheckStatus,
    inserted_at: Instant,
    expires_at: Instant,
}

/// TTL- and capacity-bounded cache of check results.
pub struct ResultCache {
    entries: RwLock<HashMap<(CommitSha, String), CachedResult>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Looks up a cached status. Expired entries count as misses and are
    /// evicted on the spot.
    pub fn get(&self, sha: &CommitSha, check_name: &str) -> Option<CheckStatus> {
        let key = (sha.clone(), check_name.to_string());
        {
            let entries = self.entries.read();
            match entries.get(&key) {
                Some(cached) if cached.expires_at > Instant::now() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(cached.status);
                }
                Some(_) => {} // expired: fall through to evict
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }
        self.entries.write().remove(&key);
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores a terminal status with the configured TTL, evicting the oldest
    /// 10% when the capacity bound is exceeded.
    pub fn set(&self, sha: CommitSha, check_name: impl Into<String>, status: CheckStatus) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.insert(
            (sha, check_name.into()),
            CachedResult {
                status,
                inserted_at: now,
                expires_at: now + self.config.ttl,
            },
        );

        if entries.len() > self.config.max_entries {
            let evict_count = (self.config.max_entries / 10).max(1);
            let mut by_age: Vec<(Instant, (CommitSha, String))> = entries
                .iter()
                .map(|(key, value)| (value.inserted_at, key.clone()))
                .collect();
            by_age.sort_by_key(|(inserted_at, _)| *inserted_at);

            for (_, key) in by_age.into_iter().take(evict_count) {
                entries.remove(&key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Removes every entry whose key shares the given SHA. Returns how many
    /// were dropped.
    pub fn invalidate_sha(&self, sha: &CommitSha) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_sha, _), _| entry_sha != sha);
        let dropped = before - entries.len();
        self.evictions.fetch_add(dropped as u64, Ordering::Relaxed);
        dropped
    }

    /// Sweeps expired entries. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, cached| cached.expires_at > now);
        let dropped = before - entries.len();
        self.evictions.fetch_add(dropped as u64, Ordering::Relaxed);
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn eviction_count(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha(n: u8) -> CommitSha {
        CommitSha::new(format!("{:040x}", n as u64 + 1)).unwrap()
    }

    #[test]
    fn get_after_set_hits() {
        let cache = ResultCache::default();
        cache.set(sha(1), "ci", CheckStatus::Passed);
        assert_eq!(cache.get(&sha(1), "ci"), Some(CheckStatus::Passed));
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn missing_key_is_a_miss() {
        let cache = ResultCache::default();
        assert_eq!(cache.get(&sha(1), "ci"), None);
        assert_eq!(cache.miss_count(), 1);
    }

    #[test]
    fn expired_entries_are_never_served() {
        let cache = ResultCache::new(CacheConfig {
            ttl: Duration::from_millis(0),
            max_entries: 16,
        });
        cache.set(sha(1), "ci", CheckStatus::Passed);
        assert_eq!(cache.get(&sha(1), "ci"), None);
        assert_eq!(cache.len(), 0, "expired entry evicted on access");
    }

    #[test]
    fn capacity_overflow_evicts_oldest_tenth() {
        let cache = ResultCache::new(CacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 10,
        });
        for n in 0..11 {
            cache.set(sha(n), "ci", CheckStatus::Passed);
        }
        assert!(cache.len() <= 10);
        // the first-inserted key is the one that went
        assert_eq!(cache.get(&sha(0), "ci"), None);
        assert_eq!(cache.get(&sha(10), "ci"), Some(CheckStatus::Passed));
    }

    #[test]
    fn invalidate_sha_drops_all_checks_for_that_commit() {
        let cache = ResultCache::default();
        cache.set(sha(1), "ci", CheckStatus::Passed);
        cache.set(sha(1), "lint", CheckStatus::Failed);
        cache.set(sha(2), "ci", CheckStatus::Passed);

        assert_eq!(cache.invalidate_sha(&sha(1)), 2);
        assert_eq!(cache.get(&sha(1), "ci"), None);
        assert_eq!(cache.get(&sha(2), "ci"), Some(CheckStatus::Passed));
    }

    #[test]
    fn purge_expired_sweeps() {
        let cache = ResultCache::new(CacheConfig {
            ttl: Duration::from_millis(0),
            max_entries: 16,
        });
        cache.set(sha(1), "ci", CheckStatus::Passed);
        cache.set(sha(2), "ci", CheckStatus::Passed);
        assert_eq!(cache.purge_expired(), 2);
        assert!(cache.is_empty());
    }
}
