// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Check Configuration Types
//!
//! The configurable gate between a branch update and the merge: a set of
//! [`Check`] definitions with dependencies forming an acyclic graph. The
//! check-execution engine runs independent checks of the same dependency
//! level in parallel and honors the configuration's fail-fast flag.
//!
//! The whole [`CheckConfiguration`] is stored as JSON in the system
//! configuration row, so every type here derives serde with stable,
//! snake_case field and tag names.
//!
//! ## Validation
//!
//! [`CheckConfiguration::validate`] rejects configurations whose dependency
//! graph references unknown ids or contains a cycle; [`CheckConfiguration::
//! levels`] groups checks by dependency depth for the engine's level-parallel
//! scheduling.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MergeQueueError;

/// Identifier of a check within one configuration.
///
/// Check ids are author-chosen strings scoped to the configuration, not
/// ULIDs: they appear in dependency lists written by hand.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct CheckId(String);

impl CheckId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CheckId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What kind of verification a check performs.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckKind {
    /// Dispatch a hosting-service workflow and poll its run to completion.
    Workflow { workflow: String },
    /// Pass iff the hosting service reports an acceptable aggregate status.
    StatusAggregate,
    /// Pass iff the hosting service reports the PR as mergeable.
    MergeabilityProbe,
    /// Unrecognized kind: permissive, passes by default.
    #[serde(other)]
    Unknown,
}

/// One configured check.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: CheckId,
    pub name: String,
    #[serde(flatten)]
    pub kind: CheckKind,
    /// Per-check timeout in seconds; `None` means no individual deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Ids of checks that must terminate before this one starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<CheckId>,
}

impl Check {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            id: CheckId::new(id),
            name: name.into(),
            kind,
            timeout_secs: None,
            depends_on: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<CheckId>) -> Self {
        self.depends_on = deps;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Ordered set of checks for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfiguration {
    #[serde(default)]
    pub checks: Vec<Check>,
    /// Cancel remaining checks at the earliest failure and do not advance to
    /// later levels.
    #[serde(default)]
    pub fail_fast: bool,
}

impl CheckConfiguration {
    /// An empty configuration: the check stage becomes a no-op.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Validates the dependency closure: ids unique, every referenced
    /// dependency present, graph acyclic.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` naming the offending check.
    pub fn validate(&self) -> Result<(), MergeQueueError> {
        let mut ids = HashSet::new();
        for check in &self.checks {
            if !ids.insert(&check.id) {
                return Err(MergeQueueError::invalid_config(format!(
                    "duplicate check id '{}'",
                    check.id
                )));
            }
        }

        for check in &self.checks {
            for dep in &check.depends_on {
                if !ids.contains(dep) {
                    return Err(MergeQueueError::invalid_config(format!(
                        "check '{}' depends on unknown check '{}'",
                        check.id, dep
                    )));
                }
            }
        }

        // Cycle detection doubles as level computation
        self.levels().map(|_| ())
    }

    /// Groups checks by dependency level, ascending.
    ///
    /// `level(c) = 0` when `c` has no dependencies, else
    /// `1 + max(level(d))` over its dependencies. Checks within one level are
    /// independent and may run in parallel.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the graph is cyclic.
    pub fn levels(&self) -> Result<Vec<Vec<&Check>>, MergeQueueError> {
        let by_id: HashMap<&CheckId, &Check> =
            self.checks.iter().map(|c| (&c.id, c)).collect();
        let mut computed: HashMap<&CheckId, u32> = HashMap::new();

        fn level_of<'a>(
            check: &'a Check,
            by_id: &HashMap<&'a CheckId, &'a Check>,
            computed: &mut HashMap<&'a CheckId, u32>,
            visiting: &mut HashSet<&'a CheckId>,
        ) -> Result<u32, MergeQueueError> {
            if let Some(level) = computed.get(&check.id) {
                return Ok(*level);
            }
            if !visiting.insert(&check.id) {
                return Err(MergeQueueError::invalid_config(format!(
                    "dependency cycle through check '{}'",
                    check.id
                )));
            }
            let mut level = 0;
            for dep in &check.depends_on {
                if let Some(dep_check) = by_id.get(dep) {
                    level = level.max(1 + level_of(dep_check, by_id, computed, visiting)?);
                }
            }
            visiting.remove(&check.id);
            computed.insert(&check.id, level);
            Ok(level)
        }

        let mut visiting = HashSet::new();
        let mut max_level = 0;
        for check in &self.checks {
            let level = level_of(check, &by_id, &mut computed, &mut visiting)?;
            max_level = max_level.max(level);
        }

        let mut grouped: Vec<Vec<&Check>> = vec![Vec::new(); (max_level + 1) as usize];
        for check in &self.checks {
            grouped[computed[&check.id] as usize].push(check);
        }
        grouped.retain(|level| !level.is_empty());
        Ok(grouped)
    }
}

/// Terminal status of one executed check.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    /// A dependency did not pass; the check never ran.
    Skipped,
    /// Fail-fast or shutdown interrupted the check.
    Cancelled,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Failed => "failed",
            CheckStatus::Skipped => "skipped",
            CheckStatus::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one check for one pull request head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: CheckId,
    pub name: String,
    pub status: CheckStatus,
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl CheckResult {
    /// Builds a result stamped with the current instant as completion time.
    pub fn finished(
        check: &Check,
        status: CheckStatus,
        output: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            check_id: check.id.clone(),
            name: check.name.clone(),
            status,
            output: output.into(),
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }
}

/// Aggregate outcome of a check-engine run, results in original input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckExecutionResult {
    pub results: Vec<CheckResult>,
    pub all_passed: bool,
    /// Names of checks with status `failed`.
    pub failed_checks: Vec<String>,
}

impl CheckExecutionResult {
    /// Builds the aggregate from per-check results, preserving their order.
    pub fn from_results(results: Vec<CheckResult>) -> Self {
        let all_passed = results.iter().all(CheckResult::passed);
        let failed_checks = results
            .iter()
            .filter(|r| r.status == CheckStatus::Failed)
            .map(|r| r.name.clone())
            .collect();
        Self {
            results,
            all_passed,
            failed_checks,
        }
    }

    /// The trivially-passing result for an empty configuration.
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            all_passed: true,
            failed_checks: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(id: &str, deps: &[&str]) -> Check {
        Check::new(id, id.to_uppercase(), CheckKind::StatusAggregate)
            .with_dependencies(deps.iter().map(|d| CheckId::from(*d)).collect())
    }

    #[test]
    fn levels_group_by_dependency_depth() {
        let config = CheckConfiguration {
            checks: vec![
                check("a", &[]),
                check("b", &["a"]),
                check("c", &[]),
                check("d", &["b", "c"]),
            ],
            fail_fast: false,
        };
        config.validate().unwrap();

        let levels = config.levels().unwrap();
        let ids: Vec<Vec<&str>> = levels
            .iter()
            .map(|level| level.iter().map(|c| c.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["a", "c"], vec!["b"], vec!["d"]]);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let config = CheckConfiguration {
            checks: vec![check("a", &["ghost"])],
            fail_fast: false,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn cycle_is_rejected() {
        let config = CheckConfiguration {
            checks: vec![check("a", &["b"]), check("b", &["a"])],
            fail_fast: true,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let config = CheckConfiguration {
            checks: vec![check("a", &["a"])],
            fail_fast: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let config = CheckConfiguration {
            checks: vec![check("a", &[]), check("a", &[])],
            fail_fast: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_kind_deserializes_permissively() {
        let json = r#"{"id":"x","name":"X","kind":"fancy_future_kind"}"#;
        let parsed: Check = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.kind, CheckKind::Unknown);
    }

    #[test]
    fn workflow_kind_round_trips() {
        let original = Check::new(
            "ci",
            "CI",
            CheckKind::Workflow {
                workflow: "ci.yml".into(),
            },
        )
        .with_timeout_secs(900);
        let json = serde_json::to_string(&original).unwrap();
        let back: Check = serde_json::from_str(&json).unwrap();
        assert_eq!(original, back);
    }

    #[test]
    fn execution_result_aggregates() {
        let a = check("a", &[]);
        let b = check("b", &[]);
        let started = Utc::now();
        let result = CheckExecutionResult::from_results(vec![
            CheckResult::finished(&a, CheckStatus::Passed, "", started),
            CheckResult::finished(&b, CheckStatus::Failed, "boom", started),
        ]);
        assert!(!result.all_passed);
        assert_eq!(result.failed_checks, vec!["B".to_string()]);
    }
}
