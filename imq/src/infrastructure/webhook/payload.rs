// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Webhook Payload Types
//!
//! Serde views of the hosting service's `pull_request` event schema, limited
//! to the fields the ingress actually reads. Unknown fields are ignored so
//! schema additions upstream never break deserialization.

use serde::Deserialize;

/// Top-level `pull_request` event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequestPayload,
    pub repository: RepositoryPayload,
    /// Present on `labeled` / `unlabeled` actions: the label that changed.
    #[serde(default)]
    pub label: Option<LabelPayload>,
}

/// The pull request inside an event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub number: u64,
    pub title: String,
    pub user: UserPayload,
    #[serde(default)]
    pub labels: Vec<LabelPayload>,
    pub head: GitRefPayload,
    pub base: GitRefPayload,
}

impl PullRequestPayload {
    /// Whether the configured trigger label is currently on the PR.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.name == label)
    }
}

/// A branch tip reference.
#[derive(Debug, Clone, Deserialize)]
pub struct GitRefPayload {
    #[serde(rename = "ref")]
    pub branch: String,
    pub sha: String,
}

/// The repository an event belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    pub name: String,
    pub owner: UserPayload,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

/// A user or organization login.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPayload {
    pub login: String,
}

/// A label on a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelPayload {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_labeled_event() {
        let json = serde_json::json!({
            "action": "labeled",
            "label": { "name": "A-merge" },
            "pull_request": {
                "number": 42,
                "title": "Add widgets",
                "user": { "login": "octocat" },
                "labels": [{ "name": "A-merge" }, { "name": "bug" }],
                "head": { "ref": "feature/widgets", "sha": "a1b2c3d4e5f6" },
                "base": { "ref": "main", "sha": "0011223344556677" },
                "unknown_future_field": true
            },
            "repository": {
                "name": "hello",
                "owner": { "login": "octo" },
                "default_branch": "main"
            }
        });

        let event: PullRequestEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.action, "labeled");
        assert_eq!(event.pull_request.number, 42);
        assert_eq!(event.pull_request.base.branch, "main");
        assert!(event.pull_request.has_label("A-merge"));
        assert!(!event.pull_request.has_label("S-blocked"));
        assert_eq!(event.repository.owner.login, "octo");
    }

    #[test]
    fn missing_labels_default_to_empty() {
        let json = serde_json::json!({
            "action": "closed",
            "pull_request": {
                "number": 7,
                "title": "Fix",
                "user": { "login": "octocat" },
                "head": { "ref": "fix", "sha": "abcdef123456" },
                "base": { "ref": "main", "sha": "0011223344556677" }
            },
            "repository": { "name": "hello", "owner": { "login": "octo" } }
        });

        let event: PullRequestEvent = serde_json::from_value(json).unwrap();
        assert!(event.pull_request.labels.is_empty());
        assert_eq!(event.repository.default_branch, "main");
    }
}
