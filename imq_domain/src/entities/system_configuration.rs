// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # System Configuration
//!
//! Process-wide singleton (logical row id 1) holding the trigger label, the
//! active check configuration, and the notification comment templates. It is
//! reloadable without restart: the webhook ingress re-reads it on every
//! request and the pipeline reads it per run, so an operator can change the
//! trigger label or the checks while entries are in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::check::CheckConfiguration;

/// Default label that enqueues a pull request.
pub const DEFAULT_TRIGGER_LABEL: &str = "A-merge";

/// Comment templates rendered onto pull requests at lifecycle milestones.
///
/// Placeholders: `{{pr}}` (PR number), `{{branch}}` (base branch),
/// `{{reason}}` (failure detail).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplates {
    pub merge_success: String,
    pub merge_failure: String,
    pub conflict: String,
    pub checks_failed: String,
}

impl Default for NotificationTemplates {
    fn default() -> Self {
        Self {
            merge_success: "🎉 PR #{{pr}} was merged into `{{branch}}` by the merge queue.".into(),
            merge_failure: "❌ Merging PR #{{pr}} into `{{branch}}` failed: {{reason}}".into(),
            conflict:
                "⚠️ PR #{{pr}} conflicts with `{{branch}}`. Resolve the conflict and re-label to re-queue."
                    .into(),
            checks_failed: "❌ PR #{{pr}} failed required checks: {{reason}}".into(),
        }
    }
}

/// Values substituted into a notification template.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub pr_number: u64,
    pub branch: String,
    pub reason: String,
}

impl NotificationTemplates {
    /// Renders a template with the given context.
    pub fn render(template: &str, context: &TemplateContext) -> String {
        template
            .replace("{{pr}}", &context.pr_number.to_string())
            .replace("{{branch}}", &context.branch)
            .replace("{{reason}}", &context.reason)
    }
}

/// The singleton configuration row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfiguration {
    trigger_label: String,
    check_configuration: CheckConfiguration,
    templates: NotificationTemplates,
    updated_at: DateTime<Utc>,
}

impl SystemConfiguration {
    pub fn new(
        trigger_label: impl Into<String>,
        check_configuration: CheckConfiguration,
        templates: NotificationTemplates,
    ) -> Self {
        Self {
            trigger_label: trigger_label.into(),
            check_configuration,
            templates,
            updated_at: Utc::now(),
        }
    }

    /// Reconstitutes the configuration from stored fields, preserving the
    /// stored update timestamp.
    pub fn from_database(
        trigger_label: String,
        check_configuration: CheckConfiguration,
        templates: NotificationTemplates,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trigger_label,
            check_configuration,
            templates,
            updated_at,
        }
    }

    pub fn trigger_label(&self) -> &str {
        &self.trigger_label
    }

    pub fn check_configuration(&self) -> &CheckConfiguration {
        &self.check_configuration
    }

    pub fn templates(&self) -> &NotificationTemplates {
        &self.templates
    }

    pub fn updated_at(&self) -> &DateTime<Utc> {
        &self.updated_at
    }

    pub fn set_trigger_label(&mut self, label: impl Into<String>) {
        self.trigger_label = label.into();
        self.updated_at = Utc::now();
    }

    pub fn set_check_configuration(&mut self, config: CheckConfiguration) {
        self.check_configuration = config;
        self.updated_at = Utc::now();
    }

    pub fn set_templates(&mut self, templates: NotificationTemplates) {
        self.templates = templates;
        self.updated_at = Utc::now();
    }
}

impl Default for SystemConfiguration {
    fn default() -> Self {
        Self::new(
            DEFAULT_TRIGGER_LABEL,
            CheckConfiguration::empty(),
            NotificationTemplates::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_the_standard_trigger_label() {
        let config = SystemConfiguration::default();
        assert_eq!(config.trigger_label(), "A-merge");
        assert!(config.check_configuration().is_empty());
    }

    #[test]
    fn render_substitutes_all_placeholders() {
        let context = TemplateContext {
            pr_number: 42,
            branch: "main".into(),
            reason: "checks failed: CI".into(),
        };
        let rendered = NotificationTemplates::render(
            "PR #{{pr}} on {{branch}}: {{reason}}",
            &context,
        );
        assert_eq!(rendered, "PR #42 on main: checks failed: CI");
    }

    #[test]
    fn setters_bump_updated_at() {
        let mut config = SystemConfiguration::default();
        let before = *config.updated_at();
        config.set_trigger_label("ship-it");
        assert_eq!(config.trigger_label(), "ship-it");
        assert!(*config.updated_at() >= before);
    }
}
