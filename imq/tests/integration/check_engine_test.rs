// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Check-engine behavior: level scheduling, dependency skipping, fail-fast
//! cancellation, caching, and per-check timeouts.

use std::time::Duration;

use imq_domain::entities::{Check, CheckConfiguration, CheckId, CheckKind, CheckStatus};

use crate::common::{seed_queue, PipelineHarness, ScriptedOutcome};

fn check(id: &str, deps: &[&str]) -> Check {
    Check::new(id, id.to_uppercase(), CheckKind::StatusAggregate)
        .with_dependencies(deps.iter().map(|d| CheckId::from(*d)).collect())
}

fn configuration(checks: Vec<Check>, fail_fast: bool) -> CheckConfiguration {
    CheckConfiguration { checks, fail_fast }
}

#[tokio::test]
async fn empty_configuration_passes_trivially() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");

    let result = h
        .engine
        .execute(
            &CheckConfiguration::empty(),
            &seeded.pull_request,
            &seeded.repository,
        )
        .await
        .unwrap();
    assert!(result.all_passed);
    assert!(result.results.is_empty());
}

#[tokio::test]
async fn results_come_back_in_input_order() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");

    // "b" finishes long after "c" (next level), but input order wins.
    h.factory.script(
        "b",
        ScriptedOutcome::after(CheckStatus::Passed, Duration::from_millis(80)),
    );
    let config = configuration(
        vec![check("a", &[]), check("b", &[]), check("c", &["a"])],
        false,
    );

    let result = h
        .engine
        .execute(&config, &seeded.pull_request, &seeded.repository)
        .await
        .unwrap();
    assert!(result.all_passed);
    let ids: Vec<&str> = result.results.iter().map(|r| r.check_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn dependents_of_failures_are_skipped_not_failed() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");

    h.factory.script("a", ScriptedOutcome::instant(CheckStatus::Failed));
    let config = configuration(
        vec![check("a", &[]), check("b", &["a"]), check("c", &["b"])],
        false,
    );

    let result = h
        .engine
        .execute(&config, &seeded.pull_request, &seeded.repository)
        .await
        .unwrap();
    assert!(!result.all_passed);
    assert_eq!(result.failed_checks, vec!["A".to_string()]);

    let by_id = |id: &str| {
        result
            .results
            .iter()
            .find(|r| r.check_id.as_str() == id)
            .unwrap()
    };
    assert_eq!(by_id("a").status, CheckStatus::Failed);
    assert_eq!(by_id("b").status, CheckStatus::Skipped);
    // transitively skipped, never failed
    assert_eq!(by_id("c").status, CheckStatus::Skipped);
}

#[tokio::test(start_paused = true)]
async fn fail_fast_cancels_siblings_and_skips_later_levels() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");

    // A fails instantly; C (same level) is still sleeping when it does.
    h.factory.script("a", ScriptedOutcome::instant(CheckStatus::Failed));
    h.factory.script(
        "c",
        ScriptedOutcome::after(CheckStatus::Passed, Duration::from_secs(30)),
    );
    let config = configuration(
        vec![check("a", &[]), check("b", &["a"]), check("c", &[])],
        true,
    );

    let result = h
        .engine
        .execute(&config, &seeded.pull_request, &seeded.repository)
        .await
        .unwrap();
    assert!(!result.all_passed);
    assert_eq!(result.failed_checks, vec!["A".to_string()]);

    let by_id = |id: &str| {
        result
            .results
            .iter()
            .find(|r| r.check_id.as_str() == id)
            .unwrap()
    };
    assert_eq!(by_id("a").status, CheckStatus::Failed);
    assert_eq!(by_id("b").status, CheckStatus::Skipped);
    assert!(matches!(
        by_id("c").status,
        CheckStatus::Passed | CheckStatus::Cancelled
    ));
}

#[tokio::test]
async fn cyclic_configuration_is_rejected() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");

    let config = configuration(vec![check("a", &["b"]), check("b", &["a"])], false);
    let error = h
        .engine
        .execute(&config, &seeded.pull_request, &seeded.repository)
        .await
        .unwrap_err();
    assert_eq!(error.category(), "configuration");
}

#[tokio::test]
async fn terminal_results_are_served_from_cache() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");
    let config = configuration(vec![check("a", &[])], false);

    let first = h
        .engine
        .execute(&config, &seeded.pull_request, &seeded.repository)
        .await
        .unwrap();
    assert!(first.all_passed);

    // The script now says fail, but the cached pass for this head wins.
    h.factory.script("a", ScriptedOutcome::instant(CheckStatus::Failed));
    let second = h
        .engine
        .execute(&config, &seeded.pull_request, &seeded.repository)
        .await
        .unwrap();
    assert!(second.all_passed);
    assert!(second.results[0].output.contains("cache"));

    // Invalidate the head: the fresh (failing) verdict shows through.
    h.cache.invalidate_sha(seeded.pull_request.head_sha());
    let third = h
        .engine
        .execute(&config, &seeded.pull_request, &seeded.repository)
        .await
        .unwrap();
    assert!(!third.all_passed);
}

#[tokio::test(start_paused = true)]
async fn per_check_timeout_produces_a_failed_result() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");

    h.factory.script(
        "slow",
        ScriptedOutcome::after(CheckStatus::Passed, Duration::from_secs(120)),
    );
    let config = configuration(
        vec![check("slow", &[]).with_timeout_secs(5)],
        false,
    );

    let result = h
        .engine
        .execute(&config, &seeded.pull_request, &seeded.repository)
        .await
        .unwrap();
    assert!(!result.all_passed);
    assert_eq!(result.results[0].status, CheckStatus::Failed);
    assert!(result.results[0].output.contains("timed out"));
}

#[tokio::test]
async fn unknown_check_kind_passes_by_default() {
    let h = PipelineHarness::new();
    let seeded = seed_queue("main");

    // The scripted factory passes unknown ids, mirroring the production
    // permissive executor; an Unknown kind must not fail the run.
    let config = configuration(
        vec![Check::new("future", "Future", CheckKind::Unknown)],
        false,
    );
    let result = h
        .engine
        .execute(&config, &seeded.pull_request, &seeded.repository)
        .await
        .unwrap();
    assert!(result.all_passed);
}
