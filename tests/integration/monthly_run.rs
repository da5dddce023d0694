//! Monthly fan-out tests
//!
//! - Full runs against the in-memory store
//! - Failure isolation between tasks
//! - Deadline expiry with tasks still in flight

use std::sync::Arc;
use std::time::{Duration, Instant};

use player_count::{
    MonthlySummary,
    aggregate::NO_DATA,
    orchestrator::{AggregationSettings, Orchestrator},
    sanitize::TargetPeriod,
    storage::{MemoryStore, MetricStore},
};
use pretty_assertions::assert_eq;

use super::helpers::*;

fn settings(deadline: Duration) -> AggregationSettings {
    AggregationSettings {
        deadline,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_monthly_run_builds_gain_against_previous_month() {
    let store = Arc::new(MemoryStore::new());
    store.add_application(create_test_app("a", 1)).await.unwrap();

    store
        .replace_daily_samples("a", month_of_samples(2024, 5, 31, 300))
        .await
        .unwrap();
    store
        .replace_monthly_summaries(
            "a",
            vec![MonthlySummary {
                date: utc(2024, 4, 1),
                average_players: 100,
                peak_players: 120,
                gain: NO_DATA.to_string(),
                gain_percent: NO_DATA.to_string(),
            }],
        )
        .await
        .unwrap();

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(ScriptedProvider::new(0)),
        settings(Duration::from_secs(5)),
    );

    let report = orchestrator.run_monthly(utc(2024, 6, 1)).await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);

    let summaries = store.get_monthly_summaries("a").await.unwrap();
    assert_eq!(summaries.len(), 2);

    let latest = &summaries[1];
    assert_eq!(latest.date, utc(2024, 5, 1));
    assert_eq!(latest.average_players, 300);
    assert_eq!(latest.peak_players, 300);
    assert_eq!(latest.gain, "200");
    assert_eq!(latest.gain_percent, "2.00%");
}

#[tokio::test]
async fn test_monthly_run_purges_old_samples() {
    let store = Arc::new(MemoryStore::new());
    store.add_application(create_test_app("a", 1)).await.unwrap();

    let mut samples = month_of_samples(2024, 1, 31, 999);
    samples.extend(month_of_samples(2024, 5, 10, 50));
    store.replace_daily_samples("a", samples).await.unwrap();

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(ScriptedProvider::new(0)),
        settings(Duration::from_secs(5)),
    );

    orchestrator.run_monthly(utc(2024, 6, 1)).await;

    let daily = store.get_daily_samples("a").await.unwrap();
    assert_eq!(daily, month_of_samples(2024, 5, 10, 50));

    let summaries = store.get_monthly_summaries("a").await.unwrap();
    assert_eq!(summaries[0].average_players, 50);
    assert_eq!(summaries[0].gain, NO_DATA);
}

#[tokio::test]
async fn test_january_run_targets_previous_december() {
    let store = Arc::new(MemoryStore::new());
    store.add_application(create_test_app("a", 1)).await.unwrap();
    store
        .replace_daily_samples("a", month_of_samples(2023, 12, 31, 40))
        .await
        .unwrap();

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(ScriptedProvider::new(0)),
        settings(Duration::from_secs(5)),
    );

    orchestrator.run_monthly(utc(2024, 1, 1)).await;

    let summaries = store.get_monthly_summaries("a").await.unwrap();
    assert_eq!(summaries[0].date, utc(2023, 12, 1));
    assert_eq!(summaries[0].average_players, 40);
    assert_eq!(store.get_daily_samples("a").await.unwrap().len(), 31);
}

#[tokio::test]
async fn test_empty_month_is_not_an_error() {
    let store = Arc::new(MemoryStore::new());
    store.add_application(create_test_app("a", 1)).await.unwrap();

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(ScriptedProvider::new(0)),
        settings(Duration::from_secs(5)),
    );

    let report = orchestrator.run_monthly(utc(2024, 6, 1)).await;
    assert_eq!(report.succeeded, 1);

    let summaries = store.get_monthly_summaries("a").await.unwrap();
    assert_eq!(summaries[0].average_players, 0);
    assert_eq!(summaries[0].peak_players, 0);
}

#[tokio::test]
async fn test_failing_task_does_not_affect_others() {
    let store = Arc::new(ScriptedStore::new().fail_for("broken"));
    for (id, domain_id) in [("a", 1), ("broken", 2), ("c", 3)] {
        store.add_application(create_test_app(id, domain_id)).await.unwrap();
        store
            .replace_daily_samples(id, month_of_samples(2024, 5, 5, 10))
            .await
            .unwrap();
    }

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(ScriptedProvider::new(0)),
        settings(Duration::from_secs(5)),
    );

    let report = orchestrator.run_monthly(utc(2024, 6, 1)).await;

    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.abandoned(), 0);

    assert_eq!(store.get_monthly_summaries("a").await.unwrap().len(), 1);
    assert_eq!(store.get_monthly_summaries("c").await.unwrap().len(), 1);
    assert!(store.get_monthly_summaries("broken").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deadline_returns_early() {
    let store = Arc::new(ScriptedStore::new().slow_for("slow", Duration::from_secs(30)));
    for (id, domain_id) in [("a", 1), ("b", 2), ("slow", 3), ("d", 4)] {
        store.add_application(create_test_app(id, domain_id)).await.unwrap();
    }

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(ScriptedProvider::new(0)),
        settings(Duration::from_millis(200)),
    );

    let started = Instant::now();
    let report = orchestrator.run_monthly(utc(2024, 6, 1)).await;
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_secs(5),
        "run should return shortly after the deadline, took {elapsed:?}"
    );
    assert_eq!(report.total, 4);
    assert!(report.succeeded + report.failed < report.total);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.abandoned(), 1);
}

#[tokio::test]
async fn test_abandoned_task_still_completes() {
    let store = Arc::new(ScriptedStore::new().slow_for("slow", Duration::from_millis(300)));
    store.add_application(create_test_app("slow", 1)).await.unwrap();
    store
        .replace_daily_samples("slow", month_of_samples(2024, 5, 3, 70))
        .await
        .unwrap();

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(ScriptedProvider::new(0)),
        settings(Duration::from_millis(50)),
    );

    let report = orchestrator.run_monthly(utc(2024, 6, 1)).await;
    assert_eq!(report.abandoned(), 1);
    assert!(store.get_monthly_summaries("slow").await.unwrap().is_empty());

    // the orphaned task keeps running and writes after the run returned
    tokio::time::sleep(Duration::from_millis(1000)).await;

    let summaries = store.get_monthly_summaries("slow").await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].average_players, 70);
}

#[tokio::test]
async fn test_run_monthly_for_explicit_period() {
    let store = Arc::new(MemoryStore::new());
    let app = create_test_app("a", 1);
    store.add_application(app.clone()).await.unwrap();
    store
        .replace_daily_samples("a", month_of_samples(2024, 3, 10, 25))
        .await
        .unwrap();

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(ScriptedProvider::new(0)),
        settings(Duration::from_secs(5)),
    );

    let report = orchestrator
        .run_monthly_for(vec![app], TargetPeriod::new(3, 2024).unwrap(), utc(2024, 4, 1))
        .await;

    assert_eq!(report.succeeded, 1);
    let summaries = store.get_monthly_summaries("a").await.unwrap();
    assert_eq!(summaries[0].date, utc(2024, 3, 1));
    assert_eq!(summaries[0].average_players, 25);
}

#[tokio::test]
async fn test_large_fleet_fans_out() {
    let store = Arc::new(ScriptedStore::new());
    for i in 0..50 {
        let id = format!("app-{i}");
        store.add_application(create_test_app(&id, i)).await.unwrap();
    }

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(ScriptedProvider::new(0)),
        settings(Duration::from_secs(5)),
    );

    let report = orchestrator.run_monthly(utc(2024, 6, 1)).await;

    assert_eq!(report.total, 50);
    assert_eq!(report.succeeded, 50);
}
