//! Poll loop scenarios against scripted provider and notifier

mod common;

use chrono::Utc;
use common::{Harness, ADMIN};
use monitor::{DeployCheck, MonitorConfig, WatchOutcome};
use status_normalizer::CanonicalStatus;
use std::time::Duration;
use storage::{ManualActionKind, Store};

#[tokio::test]
async fn first_observation_then_flaps() {
    let h = Harness::new();
    h.monitor("srv-a", false).await;

    h.provider.set_missing("srv-a");
    h.pass().await;
    h.provider.set_status("srv-a", "live");
    h.pass().await;
    assert!(h.notifier.admin_messages().is_empty());

    h.provider.set_status("srv-a", "suspended");
    h.pass().await;
    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("went down"));

    h.provider.set_status("srv-a", "running");
    h.pass().await;
    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].contains("recovered"));

    let history = h.store.status_history("srv-a", 10).await.unwrap();
    let transitions: Vec<_> = history
        .iter()
        .rev()
        .map(|e| (e.old_status, e.new_status))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (CanonicalStatus::Unknown, CanonicalStatus::Online),
            (CanonicalStatus::Online, CanonicalStatus::Offline),
            (CanonicalStatus::Offline, CanonicalStatus::Online),
        ]
    );
    assert!(history.iter().all(|e| e.source == "poll"));
}

#[tokio::test]
async fn first_observation_never_alerts() {
    let h = Harness::new();
    h.monitor("srv-a", true).await;
    h.provider.set_status("srv-a", "failed");

    h.pass().await;

    assert!(h.notifier.admin_messages().is_empty());
    assert!(h.store.status_history("srv-a", 10).await.unwrap().is_empty());
    let service = h.store.get_service("srv-a").await.unwrap().unwrap();
    assert_eq!(service.last_known_status, Some(CanonicalStatus::Offline));
}

#[tokio::test]
async fn deploy_cycle_without_deploy_notifications_is_silent() {
    let h = Harness::new();
    h.monitor("srv-a", false).await;

    for raw in ["running", "build_in_progress", "running"] {
        h.provider.set_status("srv-a", raw);
        h.pass().await;
    }

    assert!(h.notifier.admin_messages().is_empty());
    let history = h.store.status_history("srv-a", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].old_status, CanonicalStatus::Deploying);
    assert_eq!(history[1].new_status, CanonicalStatus::Deploying);
}

#[tokio::test]
async fn terminal_deploy_reported_once_across_cycles() {
    let h = Harness::new();
    h.monitor("srv-a", true).await;
    h.provider.set_status("srv-a", "running");
    h.provider.set_deploy("srv-a", "dep-1", "live", Some("Add billing page"));

    for _ in 0..4 {
        h.pass().await;
    }

    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("deploy dep-1 succeeded"));
    assert!(messages[0].contains("Commit: Add billing page"));
    assert_eq!(h.store.deploy_reports("srv-a").await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_dispatch_is_retried_next_cycle() {
    let h = Harness::new();
    h.monitor("srv-a", true).await;
    h.provider.set_status("srv-a", "running");
    h.provider.set_deploy("srv-a", "dep-1", "build_failed", None);
    h.notifier.answer_next(&[false]);

    h.pass().await;
    assert!(h.store.deploy_reports("srv-a").await.unwrap().is_empty());

    h.pass().await;
    let reports = h.store.deploy_reports("srv-a").await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].deploy_id, "dep-1");

    h.pass().await;
    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].contains("failed"));
}

#[tokio::test]
async fn in_progress_deploy_waits_for_terminal_status() {
    let h = Harness::new();
    h.monitor("srv-a", true).await;
    h.provider.set_status("srv-a", "running");
    h.provider.set_deploy("srv-a", "dep-1", "update_in_progress", None);

    h.pass().await;
    assert!(h.notifier.admin_messages().is_empty());

    h.provider
        .set_deploy("srv-a", "dep-1", "live", Some("chore(deps): bump tokio from 1.35 to 1.36"));
    h.pass().await;

    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Dependency update"));
}

#[tokio::test]
async fn manual_action_blocks_flap_but_not_deploy_outcome() {
    let h = Harness::new();
    h.monitor("srv-flap", true).await;
    h.monitor("srv-deploy", true).await;
    h.provider.set_status("srv-flap", "running");
    h.provider.set_status("srv-deploy", "deploying");
    h.pass().await;

    h.control
        .mark_manual_action("srv-flap", ManualActionKind::Suspend)
        .await
        .unwrap();
    h.control
        .mark_manual_action("srv-deploy", ManualActionKind::Resume)
        .await
        .unwrap();

    h.provider.set_status("srv-flap", "suspended");
    h.provider.set_status("srv-deploy", "live");
    h.pass().await;

    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("srv-deploy"));
    assert!(messages[0].contains("deploy succeeded"));

    // Bookkeeping still happened for the suppressed service
    let history = h.store.status_history("srv-flap", 10).await.unwrap();
    assert_eq!(history[0].new_status, CanonicalStatus::Offline);
}

#[tokio::test]
async fn live_deploy_outcome_goes_through_ledger() {
    let h = Harness::new();
    h.monitor("srv-a", true).await;
    h.provider.set_status("srv-a", "deploying");
    h.provider.set_deploy("srv-a", "dep-2", "build_in_progress", None);
    h.pass().await;

    h.provider.set_status("srv-a", "live");
    h.provider.set_deploy("srv-a", "dep-2", "live", None);
    h.pass().await;
    h.pass().await;

    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("deploy dep-2"));
    assert_eq!(h.store.deploy_reports("srv-a").await.unwrap().len(), 1);
}

#[tokio::test]
async fn crash_after_restart_is_not_absorbed_by_old_deploy() {
    let h = Harness::new();
    h.monitor("srv-a", true).await;
    h.provider.set_status("srv-a", "running");
    h.provider.set_deploy("srv-a", "dep-1", "live", None);
    h.pass().await;
    assert_eq!(h.notifier.admin_messages().len(), 1);

    h.provider.set_status("srv-a", "restarting");
    h.pass().await;
    h.provider.set_status("srv-a", "crashed");
    h.pass().await;

    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].contains("deploying -> offline"));
    assert_eq!(h.store.deploy_reports("srv-a").await.unwrap().len(), 1);

    let history = h.store.status_history("srv-a", 10).await.unwrap();
    assert_eq!(history[0].old_status, CanonicalStatus::Deploying);
    assert_eq!(history[0].new_status, CanonicalStatus::Offline);
}

#[tokio::test]
async fn deploy_reported_during_episode_absorbs_transition() {
    let h = Harness::new();
    h.monitor("srv-a", true).await;
    h.provider.set_status("srv-a", "deploying");
    h.provider.set_deploy("srv-a", "dep-3", "live", None);
    h.pass().await;
    assert_eq!(h.notifier.admin_messages().len(), 1);

    h.provider.set_status("srv-a", "live");
    h.pass().await;

    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("deploy dep-3"));
}

#[tokio::test(start_paused = true)]
async fn watch_and_pass_deliver_a_deploy_once() {
    let h = Harness::new();
    h.monitor("srv-a", true).await;
    h.provider.set_status("srv-a", "running");
    h.pass().await;

    h.notifier.set_latency(Duration::from_secs(1));
    let watch = h.control.resume_and_watch("srv-a").await.unwrap();
    h.provider.set_deploy("srv-a", "dep-1", "live", None);

    let (_, watched) = tokio::join!(h.pass(), watch);
    assert!(matches!(watched.unwrap().unwrap(), WatchOutcome::Finished(_)));

    let deploy_alerts: Vec<_> = h
        .notifier
        .admin_messages()
        .into_iter()
        .filter(|m| m.contains("deploy dep-1"))
        .collect();
    assert_eq!(deploy_alerts.len(), 1);
    assert_eq!(h.store.deploy_reports("srv-a").await.unwrap().len(), 1);

    h.pass().await;
    assert_eq!(h.notifier.admin_messages().len(), 1);
}

#[tokio::test]
async fn deploy_window_suppresses_flaps() {
    let h = Harness::new();
    h.monitor("srv-a", false).await;
    h.provider.set_status("srv-a", "running");
    h.pass().await;

    let targets = h.control.start_deploy_window(&[], 10).await.unwrap();
    assert_eq!(targets, vec!["srv-a".to_string()]);

    h.provider.set_status("srv-a", "suspended");
    h.pass().await;
    assert!(h.notifier.admin_messages().is_empty());

    h.control.end_deploy_window(&[]).await.unwrap();
    h.provider.set_status("srv-a", "running");
    h.pass().await;
    assert_eq!(h.notifier.admin_messages().len(), 1);
}

#[tokio::test]
async fn recent_transient_status_suppresses_flaps() {
    let h = Harness::new();
    h.monitor("srv-a", false).await;
    h.provider.set_status("srv-a", "running");
    h.pass().await;

    // A quick build flicker leaves a transient stamp behind
    h.store
        .record_transient_status("srv-a", Utc::now())
        .await
        .unwrap();
    h.provider.set_status("srv-a", "crashed");
    h.pass().await;

    assert!(h.notifier.admin_messages().is_empty());
}

#[tokio::test]
async fn global_mute_suppresses_and_still_fills_ledger() {
    let h = Harness::new();
    h.monitor("srv-a", true).await;
    h.provider.set_status("srv-a", "running");
    h.pass().await;

    h.control.mute_for(Duration::from_secs(600)).unwrap();
    assert!(h.control.muted_until().is_some());
    h.provider.set_status("srv-a", "stopped");
    h.provider.set_deploy("srv-a", "dep-9", "failed", None);
    h.pass().await;

    assert!(h.notifier.admin_messages().is_empty());
    assert!(h.store.is_deploy_reported("srv-a", "dep-9").await.unwrap());

    h.control.unmute();
    h.pass().await;
    assert!(h.notifier.admin_messages().is_empty());
}

#[tokio::test]
async fn provider_failure_skips_only_that_service() {
    let h = Harness::new();
    h.monitor("srv-a", false).await;
    h.monitor("srv-b", false).await;
    h.provider.set_status("srv-a", "running");
    h.provider.set_status("srv-b", "running");
    h.pass().await;

    h.provider.set_failing("srv-a");
    h.provider.set_status("srv-b", "stopped");
    let summary = h.pass().await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 1);
    let a = h.store.get_service("srv-a").await.unwrap().unwrap();
    assert_eq!(a.last_known_status, Some(CanonicalStatus::Online));
    assert_eq!(h.notifier.admin_messages().len(), 1);
}

#[tokio::test]
async fn alerts_reach_admin_and_owner() {
    let h = Harness::new();
    h.store
        .enable_monitoring("srv-a", Some("api"), "ops-room", None, Utc::now())
        .await
        .unwrap();
    h.provider.set_status("srv-a", "running");
    h.pass().await;
    h.provider.set_status("srv-a", "crashed");
    h.pass().await;

    assert_eq!(h.notifier.destinations(), vec![ADMIN.to_string(), "ops-room".to_string()]);
    assert!(h.notifier.admin_messages()[0].starts_with("api (srv-a)"));
}

#[tokio::test]
async fn enable_monitoring_seeds_baseline() {
    let h = Harness::new();
    h.provider.set_status("srv-a", "healthy");
    let status = h.control.enable_monitoring("srv-a", Some("api"), ADMIN).await.unwrap();
    assert!(status.monitoring_enabled);
    assert_eq!(status.last_known_status, Some(CanonicalStatus::Online));

    h.provider.set_status("srv-a", "suspended");
    h.pass().await;
    assert_eq!(h.notifier.admin_messages().len(), 1);

    assert!(h.control.disable_monitoring("srv-a", ADMIN).await.unwrap());
    let summary = h.pass().await;
    assert_eq!(summary.processed, 0);
}

#[tokio::test]
async fn pass_observing_deploy_uses_short_interval() {
    let h = Harness::new();
    let config = MonitorConfig::default();
    h.monitor("srv-a", false).await;

    h.provider.set_status("srv-a", "running");
    let summary = h.pass().await;
    assert_eq!(summary.next_interval(&config), config.base_interval());

    h.provider.set_status("srv-a", "building");
    let summary = h.pass().await;
    assert!(summary.saw_deploying);
    assert_eq!(summary.next_interval(&config), config.deploy_interval());
}

#[tokio::test(start_paused = true)]
async fn loop_cadence_follows_deploy_activity() {
    let h = Harness::new();
    h.monitor("srv-a", false).await;
    h.provider.set_status("srv-a", "deploying");

    let handle = h.scheduler.clone().spawn();
    tokio::time::sleep(Duration::from_secs(50)).await;
    handle.stop().await.unwrap();

    let calls = h.provider.status_calls("srv-a");
    assert!(calls.len() >= 3);
    for pair in calls.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(15));
    }
}

#[tokio::test(start_paused = true)]
async fn quiet_fleet_polls_at_base_interval() {
    let h = Harness::new();
    h.monitor("srv-a", false).await;
    h.provider.set_status("srv-a", "running");

    let handle = h.scheduler.clone().spawn();
    tokio::time::sleep(Duration::from_secs(130)).await;
    assert!(handle.is_running());
    handle.stop().await.unwrap();

    let calls = h.provider.status_calls("srv-a");
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1] - calls[0], Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn resume_watch_reports_new_deploy_once() {
    let h = Harness::new();
    h.monitor("srv-a", false).await;
    h.provider.set_deploy("srv-a", "dep-old", "live", None);

    let watch = h.control.resume_and_watch("srv-a").await.unwrap();
    h.provider.set_deploy("srv-a", "dep-new", "build_in_progress", None);
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert!(h.notifier.admin_messages().is_empty());

    h.provider.set_deploy("srv-a", "dep-new", "live", None);
    let outcome = watch.await.unwrap().unwrap();
    assert_eq!(outcome, WatchOutcome::Finished(DeployCheck::Reported));

    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("dep-new"));
    assert!(!h.store.is_deploy_reported("srv-a", "dep-old").await.unwrap());

    let actions = h.store.manual_actions("srv-a").await.unwrap();
    assert_eq!(actions[0].kind, ManualActionKind::Resume);
}

#[tokio::test(start_paused = true)]
async fn stale_deploy_watch_gives_up() {
    let h = Harness::new();
    h.monitor("srv-a", false).await;
    h.provider.set_deploy("srv-a", "dep-1", "queued", None);

    let watch = h.control.resume_and_watch("srv-a").await.unwrap();
    let outcome = watch.await.unwrap().unwrap();

    assert_eq!(outcome, WatchOutcome::TimedOut);
    assert!(h.notifier.admin_messages().is_empty());
    assert!(h.store.deploy_reports("srv-a").await.unwrap().is_empty());
}

#[tokio::test]
async fn resume_watch_rejects_unknown_service() {
    let h = Harness::new();
    assert!(h.control.resume_and_watch("ghost").await.is_err());
}

fn every_pass_scans_logs() -> MonitorConfig {
    MonitorConfig {
        log_check_interval_secs: 0,
        ..MonitorConfig::default()
    }
}

#[tokio::test]
async fn critical_log_line_alerts_once() {
    let h = Harness::with_config(every_pass_scans_logs());
    h.control.set_log_monitoring("srv-a", true, None).await.unwrap();
    h.provider.push_logs(
        "srv-a",
        &[("l-1", "GET /health 200"), ("l-2", "FATAL: out of memory")],
    );

    h.pass().await;
    h.pass().await;

    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("critical log errors: 1 new"));
    assert!(messages[0].contains("FATAL: out of memory"));

    // Log-only services are not status polled
    assert!(h.provider.status_calls("srv-a").is_empty());
    let status = h.control.monitoring_status("srv-a").await.unwrap().unwrap();
    assert_eq!(status.last_log_error_count, 0);
    assert!(status.last_log_check_at.is_some());
}

#[tokio::test]
async fn log_errors_alert_at_threshold() {
    let h = Harness::with_config(every_pass_scans_logs());
    h.control.set_log_monitoring("srv-a", true, Some(3)).await.unwrap();
    h.provider.push_logs("srv-a", &[("l-1", "error: bad input"), ("l-2", "job failed")]);
    h.pass().await;
    assert!(h.notifier.admin_messages().is_empty());

    h.provider.push_logs(
        "srv-a",
        &[("l-3", "Unhandled exception"), ("l-4", "GET /a 404"), ("l-5", "request 502")],
    );
    h.pass().await;

    let messages = h.notifier.admin_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("log errors: 3 new"));
    assert!(messages[0].contains("1. Unhandled exception"));
}

#[tokio::test]
async fn log_scan_respects_check_interval() {
    let h = Harness::new();
    h.control.set_log_monitoring("srv-a", true, None).await.unwrap();
    h.pass().await;

    h.provider.push_logs("srv-a", &[("l-1", "fatal: segmentation fault")]);
    h.pass().await;
    assert!(h.notifier.admin_messages().is_empty());
}

#[tokio::test]
async fn muted_log_alert_is_not_resent() {
    let h = Harness::with_config(every_pass_scans_logs());
    h.control.set_log_monitoring("srv-a", true, None).await.unwrap();
    h.control.mute_for(Duration::from_secs(600)).unwrap();
    h.provider.push_logs("srv-a", &[("l-1", "error: connection refused")]);
    h.pass().await;

    h.control.unmute();
    h.pass().await;
    assert!(h.notifier.admin_messages().is_empty());
}

#[tokio::test]
async fn disabling_log_monitoring_forgets_seen_lines() {
    let h = Harness::with_config(every_pass_scans_logs());
    h.control.set_log_monitoring("srv-a", true, None).await.unwrap();
    h.provider.push_logs("srv-a", &[("l-1", "FATAL: disk full")]);
    h.pass().await;
    assert_eq!(h.notifier.admin_messages().len(), 1);

    let status = h.control.set_log_monitoring("srv-a", false, None).await.unwrap();
    assert!(!status.log_monitoring_enabled);
    h.pass().await;
    assert_eq!(h.notifier.admin_messages().len(), 1);

    h.control.set_log_monitoring("srv-a", true, None).await.unwrap();
    h.pass().await;
    assert_eq!(h.notifier.admin_messages().len(), 2);
}
