use linkwatch_devkit::test_utils::eventually;
use linkwatch_devkit::{FeedAction, RecordingController, TestHarness};
use linkwatch_kernel::state::new_state;
use linkwatch_kernel::{
    spawn_policy, HysteresisPolicy, ProbeOutcome, RttSource, SuppressionState, WatchEvent, WatchSettings,
};
use std::time::Duration;

fn settings(workers: usize) -> WatchSettings {
    WatchSettings {
        workers,
        ..WatchSettings::default()
    }
}

#[tokio::test]
async fn camera_is_suppressed_on_timeout_and_restored_on_recovery() {
    let mut h = TestHarness::new();
    let controller = RecordingController::new();
    let policy = new_state(HysteresisPolicy::default());
    spawn_policy(h.watcher.subscribe(), policy.clone(), Box::new(controller.clone()));

    h.watcher.add_host("CamA", "10.0.0.5");
    h.prober
        .push_unreachable("10.0.0.5", "ping process timed out after 3000ms")
        .push_reachable("10.0.0.5", 8.0);

    let score = h.cycle("CamA").await.unwrap();
    assert_eq!(score.overall_score, 0);
    assert!(!score.reachable);
    eventually(|| controller.actions().len() == 1).await.unwrap();
    assert_eq!(policy.lock().state("CamA"), SuppressionState::Suppressed);

    let score = h.cycle("CamA").await.unwrap();
    assert_eq!(score.overall_score, 80);
    eventually(|| controller.actions().len() == 2).await.unwrap();

    assert_eq!(
        controller.actions(),
        [
            FeedAction::Disabled {
                host: "CamA".into(),
                score: 0
            },
            FeedAction::Enabled {
                host: "CamA".into(),
                score: 80
            },
        ]
    );
    assert!(policy.lock().suppressed().is_empty());
}

#[tokio::test]
async fn sustained_degradation_disables_feed_once() {
    let mut h = TestHarness::new();
    let controller = RecordingController::new();
    let policy = new_state(HysteresisPolicy::default());
    spawn_policy(h.watcher.subscribe(), policy.clone(), Box::new(controller.clone()));

    h.watcher.add_host("SIYI", "192.168.144.25");
    for _ in 0..5 {
        h.prober.push_unreachable("192.168.144.25", "Ping failed (exit code 1)");
    }
    for _ in 0..5 {
        h.cycle("SIYI").await.unwrap();
    }

    eventually(|| policy.lock().state("SIYI") == SuppressionState::Suppressed)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(controller.actions().len(), 1);
    assert_eq!(h.watcher.score("SIYI").consecutive_failures, 5);
}

#[tokio::test]
async fn error_events_follow_reachability_edges() {
    let mut h = TestHarness::new();
    h.watcher.add_host("AI", "10.0.0.9");
    h.prober
        .push_unreachable("10.0.0.9", "Ping failed (exit code 1)")
        .push_reachable("10.0.0.9", 12.0)
        .push_reachable("10.0.0.9", 11.0)
        .push_unreachable("10.0.0.9", "Ping failed (exit code 2): ping: unknown host");

    let errors = |events: &[WatchEvent]| -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                WatchEvent::Error { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    };

    // hosts start unreachable, so a first failure is not an edge
    h.watcher.run_cycle();
    let events = h.next_outcome_events("AI").await.unwrap();
    assert!(matches!(
        events[0],
        WatchEvent::StatusChanged {
            reachable: false,
            ..
        }
    ));
    assert!(errors(&events).is_empty());

    h.watcher.run_cycle();
    let events = h.next_outcome_events("AI").await.unwrap();
    assert_eq!(errors(&events), [String::new()]);

    h.watcher.run_cycle();
    let events = h.next_outcome_events("AI").await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(errors(&events).is_empty());

    h.watcher.run_cycle();
    let events = h.next_outcome_events("AI").await.unwrap();
    assert_eq!(
        errors(&events),
        ["Ping failed (exit code 2): ping: unknown host"]
    );
}

#[tokio::test]
async fn superseded_reply_is_dropped() {
    let mut h = TestHarness::new();
    h.watcher.add_host("Servo", "10.0.0.20");
    h.prober
        .push(
            "10.0.0.20",
            ProbeOutcome::unreachable("ping process timed out after 1000ms"),
            Duration::from_millis(200),
        )
        .push_reachable("10.0.0.20", 8.0);

    h.watcher.run_cycle();
    let prober = h.prober.clone();
    eventually(|| prober.calls_for("10.0.0.20") == 1).await.unwrap();
    h.watcher.run_cycle();

    let score = h.wait_for_score("Servo").await.unwrap();
    assert!(score.reachable);
    assert_eq!(score.total_probes, 1);
    assert_eq!(score.overall_score, 95);

    let stats = h.watcher.stats();
    assert_eq!(stats.probes_dispatched, 2);
    assert_eq!(stats.replies_applied, 1);
    assert_eq!(stats.stale_replies_dropped, 1);
    assert_eq!(stats.superseded_skipped, 0);
}

#[tokio::test]
async fn backlogged_requests_are_skipped_not_probed() {
    let mut h = TestHarness::new();
    h.watcher.add_host("SIYI", "192.168.144.25");
    h.prober
        .push(
            "192.168.144.25",
            ProbeOutcome::unreachable("ping process timed out after 3000ms"),
            Duration::from_millis(150),
        )
        .push_reachable("192.168.144.25", 8.0);

    h.watcher.run_cycle();
    let prober = h.prober.clone();
    eventually(|| prober.calls_for("192.168.144.25") == 1).await.unwrap();
    // the worker is busy, these pile up behind it
    for _ in 0..4 {
        h.watcher.run_cycle();
    }

    let score = h.wait_for_score("SIYI").await.unwrap();
    assert!(score.reachable);
    assert_eq!(score.total_probes, 1);
    assert_eq!(h.prober.calls_for("192.168.144.25"), 2);

    let stats = h.watcher.stats();
    assert_eq!(stats.probes_dispatched, 5);
    assert_eq!(stats.superseded_skipped, 3);
    assert_eq!(stats.stale_replies_dropped, 1);
    assert_eq!(stats.replies_applied, 1);
}

#[tokio::test]
async fn reregistering_resets_and_drops_in_flight_reply() {
    let mut h = TestHarness::new();
    h.watcher.add_host("CamA", "10.0.0.5");
    h.prober.push_reachable("10.0.0.5", 20.0);
    assert_eq!(h.cycle("CamA").await.unwrap().total_probes, 1);

    h.prober
        .push("10.0.0.5", ProbeOutcome::unreachable("late"), Duration::from_millis(100));
    h.watcher.run_cycle();
    let prober = h.prober.clone();
    eventually(|| prober.calls_for("10.0.0.5") == 2).await.unwrap();
    h.watcher.add_host("CamA", "10.0.0.6");

    let watcher = h.watcher.clone();
    eventually(|| watcher.stats().stale_replies_dropped == 1)
        .await
        .unwrap();
    let score = h.watcher.score("CamA");
    assert_eq!(score.total_probes, 0);
    assert_eq!(score.host_address, "10.0.0.6");
    assert_eq!(score.overall_score, 0);
}

#[tokio::test]
async fn removed_host_ignores_late_reply() {
    let h = TestHarness::new();
    h.watcher.add_host("AI", "10.0.0.9");
    h.prober
        .push("10.0.0.9", ProbeOutcome::unreachable("late"), Duration::from_millis(100));
    h.watcher.run_cycle();
    let prober = h.prober.clone();
    eventually(|| prober.calls_for("10.0.0.9") == 1).await.unwrap();
    assert!(h.watcher.remove_host("AI"));
    assert!(!h.watcher.remove_host("AI"));

    let watcher = h.watcher.clone();
    eventually(|| watcher.stats().stale_replies_dropped == 1)
        .await
        .unwrap();
    assert!(h.watcher.try_score("AI").is_none());
    assert!(h.watcher.hosts().is_empty());
}

#[tokio::test]
async fn host_removed_before_its_probe_is_skipped() {
    let h = TestHarness::new();
    h.watcher.add_host("AI", "10.0.0.9");
    h.prober.push_reachable("10.0.0.9", 8.0);
    h.watcher.run_cycle();
    h.watcher.remove_host("AI");

    let watcher = h.watcher.clone();
    eventually(|| watcher.stats().superseded_skipped == 1)
        .await
        .unwrap();
    assert_eq!(h.prober.calls_for("10.0.0.9"), 0);
}

#[tokio::test]
async fn removal_is_announced_with_last_score() {
    let mut h = TestHarness::new();
    h.watcher.add_host("Servo", "10.0.0.20");
    h.prober.push_reachable("10.0.0.20", 8.0);
    h.cycle("Servo").await.unwrap();

    assert!(h.watcher.remove_host("Servo"));
    match h.next_event().await.unwrap() {
        WatchEvent::HostRemoved { host, score } => {
            assert_eq!(host, "Servo");
            assert_eq!(score.overall_score, 95);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn watching_probes_every_interval_until_stopped() {
    let h = TestHarness::with_settings(WatchSettings {
        ping_interval: Duration::from_millis(20),
        ..WatchSettings::default()
    });
    h.watcher.add_host("SIYI", "192.168.144.25");
    h.watcher.start_watching();
    assert!(h.watcher.is_watching());

    let prober = h.prober.clone();
    eventually(|| prober.calls_for("192.168.144.25") >= 3)
        .await
        .unwrap();
    h.watcher.stop_watching();
    assert!(!h.watcher.is_watching());

    let before = h.prober.calls_for("192.168.144.25");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.prober.calls_for("192.168.144.25") <= before + 1);
    assert!(h
        .prober
        .calls()
        .iter()
        .all(|c| c.timeout == Duration::from_millis(1000)));
}

#[tokio::test]
async fn timeout_change_applies_to_next_cycle() {
    let mut h = TestHarness::new();
    h.watcher.add_host("AI", "10.0.0.9");
    h.watcher.set_timeout(Duration::from_millis(250)).unwrap();
    h.cycle("AI").await.unwrap();
    assert_eq!(h.prober.calls()[0].timeout, Duration::from_millis(250));
}

#[tokio::test]
async fn worker_pool_overlaps_probes() {
    let h = TestHarness::with_settings(settings(3));
    for (name, address) in [("SIYI", "a"), ("AI", "b"), ("Servo", "c")] {
        h.watcher.add_host(name, address);
        h.prober
            .push(address, ProbeOutcome::reachable(5.0, RttSource::Summary), Duration::from_millis(100));
    }
    h.watcher.run_cycle();

    let watcher = h.watcher.clone();
    eventually(|| watcher.stats().replies_applied == 3).await.unwrap();
    assert!(h.prober.max_in_flight() >= 2);
}

#[tokio::test]
async fn single_worker_probes_sequentially() {
    let h = TestHarness::with_settings(settings(1));
    for (name, address) in [("SIYI", "a"), ("AI", "b")] {
        h.watcher.add_host(name, address);
        h.prober
            .push(address, ProbeOutcome::reachable(5.0, RttSource::Summary), Duration::from_millis(30));
    }
    h.watcher.run_cycle();

    let watcher = h.watcher.clone();
    eventually(|| watcher.stats().replies_applied == 2).await.unwrap();
    assert_eq!(h.prober.max_in_flight(), 1);
}

#[tokio::test]
async fn quiet_without_hosts() {
    let mut h = TestHarness::new();
    assert_eq!(h.watcher.run_cycle(), 0);
    assert!(h.quiet_for(Duration::from_millis(50)).await);
}
