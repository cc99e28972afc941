use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use fencewatch::storage::{AlertSink, FenceStore, InMemoryAlerts, InMemoryPositions, PositionSource};
use fencewatch::{
    replay_history, DwellRearmPolicy, EventType, Fence, FenceId, FenceMonitor, GeoPoint, MonitorConfig, ObjectId,
    Position, Scenario,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

/// A polygon around the Singapore Strait anchorages.
fn strait() -> Fence {
    Fence::polygon(
        "strait",
        vec![
            GeoPoint::new(1.15, 103.60),
            GeoPoint::new(1.15, 104.10),
            GeoPoint::new(1.35, 104.10),
            GeoPoint::new(1.35, 103.60),
        ],
    )
    .watching(["imo-9"])
    .with_dwell(3.0)
}

fn track(feed: &InMemoryPositions) {
    // Approach from the west, anchor for four hours, leave to the east.
    let mut at = t0();
    for lon in [103.20, 103.40, 103.65] {
        feed.push(Position::new("imo-9", at, 1.25, lon).with_speed(11.0)).unwrap();
        at += Duration::minutes(30);
    }
    for _ in 0..9 {
        feed.push(Position::new("imo-9", at, 1.25, 103.80).with_speed(0.0)).unwrap();
        at += Duration::minutes(30);
    }
    for lon in [104.05, 104.30] {
        feed.push(Position::new("imo-9", at, 1.25, lon).with_speed(12.0)).unwrap();
        at += Duration::minutes(30);
    }
}

#[test]
fn replay_reconstructs_a_port_call() {
    let feed = InMemoryPositions::new();
    let sink = InMemoryAlerts::new();
    track(&feed);

    let summary = replay_history(
        &feed,
        &sink,
        &strait(),
        &ObjectId::new("imo-9"),
        t0(),
        t0() + Duration::days(1),
        DwellRearmPolicy::ExitOnly,
    )
    .unwrap();

    assert_eq!(summary.positions, 14);
    assert_eq!(summary.rejected, 0);
    let kinds: Vec<EventType> = summary.events.iter().map(|e| e.event_type).collect();
    assert_eq!(kinds, vec![EventType::Entry, EventType::Dwell, EventType::Exit]);

    // Entry on the third report, dwell three hours later, exit after 104.10E.
    assert_eq!(summary.events[0].occurred_at, t0() + Duration::minutes(60));
    assert_eq!(summary.events[1].occurred_at, t0() + Duration::minutes(240));
    assert_eq!(summary.events[2].occurred_at, t0() + Duration::minutes(390));
    assert_eq!(summary.events[2].position.speed, Some(12.0));
}

#[test]
fn replaying_twice_adds_nothing() {
    let feed = InMemoryPositions::new();
    let sink = InMemoryAlerts::new();
    track(&feed);
    let fence = strait();
    let imo = ObjectId::new("imo-9");

    let first = replay_history(&feed, &sink, &fence, &imo, t0(), t0() + Duration::days(1), DwellRearmPolicy::ExitOnly)
        .unwrap();
    let second = replay_history(&feed, &sink, &fence, &imo, t0(), t0() + Duration::days(1), DwellRearmPolicy::ExitOnly)
        .unwrap();

    assert_eq!(first.events.len(), 3);
    assert!(second.events.is_empty());
    assert_eq!(sink.len().unwrap(), 3);
}

#[test]
fn live_monitor_continues_from_replayed_log() {
    let feed = Arc::new(InMemoryPositions::new());
    let alerts = Arc::new(InMemoryAlerts::new());
    let fences = Arc::new(fencewatch::storage::InMemoryFences::new());
    let fence = strait();
    fences.upsert_fence(&fence).unwrap();

    // Backfill only the approach and the first hour at anchor.
    track(&feed);
    replay_history(
        feed.as_ref(),
        alerts.as_ref(),
        &fence,
        &ObjectId::new("imo-9"),
        t0(),
        t0() + Duration::minutes(90),
        DwellRearmPolicy::default(),
    )
    .unwrap();
    assert_eq!(
        alerts.latest_event(&FenceId::new("strait"), &ObjectId::new("imo-9")).unwrap().map(|e| e.event_type),
        Some(EventType::Entry)
    );

    let monitor = FenceMonitor::new(
        Arc::clone(&feed) as Arc<dyn PositionSource>,
        fences as Arc<dyn FenceStore>,
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
        &MonitorConfig::default(),
    )
    .unwrap();

    // The latest report is already east of the fence.
    let summary = monitor.run_once_at(t0() + Duration::hours(8)).unwrap();
    assert_eq!(summary.emitted, 1);
    let kinds: Vec<EventType> = alerts
        .events_for(&FenceId::new("strait"), &ObjectId::new("imo-9"))
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(kinds, vec![EventType::Entry, EventType::Exit]);
}

#[test]
fn scenario_file_round_trip_through_monitor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.json");
    let now = Utc::now();

    let doc = serde_json::json!({
        "fences": [
            {
                "id": "sg-port",
                "fenceType": "port_area",
                "centerLat": 1.26,
                "centerLon": 103.84,
                "radiusNm": 3.0,
                "vesselIds": ["imo-1", "imo-2"]
            },
            {
                "id": "broken",
                "fenceType": "circle",
                "centerLat": "north",
                "vesselIds": ["imo-1"]
            }
        ],
        "positions": [
            { "objectId": "imo-1", "timestamp": now, "latitude": 1.26, "longitude": 103.85 },
            { "objectId": "imo-2", "timestamp": now, "latitude": 1.50, "longitude": 103.85 }
        ]
    });
    std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    let mut scenario = Scenario::from_path(&path).unwrap();
    let (stores, report) = scenario.clone().into_stores().unwrap();
    assert_eq!(report.fences, 1);
    assert_eq!(report.unreadable_fences, 1);

    let alerts = Arc::new(stores.alerts);
    let monitor = FenceMonitor::new(
        Arc::new(stores.positions),
        Arc::new(stores.fences),
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
        &MonitorConfig::default(),
    )
    .unwrap();
    let summary = monitor.run_once_at(now).unwrap();
    assert_eq!(summary.evaluated, 2);
    assert_eq!(summary.emitted, 1);
    drop(monitor);

    scenario.events = alerts.all_events().unwrap();
    scenario.write_to(&path).unwrap();

    let reread = Scenario::from_path(&path).unwrap();
    assert_eq!(reread.events.len(), 1);
    assert_eq!(reread.events[0].event_type, EventType::Entry);
    assert_eq!(reread.events[0].object_id, ObjectId::new("imo-1"));

    // A second run over the written-back log records nothing new.
    let (stores, _) = reread.into_stores().unwrap();
    let alerts = Arc::new(stores.alerts);
    let monitor = FenceMonitor::new(
        Arc::new(stores.positions),
        Arc::new(stores.fences),
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
        &MonitorConfig::default(),
    )
    .unwrap();
    assert_eq!(monitor.run_once_at(now).unwrap().emitted, 0);
    assert_eq!(alerts.len().unwrap(), 1);
}
