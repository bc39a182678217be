//! Monitor-level integration test for the ETA gate: a query outside
//! its scheduled window is skipped even though it is otherwise due;
//! inside the window, the same query runs.

use std::sync::Arc;

use serde_json::json;

use vg_domain::clock::FrozenClock;
use vg_gateway::fetch::{Fetch, FakeFetcher};
use vg_gateway::monitor::query::QueryStatus;
use vg_gateway::monitor::Monitor;
use vg_gateway::storage::Storage;

fn saturday_at(hour: u32, minute: u32) -> chrono::DateTime<chrono::Utc> {
    // 2024-06-01 is a Saturday.
    format!("2024-06-01T{hour:02}:{minute:02}:00Z").parse().unwrap()
}

fn new_monitor(clock: Arc<FrozenClock>, fetcher: Arc<dyn Fetch>) -> (Monitor, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path().to_path_buf(), "default.wav".to_string());
    let monitor = Monitor::new(
        "alice".to_string(),
        storage,
        fetcher,
        vec![],
        /* min_interval_minutes */ 1,
        /* max_concurrent_fetches */ 4,
        clock,
    );
    (monitor, dir)
}

#[tokio::test]
async fn eta_window_gates_an_already_primed_query() {
    let clock = Arc::new(FrozenClock::new(saturday_at(12, 0)));
    let fetcher: Arc<dyn Fetch> = Arc::new(FakeFetcher::new(vec![vg_gateway::fetch::FetchOutcome {
        text: "nothing interesting here".to_string(),
        status: QueryStatus::Ok,
    }]));
    let (monitor, _dir) = new_monitor(clock.clone(), fetcher);

    let (ok, msg) = monitor
        .add_query(
            json!({
                "url": "https://example.com/watch",
                "sequence": "restock",
                "interval": "1",
                "eta": "saturday,16-18",
            })
            .as_object()
            .unwrap()
            .clone(),
        )
        .await;
    assert!(ok, "add_query failed: {msg}");

    let uid = monitor.all_queries().await.keys().next().unwrap().clone();

    // First scan at noon: status is still NeverRan, so the recovery
    // fast-path runs it once regardless of the eta window.
    monitor.scan().await;
    let primed = monitor.get_query(&uid).await.unwrap();
    assert_eq!(primed.status, QueryStatus::Ok);
    assert_eq!(primed.last_run, saturday_at(12, 0));

    // 15:00 — before the window opens. Scan should skip it.
    clock.set(saturday_at(15, 0));
    monitor.scan().await;
    let skipped = monitor.get_query(&uid).await.unwrap();
    assert_eq!(skipped.last_run, saturday_at(12, 0), "query ran outside its eta window");

    // 17:30 — inside the window. Scan should run it.
    clock.set(saturday_at(17, 30));
    monitor.scan().await;
    let ran = monitor.get_query(&uid).await.unwrap();
    assert_eq!(ran.last_run, saturday_at(17, 30), "query did not run inside its eta window");
}
