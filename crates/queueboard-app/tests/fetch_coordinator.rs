mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{settle, vehicle, CountingSource, GatedSource};
use queueboard_app::{FetchMode, QueueFetcher};
use queueboard_types::QueueError;

const LIVE_WINDOW: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_late_result_of_superseded_fetch_is_discarded() {
    let source = Arc::new(GatedSource::default());
    let fetcher = QueueFetcher::new(source.clone(), LIVE_WINDOW);
    fetcher.set_plant(Some("7".to_string()));

    let first = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.fetch(Some("7"), FetchMode::Normal).await })
    };
    source.wait_for(1).await;

    let second = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.fetch(Some("7"), FetchMode::Normal).await })
    };
    source.wait_for(2).await;

    assert!(source.resolve(1, Ok(vec![vehicle(2, 1)])));
    second.await.unwrap();

    // The first request resolves last; its requester has already moved on
    let _ = source.resolve(0, Ok(vec![vehicle(1, 1)]));
    first.await.unwrap();

    let state = fetcher.state();
    assert_eq!(state.vehicles, vec![vehicle(2, 1)]);
    assert_eq!(state.error, None);
    assert!(!state.loading);
}

#[tokio::test]
async fn test_superseded_failure_records_no_error() {
    let source = Arc::new(GatedSource::default());
    let fetcher = QueueFetcher::new(source.clone(), LIVE_WINDOW);

    let first = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.fetch(Some("7"), FetchMode::Silent).await })
    };
    source.wait_for(1).await;
    let second = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.fetch(Some("7"), FetchMode::Silent).await })
    };
    source.wait_for(2).await;

    let _ = source.resolve(0, Err(QueueError::Timeout));
    first.await.unwrap();
    assert_eq!(fetcher.state().error, None);

    source.resolve(1, Ok(vec![vehicle(5, 1)]));
    second.await.unwrap();
    assert_eq!(fetcher.state().vehicles.len(), 1);
    assert_eq!(fetcher.state().error, None);
}

#[tokio::test]
async fn test_failure_keeps_previous_vehicles() {
    let source = Arc::new(GatedSource::default());
    let fetcher = QueueFetcher::new(source.clone(), LIVE_WINDOW);
    fetcher.set_plant(Some("7".to_string()));

    let ok = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.retry().await })
    };
    source.wait_for(1).await;
    source.resolve(0, Ok(vec![vehicle(1, 1), vehicle(2, 2)]));
    ok.await.unwrap();
    let loaded_at = fetcher.state().last_update;
    assert!(loaded_at.is_some());

    let failing = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.retry().await })
    };
    source.wait_for(2).await;
    assert!(fetcher.state().loading);
    source.resolve(
        1,
        Err(QueueError::Http {
            status: 503,
            message: "maintenance".to_string(),
        }),
    );
    failing.await.unwrap();

    let state = fetcher.state();
    assert_eq!(state.vehicles.len(), 2);
    assert_eq!(state.last_update, loaded_at);
    assert!(!state.loading);
    assert_eq!(
        state.error.as_deref(),
        Some("Server responded with 503: maintenance")
    );
}

#[tokio::test]
async fn test_silent_fetch_never_touches_loading() {
    let source = Arc::new(GatedSource::default());
    let fetcher = QueueFetcher::new(source.clone(), LIVE_WINDOW);
    fetcher.set_plant(Some("7".to_string()));
    let mut states = fetcher.subscribe();

    let refresh = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.refresh().await })
    };
    source.wait_for(1).await;
    assert!(!fetcher.state().loading);

    source.resolve(0, Ok(vec![vehicle(1, 1)]));
    refresh.await.unwrap();

    assert!(states.has_changed().unwrap());
    let state = states.borrow_and_update().clone();
    assert!(!state.loading);
    assert_eq!(state.vehicles.len(), 1);
    assert!(fetcher.is_live(Utc::now()));
}

#[tokio::test]
async fn test_non_silent_fetch_clears_previous_error() {
    let source = Arc::new(GatedSource::default());
    let fetcher = QueueFetcher::new(source.clone(), LIVE_WINDOW);

    let failing = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.fetch(Some("7"), FetchMode::Silent).await })
    };
    source.wait_for(1).await;
    source.resolve(0, Err(QueueError::Network("offline".to_string())));
    failing.await.unwrap();
    assert!(fetcher.state().error.is_some());

    let retry = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.fetch(Some("7"), FetchMode::Normal).await })
    };
    source.wait_for(2).await;
    let state = fetcher.state();
    assert!(state.loading);
    assert_eq!(state.error, None);

    source.resolve(1, Ok(Vec::new()));
    retry.await.unwrap();
    assert!(!fetcher.state().loading);
}

#[tokio::test]
async fn test_fetch_without_plant_is_noop() {
    let source = Arc::new(CountingSource::default());
    let fetcher = QueueFetcher::new(source.clone(), LIVE_WINDOW);

    fetcher.fetch(None, FetchMode::Normal).await;
    fetcher.retry().await;
    fetcher.refresh().await;

    assert_eq!(source.count(), 0);
    assert!(!fetcher.state().loading);
}

#[tokio::test]
async fn test_set_plant_cancels_in_flight_request() {
    let source = Arc::new(GatedSource::default());
    let fetcher = QueueFetcher::new(source.clone(), LIVE_WINDOW);
    fetcher.set_plant(Some("7".to_string()));

    let pending = fetcher.spawn_fetch(FetchMode::Normal);
    source.wait_for(1).await;
    assert!(fetcher.state().loading);

    fetcher.set_plant(Some("8".to_string()));
    pending.await.unwrap();
    settle().await;

    // Reply arrives after the switch and must not land on plant 8
    let _ = source.resolve(0, Ok(vec![vehicle(1, 1)]));
    settle().await;

    let state = fetcher.state();
    assert_eq!(state.plant_id.as_deref(), Some("8"));
    assert!(state.vehicles.is_empty());
    assert!(!state.loading);
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn test_silent_successor_clears_loading_of_superseded_fetch() {
    let source = Arc::new(GatedSource::default());
    let fetcher = QueueFetcher::new(source.clone(), LIVE_WINDOW);
    fetcher.set_plant(Some("7".to_string()));

    let visible = fetcher.spawn_fetch(FetchMode::Normal);
    source.wait_for(1).await;
    let background = fetcher.spawn_fetch(FetchMode::Silent);
    source.wait_for(2).await;
    visible.await.unwrap();
    assert!(fetcher.state().loading);

    source.resolve(1, Ok(vec![vehicle(1, 1)]));
    background.await.unwrap();
    assert!(!fetcher.state().loading);
}

#[tokio::test]
async fn test_stalled_http_server_surfaces_timeout() {
    use queueboard_infra::HttpQueueSource;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(stream);
    });

    let source = HttpQueueSource::new(
        base_url,
        Duration::from_millis(200),
        common::FixedSession::with_code("ICPL"),
    )
    .unwrap();
    let fetcher = QueueFetcher::new(Arc::new(source), LIVE_WINDOW);
    fetcher.set_plant(Some("7".to_string()));
    fetcher.fetch(Some("7"), FetchMode::Normal).await;

    let state = fetcher.state();
    assert!(!state.loading);
    assert_eq!(state.error.as_deref(), Some("Request timed out"));
    assert!(state.vehicles.is_empty());
    server.abort();
}

#[tokio::test]
async fn test_cancelled_source_result_leaves_no_error() {
    let source = Arc::new(GatedSource::default());
    let fetcher = QueueFetcher::new(source.clone(), LIVE_WINDOW);
    fetcher.set_plant(Some("7".to_string()));

    let pending = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.fetch(Some("7"), FetchMode::Normal).await })
    };
    source.wait_for(1).await;
    assert!(source.resolve(0, Err(QueueError::Cancelled)));
    pending.await.unwrap();

    let state = fetcher.state();
    assert_eq!(state.error, None);
    assert!(state.vehicles.is_empty());
}
