mod common;

use std::path::Path;
use std::time::{Duration, Instant};

use pvz3_downloader::backend::downloader::worker::DownloadWorker;
use pvz3_downloader::backend::downloader::{EventSink, Outcome, SessionEvent, WorkItem};
use pvz3_downloader::backend::utils::config::RetryPolicy;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{drain, fast_policy, list_files};

fn item(server: &MockServer, dir: &Path, asset_path: &str) -> WorkItem {
    let filename = asset_path.rsplit('/').next().unwrap().to_string();
    WorkItem {
        original_identifier: format!("{}/{asset_path}", common::CDN_TOKEN),
        resolved_url: format!("{}/{asset_path}", server.uri()),
        local_path: dir.join(&filename),
        filename,
    }
}

fn worker(policy: RetryPolicy, cancel: CancellationToken) -> (DownloadWorker, EventSink) {
    let events = EventSink::new();
    let worker = DownloadWorker::new(reqwest::Client::new(), policy, cancel, events.clone());
    (worker, events)
}

fn retry_delays(events: &[SessionEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Retrying { delay_ms, .. } => Some(*delay_ms),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn recovers_after_three_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iOS/a.bundle"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    common::mount_asset(&server, "iOS/a.bundle", b"bundle-bytes").await;

    let dir = tempfile::tempdir().unwrap();
    let (worker, events) = worker(fast_policy(), CancellationToken::new());
    let mut rx = events.subscribe();
    let item = item(&server, dir.path(), "iOS/a.bundle");

    let started = Instant::now();
    let outcome = worker.run(&item).await;

    assert_eq!(outcome, Outcome::Succeeded);
    assert!(started.elapsed() >= Duration::from_millis(20 + 40 + 80));
    assert_eq!(std::fs::read(&item.local_path).unwrap(), b"bundle-bytes");
    assert_eq!(retry_delays(&drain(&mut rx)), vec![20, 40, 80]);
}

#[tokio::test]
async fn gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iOS/broken.bundle"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (worker, events) = worker(fast_policy(), CancellationToken::new());
    let mut rx = events.subscribe();

    let outcome = worker.run(&item(&server, dir.path(), "iOS/broken.bundle")).await;

    assert_eq!(outcome, Outcome::Failed);
    assert!(list_files(dir.path()).is_empty());
    let events = drain(&mut rx);
    assert_eq!(retry_delays(&events).len(), 3);
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::Log { message, .. } if message.contains("Giving up on broken.bundle")
    )));
}

#[tokio::test]
async fn backoff_is_capped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iOS/broken.bundle"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let policy = RetryPolicy {
        max_retries: 5,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(30),
        attempt_timeout: Duration::from_secs(5),
    };
    let dir = tempfile::tempdir().unwrap();
    let (worker, events) = worker(policy, CancellationToken::new());
    let mut rx = events.subscribe();

    let outcome = worker.run(&item(&server, dir.path(), "iOS/broken.bundle")).await;

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(retry_delays(&drain(&mut rx)), vec![10, 20, 30, 30, 30]);
}

#[tokio::test]
async fn empty_body_is_not_a_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iOS/empty.bundle"))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (worker, _events) = worker(fast_policy(), CancellationToken::new());

    let outcome = worker.run(&item(&server, dir.path(), "iOS/empty.bundle")).await;

    assert_eq!(outcome, Outcome::Failed);
    assert!(list_files(dir.path()).is_empty());
}

#[tokio::test]
async fn existing_file_is_skipped_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let item = item(&server, dir.path(), "iOS/a.bundle");
    std::fs::write(&item.local_path, b"cached").unwrap();
    let (worker, _events) = worker(fast_policy(), CancellationToken::new());

    assert_eq!(worker.run(&item).await, Outcome::Succeeded);
    assert_eq!(std::fs::read(&item.local_path).unwrap(), b"cached");
}

#[tokio::test]
async fn zero_length_file_is_downloaded_again() {
    let server = MockServer::start().await;
    common::mount_asset(&server, "iOS/a.bundle", b"fresh").await;

    let dir = tempfile::tempdir().unwrap();
    let item = item(&server, dir.path(), "iOS/a.bundle");
    std::fs::write(&item.local_path, b"").unwrap();
    let (worker, _events) = worker(fast_policy(), CancellationToken::new());

    assert_eq!(worker.run(&item).await, Outcome::Succeeded);
    assert_eq!(std::fs::read(&item.local_path).unwrap(), b"fresh");
}

#[tokio::test]
async fn creates_missing_parent_directories() {
    let server = MockServer::start().await;
    common::mount_asset(&server, "iOS/a.bundle", b"bytes").await;

    let dir = tempfile::tempdir().unwrap();
    let mut item = item(&server, dir.path(), "iOS/a.bundle");
    item.local_path = dir.path().join("nested").join("deeper").join("a.bundle");
    let (worker, _events) = worker(fast_policy(), CancellationToken::new());

    assert_eq!(worker.run(&item).await, Outcome::Succeeded);
    assert!(item.local_path.is_file());
}

#[tokio::test]
async fn cancelled_before_start_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (worker, _events) = worker(fast_policy(), cancel);

    let outcome = worker.run(&item(&server, dir.path(), "iOS/a.bundle")).await;
    assert_eq!(outcome, Outcome::Cancelled);
}

#[tokio::test]
async fn cancel_interrupts_a_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iOS/slow.bundle"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let (worker, _events) = worker(fast_policy(), cancel.clone());
    let item = item(&server, dir.path(), "iOS/slow.bundle");

    let handle = tokio::spawn(async move { worker.run(&item).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker did not react to cancellation")
        .unwrap();
    assert_eq!(outcome, Outcome::Cancelled);
    assert!(list_files(dir.path()).is_empty());
}

#[tokio::test]
async fn cancel_interrupts_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iOS/broken.bundle"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let policy = RetryPolicy {
        base_delay: Duration::from_secs(30),
        max_delay: Duration::from_secs(30),
        ..fast_policy()
    };
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let (worker, _events) = worker(policy, cancel.clone());
    let item = item(&server, dir.path(), "iOS/broken.bundle");

    let handle = tokio::spawn(async move { worker.run(&item).await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("backoff sleep ignored cancellation")
        .unwrap();
    assert_eq!(outcome, Outcome::Cancelled);
}

#[tokio::test]
async fn cancel_mid_body_removes_the_partial_file() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 2048];
        let _ = socket.read(&mut request).await.unwrap();
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\n")
            .await
            .unwrap();
        socket.write_all(&[7u8; 5000]).await.unwrap();
        socket.flush().await.unwrap();
        // Keep the connection open with the body unfinished.
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let dir = tempfile::tempdir().unwrap();
    let item = WorkItem {
        original_identifier: format!("{}/iOS/stalled.bin", common::CDN_TOKEN),
        resolved_url: format!("http://{addr}/iOS/stalled.bin"),
        filename: "stalled.bin".to_string(),
        local_path: dir.path().join("stalled.bin"),
    };
    let cancel = CancellationToken::new();
    let (worker, _events) = worker(fast_policy(), cancel.clone());

    let handle = tokio::spawn(async move { worker.run(&item).await });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let during = list_files(dir.path());
    assert_eq!(during.len(), 1, "expected one staging file, got {during:?}");
    let staged = during[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(staged.starts_with("stalled.bin.") && staged.ends_with(".part"), "{staged}");

    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker did not react to cancellation")
        .unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
    assert!(list_files(dir.path()).is_empty());
    server.abort();
}

#[tokio::test]
async fn colliding_items_never_share_a_staging_file() {
    let server = MockServer::start().await;
    let first_body = vec![b'a'; 200_000];
    let second_body = vec![b'b'; 300_000];
    Mock::given(method("GET"))
        .and(path("/a/shared.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(first_body.clone())
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/shared.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(second_body.clone())
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let first = item(&server, dir.path(), "a/shared.bin");
    let second = item(&server, dir.path(), "b/shared.bin");
    assert_eq!(first.local_path, second.local_path);
    let (worker, _events) = worker(fast_policy(), CancellationToken::new());

    let (a, b) = tokio::join!(worker.run(&first), worker.run(&second));

    assert_eq!((a, b), (Outcome::Succeeded, Outcome::Succeeded));
    let landed = std::fs::read(&first.local_path).unwrap();
    assert!(landed == first_body || landed == second_body, "mixed content");
    assert_eq!(list_files(dir.path()), vec![first.local_path.clone()]);
}
