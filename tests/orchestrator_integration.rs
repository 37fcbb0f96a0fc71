//! End-to-end: config -> strategy -> transfer -> sink, against a mock platform.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use teradl_core::{
    AppConfig, DeliveryError, DeliverySink, DirectorySink, ErrorKind, Orchestrator,
    PipelineError, ProgressUpdate, ResolveError, ResolvedFile, Resolver, RetryPolicy, ShareLink,
    TransferPipeline, TransferSettings,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::{should_skip_socket_bound_test, start_mock_server_or_skip};

const SHARE_LINK: &str = "check this out https://www.terabox.com/s/1Movie99 thanks";
const PAYLOAD: &[u8] = b"\x00\x01movie bytes\x02\x03";

fn config_for(server: &MockServer, staging: &Path) -> AppConfig {
    let text = format!(
        r#"
strategy = "cookie-header"
staging_dir = '{staging}'
max_retries = 1
resolve_timeout_secs = 10
transfer_timeout_secs = 10

[platform]
api_base = "{uri}"
share_origin = "{uri}"
host_header = ""

[credentials]
cookie = "ndus=integration"
"#,
        staging = staging.display(),
        uri = server.uri()
    );
    let config = AppConfig::from_toml_str(&text).unwrap();
    config.validate().unwrap();
    config
}

async fn mount_platform(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/s/1Movie99"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/sharing/link?surl=Movie99"),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sharing/link"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="/x?dp-logid=31337&y=1"></a><script>fn("JSTOK")</script>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/share/list"))
        .and(query_param("shorturl", "Movie99"))
        .and(query_param("jsToken", "JSTOK"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errno": 0,
            "list": [{
                "server_filename": "Movie: Part 1.mp4",
                "size": PAYLOAD.len(),
                "dlink": format!("{}/dlink/abc", server.uri()),
                "thumbs": { "url3": format!("{}/thumb.jpg", server.uri()) }
            }]
        })))
        .mount(server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/dlink/abc"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/cdn/movie", server.uri()).as_str()),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/movie"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PAYLOAD.to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_process_delivers_resolved_file() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_platform(&server).await;
    let staging = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let orchestrator = Orchestrator::from_config(&config_for(&server, staging.path())).unwrap();
    assert_eq!(orchestrator.strategy_name(), "chain");

    let sink = DirectorySink::new(output.path());
    let outcome = orchestrator
        .process(SHARE_LINK, &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.file.file_name(), "Movie: Part 1.mp4");
    assert_eq!(outcome.report.bytes_written, PAYLOAD.len() as u64);
    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].file_name().unwrap(), "Movie_ Part 1.mp4");
    assert_eq!(std::fs::read(&delivered[0]).unwrap(), PAYLOAD);
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_spawned_requests_run_concurrently() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_platform(&server).await;
    let staging = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let orchestrator =
        Arc::new(Orchestrator::from_config(&config_for(&server, staging.path())).unwrap());
    let sink = Arc::new(DirectorySink::new(output.path()));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            orchestrator.spawn(
                SHARE_LINK.to_string(),
                sink.clone(),
                CancellationToken::new(),
            )
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 3);
    for path in &delivered {
        assert_eq!(std::fs::read(path).unwrap(), PAYLOAD);
    }
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_process_rejects_unsupported_link_without_network() {
    let staging = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.credentials.cookie = Some("ndus=x".to_string());
    config.staging_dir = Some(staging.path().to_path_buf());

    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let sink = DirectorySink::new(staging.path().join("out"));
    let err = orchestrator
        .process("https://example.com/s/1abc", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Resolve(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidLink);
    assert!(sink.delivered().is_empty());
}

#[tokio::test]
async fn test_download_failure_surfaces_kind() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/cdn/movie"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    mount_platform(&server).await;
    let staging = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let orchestrator = Orchestrator::from_config(&config_for(&server, staging.path())).unwrap();
    let sink = DirectorySink::new(output.path());
    let err = orchestrator
        .process(SHARE_LINK, &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DownloadFailed);
    assert!(sink.delivered().is_empty());
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

/// Bytes the stalling server sends before it goes quiet.
const STALLED_AFTER: usize = 2 * 1024 * 1024;

/// Serves one response that announces far more body than it sends, then
/// holds the connection open without writing.
async fn start_stalling_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0_u8; 4096];
                let _ = socket.read(&mut request).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\n\r\n",
                    STALLED_AFTER * 4
                );
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                if socket.write_all(&vec![7_u8; STALLED_AFTER]).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });
    format!("http://{addr}/cdn/stalled.bin")
}

/// Hands out a fixed direct link without touching the network.
struct FixedResolver {
    direct_link: String,
}

#[async_trait]
impl Resolver for FixedResolver {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn resolve(&self, _link: &ShareLink) -> Result<ResolvedFile, ResolveError> {
        ResolvedFile::new("stalled.bin", self.direct_link.clone(), 0)
    }
}

/// Tracks the furthest progress seen and whether anything was delivered.
#[derive(Default)]
struct WatchingSink {
    furthest: Mutex<u64>,
    delivered: Mutex<bool>,
}

impl WatchingSink {
    fn furthest(&self) -> u64 {
        *self.furthest.lock().unwrap()
    }
}

#[async_trait]
impl DeliverySink for WatchingSink {
    async fn deliver_file(&self, _path: &Path, _display_name: &str) -> Result<(), DeliveryError> {
        *self.delivered.lock().unwrap() = true;
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        let mut furthest = self.furthest.lock().unwrap();
        *furthest = (*furthest).max(update.bytes_written);
    }
}

fn stalled_orchestrator(direct_link: String, staging: &Path, transfer_timeout: Duration) -> Orchestrator {
    let pipeline = TransferPipeline::new(TransferSettings {
        staging_dir: staging.to_path_buf(),
        retry: RetryPolicy::no_retry(),
        preflight: false,
        ..TransferSettings::default()
    })
    .unwrap();
    Orchestrator::new(
        Arc::new(FixedResolver { direct_link }),
        pipeline,
        Duration::from_secs(5),
        transfer_timeout,
    )
}

#[tokio::test]
async fn test_transfer_timeout_mid_body_cleans_staging() {
    if should_skip_socket_bound_test() {
        return;
    }
    let direct_link = start_stalling_server().await;
    let staging = TempDir::new().unwrap();
    let orchestrator = stalled_orchestrator(direct_link, staging.path(), Duration::from_secs(2));
    let sink = WatchingSink::default();

    let err = orchestrator
        .process("https://terabox.com/s/1stall", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::TimedOut { stage: "transfer", .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(sink.furthest() > 0, "no bytes were staged before the timeout");
    assert!(!*sink.delivered.lock().unwrap());
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_cancel_mid_body_cleans_staging() {
    if should_skip_socket_bound_test() {
        return;
    }
    let direct_link = start_stalling_server().await;
    let staging = TempDir::new().unwrap();
    let orchestrator = Arc::new(stalled_orchestrator(
        direct_link,
        staging.path(),
        Duration::from_secs(30),
    ));
    let sink = Arc::new(WatchingSink::default());
    let cancel = CancellationToken::new();

    let handle = orchestrator.spawn(
        "https://terabox.com/s/1stall".to_string(),
        Arc::clone(&sink) as Arc<dyn DeliverySink>,
        cancel.clone(),
    );
    tokio::time::timeout(Duration::from_secs(10), async {
        while sink.furthest() == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    cancel.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled), "unexpected error: {err:?}");
    assert!(!*sink.delivered.lock().unwrap());
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}
