mod common;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use common::hiscores_page;
use hiscores_scraper::infra::{MemorySink, ReqwestHttp};
use hiscores_scraper::pipeline::ingestion::{Fetcher, RetryPolicy};
use hiscores_scraper::{Coordinator, FetchError, PageIndex, RunState, ScrapeConfig};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn overall(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("page").map(String::as_str) {
        Some("1") => Html(hiscores_page(&[
            (1, "Lynx Titan", 2277, 4_600_000_000),
            (2, "Zezima", 2277, 4_600_000_000),
        ]))
        .into_response(),
        Some("2") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some("3") => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Html(hiscores_page(&[])).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve() -> SocketAddr {
    let app = Router::new().route("/overall.ws", get(overall));
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    addr
}

fn fetcher(addr: SocketAddr, timeout: Duration) -> Fetcher {
    let client = ReqwestHttp::new("hiscores_scraper-test", timeout).unwrap();
    Fetcher::new(Arc::new(client), format!("http://{addr}/overall.ws"), 0, timeout)
        .with_retry(RetryPolicy::none())
}

#[tokio::test]
async fn test_fetches_page_over_http() {
    let addr = serve().await;
    let raw = fetcher(addr, Duration::from_secs(5))
        .fetch(PageIndex(1), &CancellationToken::new())
        .await
        .unwrap();
    let body = String::from_utf8(raw.0).unwrap();
    assert!(body.contains("<tbody>"));
    assert!(body.contains("Lynx Titan"));
}

#[tokio::test]
async fn test_http_status_error() {
    let addr = serve().await;
    let err = fetcher(addr, Duration::from_secs(5))
        .fetch(PageIndex(2), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::StatusCode(500));
}

#[tokio::test]
async fn test_unresponsive_page_times_out() {
    let addr = serve().await;
    let err = fetcher(addr, Duration::from_millis(200))
        .fetch(PageIndex(3), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Timeout(200));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let err = fetcher(addr, Duration::from_secs(5))
        .fetch(PageIndex(1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_full_run_against_local_server() {
    let addr = serve().await;
    let config = ScrapeConfig {
        base_url: format!("http://{addr}/overall.ws"),
        start_page: 1,
        end_page: 4,
        max_concurrency: 2,
        request_timeout_secs: 1,
        retry: hiscores_scraper::config::RetryConfig::none(),
        ..ScrapeConfig::default()
    };
    let sink = Arc::new(MemorySink::new());
    let mut coordinator = Coordinator::with_reqwest(&config, sink.clone()).unwrap();

    let report = coordinator.run(config.pages()).await.unwrap();

    assert_eq!(report.state, RunState::Complete);
    assert_eq!(report.pages_total, 4);
    assert_eq!(report.pages_succeeded, 1);
    // 500, timeout, 404
    assert_eq!(report.pages_failed, 3);
    let batch = &sink.batches()[0];
    let names: Vec<_> = batch.sorted_by_rank().into_iter().map(|e| e.record.name).collect();
    assert_eq!(names, vec!["Lynx Titan", "Zezima"]);
}
