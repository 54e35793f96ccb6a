use axum::{http::StatusCode, response::Html, routing::get, Router};
use footprint_browser::{BrowserEngine, RenderOptions};
use footprint_core::{BrowserConfig, WaitUntil, DEFAULT_USER_AGENT};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::net::TcpListener;

async fn start_site() -> String {
    let app = Router::new()
        .route(
            "/user/alice",
            get(|| async {
                Html("<html><body><img src=\"/big.png\"><h1 id=\"p\">alice</h1></body></html>")
            }),
        )
        .route(
            "/user/nobody",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Html("<html><body>No such user</body></html>"),
                )
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get address");
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("Server failed to start");
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    format!("http://{addr}")
}

fn options() -> RenderOptions {
    RenderOptions {
        timeout: Duration::from_secs(30),
        wait_until: WaitUntil::DomContentLoaded,
        headers: BTreeMap::new(),
        user_agent: None,
    }
}

#[tokio::test]
#[ignore = "Requires Chrome/Chromium installed"]
async fn test_browser_engine_launch_and_shutdown() {
    let engine = BrowserEngine::launch(&BrowserConfig::default(), DEFAULT_USER_AGENT)
        .await
        .expect("launch browser");
    assert_eq!(engine.fingerprint().user_agent, DEFAULT_USER_AGENT);
    engine.shutdown().await;
}

#[tokio::test]
#[ignore = "Requires Chrome/Chromium installed"]
async fn test_render_reports_status_and_content() {
    let base = start_site().await;
    let engine = BrowserEngine::launch(&BrowserConfig::default(), DEFAULT_USER_AGENT)
        .await
        .expect("launch browser");
    let session = engine.new_session().await.expect("open session");

    let found = session
        .render(&format!("{base}/user/alice"), &options())
        .await
        .expect("render existing profile");
    assert_eq!(found.status, Some(200));
    assert!(found.content.contains("alice"));

    let missing = session
        .render(&format!("{base}/user/nobody"), &options())
        .await
        .expect("render missing profile");
    assert_eq!(missing.status, Some(404));
    assert!(missing.content.contains("No such user"));

    session.close().await;
    engine.shutdown().await;
}

#[tokio::test]
#[ignore = "Requires Chrome/Chromium installed"]
async fn test_render_unreachable_host_fails() {
    let engine = BrowserEngine::launch(&BrowserConfig::default(), DEFAULT_USER_AGENT)
        .await
        .expect("launch browser");
    let session = engine.new_session().await.expect("open session");

    let result = session.render("http://127.0.0.1:9/", &options()).await;
    assert!(result.is_err());

    session.close().await;
    engine.shutdown().await;
}
