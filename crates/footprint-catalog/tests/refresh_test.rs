//! Integration tests for catalog refresh and bootstrap against a local HTTP server.

use axum::{http::StatusCode, routing::get, Router};
use footprint_catalog::{Catalog, CatalogLoader, DocumentKind};
use footprint_core::{CatalogConfig, ScanCategory};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

const REMOTE_SITES: &str = r#"{
    "username_sites": [
        {"id": "github", "name": "GitHub", "urlTemplate": "https://github.com/{username}",
         "noResult": {"type": "status_code", "value": "404"}},
        {"id": "keybase", "name": "Keybase", "url": "https://keybase.io/{}"},
        {"name": "no id", "url": "https://nowhere.example/{}"}
    ]
}"#;

const REMOTE_COUNTRIES: &str = r#"[
    {"country": "Sweden", "country_code": "SE", "sites": [
        {"id": "hitta", "urlTemplate": "https://www.hitta.se/s?vad={query}", "urlEncode": true,
         "noResult": {"type": "contains", "value": "Inga träffar"}}
    ]}
]"#;

async fn start_catalog_server() -> String {
    let app = Router::new()
        .route("/sites.json", get(|| async { REMOTE_SITES }))
        .route("/full_name_sites.json", get(|| async { REMOTE_COUNTRIES }))
        .route("/broken.json", get(|| async { "{ not json" }))
        .route(
            "/missing.json",
            get(|| async { (StatusCode::NOT_FOUND, "gone") }),
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

fn local_catalog(dir: &TempDir) -> (CatalogLoader, Catalog) {
    let loader = CatalogLoader::new(dir.path()).expect("create loader");
    loader.ensure_defaults().expect("ensure defaults");
    std::fs::write(
        loader.path(DocumentKind::Username),
        r#"{"username_sites": [{"id": "local", "urlTemplate": "https://local.example/{username}"}]}"#,
    )
    .expect("write local document");
    let catalog = Catalog::load(loader.clone(), Duration::from_secs(5));
    (loader, catalog)
}

#[tokio::test]
async fn test_refresh_swaps_and_persists() {
    let base = start_catalog_server().await;
    let dir = TempDir::new().expect("create temp dir");
    let (loader, catalog) = local_catalog(&dir);
    assert_eq!(catalog.count(DocumentKind::Username), 1);

    let refreshed = catalog
        .refresh(DocumentKind::Username, &format!("{base}/sites.json"))
        .await;

    assert!(refreshed);
    let ids: Vec<String> = catalog
        .sites_for(ScanCategory::Username)
        .iter()
        .map(|s| s.id.to_string())
        .collect();
    assert_eq!(ids, vec!["github", "keybase"]);

    let on_disk = std::fs::read_to_string(loader.path(DocumentKind::Username))
        .expect("read persisted document");
    assert_eq!(on_disk, REMOTE_SITES);
}

#[tokio::test]
async fn test_refresh_with_malformed_body_is_rejected() {
    let base = start_catalog_server().await;
    let dir = TempDir::new().expect("create temp dir");
    let (loader, catalog) = local_catalog(&dir);

    let refreshed = catalog
        .refresh(DocumentKind::Username, &format!("{base}/broken.json"))
        .await;

    assert!(!refreshed);
    assert_eq!(catalog.count(DocumentKind::Username), 1);
    let on_disk = std::fs::read_to_string(loader.path(DocumentKind::Username))
        .expect("read local document");
    assert!(on_disk.contains("local.example"));
}

#[tokio::test]
async fn test_refresh_with_error_status_is_rejected() {
    let base = start_catalog_server().await;
    let dir = TempDir::new().expect("create temp dir");
    let (_loader, catalog) = local_catalog(&dir);

    let refreshed = catalog
        .refresh(DocumentKind::Username, &format!("{base}/missing.json"))
        .await;

    assert!(!refreshed);
    assert_eq!(catalog.count(DocumentKind::Username), 1);
}

#[tokio::test]
async fn test_bootstrap_refreshes_empty_documents() {
    let base = start_catalog_server().await;
    let dir = TempDir::new().expect("create temp dir");

    let config = CatalogConfig {
        data_dir: Some(dir.path().to_path_buf()),
        username_sites_url: format!("{base}/sites.json"),
        full_name_sites_url: format!("{base}/full_name_sites.json"),
        refresh_timeout_secs: 5,
    };

    let catalog = Catalog::bootstrap(&config).await.expect("bootstrap catalog");

    assert_eq!(catalog.count(DocumentKind::Username), 2);
    assert_eq!(catalog.count(DocumentKind::FullName), 1);
    let swedish = catalog.sites_for_country(ScanCategory::FullName, "sweden");
    assert_eq!(swedish.len(), 1);
    assert!(swedish[0].url_encode);
}

#[tokio::test]
async fn test_bootstrap_offline_creates_defaults() {
    let dir = TempDir::new().expect("create temp dir");

    let config = CatalogConfig {
        data_dir: Some(dir.path().join("data")),
        username_sites_url: "http://127.0.0.1:9/sites.json".to_string(),
        full_name_sites_url: "http://127.0.0.1:9/full_name_sites.json".to_string(),
        refresh_timeout_secs: 2,
    };

    let catalog = Catalog::bootstrap(&config).await.expect("bootstrap catalog");

    assert_eq!(catalog.count(DocumentKind::Username), 0);
    assert_eq!(catalog.count(DocumentKind::FullName), 0);
    assert!(dir.path().join("data").join("sites.json").exists());
    assert!(dir.path().join("data").join("full_name_sites.json").exists());
}
