//! API-backed scanners against mock services: breach lookup, social profile
//! and RDAP registration.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use footprint_core::{ApiConfig, ScanningConfig};
use footprint_scanner::scanners::{DomainIpScanner, EmailScanner, SocialProfileScanner};
use footprint_scanner::{Scanner, ScannerError};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn breached_account(
    State(busy_hits): State<Arc<AtomicU32>>,
    Path(email): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if headers.get("hibp-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    match email.as_str() {
        "pwned@example.com" => {
            Json(json!([{"Name": "Adobe"}, {"Name": "LinkedIn"}])).into_response()
        }
        "first/last#tag@example.com" => Json(json!([{"Name": "Tumblr"}])).into_response(),
        "busy@example.com" => {
            busy_hits.fetch_add(1, Ordering::SeqCst);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, "0")],
                "slow down",
            )
                .into_response()
        }
        "broken@example.com" => {
            (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn twitter_user(Path(name): Path<String>, headers: HeaderMap) -> impl IntoResponse {
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some("Bearer tok") {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }
    if name == "jack" {
        Json(json!({
            "data": {
                "id": "12",
                "name": "jack",
                "username": "jack",
                "location": "California",
                "verified": true,
                "public_metrics": {
                    "followers_count": 6_000_000,
                    "following_count": 4_000,
                    "tweet_count": 29_000,
                    "listed_count": 30_000
                }
            }
        }))
        .into_response()
    } else {
        Json(json!({
            "errors": [{"detail": format!("Could not find user with username: [{name}].")}]
        }))
        .into_response()
    }
}

async fn rdap_domain(Path(domain): Path<String>, headers: HeaderMap) -> impl IntoResponse {
    let accepts_rdap = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/rdap+json"));
    if domain != "example.com" || !accepts_rdap {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({
        "objectClassName": "domain",
        "ldhName": "EXAMPLE.COM",
        "events": [
            {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
            {"eventAction": "expiration", "eventDate": "2026-08-13T04:00:00Z"}
        ],
        "nameservers": [
            {"ldhName": "B.IANA-SERVERS.NET"},
            {"ldhName": "A.IANA-SERVERS.NET"}
        ],
        "entities": [{
            "roles": ["registrar"],
            "vcardArray": ["vcard", [
                ["version", {}, "text", "4.0"],
                ["fn", {}, "text", "RESERVED-Internet Assigned Numbers Authority"]
            ]],
            "entities": [{
                "roles": ["abuse"],
                "vcardArray": ["vcard", [["email", {}, "text", "Abuse@IANA.org"]]]
            }]
        }]
    }))
    .into_response()
}

async fn start_api_server(busy_hits: Arc<AtomicU32>) -> String {
    let app = Router::new()
        .route("/hibp/breachedaccount/{email}", get(breached_account))
        .route("/twitter/2/users/by/username/{name}", get(twitter_user))
        .route("/rdap/domain/{domain}", get(rdap_domain))
        .with_state(busy_hits);

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

fn apis(base: &str) -> ApiConfig {
    ApiConfig {
        hibp_base_url: format!("{base}/hibp"),
        twitter_base_url: format!("{base}/twitter"),
        rdap_base_url: format!("{base}/rdap"),
        timeout_secs: 5,
        hibp_api_key: Some("test-key".to_string()),
        twitter_bearer_token: Some("tok".to_string()),
    }
}

fn scanning() -> ScanningConfig {
    ScanningConfig {
        max_retry_after_secs: 1,
        ..ScanningConfig::default()
    }
}

#[tokio::test]
async fn test_breached_email_lists_breach_names() {
    let base = start_api_server(Arc::default()).await;
    let output = EmailScanner::new(&apis(&base), &scanning(), "pwned@example.com")
        .expect("build scanner")
        .scan()
        .await
        .expect("lookup succeeds");

    assert_eq!(output.data["breaches"]["breached"], true);
    assert_eq!(output.data["breaches"]["count"], 2);
    assert_eq!(output.data["breaches"]["breaches"], json!(["Adobe", "LinkedIn"]));
    assert_eq!(output.osint_keywords["breach"], vec!["Adobe", "LinkedIn"]);
}

#[tokio::test]
async fn test_email_with_path_characters_is_looked_up_whole() {
    let base = start_api_server(Arc::default()).await;
    let output = EmailScanner::new(&apis(&base), &scanning(), "first/last#tag@example.com")
        .expect("build scanner")
        .scan()
        .await
        .expect("lookup succeeds");

    assert_eq!(output.data["breaches"]["breaches"], json!(["Tumblr"]));
}

#[tokio::test]
async fn test_clean_email_is_not_an_error() {
    let base = start_api_server(Arc::default()).await;
    let output = EmailScanner::new(&apis(&base), &scanning(), "clean@example.com")
        .expect("build scanner")
        .scan()
        .await
        .expect("404 means no breaches");

    assert_eq!(output.data["breaches"]["breached"], false);
    assert_eq!(
        output.data["breaches"]["message"],
        "No breaches found for this email."
    );
    assert!(output.osint_keywords.is_empty());
}

#[tokio::test]
async fn test_email_rate_limit_waits_once_then_fails() {
    let busy_hits = Arc::new(AtomicU32::new(0));
    let base = start_api_server(Arc::clone(&busy_hits)).await;

    let err = EmailScanner::new(&apis(&base), &scanning(), "busy@example.com")
        .expect("build scanner")
        .scan()
        .await
        .expect_err("still limited after one retry");

    assert!(matches!(err, ScannerError::RateLimited { .. }));
    assert_eq!(busy_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_email_api_errors() {
    let base = start_api_server(Arc::default()).await;

    let mut wrong_key = apis(&base);
    wrong_key.hibp_api_key = Some("nope".to_string());
    let err = EmailScanner::new(&wrong_key, &scanning(), "pwned@example.com")
        .expect("build scanner")
        .scan()
        .await
        .expect_err("key rejected");
    assert!(matches!(err, ScannerError::Authentication { .. }));

    let err = EmailScanner::new(&apis(&base), &scanning(), "broken@example.com")
        .expect("build scanner")
        .scan()
        .await
        .expect_err("server error");
    assert!(matches!(err, ScannerError::Api { status: Some(500), .. }));
    assert!(err.to_string().contains("upstream exploded"));

    let mut no_key = apis(&base);
    no_key.hibp_api_key = None;
    let err = EmailScanner::new(&no_key, &scanning(), "pwned@example.com")
        .expect("build scanner")
        .scan()
        .await
        .expect_err("no key configured");
    assert!(matches!(err, ScannerError::Authentication { .. }));
}

#[tokio::test]
async fn test_social_profile_found() {
    let base = start_api_server(Arc::default()).await;
    let output = SocialProfileScanner::new(&apis(&base), &scanning(), "@jack")
        .expect("build scanner")
        .scan()
        .await
        .expect("profile exists");

    assert_eq!(output.data["found"], true);
    assert_eq!(output.data["username"], "jack");
    assert_eq!(output.data["followers"], 6_000_000);
    assert_eq!(output.data["verified"], true);
    assert_eq!(output.osint_keywords["location"], vec!["California"]);
}

#[tokio::test]
async fn test_social_profile_missing_carries_api_detail() {
    let base = start_api_server(Arc::default()).await;
    let err = SocialProfileScanner::new(&apis(&base), &scanning(), "ghost")
        .expect("build scanner")
        .scan()
        .await
        .expect_err("no such user");

    assert!(matches!(err, ScannerError::Api { .. }));
    assert!(err
        .to_string()
        .contains("Could not find user with username: [ghost]."));

    let mut bad_token = apis(&base);
    bad_token.twitter_bearer_token = Some("wrong".to_string());
    let err = SocialProfileScanner::new(&bad_token, &scanning(), "jack")
        .expect("build scanner")
        .scan()
        .await
        .expect_err("token rejected");
    assert!(matches!(err, ScannerError::Authentication { .. }));
}

#[tokio::test]
async fn test_rdap_registration() {
    let base = start_api_server(Arc::default()).await;
    let registration =
        DomainIpScanner::new(&apis(&base), &scanning(), "https://Example.com/about")
            .expect("build scanner")
            .registration()
            .await
            .expect("registration found");

    assert_eq!(
        registration.registrar.as_deref(),
        Some("RESERVED-Internet Assigned Numbers Authority")
    );
    assert_eq!(registration.creation_date.as_deref(), Some("1995-08-14T04:00:00Z"));
    assert_eq!(registration.expiration_date.as_deref(), Some("2026-08-13T04:00:00Z"));
    assert_eq!(
        registration.name_servers,
        vec!["a.iana-servers.net", "b.iana-servers.net"]
    );
    assert_eq!(registration.emails, vec!["abuse@iana.org"]);
}

#[tokio::test]
async fn test_rdap_unknown_domain() {
    let base = start_api_server(Arc::default()).await;
    let err = DomainIpScanner::new(&apis(&base), &scanning(), "unregistered.example")
        .expect("build scanner")
        .registration()
        .await
        .expect_err("no registration");

    assert!(matches!(err, ScannerError::Parsing { .. }));
    assert!(err
        .to_string()
        .contains("WHOIS data not found or domain does not exist."));
}
