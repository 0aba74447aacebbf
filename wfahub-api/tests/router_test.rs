/// Router tests that never reach the database
///
/// The pool is lazy, so every request here must be answered by middleware or
/// by checks that run before the first query.

mod common;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use common::{empty_request, json_request, offline_app, send, TEST_SECRET};
use serde_json::json;
use std::net::SocketAddr;
use tower::Service as _;
use uuid::Uuid;
use wfahub_shared::auth::jwt::{create_token, Claims};

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = offline_app(&[]);

    for uri in [
        "/api/templates",
        "/api/executions",
        "/api/credits/transactions",
        "/api/campaigns",
        "/api/auth/me",
        "/api/admin/users",
    ] {
        let (status, body) = send(&app, empty_request("GET", uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_garbage_bearer_token_is_rejected() {
    let app = offline_app(&[]);

    let (status, body) = send(&app, empty_request("GET", "/api/templates", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let app = offline_app(&[]);
    let claims = Claims::session(Uuid::new_v4(), chrono::Duration::hours(1));
    let forged = create_token(&claims, "another-secret-that-is-long-enough-000").unwrap();
    assert_ne!(forged, create_token(&claims, TEST_SECRET).unwrap());

    let (status, _) = send(&app, empty_request("GET", "/api/executions", Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_security_headers_on_error_responses() {
    let mut app = offline_app(&[]);

    let response = app
        .call(empty_request("GET", "/api/campaigns", None))
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_public_auth_endpoints_are_rate_limited() {
    let app = offline_app(&[("AUTH_RATE_LIMIT_PER_MINUTE", "2")]);

    // An empty body is rejected by the extractor, before any query
    for _ in 0..2 {
        let request = json_request("POST", "/api/auth/login", None, json!({}));
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    let mut router = app.clone();
    let response = router
        .call(json_request("POST", "/api/auth/login", None, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
}

/// Auth request arriving from `peer` with the given `X-Forwarded-For`
fn auth_request(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let mut request = json_request("POST", "/api/auth/register", None, json!({}));
    request
        .extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    if let Some(value) = forwarded_for {
        request
            .headers_mut()
            .insert("x-forwarded-for", value.parse().unwrap());
    }
    request
}

#[tokio::test]
async fn test_rate_limit_is_per_peer() {
    let app = offline_app(&[("AUTH_RATE_LIMIT_PER_MINUTE", "1")]);

    let (first, _) = send(&app, auth_request("203.0.113.7:40000", None)).await;
    let (second, _) = send(&app, auth_request("203.0.113.7:40001", None)).await;
    let (other, _) = send(&app, auth_request("198.51.100.2:40000", None)).await;

    assert_ne!(first, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_ne!(other, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_bypass_rate_limit() {
    let app = offline_app(&[("AUTH_RATE_LIMIT_PER_MINUTE", "1")]);

    let mut limited = 0;
    for i in 0..20 {
        let spoofed = format!("203.0.113.{}", i);
        let (status, _) = send(&app, auth_request("198.51.100.9:40000", Some(&spoofed))).await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }

    assert_eq!(limited, 19);
}

#[tokio::test]
async fn test_trusted_proxy_keys_on_last_forwarded_hop() {
    let app = offline_app(&[
        ("AUTH_RATE_LIMIT_PER_MINUTE", "1"),
        ("TRUST_PROXY_HEADERS", "true"),
    ]);
    let proxy = "10.0.0.2:443";

    let (first, _) = send(&app, auth_request(proxy, Some("1.1.1.1, 203.0.113.7"))).await;
    // a different spoofed prefix is still the same client
    let (second, _) = send(&app, auth_request(proxy, Some("2.2.2.2, 203.0.113.7"))).await;
    let (other, _) = send(&app, auth_request(proxy, Some("198.51.100.2"))).await;

    assert_ne!(first, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_ne!(other, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_malformed_policy_slug_is_not_found() {
    let app = offline_app(&[]);

    let (status, body) = send(&app, empty_request("GET", "/api/policies/Not_A_Slug", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let mut app = offline_app(&[]);

    let response = app
        .call(empty_request("POST", "/api/auth/logout", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("wfa_session="));
    assert!(cookie.contains("Max-Age=0"));
}
