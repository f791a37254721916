// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token introspection, custom token, session cookie and logout tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{bearer, body_json, create_test_app, json_body, USER_UID};

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(json_body(body))
        .unwrap()
}

#[tokio::test]
async fn test_verify_token_from_header() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/verify-token")
                .header(header::AUTHORIZATION, bearer(USER_UID))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Token is valid");
    assert_eq!(body["data"]["uid"], USER_UID);
    assert_eq!(body["data"]["email"], "user@example.com");
    assert_eq!(body["data"]["customClaims"], json!({}));
}

#[tokio::test]
async fn test_verify_token_from_body() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/auth/verify-token",
            json!({"idToken": format!("user:{USER_UID}")}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["uid"], USER_UID);
}

#[tokio::test]
async fn test_verify_token_missing() {
    let (app, _, provider) = create_test_app();

    let response = app
        .oneshot(post_json("/api/auth/verify-token", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_verify_token_expired() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/auth/verify-token",
            json!({"idToken": "expired-token"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "TOKEN_EXPIRED");
    assert_eq!(body["message"], "Token has expired");
}

#[tokio::test]
async fn test_custom_token_requires_uid() {
    let (app, _, provider) = create_test_app();

    let response = app
        .oneshot(post_json("/api/auth/custom-token", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "User UID is required");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_custom_token_created() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/auth/custom-token",
            json!({"uid": "svc-1", "additionalClaims": {"tier": "gold"}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["customToken"], "custom:svc-1");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/custom-token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_session_cookie_round_trip() {
    let (app, _, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/session-cookie",
            json!({"idToken": format!("user:{USER_UID}")}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = body_json(response).await["data"]["sessionCookie"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(post_json(
            "/api/auth/verify-session",
            json!({"sessionCookie": cookie}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Session cookie is valid");
    assert_eq!(body["data"]["uid"], USER_UID);
}

#[tokio::test]
async fn test_session_cookie_requires_id_token() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(post_json("/api/auth/session-cookie", json!({"expiresIn": 600000})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "ID token is required");
}

#[tokio::test]
async fn test_session_cookie_lifetime_out_of_range() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/auth/session-cookie",
            json!({"idToken": format!("user:{USER_UID}"), "expiresIn": 1000}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_session_rejects_revoked() {
    let (app, _, _) = create_test_app();

    let logout = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header(header::AUTHORIZATION, bearer(USER_UID))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::OK);
    assert_eq!(
        body_json(logout).await["message"],
        "All tokens revoked successfully"
    );

    let response = app
        .oneshot(post_json(
            "/api/auth/verify-session",
            json!({"sessionCookie": format!("session:{USER_UID}")}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid session cookie");
}

#[tokio::test]
async fn test_logout_requires_auth() {
    let (app, _, provider) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(provider.calls(), 0);
}
