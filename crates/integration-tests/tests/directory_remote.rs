//! Integration tests for scans resolved through the remote directory API.
//!
//! A local axum server stands in for the directory service.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode as AxumStatus, header},
    response::{IntoResponse, Response},
    routing::get,
};
use checkin_integration_tests::{KioskBuilder, TestKiosk, serve};
use checkin_kiosk::services::directory::{Directory, RemoteDirectory};
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::json;
use url::Url;

const TOKEN: &str = "directory-test-token";

async fn student(Path(id): Path<String>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"));
    if !authorized {
        return AxumStatus::UNAUTHORIZED.into_response();
    }

    match id.as_str() {
        "1234567890" => Json(json!({ "displayName": "John Doe", "andrewId": "jdoe" })).into_response(),
        "5555555555" => Json(json!({ "name": "Bob Johnson", "username": "bjohnson" })).into_response(),
        "7777777777" => Json(json!({ "email": "nobody@example.edu" })).into_response(),
        "9999999999" => AxumStatus::INTERNAL_SERVER_ERROR.into_response(),
        _ => AxumStatus::NOT_FOUND.into_response(),
    }
}

async fn directory_kiosk(token: &str) -> TestKiosk {
    let (base_url, _server) = serve(Router::new().route("/api/student/{id}", get(student))).await;
    let directory = RemoteDirectory::new(
        Url::parse(&base_url).unwrap(),
        &SecretString::from(token.to_string()),
    )
    .unwrap();

    let kiosk = KioskBuilder::default()
        .directory(Directory::Remote(directory))
        .spawn()
        .await;
    kiosk.login().await;
    kiosk
}

#[tokio::test]
async fn test_remote_match_is_returned_and_logged() {
    let kiosk = directory_kiosk(TOKEN).await;

    let (status, body) = kiosk.scan("1234567890").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": true, "person": { "name": "John Doe", "andrewid": "jdoe" } })
    );
    let rows = kiosk.log_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][2..], ["John Doe", "jdoe", "SUCCESS", "Dev User"]);
}

#[tokio::test]
async fn test_alternate_field_names_are_accepted() {
    let kiosk = directory_kiosk(TOKEN).await;

    let (_, body) = kiosk.scan("5555555555").await;

    assert_eq!(body["person"], json!({ "name": "Bob Johnson", "andrewid": "bjohnson" }));
}

#[tokio::test]
async fn test_remote_not_found_is_a_logged_failure() {
    let kiosk = directory_kiosk(TOKEN).await;

    let (status, body) = kiosk.scan("0000000000").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": false, "error": "Student not found" }));
    let rows = kiosk.log_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][4], "FAILURE");
}

#[tokio::test]
async fn test_upstream_error_is_system_error_and_not_logged() {
    let kiosk = directory_kiosk(TOKEN).await;

    let (status, body) = kiosk.scan("9999999999").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "success": false, "error": "System error" }));
    assert!(kiosk.log_rows().is_empty());
}

#[tokio::test]
async fn test_malformed_record_is_system_error() {
    let kiosk = directory_kiosk(TOKEN).await;

    let (status, body) = kiosk.scan("7777777777").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "System error");
    assert!(kiosk.log_rows().is_empty());
}

#[tokio::test]
async fn test_wrong_token_is_system_error() {
    let kiosk = directory_kiosk("not-the-token").await;

    let (status, _) = kiosk.scan("1234567890").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(kiosk.log_rows().is_empty());
}

#[tokio::test]
async fn test_unreachable_directory_is_system_error() {
    let directory = RemoteDirectory::new(
        Url::parse("http://127.0.0.1:9").unwrap(),
        &SecretString::from(TOKEN.to_string()),
    )
    .unwrap();
    let kiosk = KioskBuilder::default()
        .directory(Directory::Remote(directory))
        .spawn()
        .await;
    kiosk.login().await;

    let (status, body) = kiosk.scan("1234567890").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "System error");
}
