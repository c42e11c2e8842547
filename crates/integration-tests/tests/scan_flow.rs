//! Integration tests for the scan endpoint.
//!
//! Every test runs its own kiosk with the development bypass, the built-in
//! badge table and a CSV log in a unique temp file.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use checkin_integration_tests::TestKiosk;
use reqwest::StatusCode;
use serde_json::json;

fn tail(row: &[String]) -> &[String] {
    &row[2..]
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_unauthenticated_scan_is_rejected_without_logging() {
    let kiosk = TestKiosk::spawn().await;

    let (status, body) = kiosk.scan("1234567890").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "success": false, "error": "Not authenticated" }));
    assert!(kiosk.log_rows().is_empty());
    assert!(!kiosk.log_path.exists());
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_empty_body_is_bad_request() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;

    let (status, body) = kiosk.scan_raw("").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "No RFID ID provided" }));
    assert!(kiosk.log_rows().is_empty());
}

#[tokio::test]
async fn test_missing_or_blank_id_is_bad_request() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;

    for body in ["{}", r#"{"rfidId":""}"#, r#"{"rfidId":"   "}"#, "not json"] {
        let (status, json) = kiosk.scan_raw(body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["error"], "No RFID ID provided");
    }
    assert!(kiosk.log_rows().is_empty());
}

// ============================================================================
// Lookup and logging
// ============================================================================

#[tokio::test]
async fn test_known_badge_succeeds_and_is_logged() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;

    let (status, body) = kiosk.scan("1234567890").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": true, "person": { "name": "John Doe", "andrewid": "jdoe" } })
    );

    let rows = kiosk.log_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(tail(&rows[0]), ["John Doe", "jdoe", "SUCCESS", "Dev User"]);
}

#[tokio::test]
async fn test_unknown_badge_fails_and_is_logged() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;

    let (status, body) = kiosk.scan("0000000000").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": false, "error": "Student not found" }));

    let rows = kiosk.log_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(tail(&rows[0]), ["Unknown", "N/A", "FAILURE", "Dev User"]);
}

#[tokio::test]
async fn test_log_row_has_date_and_time_columns() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;
    kiosk.scan("9876543210").await;

    let rows = kiosk.log_rows();
    let date = &rows[0][0];
    let time = &rows[0][1];
    assert_eq!(date.split('/').count(), 3, "{date}");
    assert!(time.ends_with(" AM") || time.ends_with(" PM"), "{time}");
}

#[tokio::test]
async fn test_every_builtin_badge_resolves() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;

    let expected = [
        ("1234567890", "John Doe", "jdoe"),
        ("9876543210", "Jane Smith", "jsmith"),
        ("5555555555", "Bob Johnson", "bjohnson"),
        ("1111111111", "Alice Cooper", "acooper"),
        ("2222222222", "Charlie Brown", "cbrown"),
    ];
    for (id, name, andrewid) in expected {
        let (status, body) = kiosk.scan(id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["person"], json!({ "name": name, "andrewid": andrewid }));
    }
    assert_eq!(kiosk.log_rows().len(), expected.len());
}

#[tokio::test]
async fn test_each_scan_produces_exactly_one_row() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;

    let scans = ["1234567890", "0000000000", "5555555555", "42", "2222222222"];
    for (i, id) in scans.iter().enumerate() {
        kiosk.scan(id).await;
        assert_eq!(kiosk.log_rows().len(), i + 1);
    }

    let outcomes: Vec<String> = kiosk.log_rows().into_iter().map(|r| r[4].clone()).collect();
    assert_eq!(outcomes, ["SUCCESS", "FAILURE", "SUCCESS", "FAILURE", "SUCCESS"]);
}

#[tokio::test]
async fn test_repeated_scans_are_independent_rows() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;

    for _ in 0..3 {
        let (_, body) = kiosk.scan("1111111111").await;
        assert_eq!(body["success"], true);
    }

    let rows = kiosk.log_rows();
    assert_eq!(rows.len(), 3);
    assert!(
        rows.iter()
            .all(|r| tail(r) == ["Alice Cooper", "acooper", "SUCCESS", "Dev User"])
    );
}

#[tokio::test]
async fn test_surrounding_whitespace_is_trimmed() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;

    let (_, body) = kiosk.scan(" 5555555555\n").await;
    assert_eq!(body["person"]["andrewid"], "bjohnson");
}

#[tokio::test]
async fn test_numeric_id_is_accepted() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;

    let (status, body) = kiosk.scan_raw(r#"{"rfidId":2222222222}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["person"]["name"], "Charlie Brown");
}

#[tokio::test]
async fn test_concurrent_scans_each_get_a_whole_row() {
    let kiosk = TestKiosk::spawn().await;
    kiosk.login().await;

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..10 {
        let client = kiosk.client.clone();
        let url = kiosk.url("/scan");
        let id = if i % 2 == 0 { "1234567890" } else { "0000000000" };
        tasks.spawn(async move {
            client
                .post(url)
                .json(&json!({ "rfidId": id }))
                .send()
                .await
                .unwrap()
                .status()
        });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    let rows = kiosk.log_rows();
    assert_eq!(rows.len(), 10);
    assert!(rows.iter().all(|r| r.len() == 6));
    assert_eq!(rows.iter().filter(|r| r[4] == "SUCCESS").count(), 5);
}
