mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{base_config, request, spawn_app};
use serde_json::{Value, json};

async fn new_child(t: &common::TestApp, key: &str, name: &str) -> String {
    let (status, body) = t
        .json(request(
            "POST",
            "/api/accountability/children",
            Some(key),
            Some(json!({ "name": name, "age": 12 })),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["child"]["id"].as_str().expect("child id").to_string()
}

async fn new_commitment(t: &common::TestApp, key: &str, child: &str, due_in: Duration) -> Value {
    let due = Utc::now() + due_in;
    let (status, body) = t
        .json(request(
            "POST",
            "/api/accountability/commitments",
            Some(key),
            Some(json!({
                "child_id": child,
                "commitment_text": "clean room",
                "due_date": due.to_rfc3339(),
                "category": "chores"
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["commitment"].clone()
}

#[tokio::test]
async fn commitment_completion_updates_stats() {
    let t = spawn_app("commitments", base_config()).await;
    let user = t.user("parent@example.com", None).await;
    let key = user.api_key.as_str();
    let child = new_child(&t, key, "Emma").await;

    let commitment = new_commitment(&t, key, &child, Duration::hours(3)).await;
    assert_eq!(commitment["status"], "active");
    assert_eq!(commitment["requested_by"], user.id.to_string());
    let id = commitment["id"].as_str().expect("commitment id");

    let (status, body) = t
        .json(request(
            "PATCH",
            &format!("/api/accountability/commitments/{id}"),
            Some(key),
            Some(json!({ "status": "completed" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["commitment"]["status"], "completed");
    assert_eq!(body["commitment"]["completed_on_time"], true);
    assert_eq!(body["commitment"]["child_name"], "Emma");

    let (status, stats) = t
        .json(request("GET", &format!("/api/children/{child}/stats"), Some(key), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_commitments"], 1);
    assert_eq!(stats["completed_on_time"], 1);

    let (status, _) = t
        .json(request(
            "GET",
            &format!("/api/children/{child}/stats?month=2025-13"),
            Some(key),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn extending_requires_a_new_due_date() {
    let t = spawn_app("extend", base_config()).await;
    let user = t.user("parent@example.com", None).await;
    let key = user.api_key.as_str();
    let child = new_child(&t, key, "Leo").await;
    let commitment = new_commitment(&t, key, &child, Duration::hours(1)).await;
    let id = commitment["id"].as_str().expect("commitment id");
    let uri = format!("/api/accountability/commitments/{id}");

    let (status, _) = t
        .json(request("PATCH", &uri, Some(key), Some(json!({ "status": "extended" }))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let due = (Utc::now() + Duration::days(1)).to_rfc3339();
    let (status, body) = t
        .json(request(
            "PATCH",
            &uri,
            Some(key),
            Some(json!({ "status": "extended", "due_date": due, "extension_reason": "sick" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["commitment"]["status"], "active");
    assert_eq!(body["commitment"]["extension_reason"], "sick");
    assert!(body["commitment"]["extension_requested_at"].is_string());
}

#[tokio::test]
async fn commitments_for_foreign_children_are_rejected() {
    let t = spawn_app("foreign-child", base_config()).await;
    let alice = t.user("alice@example.com", None).await;
    let bob = t.user("bob@example.com", None).await;
    let child = new_child(&t, &alice.api_key, "Emma").await;

    let (status, _) = t
        .json(request(
            "POST",
            "/api/accountability/commitments",
            Some(&bob.api_key),
            Some(json!({
                "child_id": child,
                "commitment_text": "homework",
                "due_date": Utc::now().to_rfc3339()
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .json(request("DELETE", "/api/accountability/children", Some(&alice.api_key), None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn consequence_lifecycle() {
    let t = spawn_app("consequences", base_config()).await;
    let user = t.user("parent@example.com", None).await;
    let key = user.api_key.as_str();
    let child = new_child(&t, key, "Emma").await;

    let (status, body) = t
        .json(request(
            "POST",
            "/api/accountability/consequences",
            Some(key),
            Some(json!({
                "child_id": child,
                "restriction_type": "device",
                "restriction_item": "iPad",
                "reason": "homework",
                "duration_days": 3,
                "status": "pending_confirmation"
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let consequence = &body["consequence"];
    assert_eq!(consequence["severity"], "medium");
    assert!(consequence["expires_at"].is_string());
    let id = consequence["id"].as_str().expect("consequence id").to_string();
    let uri = format!("/api/accountability/consequences/{id}");

    let (status, body) = t
        .json(request("PATCH", &uri, Some(key), Some(json!({ "status": "active" }))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consequence"]["status"], "active");
    assert_eq!(body["consequence"]["confirmed_by"], user.id.to_string());

    let (_, dashboard) = t
        .json(request("GET", "/api/accountability/dashboard", Some(key), None))
        .await;
    assert_eq!(dashboard["children"].as_array().map(Vec::len), Some(1));
    assert_eq!(dashboard["consequences"][0]["restriction_item"], "iPad");
    assert_eq!(dashboard["stats"].as_array().map(Vec::len), Some(1));

    let (status, _) = t
        .json(request(
            "PATCH",
            &uri,
            Some(key),
            Some(json!({ "status": "extended", "extend_days": 0 })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .json(request("PATCH", &uri, Some(key), Some(json!({ "status": "lifted" }))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consequence"]["status"], "lifted");
    assert!(body["consequence"]["lifted_at"].is_string());

    let (_, dashboard) = t
        .json(request("GET", "/api/accountability/dashboard", Some(key), None))
        .await;
    assert_eq!(dashboard["consequences"], json!([]));
}

#[tokio::test]
async fn oversized_day_counts_are_rejected() {
    let t = spawn_app("day-counts", base_config()).await;
    let user = t.user("parent@example.com", None).await;
    let key = user.api_key.as_str();
    let child = new_child(&t, key, "Leo").await;

    for days in [1_000_000_000_i64, i64::MAX, 3651] {
        let (status, body) = t
            .json(request(
                "POST",
                "/api/accountability/consequences",
                Some(key),
                Some(json!({
                    "child_id": child,
                    "restriction_item": "Switch",
                    "reason": "bedtime",
                    "duration_days": days
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{days}");
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    let (status, body) = t
        .json(request(
            "POST",
            "/api/accountability/consequences",
            Some(key),
            Some(json!({
                "child_id": child,
                "restriction_item": "Switch",
                "reason": "bedtime",
                "duration_days": 2
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["consequence"]["id"].as_str().expect("consequence id").to_string();
    let expires = body["consequence"]["expires_at"].clone();

    let (status, _) = t
        .json(request(
            "PATCH",
            &format!("/api/accountability/consequences/{id}"),
            Some(key),
            Some(json!({ "status": "extended", "extend_days": 1_000_000_000_000_i64 })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // the failed extension changed nothing
    let (_, list) = t
        .json(request("GET", "/api/accountability/consequences", Some(key), None))
        .await;
    assert_eq!(list[0]["expires_at"], expires);
    assert_eq!(list[0]["duration_days"], 2);
}
