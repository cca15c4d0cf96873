mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use common::{CRON_SECRET, base_config, claude_mock, request, spawn_app, weather_mock};
use serde_json::{Value, json};

const IDEAS: &str = r#"Here you go:
[
  {"title": "LEGO Botanical Set", "description": "Buildable flowers.", "price_range": "$50-$60",
   "reasoning": "Loves building", "where_to_buy": "LEGO Store", "category": "Toys"},
  {"title": "Dino Field Guide", "description": "Illustrated guide.", "price_range": "$18",
   "reasoning": "Dinosaur fan", "where_to_buy": "Bookshop", "category": "Books"}
]"#;

async fn recipient(t: &common::TestApp, key: &str) -> String {
    let (_, body) = t
        .json(request(
            "POST",
            "/api/recipients",
            Some(key),
            Some(json!({ "name": "Emma", "relationship": "daughter", "interests": ["lego"] })),
        ))
        .await;
    body["recipient"]["id"].as_str().expect("recipient id").to_string()
}

#[tokio::test]
async fn weather_is_cached_per_user_and_location() {
    let mut cfg = base_config();
    let hits = weather_mock(&mut cfg).await;
    let t = spawn_app("weather", cfg).await;
    let user = t.user("parent@example.com", None).await;
    let key = user.api_key.as_str();

    let (status, _) = t.json(request("GET", "/api/weather", Some(key), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .json(request("GET", "/api/weather?location=Providence", Some(key), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"], "Providence");
    assert_eq!(body["current_temp"], 68.0);
    assert_eq!(body["condition_icon"], "https://cdn.test/116.png");
    assert_eq!(body["forecast"].as_array().map(Vec::len), Some(1));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // same location, and the remembered one, come from the cache
    t.json(request("GET", "/api/weather?location=providence", Some(key), None))
        .await;
    let (_, cached) = t.json(request("GET", "/api/weather", Some(key), None)).await;
    assert_eq!(cached["location"], "Providence");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    t.json(request("GET", "/api/weather?location=Boston", Some(key), None))
        .await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let (status, _) = t
        .json(request("POST", "/api/weather", Some(key), Some(json!({ "location": "Boston" }))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let (_, report) = t
        .json(request("POST", "/api/cron/refresh-weather", Some(CRON_SECRET), None))
        .await;
    assert_eq!(report["refreshed"], 1);
    assert_eq!(report["failed"], 0);
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn weather_without_api_key_is_a_server_error() {
    let t = spawn_app("weather-off", base_config()).await;
    let user = t.user("parent@example.com", None).await;

    let (status, body) = t
        .json(request("GET", "/api/weather?location=Providence", Some(&user.api_key), None))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn recommendations_parse_the_model_array() {
    let mut cfg = base_config();
    claude_mock(&mut cfg, IDEAS).await;
    let t = spawn_app("recommend", cfg).await;
    let user = t.user("parent@example.com", None).await;
    let key = user.api_key.as_str();
    let id = recipient(&t, key).await;

    let (status, _) = t
        .json(request("POST", "/api/recommendations", Some(key), Some(json!({}))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .json(request(
            "POST",
            "/api/recommendations",
            Some(key),
            Some(json!({ "recipientId": id })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body.get("raw").is_none());
    let recs = body["recommendations"].as_array().expect("recommendations");
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["title"], "LEGO Botanical Set");
    assert_eq!(recs[0]["estimated_price"], 50.0);
    assert_eq!(recs[1]["estimated_price"], 18.0);

    let other = t.user("other@example.com", None).await;
    let (status, _) = t
        .json(request(
            "POST",
            "/api/recommendations",
            Some(&other.api_key),
            Some(json!({ "recipient_id": id })),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unparseable_recommendations_fall_back_to_raw_text() {
    let mut cfg = base_config();
    claude_mock(&mut cfg, "Sorry, I can only suggest a nice card.").await;
    let t = spawn_app("recommend-raw", cfg).await;
    let user = t.user("parent@example.com", None).await;
    let id = recipient(&t, &user.api_key).await;

    let (status, body) = t
        .json(request(
            "POST",
            "/api/recommendations",
            Some(&user.api_key),
            Some(json!({ "recipient_id": id })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recommendations"], json!([]));
    assert_eq!(body["raw"], "Sorry, I can only suggest a nice card.");
}

#[tokio::test]
async fn settings_round_trip_with_validation() {
    let t = spawn_app("settings", base_config()).await;
    let user = t.user("parent@example.com", None).await;
    let key = user.api_key.as_str();

    let (status, body) = t.json(request("GET", "/api/user/settings", Some(key), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"], Value::Null);

    for bad in [
        json!({ "phone_number": "12" }),
        json!({ "quiet_hours_start": "25:99" }),
    ] {
        let (status, _) = t
            .json(request("PUT", "/api/user/settings", Some(key), Some(bad)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, body) = t
        .json(request(
            "PUT",
            "/api/user/settings",
            Some(key),
            Some(json!({
                "phone_number": "(401) 555-0100",
                "partner_phone": "401-555-0199",
                "partner_name": "Sam",
                "quiet_hours_start": "22:00",
                "quiet_hours_end": "07:00"
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone_number"], "+14015550100");
    assert_eq!(body["settings"]["partner_phone"], "+14015550199");
    assert_eq!(body["quiet_hours"], "10:00 PM - 7:00 AM");

    let (_, body) = t.json(request("GET", "/api/user/settings", Some(key), None)).await;
    assert_eq!(body["settings"]["partner_name"], "Sam");
}
