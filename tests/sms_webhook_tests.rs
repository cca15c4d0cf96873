mod common;

use axum::http::{StatusCode, header};
use common::{TwilioMock, base_config, body_text, request, sms_request, spawn_app};
use giftstash::db::recipients::RecipientInput;

const PHONE: &str = "+14015550100";

#[tokio::test]
async fn unknown_numbers_get_setup_instructions() {
    let t = spawn_app("sms-unknown", base_config()).await;

    let resp = t.call(sms_request("+19995550123", "LEGO set for Emma")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("text/xml")
    );
    let body = body_text(resp).await;
    assert!(body.starts_with("<?xml"));
    assert!(body.contains("Visit app.test/settings to get started."));
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let t = spawn_app("sms-invalid", base_config()).await;

    let resp = t.call(sms_request(PHONE, "   ")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(resp).await.contains("Invalid message format"));
}

#[tokio::test]
async fn unsigned_requests_fail_when_signatures_required() {
    let mut cfg = base_config();
    cfg.twilio.require_signature = true;
    cfg.twilio.webhook_url = Some("https://app.test/api/sms/webhook".to_string());
    let t = spawn_app("sms-signature", cfg).await;
    t.user("parent@example.com", Some(PHONE)).await;

    let resp = t.call(sms_request(PHONE, "HELP")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(resp).await.contains("Unauthorized"));
}

#[tokio::test]
async fn gift_text_saves_for_matched_recipient() {
    let t = spawn_app("sms-gift", base_config()).await;
    let user = t.user("parent@example.com", Some("(401) 555-0100")).await;
    t.state
        .db
        .recipients()
        .create(
            user.id,
            RecipientInput {
                name: Some("Emma".into()),
                relationship: Some("daughter".into()),
                ..Default::default()
            },
        )
        .await
        .expect("create recipient");

    // first contact carries the onboarding text
    let resp = t.call(sms_request("4015550100", "LEGO set for Emma")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert!(body.contains("Welcome to GiftStash!"), "{body}");
    assert!(body.contains("✅ Saved! LEGO set for Emma"), "{body}");

    let gifts = t.state.db.gifts().list(user.id, None).await.expect("list gifts");
    assert_eq!(gifts.len(), 1);
    assert_eq!(gifts[0].gift.name, "LEGO set");
    assert_eq!(gifts[0].recipients[0].recipient_name, "Emma");

    let resp = t.call(sms_request(PHONE, "undo")).await;
    let body = body_text(resp).await;
    assert!(!body.contains("Welcome to GiftStash!"), "{body}");
    assert!(body.contains("Undone: LEGO set for Emma"), "{body}");
    let gifts = t.state.db.gifts().list(user.id, None).await.expect("list gifts");
    assert!(gifts.is_empty());
}

#[tokio::test]
async fn senders_are_rate_limited() {
    let mut cfg = base_config();
    cfg.basic.sms_per_minute = 1;
    let t = spawn_app("sms-rate", cfg).await;
    t.user("parent@example.com", Some(PHONE)).await;

    let first = body_text(t.call(sms_request(PHONE, "HELP")).await).await;
    assert!(first.contains("GiftStash SMS"));

    let resp = t.call(sms_request(PHONE, "HELP")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("sending messages too quickly"));
}

#[tokio::test]
async fn test_message_goes_to_the_callers_phone() {
    let mut cfg = base_config();
    let twilio = TwilioMock::start(&mut cfg).await;
    let t = spawn_app("sms-test", cfg).await;
    let without_phone = t.user("nophone@example.com", None).await;
    let with_phone = t.user("parent@example.com", Some(PHONE)).await;

    let (status, _) = t
        .json(request("POST", "/api/sms/test", Some(&without_phone.api_key), None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .json(request("POST", "/api/sms/test", Some(&with_phone.api_key), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message_sid"], "SM1");

    let sent = twilio.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, PHONE);
}
