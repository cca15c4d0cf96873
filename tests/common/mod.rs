#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Form, Json, Router,
    body::{Body, to_bytes},
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    routing::{get, post},
};
use giftstash::config::Config;
use giftstash::db::Database;
use giftstash::db::models::User;
use giftstash::router::{StashState, stash_router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const CRON_SECRET: &str = "cron-secret";
pub const ADMIN_KEY: &str = "admin-key";

pub struct TestApp {
    pub app: Router,
    pub state: StashState,
    db_path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.db_path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}

fn temp_db_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("giftstash-{tag}-{}-{}.sqlite", std::process::id(), nanos));
    path
}

pub fn base_config() -> Config {
    let mut cfg = Config::default();
    cfg.basic.cron_secret = CRON_SECRET.to_string();
    cfg.basic.admin_key = ADMIN_KEY.to_string();
    cfg.basic.app_url = "https://app.test".to_string();
    // keep outbound calls off real services
    cfg.anthropic.base_url = "http://127.0.0.1:9".to_string();
    cfg.twilio.base_url = "http://127.0.0.1:9".to_string();
    cfg.weather.base_url = "http://127.0.0.1:9".to_string();
    cfg
}

pub async fn spawn_app(tag: &str, cfg: Config) -> TestApp {
    let db_path = temp_db_path(tag);
    let db = Database::connect(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to open test database");
    let state = StashState::new(cfg, db).expect("failed to build state");
    TestApp {
        app: stash_router(state.clone()),
        state,
        db_path,
    }
}

impl TestApp {
    pub async fn user(&self, email: &str, phone: Option<&str>) -> User {
        self.state
            .db
            .users()
            .create(email, Some("Pat Parent"), phone)
            .await
            .expect("failed to create user")
    }

    pub async fn call(&self, req: Request<Body>) -> Response {
        self.app.clone().oneshot(req).await.expect("request failed")
    }

    pub async fn json(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.call(req).await;
        let status = resp.status();
        (status, body_json(resp).await)
    }
}

pub fn request(method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("failed to build request")
}

pub fn sms_request(from: &str, body: &str) -> Request<Body> {
    let form = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("From", from)
        .append_pair("Body", body)
        .append_pair("MessageSid", "SMtest")
        .finish();
    Request::builder()
        .method("POST")
        .uri("/api/sms/webhook")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .expect("failed to build request")
}

pub async fn body_bytes(resp: Response) -> Vec<u8> {
    to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body")
        .to_vec()
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = body_bytes(resp).await;
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub async fn body_text(resp: Response) -> String {
    String::from_utf8(body_bytes(resp).await).expect("response body was not utf-8")
}

/// Serve `router` on an ephemeral port; returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// Twilio stand-in recording `(To, Body)` of each message.
#[derive(Clone, Default)]
pub struct TwilioMock {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl TwilioMock {
    pub async fn start(cfg: &mut Config) -> Self {
        let mock = Self::default();
        let router = Router::new()
            .route("/2010-04-01/Accounts/{sid}/Messages.json", post(twilio_send))
            .with_state(mock.clone());
        cfg.twilio.base_url = serve(router).await;
        cfg.twilio.account_sid = "ACtest".to_string();
        cfg.twilio.auth_token = "token".to_string();
        cfg.twilio.phone_number = "+15550000000".to_string();
        mock
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("mock lock").clone()
    }
}

async fn twilio_send(
    State(mock): State<TwilioMock>,
    Form(params): Form<Vec<(String, String)>>,
) -> Json<Value> {
    let field = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    };
    let mut sent = mock.sent.lock().expect("mock lock");
    sent.push((field("To"), field("Body")));
    Json(json!({ "sid": format!("SM{}", sent.len()) }))
}

/// Claude stand-in answering every completion with `reply`.
pub async fn claude_mock(cfg: &mut Config, reply: &'static str) {
    let router = Router::new().route(
        "/v1/messages",
        post(move || async move {
            Json(json!({
                "id": "msg_test",
                "content": [{ "type": "text", "text": reply }],
                "stop_reason": "end_turn"
            }))
        }),
    );
    cfg.anthropic.base_url = serve(router).await;
    cfg.anthropic.api_key = "sk-test".to_string();
    cfg.anthropic.max_retries = 0;
}

/// WeatherAPI stand-in; the counter tracks upstream hits.
pub async fn weather_mock(cfg: &mut Config) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/v1/forecast.json",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "current": {
                        "temp_f": 68.0, "feelslike_f": 66.5, "humidity": 50, "wind_mph": 4.0,
                        "wind_dir": "SW",
                        "condition": { "text": "Partly cloudy", "icon": "//cdn.test/116.png", "code": 1003 }
                    },
                    "forecast": { "forecastday": [{
                        "date": "2025-11-20",
                        "day": {
                            "maxtemp_f": 70.0, "mintemp_f": 50.0,
                            "condition": { "text": "Sunny", "icon": "//cdn.test/113.png", "code": 1000 },
                            "daily_chance_of_rain": 10, "daily_chance_of_snow": 0
                        }
                    }]},
                    "alerts": { "alert": [] }
                }))
            }),
        )
        .with_state(hits.clone());
    cfg.weather.base_url = serve(router).await;
    cfg.weather.api_key = "weather-key".to_string();
    hits
}
