//! End-to-end HTTP tests against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use banner_db_memory::InMemoryStorage;
use banner_server::{
    AppConfig, AppState, AuthState, CacheBackend, Claims, OutcomeCache, build_app,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";
const BANNERS: &str = "/api/v1/banner";

type Reply = (StatusCode, Option<Value>);

struct TestApp {
    router: Router,
    cache: OutcomeCache,
}

fn app() -> TestApp {
    let mut cfg = AppConfig::default();
    cfg.auth.secret = SECRET.into();

    let cache = OutcomeCache::new(CacheBackend::new_local(), Duration::from_secs(300));
    let state = AppState::new(
        Arc::new(InMemoryStorage::new()),
        cache.clone(),
        AuthState::new(SECRET),
    );
    TestApp {
        router: build_app(&cfg, state),
        cache,
    }
}

fn token(is_admin: bool) -> String {
    let claims = Claims {
        user_id: if is_admin { 1 } else { 2 },
        is_admin,
        exp: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("encode token")
}

fn admin() -> String {
    token(true)
}

fn user() -> String {
    token(false)
}

fn banner_body(feature_id: i64, tag_ids: &[i64], content: Value, is_active: bool) -> Value {
    json!({
        "tag_ids": tag_ids,
        "feature_id": feature_id,
        "content": content,
        "is_active": is_active
    })
}

fn user_banner_uri(feature_id: i64, tag_id: i64) -> String {
    format!("/api/v1/user_banner?feature_id={feature_id}&tag_id={tag_id}")
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header("token", t);
    }
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let resp = app
        .router
        .clone()
        .oneshot(req.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).expect("json body"))
    };
    (status, json)
}

async fn get(app: &TestApp, uri: &str, token: &str) -> Reply {
    send(app, "GET", uri, Some(token), None).await
}

async fn delete(app: &TestApp, uri: &str, token: &str) -> Reply {
    send(app, "DELETE", uri, Some(token), None).await
}

async fn post(app: &TestApp, token: &str, body: Value) -> Reply {
    send(app, "POST", BANNERS, Some(token), Some(body)).await
}

async fn patch(app: &TestApp, uri: &str, body: Value) -> Reply {
    send(app, "PATCH", uri, Some(&admin()), Some(body)).await
}

async fn create(app: &TestApp, body: Value) -> i64 {
    let (status, resp) = post(app, &admin(), body).await;
    assert_eq!(status, StatusCode::CREATED);
    resp.unwrap()["banner_id"].as_i64().unwrap()
}

async fn wait_cached(app: &TestApp, key: &str) {
    for _ in 0..100 {
        if app.cache.get(key).await.is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{key} never cached");
}

#[tokio::test]
async fn health_endpoints_are_public() {
    let app = app();
    let (status, body) = send(&app, "GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Some(json!({"status": "ok"})));

    let (status, body) = send(&app, "GET", "/readyz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["storage_ok"], true);
    assert_eq!(body["cache"], "local");
    assert_eq!(body["redis_available"], false);
}

#[tokio::test]
async fn requests_without_valid_token_are_unauthorized() {
    let app = app();
    let uri = user_banner_uri(1, 1);
    for token in [None, Some("garbage")] {
        let (status, body) = send(&app, "GET", &uri, token, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, Some(json!({"error": "invalid auth token"})));
    }
}

#[tokio::test]
async fn bearer_header_is_accepted() {
    let app = app();
    let req = Request::builder()
        .uri(BANNERS)
        .header(header::AUTHORIZATION, format!("Bearer {}", admin()))
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let app = app();
    let (status, body) = get(&app, BANNERS, &user()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, Some(json!({"error": "admin privileges required"})));

    let (status, _) = delete(&app, "/api/v1/banner/1", &user()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_and_read_banner() {
    let app = app();
    let body = banner_body(3, &[1, 2, 3], json!({"title": "x"}), true);
    let id = create(&app, body).await;
    assert!(id > 0);

    let (status, body) = get(&app, &user_banner_uri(3, 1), &user()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Some(json!({"title": "x"})));

    let clash = json!({"tag_ids": [2], "feature_id": 3, "content": {}});
    let (status, body) = post(&app, &admin(), clash).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        Some(json!({"error": "banner with such feature and tag already exists"}))
    );
}

#[tokio::test]
async fn user_banner_rejects_bad_params() {
    let app = app();
    let cases = [
        ("/api/v1/user_banner?feature_id=1", "bad tag id parameter"),
        ("/api/v1/user_banner?feature_id=1&tag_id=x", "bad tag id parameter"),
        ("/api/v1/user_banner?tag_id=1", "bad feature id parameter"),
        ("/api/v1/user_banner?feature_id=0&tag_id=1", "bad feature id parameter"),
        ("/api/v1/user_banner?feature_id=1&tag_id=-1", "bad tag id parameter"),
    ];
    for (uri, message) in cases {
        let (status, body) = get(&app, uri, &user()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body, Some(json!({"error": message})), "{uri}");
    }
}

#[tokio::test]
async fn inactive_banner_visibility() {
    let app = app();
    create(&app, banner_body(5, &[1], json!({"a": 1}), false)).await;
    let uri = user_banner_uri(5, 1);

    let (status, body) = get(&app, &uri, &user()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, None);

    let (status, body) = get(&app, &uri, &admin()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Some(json!({"a": 1})));
}

#[tokio::test]
async fn cached_not_found_until_last_revision_requested() {
    let app = app();
    let uri = user_banner_uri(8, 8);

    let (status, body) = get(&app, &uri, &user()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, Some(json!({"error": "banner not found"})));
    wait_cached(&app, "8:8").await;

    create(&app, banner_body(8, &[8], json!({"v": 2}), true)).await;

    let (status, _) = get(&app, &uri, &user()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let fresh = format!("{uri}&use_last_revision=true");
    let (status, body) = get(&app, &fresh, &user()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Some(json!({"v": 2})));
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let app = app();
    for tag in 1..=3 {
        create(&app, banner_body(11, &[tag], json!({"tag": tag}), true)).await;
    }
    create(&app, banner_body(12, &[1], json!({}), true)).await;

    let (status, body) = get(&app, "/api/v1/banner?feature_id=11", &admin()).await;
    assert_eq!(status, StatusCode::OK);
    let banners = body.unwrap();
    assert_eq!(banners.as_array().unwrap().len(), 3);
    let first = &banners[0];
    assert_eq!(first["feature_id"], 11);
    assert_eq!(first["tag_ids"], json!([1]));
    assert!(first["banner_id"].is_i64());
    assert!(first["created_at"].is_string());

    let second_page = "/api/v1/banner?feature_id=11&limit=1&offset=1";
    let (_, body) = get(&app, second_page, &admin()).await;
    let page = body.unwrap();
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["content"], json!({"tag": 2}));

    let (_, body) = get(&app, "/api/v1/banner?tag_id=1", &admin()).await;
    assert_eq!(body.unwrap().as_array().unwrap().len(), 2);

    let (status, body) = get(&app, "/api/v1/banner?limit=-1", &admin()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, Some(json!({"error": "bad limit parameter"})));
}

#[tokio::test]
async fn patch_replaces_tags_and_rejects_nulls() {
    let app = app();
    let id = create(&app, banner_body(20, &[1, 2], json!({}), true)).await;
    let uri = format!("{BANNERS}/{id}");

    let (status, body) = patch(&app, &uri, json!({"tag_ids": [7], "is_active": false})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, None);

    let (_, body) = get(&app, "/api/v1/banner?feature_id=20&tag_id=1", &admin()).await;
    assert_eq!(body, Some(json!([])));
    let (_, body) = get(&app, "/api/v1/banner?feature_id=20&tag_id=7", &admin()).await;
    let banners = body.unwrap();
    assert_eq!(banners[0]["is_active"], false);

    let (status, body) = patch(&app, &uri, json!({"content": null})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, Some(json!({"error": "bad content field"})));

    let missing = format!("{BANNERS}/999");
    let (status, body) = patch(&app, &missing, json!({"is_active": true})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, Some(json!({"error": "banner not found"})));
}

#[tokio::test]
async fn malformed_bodies_and_ids() {
    let app = app();
    let req = Request::builder()
        .method("POST")
        .uri(BANNERS)
        .header("token", admin())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"error": "read request body error"}));

    let (status, body) = delete(&app, "/api/v1/banner/abc", &admin()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, Some(json!({"error": "bad banner id parameter"})));
}

#[tokio::test]
async fn delete_frees_the_pair() {
    let app = app();
    let id = create(&app, banner_body(30, &[1], json!({}), true)).await;
    let uri = format!("{BANNERS}/{id}");

    let (status, body) = delete(&app, &uri, &admin()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, None);

    let (status, _) = delete(&app, &uri, &admin()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    create(&app, banner_body(30, &[1], json!({}), true)).await;
}

#[tokio::test]
async fn concurrent_creates_have_one_winner() {
    let app = app();
    let body = banner_body(40, &[1], json!({}), true);
    let token = admin();

    let attempts = (0..8).map(|_| post(&app, &token, body.clone()));
    let results = futures_util::future::join_all(attempts).await;

    let count = |status: StatusCode| results.iter().filter(|(s, _)| *s == status).count();
    assert_eq!(count(StatusCode::CREATED), 1);
    assert_eq!(count(StatusCode::CONFLICT), 7);
}
