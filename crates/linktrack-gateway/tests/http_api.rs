use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use jiff::Timestamp;
use linktrack_core::repository::Result as StorageResult;
use linktrack_core::{
    ClickEvent, ClickRepository, DeviceCount, LinkFilter, LinkStats, LinkSummary, LinkUpdate,
    NewClick, NewLink, Overview, ReadRepository, Repository, ShortCode, ShortLink, StorageError,
    TimeBucket, TimeseriesPoint,
};
use linktrack_gateway::{App, AppState, StateOptions};
use linktrack_generator::{Generator, GeneratorSettings, RandomGenerator};
use linktrack_storage::InMemoryRepository;
use serde_json::{json, Value};
use tower::ServiceExt;

const BASE_URL: &str = "https://sho.rt";

fn options(trust_proxy_headers: bool) -> StateOptions {
    StateOptions::builder()
        .base_url(BASE_URL)
        .trust_proxy_headers(trust_proxy_headers)
        .build()
}

fn generator() -> RandomGenerator {
    RandomGenerator::new(GeneratorSettings::builder().seed(7).build()).unwrap()
}

fn app() -> Router {
    app_with(Arc::new(InMemoryRepository::new()))
}

fn app_with<R: Repository + ClickRepository>(repository: Arc<R>) -> Router {
    App::router(AppState::new(repository, generator(), options(true)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn visit(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", ip)
        .header(header::USER_AGENT, "integration-test")
        .body(Body::empty())
        .unwrap()
}

async fn create(app: &Router, body: Value) -> Value {
    let (status, _, body) = send(app, json_request(Method::POST, "/links", body)).await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {body}");
    body
}

#[tokio::test]
async fn health() {
    let (status, _, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn create_then_redirect() {
    let app = app();
    let target = "https://example.com/some/long/path?x=1&y=two#frag";
    let link = create(&app, json!({ "target_url": target, "label": "docs" })).await;

    let code = link["code"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert_eq!(link["short_url"], format!("{BASE_URL}/{code}"));
    assert_eq!(link["qr_url"], format!("{BASE_URL}/qr/{code}"));
    assert_eq!(link["target_url"], target);
    assert_eq!(link["label"], "docs");
    assert_eq!(link["active"], true);

    let (status, headers, _) = send(&app, get(&format!("/{code}"))).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], target);
}

#[tokio::test]
async fn legacy_field_names_are_accepted() {
    let app = app();
    let link = create(&app, json!({ "url": "https://example.com", "custom_name": "home" })).await;
    assert_eq!(link["label"], "home");
}

#[tokio::test]
async fn invalid_url_is_rejected() {
    let app = app();
    for target in [
        "not a url",
        "ftp://example.com/file",
        "",
        "https://example.com/a\u{7f}b",
        "https://example.com/\r\nSet-Cookie: a=b",
    ] {
        let (status, _, body) = send(
            &app,
            json_request(Method::POST, "/links", json!({ "target_url": target })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{target:?}");
        assert_eq!(body["error"], "invalid_url");
    }
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/links")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn custom_code_conflicts() {
    let app = app();
    let link = create(
        &app,
        json!({ "target_url": "https://example.com", "custom_code": "launch" }),
    )
    .await;
    assert_eq!(link["code"], "launch");

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/links",
            json!({ "target_url": "https://other.example", "custom_code": "launch" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "code_taken");
}

#[tokio::test]
async fn custom_code_cannot_shadow_a_route() {
    let app = app();
    for reserved in ["health", "bulk", "Bulk"] {
        let (status, _, body) = send(
            &app,
            json_request(
                Method::POST,
                "/links",
                json!({ "target_url": "https://example.com", "custom_code": reserved }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{reserved} was accepted");
        assert_eq!(body["error"], "invalid_short_code");
    }
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let app = app();
    let (status, _, body) = send(&app, get("/nope123")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    // not a well-formed code at all
    let (status, _, _) = send(&app, get("/a!")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, get("/links/nope123")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deactivated_link_is_gone() {
    let app = app();
    let link = create(&app, json!({ "target_url": "https://example.com" })).await;
    let code = link["code"].as_str().unwrap();

    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/links/{code}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    let (status, _, body) = send(&app, visit(&format!("/{code}"), "203.0.113.1")).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "gone");

    let (_, _, stats) = send(&app, get(&format!("/links/{code}/stats"))).await;
    assert_eq!(stats["total_clicks"], 0);

    // the link can be brought back
    let (status, _, _) = send(
        &app,
        json_request(Method::PATCH, &format!("/links/{code}"), json!({ "active": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, get(&format!("/{code}"))).await;
    assert_eq!(status, StatusCode::FOUND);
}

#[tokio::test]
async fn clicks_are_counted_per_visitor() {
    let app = app();
    let link = create(&app, json!({ "target_url": "https://example.com" })).await;
    let code = link["code"].as_str().unwrap();

    for ip in ["203.0.113.1", "203.0.113.2", "203.0.113.1", "198.51.100.9"] {
        let (status, _, _) = send(&app, visit(&format!("/{code}"), ip)).await;
        assert_eq!(status, StatusCode::FOUND);
    }
    let (status, _, _) = send(&app, visit(&format!("/qr/{code}"), "198.51.100.9")).await;
    assert_eq!(status, StatusCode::FOUND);

    let (status, _, stats) = send(&app, get(&format!("/links/{code}/stats"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["link"]["code"], code);
    assert_eq!(stats["total_clicks"], 5);
    assert_eq!(stats["unique_visitors"], 3);
    assert_eq!(stats["qr_clicks"], 1);

    let (status, _, clicks) = send(&app, get(&format!("/links/{code}/clicks?limit=2"))).await;
    assert_eq!(status, StatusCode::OK);
    let clicks = clicks.as_array().unwrap();
    assert_eq!(clicks.len(), 2);
    assert_eq!(clicks[0]["source"], "qr");
    assert_eq!(clicks[0]["user_agent"], "integration-test");

    assert_eq!(stats["devices"], json!([{ "device": "desktop", "clicks": 5 }]));
    let daily = stats["daily"].as_array().unwrap();
    let daily_clicks: i64 = daily.iter().map(|p| p["clicks"].as_i64().unwrap()).sum();
    assert_eq!(daily_clicks, 5);
}

#[tokio::test]
async fn timeseries_by_period() {
    let app = app();
    let link = create(&app, json!({ "target_url": "https://example.com" })).await;
    let code = link["code"].as_str().unwrap();

    let phone = Request::builder()
        .uri(format!("/{code}"))
        .header("x-forwarded-for", "203.0.113.1")
        .header(header::USER_AGENT, "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile")
        .body(Body::empty())
        .unwrap();
    send(&app, phone).await;
    send(&app, visit(&format!("/{code}"), "203.0.113.2")).await;

    let (status, _, body) = send(&app, get(&format!("/links/{code}/timeseries"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], code);
    assert_eq!(body["period"], "7d");
    assert_eq!(body["bucket"], "day");
    let clicks: i64 = body["points"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["clicks"].as_i64().unwrap())
        .sum();
    assert_eq!(clicks, 2);

    let (status, _, body) =
        send(&app, get(&format!("/links/{code}/timeseries?period=24h"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["period"], "24h");
    assert_eq!(body["bucket"], "hour");

    let (status, _, body) =
        send(&app, get(&format!("/links/{code}/timeseries?period=bogus"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _, _) = send(&app, get("/links/zzzzzz/timeseries?period=30d")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, stats) = send(&app, get(&format!("/links/{code}/stats"))).await;
    assert_eq!(
        stats["devices"],
        json!([
            { "device": "desktop", "clicks": 1 },
            { "device": "mobile", "clicks": 1 },
        ])
    );
}

#[tokio::test]
async fn referrer_and_query_drive_the_source() {
    let app = app();
    let link = create(&app, json!({ "target_url": "https://example.com" })).await;
    let code = link["code"].as_str().unwrap();

    let request = Request::builder()
        .uri(format!("/{code}"))
        .header(header::REFERER, "https://t.co/xyz")
        .body(Body::empty())
        .unwrap();
    send(&app, request).await;
    send(&app, get(&format!("/{code}?utm_source=newsletter"))).await;
    send(&app, get(&format!("/{code}"))).await;

    let (_, _, stats) = send(&app, get(&format!("/links/{code}/stats"))).await;
    let mut sources: Vec<String> = stats["sources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["source"].as_str().unwrap().to_string())
        .collect();
    sources.sort();
    assert_eq!(sources, ["direct", "newsletter", "twitter"]);
    assert_eq!(stats["top_referrers"][0]["referrer"], "https://t.co/xyz");
}

#[tokio::test]
async fn bulk_create() {
    let app = app();
    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/links/bulk",
            json!({ "urls": [
                { "url": "https://one.example" },
                { "url": "nope" },
                { "url": "https://two.example", "custom_name": "second" },
            ] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["success_count"], 2);
    assert_eq!(body["failed_count"], 1);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["success"], false);
    assert!(results[1]["error"].as_str().unwrap().contains("invalid url"));
    assert_eq!(results[2]["label"], "second");

    let code = results[2]["code"].as_str().unwrap();
    let (status, headers, _) = send(&app, get(&format!("/{code}"))).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], "https://two.example");
}

#[tokio::test]
async fn bulk_batch_size_is_bounded() {
    let app = app();
    let (status, _, _) = send(
        &app,
        json_request(Method::POST, "/links/bulk", json!({ "urls": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let urls: Vec<Value> = (0..501)
        .map(|i| json!({ "url": format!("https://example.com/{i}") }))
        .collect();
    let (status, _, _) = send(
        &app,
        json_request(Method::POST, "/links/bulk", json!({ "urls": urls })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_by_campaign_and_state() {
    let app = app();
    let first = create(
        &app,
        json!({ "target_url": "https://a.example", "campaign": "spring" }),
    )
    .await;
    create(&app, json!({ "target_url": "https://b.example", "campaign": "fall" })).await;
    let third = create(
        &app,
        json!({ "target_url": "https://c.example", "campaign": "spring" }),
    )
    .await;

    let (status, _, body) = send(&app, get("/links?campaign=spring")).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["code"].as_str().unwrap())
        .collect();
    assert_eq!(
        codes,
        [third["code"].as_str().unwrap(), first["code"].as_str().unwrap()]
    );
    assert_eq!(body[0]["total_clicks"], 0);

    let code = first["code"].as_str().unwrap();
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/links/{code}"))
        .body(Body::empty())
        .unwrap();
    send(&app, request).await;

    let (_, _, body) = send(&app, get("/links?active=false")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, _, body) = send(&app, get("/links?limit=1&offset=1")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _, _) = send(&app, get("/links?limit=lots")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_edits_metadata() {
    let app = app();
    let link = create(
        &app,
        json!({ "target_url": "https://example.com", "label": "old", "campaign": "spring" }),
    )
    .await;
    let uri = format!("/links/{}", link["code"].as_str().unwrap());

    let (status, _, body) = send(
        &app,
        json_request(Method::PATCH, &uri, json!({ "label": "new", "campaign": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "new");
    assert_eq!(body["campaign"], Value::Null);
    assert_eq!(body["target_url"], "https://example.com");

    let (status, _, body) = send(
        &app,
        json_request(Method::PATCH, &uri, json!({ "label": "x".repeat(51) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let (status, _, _) = send(
        &app,
        json_request(Method::PATCH, "/links/missing1", json!({ "label": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overview_reports_totals() {
    let app = app();
    let link = create(&app, json!({ "target_url": "https://example.com" })).await;
    create(&app, json!({ "target_url": "https://other.example" })).await;
    let code = link["code"].as_str().unwrap();
    send(&app, visit(&format!("/{code}"), "203.0.113.1")).await;
    send(&app, visit(&format!("/{code}"), "203.0.113.2")).await;

    let (status, _, body) = send(&app, get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_links"], 2);
    assert_eq!(body["active_links"], 2);
    assert_eq!(body["total_clicks"], 2);
    assert_eq!(body["unique_visitors"], 2);
    assert_eq!(body["clicks_today"], 2);
    assert_eq!(body["links_created_today"], 2);
    assert_eq!(body["top_links"][0]["code"], code);
}

/// Always proposes the same code.
struct FixedGenerator;

impl Generator for FixedGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        ShortCode::new_unchecked("same01")
    }
}

#[tokio::test]
async fn exhausted_allocation_is_a_server_error() {
    let state = AppState::new(
        Arc::new(InMemoryRepository::new()),
        FixedGenerator,
        options(false),
    );
    let app = App::router(state);

    create(&app, json!({ "target_url": "https://example.com" })).await;
    let (status, _, body) = send(
        &app,
        json_request(Method::POST, "/links", json!({ "target_url": "https://example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal");
    assert_eq!(body["message"], "internal server error");
}

/// Serves links normally but cannot store clicks.
struct BrokenClickLog {
    inner: InMemoryRepository,
}

#[async_trait]
impl ReadRepository for BrokenClickLog {
    async fn resolve(&self, code: &ShortCode) -> StorageResult<Option<ShortLink>> {
        self.inner.resolve(code).await
    }

    async fn exists(&self, code: &ShortCode) -> StorageResult<bool> {
        self.inner.exists(code).await
    }
}

#[async_trait]
impl Repository for BrokenClickLog {
    async fn create(&self, link: NewLink) -> StorageResult<ShortLink> {
        self.inner.create(link).await
    }

    async fn set_active(&self, code: &ShortCode, active: bool) -> StorageResult<Option<ShortLink>> {
        self.inner.set_active(code, active).await
    }

    async fn update(&self, code: &ShortCode, update: LinkUpdate) -> StorageResult<Option<ShortLink>> {
        self.inner.update(code, update).await
    }

    async fn list(&self, filter: &LinkFilter) -> StorageResult<Vec<LinkSummary>> {
        self.inner.list(filter).await
    }
}

#[async_trait]
impl ClickRepository for BrokenClickLog {
    async fn record_click(&self, _click: NewClick) -> StorageResult<ClickEvent> {
        Err(StorageError::Unavailable("click log offline".to_string()))
    }

    async fn link_stats(&self, link_id: i64) -> StorageResult<LinkStats> {
        self.inner.link_stats(link_id).await
    }

    async fn recent_clicks(&self, link_id: i64, limit: u32) -> StorageResult<Vec<ClickEvent>> {
        self.inner.recent_clicks(link_id, limit).await
    }

    async fn timeseries(
        &self,
        link_id: i64,
        since: Timestamp,
        bucket: TimeBucket,
    ) -> StorageResult<Vec<TimeseriesPoint>> {
        self.inner.timeseries(link_id, since, bucket).await
    }

    async fn device_breakdown(&self, link_id: i64) -> StorageResult<Vec<DeviceCount>> {
        self.inner.device_breakdown(link_id).await
    }

    async fn overview(&self, since: Timestamp) -> StorageResult<Overview> {
        self.inner.overview(since).await
    }
}

#[tokio::test]
async fn redirect_survives_click_log_failure() {
    let app = app_with(Arc::new(BrokenClickLog {
        inner: InMemoryRepository::new(),
    }));
    let link = create(&app, json!({ "target_url": "https://example.com" })).await;
    let code = link["code"].as_str().unwrap();

    let (status, headers, _) = send(&app, visit(&format!("/{code}"), "203.0.113.1")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], "https://example.com");
}
