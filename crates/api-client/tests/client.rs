//! End-to-end client behaviour against a mock backend

use glow_api_client::prelude::*;
use glow_api_client::{ErrorBody, RequestBody};
use glow_core::retry::RetryConfig;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn config(server: &MockServer, retry: RetryConfig) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(server.uri())
        .with_retry(retry)
}

fn signed_in(access: &str) -> Arc<MemoryTokenSource> {
    Arc::new(MemoryTokenSource::with_session(
        Session::new(access).with_refresh_token("refresh-1"),
    ))
}

fn client(server: &MockServer, tokens: Arc<MemoryTokenSource>) -> GlowClient {
    GlowClient::with_token_source(config(server, RetryConfig::no_retry()), tokens).unwrap()
}

async fn mount_refresh(server: &MockServer, response: ResponseTemplate, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(response)
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/orders"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/orders"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ok": true}})))
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"session": {"access_token": "new", "refresh_token": "refresh-2"}}))
            .set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let tokens = signed_in("old");
    let client = client(&server, tokens.clone());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get::<Value>("/orders", RequestConfig::new()).await })
        })
        .collect();

    for handle in handles {
        let envelope = handle.await.unwrap().unwrap();
        assert_eq!(envelope.data, Some(json!({"ok": true})));
    }

    assert_eq!(client.refresh_count(), 1);
    assert_eq!(tokens.get_token().as_deref(), Some("new"));
    assert_eq!(
        tokens.session().unwrap().refresh_token.as_deref(),
        Some("refresh-2")
    );
    assert_eq!(tokens.logout_count(), 0);
}

#[tokio::test]
async fn failed_refresh_expires_every_waiter_and_signs_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/cart"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(401)
            .set_body_json(json!({"detail": "Refresh token revoked"}))
            .set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let tokens = signed_in("old");
    let client = client(&server, tokens.clone());

    let results = futures::future::join_all(
        (0..5).map(|_| client.get::<Value>("/cart", RequestConfig::new())),
    )
    .await;

    for result in results {
        match result {
            Err(ApiError::AuthExpired(body)) => {
                assert_eq!(body.status, 401);
                assert_eq!(body.message, "Token expired");
            }
            other => panic!("expected AuthExpired, got {other:?}"),
        }
    }
    assert_eq!(client.refresh_count(), 1);
    assert!(tokens.logout_count() >= 1);
    assert_eq!(tokens.session(), None);
}

#[tokio::test]
async fn cancelled_trigger_leaves_refresh_running_for_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/orders"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/orders"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": 1})))
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"access_token": "new"}))
            .set_delay(Duration::from_millis(200)),
        1,
    )
    .await;

    let tokens = signed_in("old");
    let client = client(&server, tokens.clone());

    let token = CancellationToken::new();
    let trigger = {
        let client = client.clone();
        let token = token.clone();
        tokio::spawn(async move {
            client
                .get::<Value>("/orders", RequestConfig::new().with_cancellation(token))
                .await
        })
    };
    let other = {
        let client = client.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            client.get::<Value>("/orders", RequestConfig::new()).await
        })
    };

    tokio::time::sleep(Duration::from_millis(60)).await;
    token.cancel();

    let trigger = trigger.await.unwrap();
    assert!(matches!(trigger, Err(ApiError::Cancelled)));

    let envelope = other.await.unwrap().unwrap();
    assert_eq!(envelope.data, Some(json!(1)));
    assert_eq!(client.refresh_count(), 1);
    assert_eq!(tokens.get_token().as_deref(), Some("new"));
    assert_eq!(tokens.logout_count(), 0);
}

#[tokio::test]
async fn unavailable_refresh_endpoint_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/cart"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(503), 1).await;

    let tokens = signed_in("old");
    let client = GlowClient::with_token_source(
        config(&server, RetryConfig::new(3, Duration::from_millis(10))),
        tokens.clone(),
    )
    .unwrap();

    let err = client.get::<Value>("/cart", RequestConfig::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthExpired);
    assert_eq!(err.body().map(|b| b.message.as_str()), Some("Token expired"));
    assert_eq!(client.refresh_count(), 1);
    assert_eq!(tokens.logout_count(), 1);
    assert_eq!(tokens.session(), None);
}

#[tokio::test]
async fn second_unauthorized_after_refresh_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/admin/payouts"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Not allowed"})))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "new"})),
        1,
    )
    .await;

    let client = client(&server, signed_in("old"));
    let err = client
        .get::<Value>("/admin/payouts", RequestConfig::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthExpired);
    assert_eq!(err.body().map(|b| b.message.as_str()), Some("Not allowed"));
    assert_eq!(client.refresh_count(), 1);
}

#[tokio::test]
async fn unauthorized_without_refresh_token_does_not_call_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let tokens = Arc::new(MemoryTokenSource::with_session(Session::new("old")));
    let client = client(&server, tokens.clone());

    let err = client.get::<Value>("/profile", RequestConfig::new()).await.unwrap_err();
    assert_eq!(
        err.body(),
        Some(&ErrorBody {
            status: 401,
            message: "Unauthorized".into(),
            code: None,
            details: None,
        })
    );
    assert!(matches!(err, ApiError::AuthExpired(_)));
    assert_eq!(tokens.logout_count(), 1);
}

#[tokio::test]
async fn refresh_does_not_consume_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/wallet"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/wallet"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/wallet"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"balance": 1200}})))
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "new"})),
        1,
    )
    .await;

    let client = GlowClient::with_token_source(
        config(&server, RetryConfig::new(1, Duration::from_millis(10))),
        signed_in("old"),
    )
    .unwrap();

    let envelope = client.get::<Value>("/wallet", RequestConfig::new()).await.unwrap();
    assert_eq!(envelope.data, Some(json!({"balance": 1200})));
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

/// Answers 503 and remembers when each attempt arrived
struct RecordArrivals(Arc<Mutex<Vec<Instant>>>);

impl Respond for RecordArrivals {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.0.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(503).set_body_json(json!({"detail": "Service Unavailable"}))
    }
}

#[tokio::test]
async fn server_errors_back_off_exponentially() {
    let server = MockServer::start().await;
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("GET"))
        .and(path("/api/v1/products"))
        .respond_with(RecordArrivals(arrivals.clone()))
        .expect(4)
        .mount(&server)
        .await;

    let client = GlowClient::with_config(config(
        &server,
        RetryConfig::new(3, Duration::from_millis(100)),
    ))
    .unwrap();

    let err = client.get::<Value>("/products", RequestConfig::new()).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(matches!(err, ApiError::Http(_)));

    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 4);
    let gaps: Vec<Duration> = arrivals.windows(2).map(|w| w[1] - w[0]).collect();
    for (gap, expected_ms) in gaps.iter().zip([100u64, 200, 400]) {
        let expected = Duration::from_millis(expected_ms);
        assert!(
            *gap >= expected && *gap < expected * 2,
            "gap {gap:?} outside [{expected:?}, {:?})",
            expected * 2
        );
    }

    let requests = server.received_requests().await.unwrap();
    let ids: Vec<_> = requests
        .iter()
        .map(|r| r.headers.get("x-request-id").unwrap().to_str().unwrap().to_owned())
        .collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn per_call_retry_override() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let client = GlowClient::with_config(config(
        &server,
        RetryConfig::new(3, Duration::from_millis(5)),
    ))
    .unwrap();
    let err = client
        .get::<Value>("/search", RequestConfig::new().with_max_retries(1))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(429));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/products/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Product not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GlowClient::with_config(config(
        &server,
        RetryConfig::new(3, Duration::from_millis(10)),
    ))
    .unwrap();
    let err = client
        .get::<Value>("/products/missing", RequestConfig::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.body().unwrap().message, "Product not found");
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = GlowClient::with_config(config(&server, RetryConfig::no_retry())).unwrap();
    let started = Instant::now();
    let err = client
        .get::<Value>(
            "/feed",
            RequestConfig::new().with_timeout(Duration::from_millis(10)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Timeout(d) if d == Duration::from_millis(10)));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn caller_cancellation_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = GlowClient::with_config(config(
        &server,
        RetryConfig::new(3, Duration::from_millis(10)),
    ))
    .unwrap();
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let err = client
        .get::<Value>("/feed", RequestConfig::new().with_cancellation(token))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn post_returns_normalized_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/echo"))
        .and(body_json(json!({"x": 1})))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"x": 1}, "message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GlowClient::with_config(config(&server, RetryConfig::no_retry())).unwrap();
    let envelope = client
        .post::<Value, _>("/echo", &json!({"x": 1}), RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(envelope.data, Some(json!({"x": 1})));
    assert!(envelope.success);
    assert_eq!(envelope.message.as_deref(), Some("ok"));
}

#[tokio::test]
async fn typed_payload_and_pagination() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Product {
        id: u32,
        name: String,
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/products"))
        .and(query_param("category", "skincare"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 7, "name": "Rose serum"}],
            "meta": {"page": 2, "limit": 1, "total": 9, "hasMore": true}
        })))
        .mount(&server)
        .await;

    let client = GlowClient::with_config(config(&server, RetryConfig::no_retry())).unwrap();
    let params = QueryParams::new()
        .with("category", "skincare")
        .with("page", 2)
        .with_opt("brand", None::<&str>);
    let envelope = client
        .get::<Vec<Product>>("/products", RequestConfig::new().with_params(params))
        .await
        .unwrap();

    assert_eq!(
        envelope.data,
        Some(vec![Product {
            id: 7,
            name: "Rose serum".into()
        }])
    );
    assert_eq!(envelope.meta.and_then(|m| m.has_more), Some(true));
}

#[tokio::test]
async fn payload_shape_mismatch_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "not a number"})))
        .mount(&server)
        .await;

    let client = GlowClient::with_config(config(&server, RetryConfig::no_retry())).unwrap();
    let err = client.get::<u64>("/count", RequestConfig::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[tokio::test]
async fn authorization_header_follows_token_source() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let anonymous = GlowClient::with_config(config(&server, RetryConfig::no_retry())).unwrap();
    anonymous.delete::<Value>("/cart/items/1", RequestConfig::new()).await.unwrap();

    let tokens = signed_in("abc");
    let authed = client(&server, tokens);
    let envelope = authed
        .delete::<Value>(
            "/cart/items/2",
            RequestConfig::new().with_header("X-Client-Info", "checkout"),
        )
        .await
        .unwrap();
    assert_eq!(envelope.data, None);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(requests[1].headers.get("authorization").unwrap(), "Bearer abc");
    assert_eq!(requests[1].headers.get("x-client-info").unwrap(), "checkout");
}

#[tokio::test]
async fn upload_sends_multipart_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/media"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "m1"}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GlowClient::with_config(config(&server, RetryConfig::no_retry())).unwrap();
    let parts = vec![
        UploadPart::text("caption", "Before and after"),
        UploadPart::file("file", "look.jpg", vec![0xFF, 0xD8, 0xFF]).with_mime("image/jpeg"),
    ];
    let envelope = client
        .upload::<Value>("/media", parts, RequestConfig::new())
        .await
        .unwrap();
    assert_eq!(envelope.data, Some(json!({"id": "m1"})));

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    assert!(String::from_utf8_lossy(&requests[0].body).contains("Before and after"));
}

#[tokio::test]
async fn null_body_is_sent_empty() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = GlowClient::with_config(config(&server, RetryConfig::no_retry())).unwrap();
    client
        .put::<Value, _>("/orders/1/confirm", &(), RequestConfig::new())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].body.is_empty());
    assert_eq!(RequestBody::json(&()).unwrap(), RequestBody::Empty);
}
