//! Caching behavior of the dispatch pipeline, against a wiremock origin.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use restbox::{ClientConfig, Concurrent, MockRouter, RestClient};
use restbox_moka::MokaStore;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u32,
    name: String,
}

fn cached_client(server: &MockServer) -> RestClient {
    RestClient::builder(ClientConfig::new("cache-test", server.uri()).with_cache(true))
        .store(MokaStore::builder().max_cost(16 * 1024 * 1024).build())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_max_age_hit_then_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("cache-control", "max-age=2")
                .set_body_json(json!([{"id": 1, "name": "Alice"}])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = cached_client(&server);

    let first = client.get("/user").send().await.unwrap();
    assert_eq!(first.status_code(), 200);
    assert!(!first.cache_hit());

    let second = client.get("/user").send().await.unwrap();
    assert!(second.cache_hit());
    assert_eq!(second.bytes(), first.bytes());
    let users: Vec<User> = second.deserialize().unwrap();
    assert_eq!(users, vec![User { id: 1, name: "Alice".into() }]);

    tokio::time::sleep(Duration::from_millis(2100)).await;

    let third = client.get("/user").send().await.unwrap();
    assert!(!third.cache_hit(), "expired entry must trigger a network call");
    assert_eq!(third.status_code(), 200);
}

#[tokio::test]
async fn test_etag_revalidation_not_modified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("if-none-match", "\"1234\""))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"1234\"")
                .set_body_json(json!([{"id": 1, "name": "Alice"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = cached_client(&server);

    let first = client.get("/user").send().await.unwrap();
    assert!(!first.cache_hit());
    assert_eq!(first.etag(), Some("\"1234\""));

    let second = client.get("/user").send().await.unwrap();
    assert_eq!(second.status_code(), 200, "cached status replaces the 304");
    assert!(second.cache_hit());
    assert_eq!(second.bytes(), first.bytes());
}

#[tokio::test]
async fn test_etag_revalidation_fresh_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "W/\"v1\"")
                .set_body_string("version one"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = cached_client(&server);
    client.get("/doc").send().await.unwrap();
    let second = client.get("/doc").send().await.unwrap();

    // The origin ignored the validator and sent a full 200.
    assert!(!second.cache_hit());
    assert_eq!(second.text(), "version one");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("if-none-match").is_none());
    assert_eq!(requests[1].headers.get("if-none-match").unwrap(), "W/\"v1\"");
}

#[tokio::test]
async fn test_last_modified_revalidation() {
    let last_modified = "Tue, 15 Nov 1994 12:45:26 GMT";
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .and(move |request: &Request| {
            // HTTP dates contain a comma, so compare the raw value.
            request
                .headers
                .get("if-modified-since")
                .is_some_and(|value| value == last_modified)
        })
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("last-modified", last_modified)
                .set_body_string("quarterly numbers"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = cached_client(&server);
    let first = client.get("/report").send().await.unwrap();
    assert!(first.last_modified().is_some());

    let second = client.get("/report").send().await.unwrap();
    assert!(second.cache_hit());
    assert_eq!(second.text(), "quarterly numbers");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[1].headers.get("if-none-match").is_none());
}

#[tokio::test]
async fn test_post_never_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "Maria"})))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("cache-control", "max-age=60")
                .insert_header("etag", "\"m1\"")
                .set_body_json(json!({"id": 2, "name": "Maria"})),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = cached_client(&server);
    for _ in 0..2 {
        let created = client
            .post("/user")
            .body(&json!({"name": "Maria"}))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status_code(), 201);
        assert!(!created.cache_hit());
    }

    let listed = client.get("/user").send().await.unwrap();
    assert!(!listed.cache_hit(), "POST responses must not populate the cache");
}

#[tokio::test]
async fn test_writes_after_cached_get_reach_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("cache-control", "max-age=60")
                .set_body_string("balance"),
        )
        .expect(1)
        .mount(&server)
        .await;
    for verb in ["POST", "PUT", "DELETE"] {
        Mock::given(method(verb))
            .and(path("/account"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = cached_client(&server);
    client.get("/account").send().await.unwrap();
    assert!(client.get("/account").send().await.unwrap().cache_hit());

    for request in [
        client.post("/account").raw_body("deposit"),
        client.put("/account").raw_body("update"),
        client.delete("/account"),
    ] {
        let response = request.send().await.unwrap();
        assert_eq!(response.status_code(), 204);
        assert!(!response.cache_hit());
    }

    let cached = client.get("/account").send().await.unwrap();
    assert!(cached.cache_hit());
    assert_eq!(cached.text(), "balance");
}

#[tokio::test]
async fn test_head_and_options_are_admitted() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/probe-head"))
        .respond_with(ResponseTemplate::new(200).insert_header("cache-control", "max-age=60"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("OPTIONS"))
        .and(path("/allowed"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("allow", "GET, HEAD")
                .insert_header("etag", "\"opts\""),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("OPTIONS"))
        .and(path("/allowed"))
        .and(header("if-none-match", "\"opts\""))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    let client = cached_client(&server);
    assert!(!client.head("/probe-head").send().await.unwrap().cache_hit());
    assert!(client.head("/probe-head").send().await.unwrap().cache_hit());

    assert!(!client.options("/allowed").send().await.unwrap().cache_hit());
    let revalidated = client.options("/allowed").send().await.unwrap();
    assert!(revalidated.cache_hit());
    assert_eq!(revalidated.status_code(), 204);
    assert_eq!(revalidated.headers().get("allow").unwrap(), "GET, HEAD");
}

#[tokio::test]
async fn test_response_without_signals_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string("no headers"))
        .expect(2)
        .mount(&server)
        .await;

    let client = cached_client(&server);
    client.get("/plain").send().await.unwrap();
    let second = client.get("/plain").send().await.unwrap();
    assert!(!second.cache_hit());
}

#[tokio::test]
async fn test_disabled_cache_skips_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(200).insert_header("cache-control", "max-age=60"))
        .expect(3)
        .mount(&server)
        .await;

    let client = cached_client(&server);
    client.get("/item").send().await.unwrap();
    assert!(client.get("/item").send().await.unwrap().cache_hit());

    client.set_caching(false);
    assert!(!client.get("/item").send().await.unwrap().cache_hit());
    assert!(!client.get("/item").send().await.unwrap().cache_hit());
}

#[tokio::test]
async fn test_error_status_is_cached_like_any_other() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("cache-control", "max-age=30")
                .set_body_raw(
                    r#"{"title":"Not Found","status":404}"#,
                    "application/problem+json",
                ),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = cached_client(&server);
    let first = client.get("/missing").send().await.unwrap();
    assert!(first.error().is_none());
    assert!(!first.is_ok());
    assert_eq!(first.problem().unwrap().title.as_deref(), Some("Not Found"));

    let second = client.get("/missing").send().await.unwrap();
    assert!(second.cache_hit());
    assert_eq!(second.status_code(), 404);
    assert_eq!(second.problem().unwrap().status, Some(404));
}

struct Numbered(AtomicUsize);

impl Respond for Numbered {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        let n = self.0.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(200)
            .insert_header("cache-control", "max-age=60")
            .set_body_string(format!("response-{n}"))
            .set_delay(Duration::from_millis(200))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_first_writer_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/race"))
        .respond_with(Numbered(AtomicUsize::new(0)))
        .expect(8)
        .mount(&server)
        .await;

    let client = cached_client(&server);
    let mut group = Concurrent::new();
    for _ in 0..8 {
        group.spawn(client.get("/race"));
    }
    let bodies: Vec<String> = group
        .join()
        .await
        .into_iter()
        .map(|result| {
            let response = result.unwrap();
            assert_eq!(response.status_code(), 200);
            assert!(!response.cache_hit());
            response.text()
        })
        .collect();

    let mut distinct = bodies.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 8, "every caller gets its own response");

    let cached = client.get("/race").send().await.unwrap();
    assert!(cached.cache_hit());
    assert!(bodies.contains(&cached.text()));
    let again = client.get("/race").send().await.unwrap();
    assert_eq!(again.text(), cached.text(), "the stored entry is never replaced");
}

#[tokio::test]
async fn test_cache_key_is_url_before_mock_substitution() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("x-original-url", "https://api.example.com/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("cache-control", "max-age=60")
                .set_body_string("from mock"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = std::sync::Arc::new(MokaStore::builder().build());
    let mocked = RestClient::builder(
        ClientConfig::new("mocked", "https://api.example.com").with_cache(true),
    )
    .store(store.clone())
    .mock(MockRouter::to(&server.uri()).unwrap())
    .build()
    .unwrap();
    let first = mocked.get("/user").send().await.unwrap();
    assert_eq!(first.text(), "from mock");

    // A client without routing would hit the real host; the shared entry is
    // keyed on that host, so it is served from cache instead.
    let direct = RestClient::builder(
        ClientConfig::new("direct", "https://api.example.com").with_cache(true),
    )
    .store(store)
    .build()
    .unwrap();
    let second = direct.get("/user").send().await.unwrap();
    assert!(second.cache_hit());
    assert_eq!(second.text(), "from mock");
}
