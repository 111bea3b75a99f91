// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use super::*;
use crate::test_support::{drain_notices, FakeUpstream, TestDaemon};
use yare::parameterized;

fn swr() -> Vec<String> {
    vec!["/api/listings".to_string(), "/api/categories".to_string()]
}

#[parameterized(
    static_dir = { "/static/app.js", Strategy::CacheFirst(Partition::Static) },
    assets_dir = { "/assets/logo", Strategy::CacheFirst(Partition::Static) },
    stylesheet = { "/theme.css", Strategy::CacheFirst(Partition::Static) },
    font = { "/fonts/inter.WOFF2", Strategy::CacheFirst(Partition::Static) },
    media_dir = { "/media/42", Strategy::CacheFirst(Partition::Media) },
    image = { "/listings/1/photo.jpg?w=200", Strategy::CacheFirst(Partition::Media) },
    listings = { "/api/listings?page=2", Strategy::StaleWhileRevalidate },
    category = { "/api/categories/7", Strategy::StaleWhileRevalidate },
    absolute = { "http://shop.test/api/listings", Strategy::StaleWhileRevalidate },
    offers = { "/api/offers", Strategy::NetworkFirst },
    dotted_dir = { "/api/v1.2/me", Strategy::NetworkFirst },
)]
fn classifies_requests(url: &str, expected: Strategy) {
    assert_eq!(classify(&HttpRequest::get(url), &swr()), expected);
}

#[test]
fn placeholder_is_an_svg_image() {
    let response = placeholder_image();
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type.as_deref(), Some("image/svg+xml"));
    assert!(response.text().starts_with("<svg"));
}

fn fetched(response: DaemonResponse) -> HttpResponse {
    match response {
        DaemonResponse::Fetched { response } => response,
        other => panic!("expected Fetched, got {:?}", other),
    }
}

async fn get(daemon: &TestDaemon, url: &str) -> Result<HttpResponse> {
    Ok(fetched(daemon.state.router().handle(HttpRequest::get(url)).await?))
}

#[tokio::test]
async fn cache_first_hits_network_once() {
    let daemon = TestDaemon::new(FakeUpstream::online());
    daemon.upstream.respond_json("/static/app.js", "v1");

    assert_eq!(get(&daemon, "/static/app.js").await.unwrap().text(), "v1");
    daemon.upstream.respond_json("/static/app.js", "v2");
    assert_eq!(get(&daemon, "/static/app.js").await.unwrap().text(), "v1");
    assert_eq!(daemon.upstream.fetch_count("/static/app.js"), 1);
}

#[tokio::test]
async fn cache_first_does_not_store_errors() {
    let daemon = TestDaemon::new(FakeUpstream::online());

    assert_eq!(get(&daemon, "/static/missing.js").await.unwrap().status, 404);
    assert_eq!(get(&daemon, "/static/missing.js").await.unwrap().status, 404);
    assert_eq!(daemon.upstream.fetch_count("/static/missing.js"), 2);
}

#[tokio::test]
async fn unreachable_image_gets_placeholder() {
    let daemon = TestDaemon::new(FakeUpstream::offline());

    let response = get(&daemon, "/media/listing-1.png").await.unwrap();
    assert_eq!(response, placeholder_image());
}

#[tokio::test]
async fn unreachable_script_is_an_error() {
    let daemon = TestDaemon::new(FakeUpstream::offline());

    let err = get(&daemon, "/static/app.js").await.unwrap_err();
    assert!(err.to_string().starts_with("request failed"), "got: {err}");
}

#[tokio::test]
async fn stale_while_revalidate_serves_cache_then_refreshes() {
    let daemon = TestDaemon::new(FakeUpstream::online());
    daemon.upstream.respond_json("/api/listings", "[1]");
    assert_eq!(get(&daemon, "/api/listings").await.unwrap().text(), "[1]");

    daemon.upstream.respond_json("/api/listings", "[2]");
    assert_eq!(get(&daemon, "/api/listings").await.unwrap().text(), "[1]");

    let mut latest = String::new();
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        latest = get(&daemon, "/api/listings").await.unwrap().text();
        if latest == "[2]" {
            break;
        }
    }
    assert_eq!(latest, "[2]");
}

#[tokio::test]
async fn stale_while_revalidate_serves_cache_offline() {
    let daemon = TestDaemon::new(FakeUpstream::online());
    daemon.upstream.respond_json("/api/categories", r#"["bikes"]"#);
    get(&daemon, "/api/categories").await.unwrap();

    daemon.upstream.set_online(false);
    assert_eq!(
        get(&daemon, "/api/categories").await.unwrap().text(),
        r#"["bikes"]"#
    );
}

#[tokio::test]
async fn stale_while_revalidate_without_cache_needs_network() {
    let daemon = TestDaemon::new(FakeUpstream::offline());
    assert!(get(&daemon, "/api/listings").await.is_err());
}

#[tokio::test]
async fn network_first_prefers_fresh_response() {
    let daemon = TestDaemon::new(FakeUpstream::online());
    daemon.upstream.respond_json("/api/me", r#"{"name":"a"}"#);
    get(&daemon, "/api/me").await.unwrap();

    daemon.upstream.respond_json("/api/me", r#"{"name":"b"}"#);
    assert_eq!(get(&daemon, "/api/me").await.unwrap().text(), r#"{"name":"b"}"#);
}

#[tokio::test]
async fn network_first_falls_back_to_cache() {
    let daemon = TestDaemon::new(FakeUpstream::online());
    daemon.upstream.respond_json("/api/me", r#"{"name":"a"}"#);
    get(&daemon, "/api/me").await.unwrap();

    daemon.upstream.set_online(false);
    assert_eq!(get(&daemon, "/api/me").await.unwrap().text(), r#"{"name":"a"}"#);
    assert!(get(&daemon, "/api/other").await.is_err());
}

#[tokio::test]
async fn offline_mutation_is_queued_and_announced() {
    let daemon = TestDaemon::new(FakeUpstream::offline());
    let mut notices = daemon.state.subscribe();

    let request = HttpRequest::new("POST", "/api/offers").with_json_body(r#"{"amount":40}"#);
    let response = daemon.state.router().handle(request).await.unwrap();

    let id = match response {
        DaemonResponse::Queued { id } => id,
        other => panic!("expected Queued, got {:?}", other),
    };
    let item = daemon.state.queue().get(&id).unwrap().unwrap();
    assert_eq!(item.kind, "http.post");
    assert_eq!(item.payload["url"], "/api/offers");
    assert_eq!(item.payload["body"]["amount"], 40);
    assert_eq!(drain_notices(&mut notices), vec![Notice::SyncQueued { id }]);
}

#[tokio::test]
async fn online_mutation_passes_through() {
    let daemon = TestDaemon::new(FakeUpstream::online());

    let request = HttpRequest::new("DELETE", "/api/offers/9");
    let response = fetched(daemon.state.router().handle(request).await.unwrap());
    assert_eq!(response.status, 201);
    assert_eq!(daemon.state.queue().stats().unwrap().total, 0);
}

#[tokio::test]
async fn prefetch_stores_into_api_partition() {
    let daemon = TestDaemon::new(FakeUpstream::online());
    daemon.upstream.respond_json("/api/categories", "[]");

    let response = daemon
        .state
        .router()
        .prefetch(&HttpRequest::get("/api/categories"))
        .await
        .unwrap();
    assert!(response.is_success());

    daemon.upstream.set_online(false);
    assert_eq!(get(&daemon, "/api/categories").await.unwrap().text(), "[]");
}
