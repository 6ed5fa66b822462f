//! Integration tests for the web backend against wiremock.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use igscrape_core::{BackendId, Credentials, ErrorKind, RequestMode, ScrapeRequest};
use igscrape_scraper::{
    AuthContext, Backend, HttpSettings, LoginFlow, SessionBackend, SessionStore,
    StaticCodeProvider, WebBackend, WebClient,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_backend(server: &MockServer, session_dir: &Path, code: &str) -> WebBackend {
    let settings = HttpSettings::for_base_url(BackendId::Web, &server.uri());
    let client = WebClient::new(&settings).expect("client construction should not fail");
    SessionBackend::new(
        client,
        AuthContext {
            credentials: Credentials {
                username: "scraper".to_owned(),
                password: "hunter2".to_owned(),
            },
            sessions: Arc::new(SessionStore::new(session_dir)),
            codes: Arc::new(StaticCodeProvider(code.to_owned())),
        },
    )
}

async fn mount_login_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "csrftoken=csrf-abc; Path=/")
                .set_body_string("<html></html>"),
        )
        .mount(server)
        .await;
}

/// Value of cookie `name` in the web session persisted under `session_dir`,
/// read back through a fresh client.
fn stored_cookie(session_dir: &Path, name: &str) -> Option<String> {
    let stored = SessionStore::new(session_dir).load(BackendId::Web, "scraper")?;
    let settings = HttpSettings::for_base_url(BackendId::Web, "http://127.0.0.1:9");
    let mut client = WebClient::new(&settings).ok()?;
    client.restore(&stored.credentials).ok()?;
    client.cookie(name)
}

fn authenticated() -> ResponseTemplate {
    authenticated_as("sess-xyz")
}

fn authenticated_as(session_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .append_header("set-cookie", format!("sessionid={session_id}; Path=/; HttpOnly"))
        .append_header("set-cookie", "ds_user_id=1001; Path=/")
        .set_body_json(serde_json::json!({
            "authenticated": true,
            "user": true,
            "userId": "1001",
            "status": "ok"
        }))
}

async fn mount_login(server: &MockServer) {
    mount_login_page(server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/web/accounts/login/ajax/"))
        .and(header("x-csrftoken", "csrf-abc"))
        .and(body_string_contains("username=scraper"))
        .respond_with(authenticated())
        .mount(server)
        .await;
}

fn node(id: &str, shortcode: &str, video: bool) -> serde_json::Value {
    let views = if video {
        serde_json::json!(12_000)
    } else {
        serde_json::Value::Null
    };
    serde_json::json!({
        "id": id,
        "shortcode": shortcode,
        "is_video": video,
        "video_view_count": views,
        "taken_at_timestamp": 1_700_000_000,
        "edge_media_to_caption": {"edges": [{"node": {"text": format!("caption {shortcode}")}}]},
        "edge_liked_by": {"count": 50},
        "edge_media_to_comment": {"count": 5}
    })
}

fn profile_payload(has_next_page: bool) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "user": {
                "id": "787132",
                "username": "natgeo",
                "full_name": "National Geographic",
                "biography": "Experience the world",
                "profile_pic_url": "https://cdn.example.com/small.jpg",
                "profile_pic_url_hd": "https://cdn.example.com/hd.jpg",
                "edge_followed_by": {"count": 283_000_000},
                "edge_follow": {"count": 160},
                "is_private": false,
                "edge_owner_to_timeline_media": {
                    "count": 3,
                    "page_info": {"has_next_page": has_next_page, "end_cursor": "page-2"},
                    "edges": [
                        {"node": node("1", "VideoOne", true)},
                        {"node": node("2", "PhotoTwo", false)}
                    ]
                }
            }
        },
        "status": "ok"
    })
}

#[tokio::test]
async fn login_then_profile_and_posts_from_same_payload() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(query_param("username", "natgeo"))
        .and(header("x-csrftoken", "csrf-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_payload(false)))
        .expect(1)
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    backend.authenticate().await.expect("login should succeed");

    let profile = backend.fetch_profile("natgeo").await.expect("profile");
    assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn.example.com/hd.jpg"));
    assert_eq!(profile.follower_count, Some(283_000_000));

    let posts = backend.fetch_posts("natgeo", 5).await.expect("posts");
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].view_count, Some(12_000));
    assert_eq!(posts[1].view_count, None);
    assert_eq!(posts[1].like_count, Some(50));
    assert_eq!(posts[0].caption.as_deref(), Some("caption VideoOne"));

    assert_eq!(stored_cookie(dir.path(), "sessionid").as_deref(), Some("sess-xyz"));
    assert_eq!(stored_cookie(dir.path(), "csrftoken").as_deref(), Some("csrf-abc"));
}

#[tokio::test]
async fn posts_paginate_through_graphql() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_payload(true)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/graphql/query/"))
        .and(query_param("query_hash", "003056d32c2554def87228bc3fd9668a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"user": {"edge_owner_to_timeline_media": {
                "page_info": {"has_next_page": true, "end_cursor": "page-3"},
                "edges": [{"node": node("3", "PhotoThree", false)}, {"node": node("4", "PhotoFour", false)}]
            }}},
            "status": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    let posts = backend.fetch_posts("natgeo", 3).await.expect("posts");
    let codes: Vec<_> = posts.iter().map(|p| p.shortcode.as_str()).collect();
    assert_eq!(codes, vec!["VideoOne", "PhotoTwo", "PhotoThree"]);
}

#[tokio::test]
async fn single_post_by_shortcode() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/graphql/query/"))
        .and(query_param("query_hash", "2b0673e0dc4580674a88d426fe00ea90"))
        .and(query_param("variables", r#"{"shortcode":"AbC123xy"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"shortcode_media": node("999", "AbC123xy", true)},
            "status": "ok"
        })))
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    let post = backend.fetch_single_post("AbC123xy").await.expect("post");
    assert_eq!(post.post_id, "999");
    assert_eq!(post.shortcode, "AbC123xy");
    assert_eq!(post.published_at.as_deref(), Some("2023-11-14T22:13:20+00:00"));
}

#[tokio::test]
async fn deleted_post_is_not_found() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/graphql/query/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"shortcode_media": null},
            "status": "ok"
        })))
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    let err = backend.fetch_single_post("Gone1234").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    let err = backend.fetch_profile("nobody_here").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn two_factor_login_posts_code_and_identifier() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/web/accounts/login/ajax/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "two_factor_required": true,
            "two_factor_info": {"two_factor_identifier": "web-tf-9"},
            "status": "fail"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/web/accounts/login/ajax/two_factor/"))
        .and(body_string_contains("verificationCode=112233"))
        .and(body_string_contains("identifier=web-tf-9"))
        .respond_with(authenticated())
        .expect(1)
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "112233");
    backend.authenticate().await.expect("2FA login should succeed");
    assert!(backend.client().is_logged_in());
}

#[tokio::test]
async fn login_without_session_cookie_fails() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/web/accounts/login/ajax/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authenticated": false,
            "user": true,
            "status": "ok"
        })))
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    let err = backend.authenticate().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(SessionStore::new(dir.path())
        .load(BackendId::Web, "scraper")
        .is_none());
}

/// Logs in against a throwaway server so `session_dir` holds a persisted
/// cookie session with `sessionid` set to `session_id`.
async fn seed_session(session_dir: &Path, session_id: &str) {
    let server = MockServer::start().await;
    mount_login_page(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/web/accounts/login/ajax/"))
        .respond_with(authenticated_as(session_id))
        .mount(&server)
        .await;
    let mut backend = test_backend(&server, session_dir, "000000");
    backend.authenticate().await.expect("seed login");
}

fn sends_cookie(expected: &'static str) -> impl Fn(&wiremock::Request) -> bool + Send + Sync {
    move |req: &wiremock::Request| {
        req.headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|cookies| cookies.split("; ").any(|c| c == expected))
    }
}

#[tokio::test]
async fn cached_cookies_are_probed_and_reused() {
    let dir = tempfile::tempdir().unwrap();
    seed_session(dir.path(), "cached").await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/current_user/"))
        .and(sends_cookie("sessionid=cached"))
        .and(header("x-csrftoken", "csrf-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "user": {"pk": "1001", "username": "scraper"},
            "status": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/web/accounts/login/ajax/"))
        .respond_with(authenticated())
        .expect(0)
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    backend.authenticate().await.expect("cached cookies restore");
    assert_eq!(backend.client().cookie("sessionid").as_deref(), Some("cached"));
}

#[tokio::test]
async fn rejected_cookies_fall_back_to_login() {
    let dir = tempfile::tempdir().unwrap();
    seed_session(dir.path(), "stale").await;

    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/current_user/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    backend.authenticate().await.expect("fresh login after stale cookies");
    assert_eq!(stored_cookie(dir.path(), "sessionid").as_deref(), Some("sess-xyz"));
}

#[tokio::test]
async fn expired_session_cookie_logs_the_client_out() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "sessionid=deleted; Path=/; Max-Age=0")
                .set_body_json(profile_payload(false)),
        )
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    backend.authenticate().await.expect("login should succeed");
    assert!(backend.client().is_logged_in());

    backend.fetch_profile("natgeo").await.expect("profile");
    assert!(!backend.client().is_logged_in());
    assert_eq!(backend.client().cookie("sessionid"), None);
    assert_eq!(backend.client().cookie("csrftoken").as_deref(), Some("csrf-abc"));
}

#[tokio::test]
async fn login_setting_an_expired_session_cookie_fails() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/web/accounts/login/ajax/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header(
                    "set-cookie",
                    "sessionid=sess-old; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
                )
                .set_body_json(serde_json::json!({"authenticated": true, "status": "ok"})),
        )
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    let err = backend.authenticate().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn private_profile_is_not_found_for_profile_and_posts() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    let mut private = profile_payload(false);
    private["data"]["user"]["username"] = serde_json::json!("secret");
    private["data"]["user"]["is_private"] = serde_json::json!(true);
    private["data"]["user"]["edge_owner_to_timeline_media"]["edges"] = serde_json::json!([]);
    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(query_param("username", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(private))
        .expect(2)
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    let err = backend.fetch_profile("secret").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("private account"));

    let err = backend.fetch_posts("secret", 5).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn only_the_latest_profile_timeline_is_reused() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(query_param("username", "natgeo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_payload(false)))
        .expect(2)
        .mount(&server)
        .await;

    let mut nasa = profile_payload(false);
    nasa["data"]["user"]["id"] = serde_json::json!("528817");
    nasa["data"]["user"]["username"] = serde_json::json!("nasa");
    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(query_param("username", "nasa"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nasa))
        .expect(1)
        .mount(&server)
        .await;

    let mut backend = test_backend(&server, dir.path(), "000000");
    backend.fetch_profile("natgeo").await.expect("natgeo profile");
    backend.fetch_profile("nasa").await.expect("nasa profile");

    // The natgeo timeline was replaced by nasa's, so it is fetched again.
    let posts = backend.fetch_posts("natgeo", 5).await.expect("natgeo posts");
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].shortcode, "VideoOne");
}

#[test]
fn numeric_ids_are_not_supported() {
    let dir = tempfile::tempdir().unwrap();
    let settings = HttpSettings::for_base_url(BackendId::Web, "http://127.0.0.1:9");
    let backend = SessionBackend::new(
        WebClient::new(&settings).unwrap(),
        AuthContext {
            credentials: Credentials {
                username: "scraper".to_owned(),
                password: "hunter2".to_owned(),
            },
            sessions: Arc::new(SessionStore::new(dir.path())),
            codes: Arc::new(StaticCodeProvider(String::new())),
        },
    );
    let request = ScrapeRequest {
        target: "787132".to_owned(),
        mode: RequestMode::ProfileWithPosts,
        post_limit: 5,
        permalink: None,
        origin_metadata: BTreeMap::new(),
    };
    assert!(!backend.supports(&request));
}
