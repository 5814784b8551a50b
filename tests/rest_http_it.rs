#![cfg(feature = "reqwest")]

// std
use std::time::{Duration, Instant};
// crates.io
use httpmock::prelude::*;
// self
use serial_rest::{
	NO_BODY, Rest,
	error::{Error, TransportError},
	http::ReqwestTransport,
	http_types::StatusCode,
};

fn client(server: &MockServer) -> Rest {
	Rest::builder().base_url(server.base_url()).build().expect("Client should build.")
}

#[tokio::test]
async fn verbs_reach_their_endpoints() {
	let server = MockServer::start_async().await;
	let get = server
		.mock_async(|when, then| {
			when.method(GET).path("/items/1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":1,\"name\":\"sheet\"}");
		})
		.await;
	let post = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/items")
				.header("content-type", "application/json")
				.body("{\"name\":\"new\"}");
			then.status(201).header("content-type", "application/json").body("{\"id\":2}");
		})
		.await;
	let put = server
		.mock_async(|when, then| {
			when.method(PUT).path("/items/2").body("{\"name\":\"renamed\"}");
			then.status(200).header("content-type", "application/json").body("{\"id\":2}");
		})
		.await;
	let delete = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/items/2");
			then.status(204);
		})
		.await;
	let rest = client(&server);
	let fetched = rest.get("items/1", false).await.expect("GET should succeed.");

	assert!(fetched.ok);
	assert_eq!(fetched.status, StatusCode::OK);
	assert_eq!(fetched.data, Some(serde_json::json!({ "id": 1, "name": "sheet" })));
	assert!(!fetched.redirected);

	let created = rest
		.post("/items", Some(&serde_json::json!({ "name": "new" })), false)
		.await
		.expect("POST should succeed.");

	assert_eq!(created.status, StatusCode::CREATED);
	assert_eq!(created.status_text, "Created");

	rest.put("items/2", Some(&serde_json::json!({ "name": "renamed" })), false)
		.await
		.expect("PUT should succeed.");

	let deleted = rest.delete("items/2", false).await.expect("DELETE should succeed.");

	assert_eq!(deleted.status, StatusCode::NO_CONTENT);
	assert_eq!(deleted.data, None);

	get.assert_async().await;
	post.assert_async().await;
	put.assert_async().await;
	delete.assert_async().await;
}

#[tokio::test]
async fn bearer_token_is_sent_when_installed() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer static-token");
			then.status(200).header("content-type", "application/json").body("{\"user\":\"a\"}");
		})
		.await;
	let rest = Rest::builder()
		.base_url(server.base_url())
		.access_token("static-token")
		.build()
		.expect("Client should build.");
	let response = rest.qget("me", false).await.expect("Authorized request should succeed.");

	mock.assert_async().await;

	assert_eq!(response.data, Some(serde_json::json!({ "user": "a" })));
}

#[tokio::test]
async fn error_status_carries_body_text() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/missing");
			then.status(404).body("no such sheet");
		})
		.await;
	let err = client(&server).get("missing", false).await.expect_err("404 should fail.");

	mock.assert_async().await;

	assert!(matches!(
		&err,
		Error::Transport(TransportError::Status { status: 404, status_text, body })
			if status_text == "Not Found" && body == "no such sheet"
	));
	assert_eq!(err.to_string(), "HTTP error: 404 Not Found - no such sheet");
}

#[tokio::test]
async fn non_json_body_leaves_data_empty() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/health");
			then.status(200).header("content-type", "text/plain").body("ok");
		})
		.await;

	let response = client(&server).get("health", false).await.expect("Request should succeed.");

	assert!(response.ok);
	assert_eq!(response.data, None);
}

#[tokio::test]
async fn redirects_report_final_url() {
	let server = MockServer::start_async().await;
	let target = server.url("/v2/items");

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/items");
			then.status(302).header("location", target.as_str());
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/items");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;

	let response = client(&server).get("v1/items", false).await.expect("Redirect should resolve.");

	assert!(response.redirected);
	assert_eq!(response.url.path(), "/v2/items");
	assert_eq!(response.data, Some(serde_json::json!([])));
}

#[tokio::test]
async fn cookies_travel_only_with_credentials() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/login");
			then.status(204).header("set-cookie", "session=abc; Path=/");
		})
		.await;

	let me = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("cookie", "session=abc");
			then.status(200).header("content-type", "application/json").body("{\"user\":\"a\"}");
		})
		.await;
	let anonymous = Rest::builder()
		.base_url(server.base_url())
		.transport(ReqwestTransport::new().expect("Transport should build."))
		.build()
		.expect("Client should build.");

	anonymous.post("login", NO_BODY, false).await.expect("Login should succeed.");
	anonymous.get("me", true).await.expect_err("Cookie from an anonymous login must not be kept.");

	let rest = client(&server);

	rest.post("login", NO_BODY, true).await.expect("Login should succeed.");

	let err = rest.get("me", false).await.expect_err("Cookies must stay home without credentials.");

	assert!(matches!(err, Error::Transport(TransportError::Status { status: 404, .. })));

	let response = rest.get("me", true).await.expect("Request with credentials should succeed.");

	assert_eq!(response.data, Some(serde_json::json!({ "user": "a" })));

	me.assert_calls_async(1).await;
}

#[tokio::test]
async fn request_timeout_surfaces_as_timeout_error() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/slow");
			then.status(200).delay(Duration::from_secs(2));
		})
		.await;

	let rest = Rest::builder()
		.base_url(server.base_url())
		.request_timeout(Duration::from_millis(100))
		.build()
		.expect("Client should build.");
	let err = rest.get("slow", false).await.expect_err("Slow request should time out.");

	assert!(matches!(err, Error::Transport(TransportError::Timeout)));
}

#[tokio::test]
async fn queued_http_requests_are_serialized() {
	let server = MockServer::start_async().await;

	for (path, delay) in [("/a", 300), ("/b", 50), ("/c", 100)] {
		server
			.mock_async(|when, then| {
				when.method(GET).path(path);
				then.status(200)
					.header("content-type", "application/json")
					.body(format!("{{\"path\":\"{path}\"}}"))
					.delay(Duration::from_millis(delay));
			})
			.await;
	}

	let rest = client(&server);
	let started = Instant::now();
	let (a, b, c) =
		tokio::join!(rest.qget("a", false), rest.qget("b", false), rest.qget("c", false));

	assert!(started.elapsed() >= Duration::from_millis(450));

	for (response, path) in [(a, "/a"), (b, "/b"), (c, "/c")] {
		let response = response.expect("Queued request should succeed.");

		assert_eq!(response.data, Some(serde_json::json!({ "path": path })));
	}

	assert!(rest.queue().is_empty());
}
