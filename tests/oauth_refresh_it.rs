#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use serial_rest::{
	Rest,
	error::{CredentialError, Error},
	oauth::RefreshTokenRenewer,
};

const CLIENT_ID: &str = "client-sheets";
const CLIENT_SECRET: &str = "secret-sheets";

fn renewer(server: &MockServer) -> Arc<RefreshTokenRenewer> {
	Arc::new(
		RefreshTokenRenewer::new(server.url("/token"), CLIENT_ID, "refresh-old")
			.expect("Renewer should build.")
			.with_client_secret(CLIENT_SECRET)
			.with_request_body_auth()
			.with_scopes(["sheets.read"]),
	)
}

fn client(server: &MockServer, renewer: Arc<RefreshTokenRenewer>) -> Rest {
	let rest = Rest::builder().base_url(server.base_url()).build().expect("Client should build.");

	rest.tokens().set_renewer(renewer);

	rest
}

#[tokio::test]
async fn refresh_grant_installs_token_and_rotates_refresh_token() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(
					serde_json::json!({
						"access_token": "access-new",
						"refresh_token": "refresh-new",
						"token_type": "bearer",
						"expires_in": 1800,
						"scope": "sheets.read"
					})
					.to_string(),
				);
		})
		.await;
	let me = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer access-new");
			then.status(200).header("content-type", "application/json").body("{\"user\":\"a\"}");
		})
		.await;
	let renewer = renewer(&server);
	let rest = client(&server, renewer.clone());

	rest.init_auth().await.expect("Refresh grant should succeed.");

	token.assert_async().await;

	assert_eq!(renewer.refresh_token(), "refresh-new");
	assert!(rest.tokens().has_pending_renewal());

	let credential = rest.tokens().credential().expect("Credential should be installed.");

	assert_eq!(credential.token.expose(), "access-new");
	assert!(credential.expires_at.is_some());

	rest.get("me", false).await.expect("Authorized request should succeed.");

	me.assert_async().await;
}

#[tokio::test]
async fn on_demand_renewal_runs_before_first_request() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"lazy\",\"token_type\":\"bearer\",\"expires_in\":600}");
		})
		.await;
	let items = server
		.mock_async(|when, then| {
			when.method(GET).path("/items").header("authorization", "Bearer lazy");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let renewer = renewer(&server);
	let rest = client(&server, renewer.clone());

	rest.qget("items", false).await.expect("First queued request should renew and succeed.");
	rest.qget("items", false).await.expect("Second queued request should reuse the token.");

	token.assert_calls_async(1).await;
	items.assert_calls_async(2).await;

	assert_eq!(renewer.refresh_token(), "refresh-old");
}

#[tokio::test]
async fn oauth_error_maps_to_rejected() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Token revoked\"}");
		})
		.await;

	let rest = client(&server, renewer(&server));
	let err = rest.init_auth().await.expect_err("Rejected refresh should fail.");

	assert!(matches!(
		err,
		Error::Credential(CredentialError::Rejected { ref error, ref description })
			if error == "invalid_grant" && description.as_deref() == Some("Token revoked")
	));
	assert!(rest.tokens().current_token().is_none());
	assert_eq!(rest.tokens().metrics().failures(), 1);
}

#[tokio::test]
async fn malformed_token_response_is_reported() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token_type\":\"bearer\"}");
		})
		.await;

	let rest = client(&server, renewer(&server));
	let err = rest.init_auth().await.expect_err("Malformed grant should fail.");

	assert!(matches!(err, Error::Credential(CredentialError::MalformedGrant { .. })));
}
