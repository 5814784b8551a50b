//! Demonstrates serialized requests against a mock API whose bearer token is obtained through a
//! refresh-token grant and renewed ahead of expiry.

// std
use std::time::Duration;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use serial_rest::{Rest, oauth::RefreshTokenRenewer};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;

	for (row, delay) in [(1, 400), (2, 50), (3, 150)] {
		server
			.mock_async(|when, then| {
				when.method(PUT)
					.path(format!("/sheets/demo/rows/{row}"))
					.header("authorization", "Bearer demo-access");
				then.status(200)
					.header("content-type", "application/json")
					.body(format!("{{\"updatedRow\":{row}}}"))
					.delay(Duration::from_millis(delay));
			})
			.await;
	}

	let renewer = RefreshTokenRenewer::new(server.url("/token"), "demo-client", "demo-refresh")?
		.with_client_secret("super-secret");
	let rest = Rest::builder().base_url(server.url("/sheets/demo")).renewer(renewer).build()?;

	rest.init_auth().await?;

	let values = serde_json::json!({ "values": [["a", "b"]] });
	let (first, second, third) = tokio::join!(
		rest.qput("rows/1", Some(&values), false),
		rest.qput("rows/2", Some(&values), false),
		rest.qput("rows/3", Some(&values), false),
	);

	for response in [first?, second?, third?] {
		println!("Updated in submission order: {:?}.", response.data);
	}

	token_mock.assert_async().await;

	Ok(())
}
