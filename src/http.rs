//! Transport primitives and response normalization.
//!
//! [`HttpTransport`] is the client's only dependency on an HTTP stack. Implementations send
//! one [`RequestDescriptor`] and hand back the [`RawResponse`] untouched; [`execute`] turns
//! that into the uniform [`HttpResponse`] (or a [`TransportError`]) so custom transports and
//! test fakes get identical status and body handling.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::cookie::{CookieStore, Jar};
// self
use crate::{_prelude::*, error::TransportError, request::RequestDescriptor};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + 'a + Send>>;

/// Network seam used by both the direct and the queued request paths.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared between the
/// facade, the dispatcher worker, and renewal tasks.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and returns the response as received, whatever its status.
	fn send<'a>(&'a self, request: &'a RequestDescriptor) -> TransportFuture<'a>;
}

/// Response as received from the transport, before status classification.
///
/// Additional fields may be added in future releases, so downstream code should construct
/// values with [`RawResponse::new`] and the `with_*` helpers.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Reason phrase reported for the status.
	pub status_text: String,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
	/// Final URL after redirects.
	pub url: Url,
	/// Whether the transport followed at least one redirect.
	pub redirected: bool,
}
impl RawResponse {
	/// Creates an empty response for `url` using the canonical reason phrase.
	pub fn new(status: StatusCode, url: Url) -> Self {
		Self {
			status,
			status_text: status.canonical_reason().unwrap_or_default().to_owned(),
			headers: HeaderMap::new(),
			body: Vec::new(),
			url,
			redirected: false,
		}
	}

	/// Adds a header.
	pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);

		self
	}

	/// Replaces the body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Replaces the body with serialized JSON and sets `Content-Type: application/json`.
	pub fn with_json(self, value: &JsonValue) -> Self {
		self.with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(value.to_string())
	}

	/// Marks the response as the result of following redirects to `url`.
	pub fn redirected_to(mut self, url: Url) -> Self {
		self.url = url;
		self.redirected = true;

		self
	}
}

/// Normalized response delivered to callers.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// `true` when the status is in the 2xx range.
	pub ok: bool,
	/// HTTP status code.
	pub status: StatusCode,
	/// Reason phrase reported for the status.
	pub status_text: String,
	/// Response headers.
	pub headers: HeaderMap,
	/// Parsed JSON body when the response declared a JSON content type.
	pub data: Option<JsonValue>,
	/// Final URL after redirects.
	pub url: Url,
	/// Whether the transport followed at least one redirect.
	pub redirected: bool,
}
impl HttpResponse {
	/// Classifies `raw` by status and parses JSON bodies.
	pub fn from_raw(raw: RawResponse) -> Result<Self> {
		if !raw.status.is_success() {
			return Err(TransportError::Status {
				status: raw.status.as_u16(),
				status_text: raw.status_text,
				body: String::from_utf8_lossy(&raw.body).into_owned(),
			}
			.into());
		}

		let data = if declares_json(&raw.headers) && !raw.body.is_empty() {
			let mut de = serde_json::Deserializer::from_slice(&raw.body);

			Some(
				serde_path_to_error::deserialize(&mut de)
					.map_err(|source| TransportError::Decode { source })?,
			)
		} else {
			None
		};

		Ok(Self {
			ok: true,
			status: raw.status,
			status_text: raw.status_text,
			headers: raw.headers,
			data,
			url: raw.url,
			redirected: raw.redirected,
		})
	}

	/// Decodes the JSON body into `T`; a missing body decodes from `null`.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let value = self.data.clone().unwrap_or(JsonValue::Null);

		serde_path_to_error::deserialize(value)
			.map_err(|source| TransportError::Decode { source }.into())
	}
}

/// Executes one request through `transport` and normalizes the outcome.
pub async fn execute(
	transport: &dyn HttpTransport,
	request: &RequestDescriptor,
) -> Result<HttpResponse> {
	let raw = transport.send(request).await?;

	HttpResponse::from_raw(raw)
}

fn declares_json(headers: &HeaderMap) -> bool {
	headers
		.get(header::CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
}

/// Reqwest-backed transport with an opt-in cookie jar.
///
/// Redirects are followed by the underlying client; the final URL and the redirect flag are
/// reported on the response. Cookies are read from and stored into the jar only for
/// descriptors built with `with_credentials`.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	cookies: Arc<Jar>,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport around a fresh reqwest client.
	pub fn new() -> Result<Self> {
		let client = ReqwestClient::builder().build().map_err(crate::error::ConfigError::from)?;

		Ok(Self::with_client(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]. Do not enable the client's own cookie store,
	/// or cookies will be sent regardless of `with_credentials`.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, cookies: Default::default() }
	}

	/// Cookie jar shared by requests built with `with_credentials`.
	pub fn cookie_jar(&self) -> &Arc<Jar> {
		&self.cookies
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.client
	}
}
#[cfg(feature = "reqwest")]
impl Debug for ReqwestTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReqwestTransport").finish_non_exhaustive()
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send<'a>(&'a self, request: &'a RequestDescriptor) -> TransportFuture<'a> {
		Box::pin(async move {
			let mut builder = self
				.client
				.request(request.method().clone(), request.url().clone())
				.headers(request.headers().clone());

			if request.with_credentials() {
				if let Some(cookie) = self.cookies.cookies(request.url()) {
					builder = builder.header(header::COOKIE, cookie);
				}
			}
			if let Some(body) = request.body() {
				builder = builder.body(body.to_vec());
			}
			if let Some(timeout) = request.timeout() {
				builder = builder.timeout(timeout);
			}

			let response = builder.send().await?;
			let status = response.status();
			let url = response.url().clone();
			let headers = response.headers().to_owned();

			if request.with_credentials() {
				let mut set_cookies = headers.get_all(header::SET_COOKIE).iter();

				self.cookies.set_cookies(&mut set_cookies, &url);
			}

			let body = response.bytes().await?.to_vec();
			let redirected = url != *request.url();
			let mut raw = RawResponse::new(status, url).with_body(body);

			raw.headers = headers;
			raw.redirected = redirected;

			Ok(raw)
		})
	}
}
