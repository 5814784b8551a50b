//! Immutable request descriptors and the builder that resolves endpoints and credentials.

// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	error::{ConfigError, CredentialError},
};

/// HTTP verbs exposed by the facade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `DELETE`
	Delete,
}
impl HttpMethod {
	/// Returns the verb as an [`http::Method`](Method).
	pub fn as_method(self) -> Method {
		match self {
			HttpMethod::Get => Method::GET,
			HttpMethod::Post => Method::POST,
			HttpMethod::Put => Method::PUT,
			HttpMethod::Delete => Method::DELETE,
		}
	}
}
impl From<HttpMethod> for Method {
	fn from(value: HttpMethod) -> Self {
		value.as_method()
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_method().as_str())
	}
}

/// Fully resolved outbound request.
///
/// Descriptors are created once per call and never mutated; the dispatcher and the transport
/// only borrow them. `Debug` output hides the `Authorization` header value.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
	method: Method,
	url: Url,
	headers: HeaderMap,
	body: Option<Vec<u8>>,
	with_credentials: bool,
	timeout: Option<StdDuration>,
}
impl RequestDescriptor {
	/// Creates a descriptor without headers, body, or deadline.
	pub fn new(method: Method, url: Url) -> Self {
		Self {
			method,
			url,
			headers: HeaderMap::new(),
			body: None,
			with_credentials: false,
			timeout: None,
		}
	}

	pub(crate) fn from_parts(
		method: Method,
		url: Url,
		headers: HeaderMap,
		body: Option<Vec<u8>>,
	) -> Self {
		Self { headers, body, ..Self::new(method, url) }
	}

	/// Request method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Absolute target URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Request headers, including `Authorization` when a token was present.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Serialized body, if any.
	pub fn body(&self) -> Option<&[u8]> {
		self.body.as_deref()
	}

	/// Whether the transport should include ambient credentials (cookies).
	pub fn with_credentials(&self) -> bool {
		self.with_credentials
	}

	/// Per-request deadline enforced by the transport.
	pub fn timeout(&self) -> Option<StdDuration> {
		self.timeout
	}

	/// Returns a copy carrying the provided deadline.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}

/// Resolves endpoints against a base URL and assembles [`RequestDescriptor`] values.
///
/// The builder is a pure function of its inputs: it performs no I/O and reads the credential
/// only through the token snapshot handed to [`RequestBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct RequestBuilder {
	base_url: Option<Url>,
	timeout: Option<StdDuration>,
}
impl RequestBuilder {
	/// Creates a builder joining relative endpoints onto `base_url`.
	pub fn new(base_url: Option<Url>) -> Self {
		Self { base_url, timeout: None }
	}

	/// Applies a default deadline to every descriptor.
	pub fn with_timeout(mut self, timeout: Option<StdDuration>) -> Self {
		self.timeout = timeout;

		self
	}

	/// Base URL used for relative endpoints.
	pub fn base_url(&self) -> Option<&Url> {
		self.base_url.as_ref()
	}

	/// Resolves `endpoint` to an absolute URL.
	///
	/// Endpoints starting with `http://` or `https://` are used verbatim; anything else is
	/// appended to the base URL with exactly one `/` in between.
	pub fn resolve(&self, endpoint: &str) -> Result<Url> {
		let invalid = |source: Option<url::ParseError>| ConfigError::InvalidEndpoint {
			endpoint: endpoint.to_owned(),
			source,
		};

		if is_absolute(endpoint) {
			return Url::parse(endpoint).map_err(|e| invalid(Some(e)).into());
		}

		let base = self.base_url.as_ref().ok_or_else(|| invalid(None))?;
		let joined = format!(
			"{}/{}",
			base.as_str().trim_end_matches('/'),
			endpoint.trim_start_matches('/')
		);

		Url::parse(&joined).map_err(|e| invalid(Some(e)).into())
	}

	/// Builds a descriptor for `endpoint`.
	///
	/// Attaches `Authorization: Bearer <token>` when `token` is given and serializes `payload`
	/// as JSON with a matching `Content-Type`.
	pub fn build<P>(
		&self,
		endpoint: &str,
		method: Method,
		payload: Option<&P>,
		with_credentials: bool,
		token: Option<&BearerToken>,
	) -> Result<RequestDescriptor>
	where
		P: ?Sized + Serialize,
	{
		let url = self.resolve(endpoint)?;
		let mut headers = HeaderMap::new();

		if let Some(token) = token {
			let value = token.header_value().ok_or(CredentialError::InvalidToken)?;

			headers.insert(header::AUTHORIZATION, value);
		}

		let body = match payload {
			Some(payload) => {
				let bytes = serde_json::to_vec(payload).map_err(ConfigError::Serialize)?;

				headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

				Some(bytes)
			},
			None => None,
		};

		Ok(RequestDescriptor {
			method,
			url,
			headers,
			body,
			with_credentials,
			timeout: self.timeout,
		})
	}
}

fn is_absolute(endpoint: &str) -> bool {
	let lower = endpoint.get(..8).unwrap_or(endpoint).to_ascii_lowercase();

	lower.starts_with("http://") || lower.starts_with("https://")
}
