//! OAuth 2.0 `refresh_token` grant packaged as a [`TokenRenewer`].

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpRequest,
	RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{RenewFuture, TokenGrant, TokenRenewer},
	error::{ConfigError, CredentialError, TransportError},
	http::HttpTransport,
	request::RequestDescriptor,
	rest::Rest,
};

type RefreshClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Renews credentials by exchanging a refresh token at a token endpoint.
///
/// Token requests travel over the client's own [`HttpTransport`], so a custom or mocked
/// transport covers renewals too. When the server rotates the refresh token, the new one
/// replaces the stored value before the grant is returned.
pub struct RefreshTokenRenewer {
	token_url: String,
	client: RefreshClient,
	refresh_token: Mutex<RefreshToken>,
	scopes: Vec<Scope>,
}
impl RefreshTokenRenewer {
	/// Creates a renewer for a public client.
	pub fn new(
		token_url: impl Into<String>,
		client_id: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Result<Self> {
		let token_url = token_url.into();
		let endpoint = TokenUrl::new(token_url.clone())
			.map_err(|source| ConfigError::InvalidTokenUrl { source })?;
		let client = BasicClient::new(ClientId::new(client_id.into())).set_token_uri(endpoint);

		Ok(Self {
			token_url,
			client,
			refresh_token: Mutex::new(RefreshToken::new(refresh_token.into())),
			scopes: Vec::new(),
		})
	}

	/// Authenticates as a confidential client (HTTP Basic by default).
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client = self.client.set_client_secret(ClientSecret::new(secret.into()));

		self
	}

	/// Sends client credentials in the form body instead of the `Authorization` header.
	pub fn with_request_body_auth(mut self) -> Self {
		self.client = self.client.set_auth_type(AuthType::RequestBody);

		self
	}

	/// Requests the given scopes on every renewal.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(|scope| Scope::new(scope.into())).collect();

		self
	}

	/// Refresh token presented on the next renewal.
	pub fn refresh_token(&self) -> String {
		self.refresh_token.lock().secret().to_owned()
	}
}
impl TokenRenewer for RefreshTokenRenewer {
	fn renew<'a>(&'a self, rest: &'a Rest) -> RenewFuture<'a> {
		Box::pin(async move {
			let handle = TransportHandle(rest.transport().clone());
			let refresh_token = self.refresh_token.lock().clone();
			let mut request = self.client.exchange_refresh_token(&refresh_token);

			for scope in &self.scopes {
				request = request.add_scope(scope.clone());
			}

			let response = request.request_async(&handle).await.map_err(map_request_error)?;

			if let Some(rotated) = response.refresh_token() {
				tracing::debug!("Token endpoint rotated the refresh token.");

				*self.refresh_token.lock() = rotated.clone();
			}

			Ok(grant_from_response(&response))
		})
	}
}
impl Debug for RefreshTokenRenewer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshTokenRenewer")
			.field("token_url", &self.token_url)
			.field("refresh_token", &"<redacted>")
			.field("scopes", &self.scopes)
			.finish()
	}
}

struct TransportHandle(Arc<dyn HttpTransport>);
impl<'c> AsyncHttpClient<'c> for TransportHandle {
	type Error = TransportError;
	type Future =
		Pin<Box<dyn Future<Output = Result<oauth2::HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			let (parts, body) = request.into_parts();
			let url = Url::parse(&parts.uri.to_string()).map_err(TransportError::network)?;
			let body = if body.is_empty() { None } else { Some(body) };
			let descriptor = RequestDescriptor::from_parts(parts.method, url, parts.headers, body);
			let raw = self.0.send(&descriptor).await?;
			let mut response = oauth2::HttpResponse::new(raw.body);

			*response.status_mut() = raw.status;
			*response.headers_mut() = raw.headers;

			Ok(response)
		})
	}
}

fn grant_from_response(response: &BasicTokenResponse) -> TokenGrant {
	TokenGrant {
		access_token: response.access_token().secret().to_owned(),
		token_type: Some(response.token_type().as_ref().to_owned()),
		expires_in: response.expires_in().map(|ttl| ttl.as_secs()),
		refresh_token: response.refresh_token().map(|token| token.secret().to_owned()),
		scope: response
			.scopes()
			.map(|scopes| scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ")),
	}
}

fn map_request_error(err: BasicRequestTokenError<TransportError>) -> Error {
	match err {
		RequestTokenError::ServerResponse(response) => CredentialError::Rejected {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
		}
		.into(),
		RequestTokenError::Request(e) => e.into(),
		RequestTokenError::Parse(source, _body) => CredentialError::MalformedGrant { source }.into(),
		RequestTokenError::Other(message) => CredentialError::Other { message }.into(),
	}
}
