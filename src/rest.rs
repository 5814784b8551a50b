//! Client facade tying the request builder, the dispatcher, and the credential manager together.

// self
use crate::{
	_prelude::*,
	auth::{TokenManager, TokenRenewer, manager::DEFAULT_RENEWAL_MARGIN},
	error::ConfigError,
	http::{self, HttpResponse, HttpTransport},
	obs::{self, OpKind, OpOutcome, OpSpan},
	queue::RequestQueue,
	request::{HttpMethod, RequestBuilder, RequestDescriptor},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Payload placeholder for `post`/`put` calls without a body.
pub const NO_BODY: Option<&'static ()> = None;

pub(crate) struct RestInner {
	requests: RequestBuilder,
	transport: Arc<dyn HttpTransport>,
	queue: RequestQueue,
	tokens: TokenManager,
	renew_on_demand: bool,
}

/// REST client with direct and serialized (queued) request paths.
///
/// `Rest` is a cheap handle; clones share the transport, the dispatcher, and the credential
/// slot. Direct calls (`get`, `post`, ...) run immediately and may overlap. Queued calls
/// (`qget`, `qpost`, ...) go through the [`RequestQueue`], which runs them one at a time in
/// submission order. Both paths attach the current bearer token when one is installed.
#[derive(Clone)]
pub struct Rest {
	inner: Arc<RestInner>,
}
impl Rest {
	/// Starts configuring a client.
	pub fn builder() -> RestBuilder {
		RestBuilder::default()
	}

	pub(crate) fn from_inner(inner: Arc<RestInner>) -> Self {
		Self { inner }
	}

	/// Credential manager backing this client.
	pub fn tokens(&self) -> &TokenManager {
		&self.inner.tokens
	}

	/// Dispatcher used by the queued request variants.
	pub fn queue(&self) -> &RequestQueue {
		&self.inner.queue
	}

	/// Transport shared by both request paths.
	pub fn transport(&self) -> &Arc<dyn HttpTransport> {
		&self.inner.transport
	}

	/// Base URL joined onto relative endpoints.
	pub fn base_url(&self) -> Option<&Url> {
		self.inner.requests.base_url()
	}

	/// Runs the initial credential renewal; a no-op without a renewal callback.
	pub async fn init_auth(&self) -> Result<()> {
		self.inner.tokens.init().await
	}

	/// Builds a descriptor carrying the currently installed token.
	pub fn build_request<P>(
		&self,
		endpoint: &str,
		method: HttpMethod,
		payload: Option<&P>,
		with_credentials: bool,
	) -> Result<RequestDescriptor>
	where
		P: ?Sized + Serialize,
	{
		let token = self.inner.tokens.current_token();

		self.inner.requests.build(
			endpoint,
			method.as_method(),
			payload,
			with_credentials,
			token.as_ref(),
		)
	}

	/// Sends a prepared descriptor directly, bypassing the queue.
	pub async fn execute(&self, request: &RequestDescriptor) -> Result<HttpResponse> {
		http::execute(self.inner.transport.as_ref(), request).await
	}

	/// Sends a request immediately.
	pub async fn make_request<P>(
		&self,
		endpoint: &str,
		method: HttpMethod,
		payload: Option<&P>,
		with_credentials: bool,
	) -> Result<HttpResponse>
	where
		P: ?Sized + Serialize + Sync,
	{
		const KIND: OpKind = OpKind::Direct;

		let span = OpSpan::new(KIND, "make_request");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let request = self.prepare(endpoint, method, payload, with_credentials).await?;

				span.record_request(&request);

				self.execute(&request).await
			})
			.await;

		record_result(KIND, &result);

		result
	}

	/// Sends a request through the serialized dispatcher and waits for its turn and response.
	pub async fn make_q_request<P>(
		&self,
		endpoint: &str,
		method: HttpMethod,
		payload: Option<&P>,
		with_credentials: bool,
	) -> Result<HttpResponse>
	where
		P: ?Sized + Serialize + Sync,
	{
		const KIND: OpKind = OpKind::Queued;

		let span = OpSpan::new(KIND, "make_q_request");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let request = self.prepare(endpoint, method, payload, with_credentials).await?;

				span.record_request(&request);

				self.inner.queue.enqueue(request).await
			})
			.await;

		record_result(KIND, &result);

		result
	}

	/// `GET` sent immediately.
	pub async fn get(&self, endpoint: &str, with_credentials: bool) -> Result<HttpResponse> {
		self.make_request(endpoint, HttpMethod::Get, NO_BODY, with_credentials).await
	}

	/// `POST` sent immediately.
	pub async fn post<P>(
		&self,
		endpoint: &str,
		payload: Option<&P>,
		with_credentials: bool,
	) -> Result<HttpResponse>
	where
		P: ?Sized + Serialize + Sync,
	{
		self.make_request(endpoint, HttpMethod::Post, payload, with_credentials).await
	}

	/// `PUT` sent immediately.
	pub async fn put<P>(
		&self,
		endpoint: &str,
		payload: Option<&P>,
		with_credentials: bool,
	) -> Result<HttpResponse>
	where
		P: ?Sized + Serialize + Sync,
	{
		self.make_request(endpoint, HttpMethod::Put, payload, with_credentials).await
	}

	/// `DELETE` sent immediately.
	pub async fn delete(&self, endpoint: &str, with_credentials: bool) -> Result<HttpResponse> {
		self.make_request(endpoint, HttpMethod::Delete, NO_BODY, with_credentials).await
	}

	/// Queued `GET`.
	pub async fn qget(&self, endpoint: &str, with_credentials: bool) -> Result<HttpResponse> {
		self.make_q_request(endpoint, HttpMethod::Get, NO_BODY, with_credentials).await
	}

	/// Queued `POST`.
	pub async fn qpost<P>(
		&self,
		endpoint: &str,
		payload: Option<&P>,
		with_credentials: bool,
	) -> Result<HttpResponse>
	where
		P: ?Sized + Serialize + Sync,
	{
		self.make_q_request(endpoint, HttpMethod::Post, payload, with_credentials).await
	}

	/// Queued `PUT`.
	pub async fn qput<P>(
		&self,
		endpoint: &str,
		payload: Option<&P>,
		with_credentials: bool,
	) -> Result<HttpResponse>
	where
		P: ?Sized + Serialize + Sync,
	{
		self.make_q_request(endpoint, HttpMethod::Put, payload, with_credentials).await
	}

	/// Queued `DELETE`.
	pub async fn qdelete(&self, endpoint: &str, with_credentials: bool) -> Result<HttpResponse> {
		self.make_q_request(endpoint, HttpMethod::Delete, NO_BODY, with_credentials).await
	}

	async fn prepare<P>(
		&self,
		endpoint: &str,
		method: HttpMethod,
		payload: Option<&P>,
		with_credentials: bool,
	) -> Result<RequestDescriptor>
	where
		P: ?Sized + Serialize + Sync,
	{
		if self.inner.renew_on_demand {
			self.inner.tokens.ensure_fresh().await?;
		}

		self.build_request(endpoint, method, payload, with_credentials)
	}
}
impl Debug for Rest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Rest")
			.field("base_url", &self.base_url().map(Url::as_str))
			.field("tokens", &self.inner.tokens)
			.field("queue", &self.inner.queue)
			.field("renew_on_demand", &self.inner.renew_on_demand)
			.finish()
	}
}

/// Configuration for [`Rest`].
pub struct RestBuilder {
	base_url: Option<String>,
	access_token: Option<String>,
	renewer: Option<Arc<dyn TokenRenewer>>,
	renewal_margin: Duration,
	request_timeout: Option<StdDuration>,
	renew_on_demand: bool,
	transport: Option<Arc<dyn HttpTransport>>,
}
impl RestBuilder {
	/// Sets the base URL joined onto relative endpoints.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());

		self
	}

	/// Installs a static bearer token at construction.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(token.into());

		self
	}

	/// Registers the renewal callback.
	pub fn renewer<R>(mut self, renewer: R) -> Self
	where
		R: TokenRenewer,
	{
		self.renewer = Some(Arc::new(renewer));

		self
	}

	/// Sets how long before the declared expiry the automatic renewal runs (default 2s).
	pub fn renewal_margin(mut self, margin: Duration) -> Self {
		self.renewal_margin = margin;

		self
	}

	/// Applies a deadline to every request.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Controls whether requests renew a missing or expired credential first (default on).
	pub fn renew_on_demand(mut self, enabled: bool) -> Self {
		self.renew_on_demand = enabled;

		self
	}

	/// Uses `transport` instead of the default reqwest transport.
	pub fn transport<T>(self, transport: T) -> Self
	where
		T: HttpTransport,
	{
		self.shared_transport(Arc::new(transport))
	}

	/// Uses a shared transport instance.
	pub fn shared_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Validates the configuration and creates the client.
	pub fn build(self) -> Result<Rest> {
		let Self {
			base_url,
			access_token,
			renewer,
			renewal_margin,
			request_timeout,
			renew_on_demand,
			transport,
		} = self;
		let base_url = base_url.as_deref().map(parse_base_url).transpose()?;
		let transport = match transport {
			Some(transport) => transport,
			None => default_transport()?,
		};
		let requests = RequestBuilder::new(base_url).with_timeout(request_timeout);
		let queue = RequestQueue::new(transport.clone());
		let inner = Arc::new_cyclic(|client| RestInner {
			requests,
			transport,
			queue,
			tokens: TokenManager::new(client.clone(), renewal_margin),
			renew_on_demand,
		});

		if let Some(token) = access_token {
			inner.tokens.set_access_token(token);
		}
		if let Some(renewer) = renewer {
			inner.tokens.set_renewer(renewer);
		}

		Ok(Rest::from_inner(inner))
	}
}
impl Default for RestBuilder {
	fn default() -> Self {
		Self {
			base_url: None,
			access_token: None,
			renewer: None,
			renewal_margin: DEFAULT_RENEWAL_MARGIN,
			request_timeout: None,
			renew_on_demand: true,
			transport: None,
		}
	}
}
impl Debug for RestBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RestBuilder")
			.field("base_url", &self.base_url)
			.field("access_token_set", &self.access_token.is_some())
			.field("renewer_set", &self.renewer.is_some())
			.field("renewal_margin", &self.renewal_margin)
			.field("request_timeout", &self.request_timeout)
			.field("renew_on_demand", &self.renew_on_demand)
			.field("transport_set", &self.transport.is_some())
			.finish()
	}
}

fn parse_base_url(raw: &str) -> Result<Url> {
	let invalid = |reason: String| ConfigError::InvalidBaseUrl { url: raw.to_owned(), reason };
	let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

	match url.scheme() {
		"http" | "https" => Ok(url),
		scheme => Err(invalid(format!("unsupported scheme `{scheme}`")).into()),
	}
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn HttpTransport>> {
	Ok(Arc::new(ReqwestTransport::new()?))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn HttpTransport>> {
	Err(ConfigError::MissingTransport.into())
}

fn record_result<T>(kind: OpKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_op_outcome(kind, OpOutcome::Success),
		Err(e) => {
			tracing::debug!(op = kind.as_str(), error = %e, "Request failed.");
			obs::record_op_outcome(kind, OpOutcome::Failure);
		},
	}
}
