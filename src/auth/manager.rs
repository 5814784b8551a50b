//! Credential lifecycle management with serialized renewals and proactive rescheduling.
//!
//! The [`TokenManager`] owns the single credential slot consulted by every request built
//! through the facade. Installing a credential bumps a generation counter and replaces the
//! pending renewal task, so at most one scheduled renewal exists at a time. All renewals
//! (initial, manual, on-demand, scheduled) run behind one async gate; a scheduled renewal
//! stands down when a newer credential was installed while it was sleeping or waiting for
//! the gate, and any renewal discards its grant when a credential was installed while its
//! callback ran, so a stale grant never overwrites a fresher one.

mod metrics;

pub use self::metrics::RenewalMetrics;

// crates.io
use tokio::task::AbortHandle;
// self
use crate::{
	_prelude::*,
	auth::{BearerToken, Credential, TokenGrant, TokenRenewer},
	obs::{self, OpKind, OpOutcome, OpSpan},
	rest::{Rest, RestInner},
};

/// Default safety margin between a scheduled renewal and the declared expiry.
pub const DEFAULT_RENEWAL_MARGIN: Duration = Duration::seconds(2);

tokio::task_local! {
	static RENEWING: ();
}

#[derive(Default)]
struct CredentialSlot {
	credential: Option<Credential>,
	generation: u64,
	pending: Option<AbortHandle>,
	background_error: Option<Error>,
}

/// Holds the current bearer credential and keeps it fresh.
pub struct TokenManager {
	client: Weak<RestInner>,
	slot: Mutex<CredentialSlot>,
	renewer: RwLock<Option<Arc<dyn TokenRenewer>>>,
	renewal_gate: AsyncMutex<()>,
	renewal_margin: Duration,
	metrics: RenewalMetrics,
}
impl TokenManager {
	pub(crate) fn new(client: Weak<RestInner>, renewal_margin: Duration) -> Self {
		Self {
			client,
			slot: Default::default(),
			renewer: Default::default(),
			renewal_gate: AsyncMutex::new(()),
			renewal_margin: if renewal_margin.is_negative() { Duration::ZERO } else { renewal_margin },
			metrics: Default::default(),
		}
	}

	/// Returns the token attached to outbound requests, if any.
	pub fn current_token(&self) -> Option<BearerToken> {
		self.slot.lock().credential.as_ref().map(|credential| credential.token.clone())
	}

	/// Returns a snapshot of the installed credential.
	pub fn credential(&self) -> Option<Credential> {
		self.slot.lock().credential.clone()
	}

	/// Identifies the installed credential; increases on every install.
	pub fn generation(&self) -> u64 {
		self.slot.lock().generation
	}

	/// Returns `true` while an automatic renewal is scheduled.
	pub fn has_pending_renewal(&self) -> bool {
		self.slot.lock().pending.is_some()
	}

	/// Safety margin subtracted from each declared lifetime.
	pub fn renewal_margin(&self) -> Duration {
		self.renewal_margin
	}

	/// Renewal counters for this manager.
	pub fn metrics(&self) -> &RenewalMetrics {
		&self.metrics
	}

	/// Registers the renewal callback, replacing any previous one.
	pub fn set_renew_function<R>(&self, renewer: R)
	where
		R: TokenRenewer,
	{
		self.set_renewer(Arc::new(renewer));
	}

	/// Registers a shared renewal callback, replacing any previous one.
	pub fn set_renewer(&self, renewer: Arc<dyn TokenRenewer>) {
		*self.renewer.write() = Some(renewer);
	}

	/// Returns `true` once a renewal callback is registered.
	pub fn has_renewer(&self) -> bool {
		self.renewer.read().is_some()
	}

	/// Takes the error left behind by the most recent failed scheduled renewal.
	pub fn take_background_error(&self) -> Option<Error> {
		self.slot.lock().background_error.take()
	}

	/// Performs the initial renewal when a renewal callback is registered.
	pub async fn init(&self) -> Result<()> {
		self.renew().await
	}

	/// Replaces the current credential with a freshly renewed one.
	///
	/// Without a registered callback this is a no-op, which keeps statically provided tokens
	/// usable. A grant without an access token fails with
	/// [`CredentialError::MissingAccessToken`](crate::error::CredentialError::MissingAccessToken)
	/// and leaves the current credential in place.
	pub async fn renew(&self) -> Result<()> {
		let Some(renewer) = self.renewer() else {
			tracing::debug!("No renewal function registered; keeping the current token.");

			return Ok(());
		};
		let rest = self.client()?;
		let _gate = self.renewal_gate.lock().await;

		self.renew_locked(renewer.as_ref(), &rest).await
	}

	/// Renews when a callback is registered and the credential is missing or expired.
	///
	/// Concurrent callers share one renewal. Calls made from inside a renewal return
	/// immediately.
	pub async fn ensure_fresh(&self) -> Result<()> {
		if RENEWING.try_with(|_| ()).is_ok() || !self.needs_renewal() {
			return Ok(());
		}

		let Some(renewer) = self.renewer() else { return Ok(()) };
		let rest = self.client()?;
		let _gate = self.renewal_gate.lock().await;

		if !self.needs_renewal() {
			return Ok(());
		}

		self.renew_locked(renewer.as_ref(), &rest).await
	}

	/// Installs a static, never-expiring token and cancels any scheduled renewal.
	pub fn set_access_token(&self, token: impl Into<String>) {
		self.install(Credential::new(BearerToken::new(token)), None);
	}

	/// Installs a grant; schedules one renewal ahead of its expiry when `auto_renew` is set.
	pub fn set_grant(&self, grant: &TokenGrant, auto_renew: bool) -> Result<()> {
		self.install_grant(grant, auto_renew, None).map(|_| ())
	}

	// Returns `false` without touching the slot when `expected` no longer matches the
	// installed generation.
	fn install_grant(
		&self,
		grant: &TokenGrant,
		auto_renew: bool,
		expected: Option<u64>,
	) -> Result<bool> {
		let credential = Credential::from_grant(grant, OffsetDateTime::now_utc())?;
		let ttl = if auto_renew { grant.ttl()? } else { None };

		Ok(self.install_if(credential, ttl, expected))
	}

	fn install(&self, credential: Credential, ttl: Option<Duration>) {
		self.install_if(credential, ttl, None);
	}

	fn install_if(
		&self,
		credential: Credential,
		ttl: Option<Duration>,
		expected: Option<u64>,
	) -> bool {
		let mut slot = self.slot.lock();

		if expected.is_some_and(|generation| generation != slot.generation) {
			return false;
		}

		slot.generation = slot.generation.wrapping_add(1);

		if let Some(pending) = slot.pending.take() {
			pending.abort();
		}

		slot.credential = Some(credential);

		if let Some(ttl) = ttl {
			let delay = (ttl - self.renewal_margin).max(Duration::ZERO);

			slot.pending = self.schedule_renewal(delay.unsigned_abs(), slot.generation);
		}

		tracing::debug!(
			generation = slot.generation,
			scheduled = slot.pending.is_some(),
			"Installed credential."
		);

		true
	}

	fn schedule_renewal(&self, delay: StdDuration, generation: u64) -> Option<AbortHandle> {
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			tracing::warn!("No Tokio runtime available; automatic renewal is disabled.");

			return None;
		};
		let client = self.client.clone();
		let task = runtime.spawn(async move {
			tokio::time::sleep(delay).await;

			let Some(inner) = client.upgrade() else { return };
			let rest = Rest::from_inner(inner);

			rest.tokens().renew_scheduled(&rest, generation).await;
		});

		Some(task.abort_handle())
	}

	async fn renew_scheduled(&self, rest: &Rest, generation: u64) {
		if !self.claim_scheduled(generation) {
			self.metrics.record_superseded();

			return;
		}

		let Some(renewer) = self.renewer() else { return };
		let _gate = self.renewal_gate.lock().await;

		if self.generation() != generation {
			tracing::debug!(generation, "Scheduled renewal superseded by a newer credential.");
			self.metrics.record_superseded();

			return;
		}
		if let Err(e) = self.renew_locked(renewer.as_ref(), rest).await {
			tracing::warn!(error = %e, generation, "Scheduled token renewal failed.");

			self.slot.lock().background_error = Some(e);
		}
	}

	// Detaches the pending handle so the install performed by this renewal does not abort the
	// task running it.
	fn claim_scheduled(&self, generation: u64) -> bool {
		let mut slot = self.slot.lock();

		if slot.generation != generation {
			return false;
		}

		slot.pending = None;

		true
	}

	async fn renew_locked(&self, renewer: &dyn TokenRenewer, rest: &Rest) -> Result<()> {
		const KIND: OpKind = OpKind::Renewal;

		let span = OpSpan::new(KIND, "renew");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.record_attempt();

		let generation = self.generation();
		let result = span
			.instrument(async {
				let grant = RENEWING.scope((), renewer.renew(rest)).await?;

				self.install_grant(&grant, true, Some(generation))
			})
			.await;

		match &result {
			Ok(false) => {
				tracing::debug!(generation, "Discarded renewed grant; a newer credential exists.");
				self.metrics.record_superseded();
				obs::record_op_outcome(KIND, OpOutcome::Success);
			},
			Ok(true) => {
				self.metrics.record_success();
				obs::record_op_outcome(KIND, OpOutcome::Success);
			},
			Err(e) => {
				tracing::debug!(error = %e, "Token renewal failed.");
				self.metrics.record_failure();
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
		}

		result.map(|_| ())
	}

	fn needs_renewal(&self) -> bool {
		if !self.has_renewer() {
			return false;
		}

		match &self.slot.lock().credential {
			Some(credential) => credential.is_expired(),
			None => true,
		}
	}

	fn renewer(&self) -> Option<Arc<dyn TokenRenewer>> {
		self.renewer.read().clone()
	}

	fn client(&self) -> Result<Rest> {
		self.client.upgrade().map(Rest::from_inner).ok_or(Error::ClientDropped)
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let slot = self.slot.lock();

		f.debug_struct("TokenManager")
			.field("credential", &slot.credential)
			.field("generation", &slot.generation)
			.field("pending_renewal", &slot.pending.is_some())
			.field("renewer_set", &self.has_renewer())
			.field("renewal_margin", &self.renewal_margin)
			.finish()
	}
}
impl Drop for TokenManager {
	fn drop(&mut self) {
		if let Some(pending) = self.slot.get_mut().pending.take() {
			pending.abort();
		}
	}
}
