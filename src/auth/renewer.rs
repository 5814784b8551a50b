//! Renewal callback contract used by the credential manager to obtain fresh tokens.

// self
use crate::{_prelude::*, auth::TokenGrant, rest::Rest};

/// Boxed future returned by [`TokenRenewer::renew`].
pub type RenewFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenGrant>> + 'a + Send>>;

/// Obtains a fresh credential from an authorization service.
///
/// The renewer receives the client it is registered on, so it can reach the token endpoint
/// through the same transport. Requests issued from inside a renewal skip the on-demand
/// credential check, which keeps the first renewal from waiting on itself. A renewer must not
/// call [`TokenManager::renew`](crate::auth::TokenManager::renew) on the same client.
///
/// Any `Fn(Rest) -> impl Future<Output = Result<TokenGrant>>` closure is a renewer.
pub trait TokenRenewer
where
	Self: 'static + Send + Sync,
{
	/// Requests a new grant.
	fn renew<'a>(&'a self, rest: &'a Rest) -> RenewFuture<'a>;
}
impl<F, Fut> TokenRenewer for F
where
	F: 'static + Send + Sync + Fn(Rest) -> Fut,
	Fut: 'static + Send + Future<Output = Result<TokenGrant>>,
{
	fn renew<'a>(&'a self, rest: &'a Rest) -> RenewFuture<'a> {
		Box::pin(self(rest.clone()))
	}
}
