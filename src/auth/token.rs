//! Bearer token values, renewal payloads, and installed credentials.

// self
use crate::{_prelude::*, error::CredentialError};

/// Redacted bearer token wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken(String);
impl BearerToken {
	/// Wraps a new token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the token carries no usable characters.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}

	/// Renders the `Authorization` header value, flagged as sensitive.
	pub fn header_value(&self) -> Option<HeaderValue> {
		let mut value = HeaderValue::try_from(format!("Bearer {}", self.0)).ok()?;

		value.set_sensitive(true);

		Some(value)
	}
}
impl AsRef<str> for BearerToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("BearerToken").field(&"<redacted>").finish()
	}
}
impl Display for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Payload returned by a renewal callback, shaped like an OAuth 2.0 token response.
///
/// A missing `access_token` deserializes as an empty string so the manager can reject it
/// with [`CredentialError::MissingAccessToken`] instead of failing inside serde.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TokenGrant {
	/// Access token issued by the authorization server.
	#[serde(default)]
	pub access_token: String,
	/// Token type reported by the server (usually `Bearer`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
	/// Lifetime of the access token in seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<u64>,
	/// Refresh token, when the server rotates one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
	/// Space-delimited scopes granted to the token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
}
impl TokenGrant {
	/// Creates a grant carrying only an access token.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self { access_token: access_token.into(), ..Default::default() }
	}

	/// Declares the token lifetime in seconds.
	pub fn with_expires_in(mut self, seconds: u64) -> Self {
		self.expires_in = Some(seconds);

		self
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Declared lifetime, treating `0` as "no lifetime declared".
	pub fn ttl(&self) -> Result<Option<Duration>> {
		match self.expires_in {
			None | Some(0) => Ok(None),
			Some(secs) => {
				let secs = i64::try_from(secs).map_err(|_| CredentialError::ExpiresInOutOfRange)?;

				Ok(Some(Duration::seconds(secs)))
			},
		}
	}
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("scope", &self.scope)
			.finish()
	}
}

/// Credential currently installed in the [`TokenManager`](crate::auth::TokenManager).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Bearer token attached to outbound requests.
	pub token: BearerToken,
	/// Instant after which the token must not be used; `None` never expires.
	pub expires_at: Option<OffsetDateTime>,
}
impl Credential {
	/// Creates a never-expiring credential.
	pub fn new(token: BearerToken) -> Self {
		Self { token, expires_at: None }
	}

	/// Builds a credential from a grant observed at `now`.
	pub fn from_grant(grant: &TokenGrant, now: OffsetDateTime) -> Result<Self> {
		let token = BearerToken::new(grant.access_token.clone());

		if token.is_blank() {
			return Err(CredentialError::MissingAccessToken.into());
		}

		let expires_at = match grant.ttl()? {
			Some(ttl) => Some(now.checked_add(ttl).ok_or(CredentialError::ExpiresInOutOfRange)?),
			None => None,
		};

		Ok(Self { token, expires_at })
	}

	/// Returns `true` if the credential has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Returns `true` if the credential is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_formatters_redact() {
		let token = BearerToken::new("super-secret");

		assert_eq!(format!("{token:?}"), "BearerToken(\"<redacted>\")");
		assert_eq!(format!("{token}"), "<redacted>");
		let grant = TokenGrant::new("super-secret").with_refresh_token("refresh-secret");
		let rendered = format!("{grant:?}");

		assert!(!rendered.contains("super-secret"));
		assert!(!rendered.contains("refresh-secret"));
	}

	#[test]
	fn header_value_is_sensitive_bearer() {
		let value = BearerToken::new("abc").header_value().expect("Token should be a valid header.");

		assert_eq!(value.to_str().expect("Header should be ASCII."), "Bearer abc");
		assert!(value.is_sensitive());
		assert!(BearerToken::new("line\nbreak").header_value().is_none());
	}

	#[test]
	fn grant_without_access_token_deserializes_as_blank() {
		let grant: TokenGrant = serde_json::from_str("{\"token_type\":\"bearer\",\"expires_in\":60}")
			.expect("Grant payload should deserialize.");

		assert!(grant.access_token.is_empty());
		assert!(matches!(
			Credential::from_grant(&grant, OffsetDateTime::now_utc()),
			Err(Error::Credential(CredentialError::MissingAccessToken))
		));
	}

	#[test]
	fn credential_expiry_tracks_grant_ttl() {
		let now = OffsetDateTime::now_utc();
		let credential = Credential::from_grant(&TokenGrant::new("abc").with_expires_in(60), now)
			.expect("Credential should build from a valid grant.");

		assert_eq!(credential.expires_at, Some(now + Duration::seconds(60)));
		assert!(!credential.is_expired_at(now + Duration::seconds(59)));
		assert!(credential.is_expired_at(now + Duration::seconds(60)));

		let forever = Credential::from_grant(&TokenGrant::new("abc").with_expires_in(0), now)
			.expect("Zero ttl should build a non-expiring credential.");

		assert_eq!(forever.expires_at, None);
		assert!(!forever.is_expired_at(now + Duration::days(365)));
	}

	#[test]
	fn oversized_ttl_is_rejected() {
		let grant = TokenGrant::new("abc").with_expires_in(u64::MAX);

		assert!(matches!(grant.ttl(), Err(Error::Credential(CredentialError::ExpiresInOutOfRange))));
	}
}
