//! Error types shared by the dispatcher, the credential manager, and the facade.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Non-success HTTP status or network failure for a single request.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Credential renewal produced an unusable result.
	#[error(transparent)]
	Credential(#[from] CredentialError),

	/// The dispatcher worker stopped before delivering a response.
	#[error("Request queue stopped before delivering a response.")]
	QueueClosed,
	/// The owning client was dropped while a background operation still referenced it.
	#[error("REST client was dropped.")]
	ClientDropped,
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Base URL cannot be parsed or does not use HTTP(S).
	#[error("Base URL `{url}` is invalid: {reason}.")]
	InvalidBaseUrl {
		/// Raw value supplied by the caller.
		url: String,
		/// Why the value was rejected.
		reason: String,
	},
	/// Endpoint could not be resolved to an absolute URL.
	#[error("Endpoint `{endpoint}` cannot be resolved to an absolute URL.")]
	InvalidEndpoint {
		/// Endpoint supplied by the caller.
		endpoint: String,
		/// Underlying parsing failure, if the URL was malformed.
		#[source]
		source: Option<url::ParseError>,
	},
	/// Token endpoint URL for the refresh grant is invalid.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenUrl {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Request payload could not be serialized to JSON.
	#[error("Request payload could not be serialized to JSON.")]
	Serialize(#[source] serde_json::Error),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// No transport was configured and the default reqwest transport is disabled.
	#[error("No HTTP transport configured; enable the `reqwest` feature or supply one.")]
	MissingTransport,
	/// Queued dispatch needs a Tokio runtime to drive its worker.
	#[error("Queued requests must be submitted from within a Tokio runtime.")]
	MissingRuntime,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures for a single request.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Server answered with a status outside the 2xx range.
	#[error("HTTP error: {status} {status_text} - {body}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Canonical reason phrase for the status.
		status_text: String,
		/// Raw response body text.
		body: String,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Per-request deadline elapsed before the server answered.
	#[error("Request timed out.")]
	Timeout,
	/// Response declared JSON but the body could not be parsed.
	#[error("Response body is not valid JSON.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns the HTTP status carried by [`TransportError::Status`].
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } => Some(*status),
			_ => None,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Credential renewal failures.
#[derive(Debug, ThisError)]
pub enum CredentialError {
	/// Renewal callback returned a payload without an access token.
	#[error("No access token in response when getting a new access token.")]
	MissingAccessToken,
	/// Access token contains characters that cannot appear in an HTTP header.
	#[error("Access token cannot be used as an HTTP header value.")]
	InvalidToken,
	/// Declared `expires_in` cannot be represented as an expiry instant.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Authorization server rejected the renewal request.
	#[error("Token endpoint rejected the renewal: {error}.")]
	Rejected {
		/// OAuth error code.
		error: String,
		/// Optional human-readable description.
		description: Option<String>,
	},
	/// Token endpoint responded with a body that is not a token response.
	#[error("Token endpoint returned a malformed token response.")]
	MalformedGrant {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Renewal failed for a reason the token endpoint did not classify.
	#[error("Token renewal failed: {message}.")]
	Other {
		/// Description of the failure.
		message: String,
	},
}
