//! Session-level error types shared across the store, refresh, and request layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical session error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(#[from] crate::store::StoreError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; the caller's action may be retried by the user.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Configuration and validation failures raised by the session keeper.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// The API base URL cannot be joined with the refresh path.
	#[error("API base URL cannot address the refresh endpoint.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A stored token cannot be encoded as an `Authorization` header value.
	#[error("Stored token is not a valid Authorization header value.")]
	InvalidAuthorizationHeader {
		/// Underlying header encoding failure.
		#[source]
		source: reqwest::header::InvalidHeaderValue,
	},
	/// A request payload cannot be serialized to JSON.
	#[error("Request payload cannot be serialized to JSON.")]
	InvalidRequestBody {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// No refresh token is stored for the current session.
	#[error("No refresh token is stored for the current session.")]
	MissingRefreshToken,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Temporary failure variants surfaced by the refresh exchange.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Refresh endpoint returned a non-success status.
	#[error("Refresh endpoint returned an unexpected response: {message}.")]
	RefreshEndpoint {
		/// Short summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Refresh endpoint responded with JSON that could not be parsed.
	#[error("Refresh endpoint returned malformed JSON.")]
	RefreshResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Refresh endpoint answered successfully but carried no access token.
	#[error("Refresh endpoint response is missing an access token.")]
	MissingAccessToken,
	/// The in-flight refresh did not resolve within the bounded wait.
	#[error("Timed out waiting for the in-flight refresh to resolve.")]
	RefreshWaitTimeout,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
