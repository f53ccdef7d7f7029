//! Proxy-level error types shared across credentials, the coordinator, and the dispatcher.

// crates.io
use axum::http::StatusCode;
// self
use crate::_prelude::*;

/// Proxy-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical proxy error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Inbound request is missing or carries malformed routing parameters.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Identity provider could not produce a token.
	#[error("Credential could not be fetched.")]
	CredentialFetch(#[source] Arc<CredentialError>),
	/// Upstream call failed below the HTTP layer.
	#[error(transparent)]
	Forwarding(#[from] ForwardingError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Listener failed while serving.
	#[error("Server stopped with an I/O error.")]
	Serve(#[from] std::io::Error),
}
impl Error {
	/// Fixed message returned to callers when the proxy itself fails.
	pub const PROXY_FAILURE_MESSAGE: &'static str = "Proxy request failed";

	/// HTTP status surfaced to the caller for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::Validation(_) => StatusCode::BAD_REQUEST,
			Self::CredentialFetch(_) | Self::Forwarding(_) | Self::Config(_) | Self::Serve(_) =>
				StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Message safe to expose to the caller; never carries the underlying cause.
	pub fn client_message(&self) -> &'static str {
		match self {
			Self::Validation(err) => err.client_message(),
			_ => Self::PROXY_FAILURE_MESSAGE,
		}
	}
}
impl From<Arc<CredentialError>> for Error {
	fn from(e: Arc<CredentialError>) -> Self {
		Self::CredentialFetch(e)
	}
}
impl From<CredentialError> for Error {
	fn from(e: CredentialError) -> Self {
		Self::CredentialFetch(Arc::new(e))
	}
}

/// Caller mistakes detected before any token or upstream work happens.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// At least one of `resource`, `deployment`, `api_version` is absent or empty.
	#[error("Missing required query parameters: resource, deployment, api_version")]
	MissingParameters,
	/// The `resource` value cannot be used as a single DNS label.
	#[error("Resource `{resource}` is not a valid host label.")]
	InvalidResource {
		/// Offending value as received.
		resource: String,
	},
}
impl ValidationError {
	/// Message returned to the caller in the JSON error body.
	pub fn client_message(&self) -> &'static str {
		match self {
			Self::MissingParameters =>
				"Missing required query parameters: resource, deployment, api_version",
			Self::InvalidResource { .. } => "Invalid resource query parameter",
		}
	}
}

/// Failures raised by identity-provider credentials.
#[derive(Debug, ThisError)]
pub enum CredentialError {
	/// Credential is not configured or its endpoint is unreachable from this host.
	#[error("{credential} is unavailable: {reason}.")]
	Unavailable {
		/// Credential label.
		credential: &'static str,
		/// Why the credential could not be used.
		reason: String,
	},
	/// Identity provider refused to issue a token.
	#[error("Identity provider rejected the request: {reason}.")]
	Rejected {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Identity provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token response carried an expiry that is missing, non-positive, or out of range.
	#[error("Token response carries an invalid expiry: {reason}.")]
	InvalidExpiry {
		/// What was wrong with the expiry.
		reason: String,
	},
	/// Transport failure (DNS, TCP, TLS, process spawn).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Every source in a credential chain failed.
	#[error("No credential in the chain produced a token: {}.", .attempts.join("; "))]
	ChainExhausted {
		/// One line per attempted source.
		attempts: Vec<String>,
	},
}
impl CredentialError {
	/// Builds an [`CredentialError::Unavailable`] for the given credential label.
	pub fn unavailable(credential: &'static str, reason: impl Into<String>) -> Self {
		Self::Unavailable { credential, reason: reason.into() }
	}

	/// Returns `true` when a credential chain may move on to its next source.
	pub fn is_unavailable(&self) -> bool {
		matches!(self, Self::Unavailable { .. })
	}
}

/// Failures while relaying a request to the upstream service.
#[derive(Debug, ThisError)]
pub enum ForwardingError {
	/// Inbound request body could not be read.
	#[error("Inbound request body could not be read.")]
	InboundBody {
		/// Underlying body failure.
		#[source]
		source: BoxError,
	},
	/// Outbound request could not be built.
	#[error("Outbound request could not be built.")]
	Request {
		/// Underlying construction failure.
		#[source]
		source: BoxError,
	},
	/// Upstream could not be reached or the exchange broke mid-flight.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl ForwardingError {
	/// Wraps an inbound body read failure.
	pub fn inbound_body(src: impl Into<BoxError>) -> Self {
		Self::InboundBody { source: src.into() }
	}

	/// Wraps an outbound request construction failure.
	pub fn request(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Request { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ForwardingError {
	fn from(e: ReqwestError) -> Self {
		if e.is_builder() { Self::request(e) } else { Self::Transport(e.into()) }
	}
}

/// Configuration and validation failures raised at startup.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured URL cannot be parsed.
	#[error("Configured {field} is not a valid URL.")]
	InvalidUrl {
		/// Name of the offending setting.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Listener could not be bound.
	#[error("Could not listen on `{address}`.")]
	Bind {
		/// Address that was attempted.
		address: std::net::SocketAddr,
		/// Underlying socket failure.
		#[source]
		source: std::io::Error,
	},
	/// A credential was selected explicitly but its settings are incomplete.
	#[error("{credential} requires {missing}.")]
	MissingCredentialSetting {
		/// Credential label.
		credential: &'static str,
		/// Missing setting names.
		missing: &'static str,
	},
	/// Token scope is empty or contains whitespace.
	#[error("Token scope `{scope}` is invalid.")]
	InvalidScope {
		/// Offending scope string.
		scope: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling a remote endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling a remote endpoint.")]
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

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn validation_maps_to_bad_request_with_fixed_message() {
		let err = Error::from(ValidationError::MissingParameters);

		assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(
			err.client_message(),
			"Missing required query parameters: resource, deployment, api_version"
		);
	}

	#[test]
	fn credential_failure_hides_cause_from_client() {
		let err = Error::from(CredentialError::Rejected {
			reason: "AADSTS7000215: Invalid client secret provided".into(),
		});

		assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(err.client_message(), "Proxy request failed");
		assert!(!err.client_message().contains("AADSTS"));

		let source = StdError::source(&err).expect("Credential error should expose its cause.");

		assert!(source.to_string().contains("AADSTS7000215"));
	}

	#[test]
	fn chain_exhausted_lists_attempts() {
		let err = CredentialError::ChainExhausted {
			attempts: vec!["ManagedIdentityCredential: down".into(), "AzureCliCredential: gone".into()],
		};

		assert_eq!(
			err.to_string(),
			"No credential in the chain produced a token: ManagedIdentityCredential: down; AzureCliCredential: gone."
		);
	}
}
