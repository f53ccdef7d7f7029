//! Per-request relay: validate the routing query, attach the bearer token, rewrite onto
//! the deployment endpoint, and forward.
//!
//! Each request walks `Received -> Validated -> TokenAcquired -> Forwarded` and ends in
//! either a relayed upstream response or exactly one JSON error response. Nothing is
//! retried.

pub mod dispatcher;
pub mod forward;
pub mod outbound;
pub mod params;
pub mod target;

pub use dispatcher::ProxyDispatcher;
pub use forward::{ForwardFuture, Forwarder, ReqwestForwarder};
pub use outbound::{OutboundRequest, build_outbound_request};
pub use params::ProxyRequestContext;
pub use target::{UpstreamSettings, UpstreamTarget};

// crates.io
use axum::{
	Json,
	http::{HeaderMap, HeaderName, header},
	response::{IntoResponse, Response},
};
use serde_json::json;
// self
use crate::_prelude::*;

/// Header callers use to pass an Azure OpenAI API key; never forwarded.
pub const API_KEY_HEADER: &str = "api-key";

const HOP_BY_HOP: [HeaderName; 7] = [
	header::CONNECTION,
	HeaderName::from_static("keep-alive"),
	header::PROXY_AUTHENTICATE,
	header::PROXY_AUTHORIZATION,
	header::TE,
	header::TRAILER,
	header::TRANSFER_ENCODING,
];

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		(self.status_code(), Json(json!({ "error": self.client_message() }))).into_response()
	}
}

/// Removes hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
	let listed = headers
		.get_all(header::CONNECTION)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(','))
		.filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
		.collect::<Vec<_>>();

	for name in listed.iter().chain(HOP_BY_HOP.iter()) {
		headers.remove(name);
	}

	headers.remove(header::UPGRADE);
	headers.remove("proxy-connection");
}

/// Renders `err` followed by each of its sources, `: `-separated.
pub(crate) fn error_chain(err: &(dyn StdError + 'static)) -> String {
	let mut rendered = err.to_string();
	let mut source = err.source();

	while let Some(cause) = source {
		rendered.push_str(": ");
		rendered.push_str(&cause.to_string());

		source = cause.source();
	}

	rendered
}

#[cfg(test)]
mod tests {
	// crates.io
	use axum::http::{HeaderValue, StatusCode};
	// self
	use super::*;
	use crate::error::{CredentialError, ValidationError};

	#[test]
	fn hop_by_hop_and_connection_listed_headers_are_removed() {
		let mut headers = HeaderMap::new();

		headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
		headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
		headers.insert("x-trace", HeaderValue::from_static("1"));
		headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
		headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

		strip_hop_by_hop(&mut headers);

		assert_eq!(headers.len(), 1);
		assert!(headers.contains_key(header::CONTENT_TYPE));
	}

	#[test]
	fn error_response_uses_client_message() {
		let response = Error::from(ValidationError::MissingParameters).into_response();

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);

		let response =
			Error::from(CredentialError::Rejected { reason: "AADSTS7000215".into() }).into_response();

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn error_chain_walks_sources() {
		let err = Error::from(CredentialError::Rejected { reason: "AADSTS7000215".into() });

		assert_eq!(
			error_chain(&err),
			"Credential could not be fetched.: Identity provider rejected the request: AADSTS7000215."
		);
	}
}
