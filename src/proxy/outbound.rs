//! Pure construction of the request sent upstream.

// crates.io
use axum::http::{HeaderMap, Method, header};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::ForwardingError,
	proxy::{self, ProxyRequestContext, UpstreamTarget},
};

/// Fully rewritten request ready for a [`Forwarder`](crate::proxy::Forwarder).
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// Inbound method, unchanged.
	pub method: Method,
	/// Deployment endpoint; the inbound path and query are discarded.
	pub url: Url,
	/// Caller headers minus credentials and hop-by-hop fields, plus `Authorization`.
	pub headers: HeaderMap,
	/// Inbound body, unchanged.
	pub body: Bytes,
}

/// Rewrites the caller's request onto `target` with `token` as the only credential.
///
/// The caller's `api-key` is dropped. `Host` and `Content-Length` are left for the client
/// to derive from the new URL and body.
pub fn build_outbound_request(
	ctx: &ProxyRequestContext,
	target: UpstreamTarget,
	method: Method,
	body: Bytes,
	token: &AccessToken,
) -> Result<OutboundRequest, ForwardingError> {
	let mut headers = ctx.caller_headers.clone();

	proxy::strip_hop_by_hop(&mut headers);
	headers.remove(proxy::API_KEY_HEADER);
	headers.remove(header::HOST);
	headers.remove(header::CONTENT_LENGTH);
	headers.insert(
		header::AUTHORIZATION,
		token.secret.bearer_header().map_err(ForwardingError::request)?,
	);

	Ok(OutboundRequest { method, url: target.url, headers, body })
}
