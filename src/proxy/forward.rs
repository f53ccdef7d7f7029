//! Forwarding collaborator that performs the upstream exchange.

// crates.io
use axum::{body::Body, http::Response};
// self
use crate::{
	_prelude::*,
	error::ForwardingError,
	http::ReqwestHttpClient,
	proxy::{self, OutboundRequest},
};

/// Boxed future returned by [`Forwarder::forward`].
pub type ForwardFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Response<Body>, ForwardingError>> + 'a + Send>>;

/// Sends an [`OutboundRequest`] and hands back the upstream response.
///
/// Any HTTP status from upstream is a successful forward; only failures to complete the
/// exchange are errors.
pub trait Forwarder
where
	Self: Send + Sync,
{
	/// Performs one upstream exchange. Never retries.
	fn forward(&self, request: OutboundRequest) -> ForwardFuture<'_>;
}

/// [`Forwarder`] over the shared reqwest client; streams the upstream body back.
#[derive(Clone, Debug)]
pub struct ReqwestForwarder {
	http_client: ReqwestHttpClient,
}
impl ReqwestForwarder {
	/// Creates a forwarder over `http_client`, which must not follow redirects.
	pub fn new(http_client: ReqwestHttpClient) -> Self {
		Self { http_client }
	}
}
impl Forwarder for ReqwestForwarder {
	fn forward(&self, request: OutboundRequest) -> ForwardFuture<'_> {
		Box::pin(async move {
			let OutboundRequest { method, url, headers, body } = request;
			let upstream =
				self.http_client.request(method, url).headers(headers).body(body).send().await?;
			let status = upstream.status();
			let mut headers = upstream.headers().clone();

			proxy::strip_hop_by_hop(&mut headers);

			let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));

			*response.status_mut() = status;
			*response.headers_mut() = headers;

			Ok(response)
		})
	}
}
