//! Request orchestration from inbound query to relayed response.

// crates.io
use axum::{
	body::Body,
	http::{Request, Response},
	response::IntoResponse,
};
// self
use crate::{
	_prelude::*,
	coordinator::TokenCoordinator,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	proxy::{self, Forwarder, ProxyRequestContext, UpstreamSettings, UpstreamTarget},
};

/// Turns one inbound request into one relayed response or one error response.
#[derive(Clone)]
pub struct ProxyDispatcher {
	coordinator: TokenCoordinator,
	forwarder: Arc<dyn Forwarder>,
	upstream: UpstreamSettings,
}
impl ProxyDispatcher {
	/// Wires the coordinator and forwarder together for `upstream`.
	pub fn new(
		coordinator: TokenCoordinator,
		forwarder: Arc<dyn Forwarder>,
		upstream: UpstreamSettings,
	) -> Self {
		Self { coordinator, forwarder, upstream }
	}

	/// Coordinator supplying bearer tokens.
	pub fn coordinator(&self) -> &TokenCoordinator {
		&self.coordinator
	}

	/// Handles one buffered inbound request.
	///
	/// Validation happens before any token or upstream work. Failures become a JSON
	/// `{"error": ..}` body whose message never carries the underlying cause.
	pub async fn dispatch(&self, request: Request<Bytes>) -> Response<Body> {
		const KIND: FlowKind = FlowKind::Proxy;

		let span = FlowSpan::new(KIND, "dispatch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		match span.instrument(self.relay(request)).await {
			Ok(response) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				tracing::debug!(status = response.status().as_u16(), "upstream response relayed");

				response
			},
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				match &e {
					Error::Validation(reason) =>
						tracing::debug!(error = %reason, "rejected proxy request"),
					_ => tracing::error!(error = %proxy::error_chain(&e), "proxy request failed"),
				}

				e.into_response()
			},
		}
	}

	async fn relay(&self, request: Request<Bytes>) -> Result<Response<Body>> {
		let (parts, body) = request.into_parts();
		let ctx = ProxyRequestContext::from_query(parts.uri.query(), parts.headers)?;
		let target = UpstreamTarget::resolve(&ctx, &self.upstream)?;
		let token = self.coordinator.obtain().await?;

		tracing::debug!(
			method = %parts.method,
			host = target.host(),
			deployment = %ctx.deployment,
			"forwarding request"
		);

		let outbound = proxy::build_outbound_request(&ctx, target, parts.method, body, &token)?;

		Ok(self.forwarder.forward(outbound).await?)
	}
}
impl Debug for ProxyDispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProxyDispatcher")
			.field("coordinator", &self.coordinator)
			.field("upstream", &self.upstream)
			.finish_non_exhaustive()
	}
}
