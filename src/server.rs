//! HTTP front end: a health probe plus a catch-all proxy route.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Router,
	body::{self, Body},
	extract::{Request, State},
	http::Response,
	response::IntoResponse,
	routing::get,
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
// self
use crate::{
	_prelude::*,
	config::ProxyConfig,
	coordinator::TokenCoordinator,
	error::{ConfigError, ForwardingError},
	http::ReqwestHttpClient,
	proxy::{self, ProxyDispatcher, ReqwestForwarder},
};

/// State shared by every handler.
#[derive(Clone, Debug)]
pub struct AppState {
	dispatcher: ProxyDispatcher,
	max_body_bytes: usize,
}
impl AppState {
	/// Bundles the dispatcher with the inbound body limit.
	pub fn new(dispatcher: ProxyDispatcher, max_body_bytes: usize) -> Self {
		Self { dispatcher, max_body_bytes }
	}
}

/// Builds the router: `GET /healthz` answers locally, everything else is proxied.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/healthz", get(healthz).fallback(relay))
		.fallback(relay)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Wires credentials, coordinator and forwarder from `config`, then serves until Ctrl-C or
/// SIGTERM.
pub async fn serve(config: ProxyConfig) -> Result<()> {
	let http_client = ReqwestHttpClient::build(config.request_timeout())?;
	let credential = config.build_credential(&http_client)?;

	tracing::info!(credential = credential.name(), scope = %config.token_scope, "credential configured");

	let coordinator = TokenCoordinator::new(credential, config.token_scope.clone())
		.with_skew(config.refresh_skew());
	let dispatcher = ProxyDispatcher::new(
		coordinator,
		Arc::new(ReqwestForwarder::new(http_client)),
		config.upstream_settings()?,
	);
	let address = config.listen_addr();
	let listener =
		TcpListener::bind(address).await.map_err(|source| ConfigError::Bind { address, source })?;

	log_usage(listener.local_addr()?);

	axum::serve(listener, router(AppState::new(dispatcher, config.max_body_bytes)))
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	tracing::info!("azure openai proxy stopped");

	Ok(())
}

async fn healthz() -> &'static str {
	"ok"
}

async fn relay(State(state): State<AppState>, request: Request) -> Response<Body> {
	let (parts, body) = request.into_parts();
	let body = match body::to_bytes(body, state.max_body_bytes).await {
		Ok(body) => body,
		Err(e) => {
			let e = Error::from(ForwardingError::inbound_body(e));

			tracing::error!(error = %proxy::error_chain(&e), "inbound body could not be read");

			return e.into_response();
		},
	};

	state.dispatcher.dispatch(Request::from_parts(parts, body)).await
}

fn log_usage(address: SocketAddr) {
	let port = address.port();

	tracing::info!("azure openai proxy running on http://{address}");
	tracing::info!(
		"usage: curl 'http://localhost:{port}/?resource=RESOURCE&deployment=DEPLOYMENT&api_version=API_VERSION' \
		 -H 'Content-Type: application/json' -d '{{\"messages\": [{{\"role\": \"user\", \"content\": \"Hello\"}}]}}'"
	);
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			tracing::warn!(error = %e, "ctrl-c handler unavailable");
			std::future::pending::<()>().await;
		}
	};
	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			},
			Err(e) => {
				tracing::warn!(error = %e, "SIGTERM handler unavailable");
				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
	// crates.io
	use axum::http::{Method, StatusCode};
	// self
	use super::*;
	use crate::{
		auth::{AccessToken, TokenScope},
		credential::{CredentialFuture, TokenCredential},
		proxy::{ForwardFuture, Forwarder, OutboundRequest, UpstreamSettings},
	};

	struct Stub;
	impl TokenCredential for Stub {
		fn name(&self) -> &'static str {
			"stub"
		}

		fn get_token<'a>(&'a self, _: &'a TokenScope) -> CredentialFuture<'a> {
			Box::pin(async { Ok(AccessToken::new("T", OffsetDateTime::now_utc() + Duration::hours(1))) })
		}
	}
	impl Forwarder for Stub {
		fn forward(&self, _: OutboundRequest) -> ForwardFuture<'_> {
			Box::pin(async { Ok(Response::new(Body::from("relayed"))) })
		}
	}

	fn state(max_body_bytes: usize) -> AppState {
		let coordinator = TokenCoordinator::new(Arc::new(Stub), TokenScope::default());

		AppState::new(
			ProxyDispatcher::new(coordinator, Arc::new(Stub), UpstreamSettings::default()),
			max_body_bytes,
		)
	}

	async fn call(state: AppState, request: Request) -> (StatusCode, Bytes) {
		use tower::ServiceExt;

		let response = router(state).oneshot(request).await.expect("Router is infallible.");
		let status = response.status();
		let body = body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("Response body should be readable.");

		(status, body)
	}

	fn request(method: Method, uri: &str, body: &'static str) -> Request {
		axum::http::Request::builder()
			.method(method)
			.uri(uri)
			.body(Body::from(body))
			.expect("Fixture request should build.")
	}

	#[tokio::test]
	async fn healthz_answers_locally() {
		let (status, body) = call(state(1024), request(Method::GET, "/healthz", "")).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, "ok");
	}

	#[tokio::test]
	async fn any_other_path_and_method_is_proxied() {
		for (method, uri) in [
			(Method::POST, "/?resource=foo&deployment=bar&api_version=v1"),
			(Method::PUT, "/deep/path?resource=foo&deployment=bar&api_version=v1"),
			(Method::POST, "/healthz?resource=foo&deployment=bar&api_version=v1"),
		] {
			let (status, body) = call(state(1024), request(method, uri, "{}")).await;

			assert_eq!(status, StatusCode::OK, "{uri}");
			assert_eq!(body, "relayed");
		}
	}

	#[tokio::test]
	async fn oversized_body_is_a_proxy_failure() {
		let (status, body) = call(
			state(4),
			request(Method::POST, "/?resource=foo&deployment=bar&api_version=v1", "too large"),
		)
		.await;

		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body, r#"{"error":"Proxy request failed"}"#);
	}
}
