//! Shared fakes for integration tests.

#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicU32, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use axum::{
	body::Body,
	http::{Response, StatusCode},
};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use azure_openai_proxy::{
	auth::{AccessToken, TokenScope},
	credential::{CredentialFuture, TokenCredential},
	error::{CredentialError, ForwardingError, TransportError},
	proxy::{ForwardFuture, Forwarder, OutboundRequest},
};

/// Credential that counts calls and answers after an optional delay.
pub struct MockCredential {
	calls: AtomicU32,
	delay: StdDuration,
	lifetime: Duration,
	failure: Mutex<Option<String>>,
}
impl MockCredential {
	pub fn succeeding(lifetime: Duration) -> Arc<Self> {
		Arc::new(Self {
			calls: AtomicU32::new(0),
			delay: StdDuration::ZERO,
			lifetime,
			failure: Mutex::new(None),
		})
	}

	pub fn failing(reason: &str) -> Arc<Self> {
		let credential = Self::succeeding(Duration::hours(1));

		credential.fail_with(reason);

		credential
	}

	pub fn delayed(lifetime: Duration, delay: StdDuration) -> Arc<Self> {
		Arc::new(Self {
			calls: AtomicU32::new(0),
			delay,
			lifetime,
			failure: Mutex::new(None),
		})
	}

	pub fn fail_with(&self, reason: &str) {
		*self.failure.lock() = Some(reason.to_owned());
	}

	pub fn recover(&self) {
		*self.failure.lock() = None;
	}

	pub fn calls(&self) -> u32 {
		self.calls.load(Ordering::SeqCst)
	}
}
impl TokenCredential for MockCredential {
	fn name(&self) -> &'static str {
		"MockCredential"
	}

	fn get_token<'a>(&'a self, _: &'a TokenScope) -> CredentialFuture<'a> {
		Box::pin(async move {
			let call = self.calls.fetch_add(1, Ordering::SeqCst);

			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}

			let failure = self.failure.lock().clone();

			match failure {
				Some(reason) => Err(CredentialError::Rejected { reason }),
				None => Ok(AccessToken::new(
					format!("token-{call}"),
					OffsetDateTime::now_utc() + self.lifetime,
				)),
			}
		})
	}
}

/// Forwarder that records every request and answers with a canned response.
#[derive(Default)]
pub struct RecordingForwarder {
	requests: Mutex<Vec<OutboundRequest>>,
	reply: Mutex<Option<(StatusCode, Vec<(&'static str, &'static str)>, &'static str)>>,
	fail: Mutex<bool>,
}
impl RecordingForwarder {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn reply_with(
		&self,
		status: StatusCode,
		headers: Vec<(&'static str, &'static str)>,
		body: &'static str,
	) {
		*self.reply.lock() = Some((status, headers, body));
	}

	pub fn fail(&self) {
		*self.fail.lock() = true;
	}

	pub fn requests(&self) -> Vec<OutboundRequest> {
		self.requests.lock().clone()
	}
}
impl Forwarder for RecordingForwarder {
	fn forward(&self, request: OutboundRequest) -> ForwardFuture<'_> {
		self.requests.lock().push(request);

		let fail = *self.fail.lock();
		let reply = self.reply.lock().clone();

		Box::pin(async move {
			if fail {
				return Err(ForwardingError::Transport(TransportError::Io(std::io::Error::new(
					std::io::ErrorKind::ConnectionRefused,
					"upstream refused the connection",
				))));
			}

			let (status, headers, body) = reply.unwrap_or((StatusCode::OK, Vec::new(), "{}"));
			let mut response = Response::new(Body::from(body));

			*response.status_mut() = status;

			for (name, value) in headers {
				response.headers_mut().insert(name, value.parse().expect("Header fixture should parse."));
			}

			Ok(response)
		})
	}
}
