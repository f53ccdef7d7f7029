//! Ordered fallback across credential sources.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use crate::{
	_prelude::*,
	auth::TokenScope,
	credential::{CredentialFuture, TokenCredential},
	error::CredentialError,
};

const UNSET: usize = usize::MAX;

/// Tries each source in order and remembers the first one that succeeds.
///
/// Only [`CredentialError::Unavailable`] moves the search to the next source. Once a
/// source has produced a token every later call goes straight to it, so a fallback never
/// masks the error of the source that used to work.
pub struct DefaultCredentialChain {
	sources: Vec<Arc<dyn TokenCredential>>,
	cached_source_index: AtomicUsize,
}
impl DefaultCredentialChain {
	/// Creates a chain over `sources`, tried front to back.
	pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
		Self { sources, cached_source_index: AtomicUsize::new(UNSET) }
	}

	/// Labels of the configured sources in try order.
	pub fn source_names(&self) -> Vec<&'static str> {
		self.sources.iter().map(|source| source.name()).collect()
	}

	/// Label of the source that last succeeded, if any.
	pub fn selected(&self) -> Option<&'static str> {
		self.sources.get(self.cached_source_index.load(Ordering::Relaxed)).map(|source| source.name())
	}
}
impl TokenCredential for DefaultCredentialChain {
	fn name(&self) -> &'static str {
		"DefaultCredentialChain"
	}

	fn get_token<'a>(&'a self, scope: &'a TokenScope) -> CredentialFuture<'a> {
		Box::pin(async move {
			if let Some(source) = self.sources.get(self.cached_source_index.load(Ordering::Relaxed)) {
				tracing::trace!(credential = source.name(), "using selected credential");

				return source.get_token(scope).await;
			}

			let mut attempts = Vec::with_capacity(self.sources.len());

			for (index, source) in self.sources.iter().enumerate() {
				match source.get_token(scope).await {
					Ok(token) => {
						tracing::info!(credential = source.name(), "credential selected");
						self.cached_source_index.store(index, Ordering::Relaxed);

						return Ok(token);
					},
					Err(e) if e.is_unavailable() => {
						tracing::debug!(credential = source.name(), error = %e, "credential unavailable");
						attempts.push(format!("{}: {e}", source.name()));
					},
					// A configured source that fails authoritatively ends the search.
					Err(e) => {
						tracing::warn!(credential = source.name(), error = %e, "credential failed");

						return Err(e);
					},
				}
			}

			if attempts.is_empty() {
				attempts.push("no credential sources configured".into());
			}

			Err(CredentialError::ChainExhausted { attempts })
		})
	}
}
impl Debug for DefaultCredentialChain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DefaultCredentialChain")
			.field("sources", &self.source_names())
			.field("selected", &self.selected())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicU32;
	// self
	use super::*;
	use crate::auth::AccessToken;

	#[derive(Clone, Copy)]
	enum Script {
		Succeed,
		Unavailable,
		Reject,
	}

	struct Scripted {
		name: &'static str,
		script: Script,
		calls: AtomicU32,
	}
	impl Scripted {
		fn new(name: &'static str, script: Script) -> Arc<Self> {
			Arc::new(Self { name, script, calls: AtomicU32::new(0) })
		}
	}
	impl TokenCredential for Scripted {
		fn name(&self) -> &'static str {
			self.name
		}

		fn get_token<'a>(&'a self, _: &'a TokenScope) -> CredentialFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let outcome = match self.script {
				Script::Succeed =>
					Ok(AccessToken::new(self.name, OffsetDateTime::now_utc() + Duration::hours(1))),
				Script::Unavailable => Err(CredentialError::unavailable(self.name, "not configured")),
				Script::Reject => Err(CredentialError::Rejected { reason: "AADSTS700016".into() }),
			};

			Box::pin(async move { outcome })
		}
	}

	#[tokio::test]
	async fn first_successful_source_is_remembered() {
		let broken = Scripted::new("broken", Script::Unavailable);
		let working = Scripted::new("working", Script::Succeed);
		let chain = DefaultCredentialChain::new(vec![
			broken.clone() as Arc<dyn TokenCredential>,
			working.clone() as Arc<dyn TokenCredential>,
		]);
		let scope = TokenScope::default();

		for _ in 0..3 {
			let token = chain.get_token(&scope).await.expect("Second source should succeed.");

			assert_eq!(token.secret.expose(), "working");
		}

		assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
		assert_eq!(working.calls.load(Ordering::SeqCst), 3);
		assert_eq!(chain.selected(), Some("working"));
	}

	#[tokio::test]
	async fn exhausted_chain_lists_every_attempt() {
		let chain = DefaultCredentialChain::new(vec![
			Scripted::new("first", Script::Unavailable) as Arc<dyn TokenCredential>,
			Scripted::new("second", Script::Unavailable) as Arc<dyn TokenCredential>,
		]);
		let err =
			chain.get_token(&TokenScope::default()).await.expect_err("Every source fails.");

		match err {
			CredentialError::ChainExhausted { attempts } => {
				assert_eq!(attempts.len(), 2);
				assert!(attempts[0].starts_with("first: "));
				assert!(attempts[1].starts_with("second: "));
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[tokio::test]
	async fn authoritative_failure_stops_the_search() {
		let rejecting = Scripted::new("rejecting", Script::Reject);
		let fallback = Scripted::new("fallback", Script::Succeed);
		let chain = DefaultCredentialChain::new(vec![
			rejecting.clone() as Arc<dyn TokenCredential>,
			fallback.clone() as Arc<dyn TokenCredential>,
		]);
		let err = chain
			.get_token(&TokenScope::default())
			.await
			.expect_err("A rejected configured source should not fall through.");

		assert!(matches!(err, CredentialError::Rejected { .. }));
		assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
		assert_eq!(chain.selected(), None);
	}
}
