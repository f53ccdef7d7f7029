//! Process-wide bearer token cache with single-flight refresh.
//!
//! [`TokenCoordinator::obtain`] serves the cached token while it is outside the refresh
//! skew. Otherwise the first caller publishes a shared one-shot cell and spawns the
//! credential call that fills it; every caller that misses the cache while that cell is
//! published awaits the same cell and observes the same outcome. The refresh stores the
//! token and withdraws the cell before any waiter is released, so the next miss after a
//! completed refresh always starts a new one.
//!
//! The state mutex guards only pointer swaps and is never held across an `.await`.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenScope},
	credential::TokenCredential,
	error::CredentialError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

type RefreshOutcome = std::result::Result<AccessToken, Arc<CredentialError>>;
type RefreshCell = Arc<OnceCell<RefreshOutcome>>;

#[derive(Default)]
struct State {
	cached: Option<AccessToken>,
	in_flight: Option<RefreshCell>,
}

struct Inner {
	credential: Arc<dyn TokenCredential>,
	scope: TokenScope,
	state: Mutex<State>,
	metrics: RefreshMetrics,
}
impl Inner {
	async fn refresh(&self, cell: &RefreshCell) -> RefreshOutcome {
		const KIND: FlowKind = FlowKind::TokenRefresh;

		let span = FlowSpan::new(KIND, "obtain");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let outcome = span.instrument(self.credential.get_token(&self.scope)).await.map_err(Arc::new);

		{
			let mut state = self.state.lock();

			if let Ok(token) = &outcome {
				state.cached = Some(token.clone());
			}
			if state.in_flight.as_ref().is_some_and(|current| Arc::ptr_eq(current, cell)) {
				state.in_flight = None;
			}
		}

		match &outcome {
			Ok(token) => {
				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				tracing::info!(
					credential = self.credential.name(),
					expires_at = %token.expires_at,
					"upstream token refreshed"
				);
			},
			Err(e) => {
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				tracing::error!(
					credential = self.credential.name(),
					error = %e,
					"upstream token refresh failed"
				);
			},
		}

		outcome
	}
}

/// Owns the cached upstream token and collapses concurrent refreshes into one call.
///
/// Cloning is cheap and every clone shares the same cache.
#[derive(Clone)]
pub struct TokenCoordinator {
	inner: Arc<Inner>,
	skew: Duration,
}
impl TokenCoordinator {
	/// Refresh margin applied before the provider-reported expiry.
	pub const DEFAULT_SKEW: Duration = Duration::minutes(5);

	/// Creates a coordinator that fetches `scope` tokens from `credential`.
	pub fn new(credential: Arc<dyn TokenCredential>, scope: TokenScope) -> Self {
		Self {
			inner: Arc::new(Inner {
				credential,
				scope,
				state: Mutex::new(State::default()),
				metrics: RefreshMetrics::default(),
			}),
			skew: Self::DEFAULT_SKEW,
		}
	}

	/// Overrides the refresh skew; negative values are clamped to zero.
	pub fn with_skew(mut self, skew: Duration) -> Self {
		self.skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}

	/// Scope requested from the credential.
	pub fn scope(&self) -> &TokenScope {
		&self.inner.scope
	}

	/// Refresh skew in effect.
	pub fn skew(&self) -> Duration {
		self.skew
	}

	/// Counters describing cache and refresh activity.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.inner.metrics
	}

	/// Snapshot of the cached token, fresh or not.
	pub fn cached(&self) -> Option<AccessToken> {
		self.inner.state.lock().cached.clone()
	}

	/// Returns a token that is valid beyond the skew, refreshing it when needed.
	///
	/// Identity-provider failures are not retried and leave the cache untouched; every
	/// caller that joined the failed refresh receives the same shared error. The refresh
	/// runs on its own task, so dropping a caller never cancels it for the others.
	pub async fn obtain(&self) -> Result<AccessToken> {
		let now = OffsetDateTime::now_utc();
		let cell = {
			let mut state = self.inner.state.lock();

			if let Some(token) = state.cached.as_ref().filter(|token| token.is_fresh_at(now, self.skew))
			{
				self.inner.metrics.record_cache_hit();

				return Ok(token.clone());
			}

			match &state.in_flight {
				Some(cell) => {
					self.inner.metrics.record_joined();

					Arc::clone(cell)
				},
				None => {
					let cell = RefreshCell::default();

					state.in_flight = Some(Arc::clone(&cell));
					self.spawn_refresh(Arc::clone(&cell));

					cell
				},
			}
		};

		cell.wait().await.clone().map_err(Error::from)
	}

	fn spawn_refresh(&self, cell: RefreshCell) {
		let inner = Arc::clone(&self.inner);

		tokio::spawn(async move {
			let outcome = inner.refresh(&cell).await;

			// Only this task sets the cell, so the slot is always empty here.
			let _ = cell.set(outcome).await;
		});
	}
}
impl Debug for TokenCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.inner.state.lock();

		f.debug_struct("TokenCoordinator")
			.field("credential", &self.inner.credential.name())
			.field("scope", &self.inner.scope)
			.field("skew", &self.skew)
			.field("cached", &state.cached)
			.field("refreshing", &state.in_flight.is_some())
			.finish()
	}
}
