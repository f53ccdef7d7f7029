//! Cached bearer token with its absolute expiry and freshness helpers.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret, error::CredentialError};

/// Freshness of an [`AccessToken`] relative to an instant and a refresh skew.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
	/// Token is valid beyond the skew margin and can be handed out.
	Fresh,
	/// Token is still valid but inside the skew margin; refresh before use.
	Stale,
	/// Token exceeded its expiry instant.
	Expired,
}

/// Bearer token returned by an identity provider.
///
/// `expires_at` is the absolute instant reported (or derived) from the provider
/// response; the token was valid for the requested scope when it was recorded.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
	/// Token secret; callers must avoid logging it.
	pub secret: TokenSecret,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Creates a token with an absolute expiry.
	pub fn new(secret: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { secret: TokenSecret::new(secret), expires_at }
	}

	/// Creates a token from a relative lifetime, rejecting non-positive durations.
	pub fn expiring_in(
		secret: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Result<Self, CredentialError> {
		if !expires_in.is_positive() {
			return Err(CredentialError::InvalidExpiry {
				reason: format!("expires_in must be positive, got {expires_in}"),
			});
		}

		let expires_at = issued_at.checked_add(expires_in).ok_or_else(|| {
			CredentialError::InvalidExpiry { reason: "expires_in exceeds the supported range".into() }
		})?;

		Ok(Self::new(secret, expires_at))
	}

	/// Creates a token from a Unix timestamp expressed in seconds.
	pub fn expiring_at_unix(secret: impl Into<String>, timestamp: i64) -> Result<Self, CredentialError> {
		let expires_at = OffsetDateTime::from_unix_timestamp(timestamp).map_err(|e| {
			CredentialError::InvalidExpiry { reason: format!("expires_on {timestamp} is out of range: {e}") }
		})?;

		Ok(Self::new(secret, expires_at))
	}

	/// Computes the freshness at `instant` given a refresh `skew`.
	pub fn status_at(&self, instant: OffsetDateTime, skew: Duration) -> TokenStatus {
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}
		if self.expires_at.checked_sub(skew).is_some_and(|refresh_at| instant < refresh_at) {
			return TokenStatus::Fresh;
		}

		TokenStatus::Stale
	}

	/// Returns `true` when the token may be served at `instant` without a refresh.
	pub fn is_fresh_at(&self, instant: OffsetDateTime, skew: Duration) -> bool {
		matches!(self.status_at(instant, skew), TokenStatus::Fresh)
	}

	/// Remaining lifetime at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("secret", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const SKEW: Duration = Duration::minutes(5);

	#[test]
	fn status_transitions_cover_all_states() {
		let token = AccessToken::new("access", macros::datetime!(2025-01-01 01:00 UTC));

		assert_eq!(token.status_at(macros::datetime!(2025-01-01 00:30 UTC), SKEW), TokenStatus::Fresh);
		assert_eq!(token.status_at(macros::datetime!(2025-01-01 00:55 UTC), SKEW), TokenStatus::Stale);
		assert_eq!(token.status_at(macros::datetime!(2025-01-01 00:57 UTC), SKEW), TokenStatus::Stale);
		assert_eq!(token.status_at(macros::datetime!(2025-01-01 01:00 UTC), SKEW), TokenStatus::Expired);
	}

	#[test]
	fn freshness_boundary_is_exclusive() {
		let token = AccessToken::new("access", macros::datetime!(2025-01-01 01:00 UTC));

		assert!(token.is_fresh_at(macros::datetime!(2025-01-01 00:54:59 UTC), SKEW));
		assert!(!token.is_fresh_at(macros::datetime!(2025-01-01 00:55 UTC), SKEW));
	}

	#[test]
	fn relative_expiry_requires_positive_lifetime() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = AccessToken::expiring_in("secret", issued, Duration::minutes(30))
			.expect("Positive lifetime should build a token.");

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 00:30 UTC));
		assert!(matches!(
			AccessToken::expiring_in("secret", issued, Duration::ZERO),
			Err(CredentialError::InvalidExpiry { .. })
		));
	}

	#[test]
	fn unix_expiry_parses_seconds() {
		let token = AccessToken::expiring_at_unix("secret", 1_735_693_200)
			.expect("Unix timestamp should be in range.");

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(token.remaining_at(macros::datetime!(2025-01-01 02:00 UTC)), Duration::ZERO);
	}

	#[test]
	fn debug_redacts_secret() {
		let token = AccessToken::new("super-secret", macros::datetime!(2025-01-01 01:00 UTC));

		assert!(!format!("{token:?}").contains("super-secret"));
	}
}
