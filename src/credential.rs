//! Identity-provider credentials that mint bearer tokens for a scope.
//!
//! [`TokenCredential`] is the only contract the [`TokenCoordinator`](crate::coordinator::TokenCoordinator)
//! depends on. The built-in sources mirror the usual Azure chain:
//!
//! - [`ClientSecretCredential`] runs the OAuth 2.0 client-credentials grant against Entra ID.
//! - [`ManagedIdentityCredential`] asks the App Service identity endpoint or IMDS.
//! - [`AzureCliCredential`] shells out to `az account get-access-token`.
//! - [`DefaultCredentialChain`] tries the above in order and sticks with the first that works.

pub mod azure_cli;
pub mod chain;
pub mod client_secret;
pub mod managed_identity;

pub use azure_cli::AzureCliCredential;
pub use chain::DefaultCredentialChain;
pub use client_secret::ClientSecretCredential;
pub use managed_identity::ManagedIdentityCredential;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenScope},
	error::CredentialError,
};

/// Boxed future returned by [`TokenCredential::get_token`].
pub type CredentialFuture<'a> =
	Pin<Box<dyn Future<Output = Result<AccessToken, CredentialError>> + 'a + Send>>;

/// Source of bearer tokens for a single scope.
///
/// Implementations perform exactly one remote exchange per call; caching, freshness and
/// single-flight coordination live in the coordinator.
pub trait TokenCredential
where
	Self: Send + Sync,
{
	/// Stable label used in logs and chain diagnostics.
	fn name(&self) -> &'static str;

	/// Requests a token for `scope`.
	fn get_token<'a>(&'a self, scope: &'a TokenScope) -> CredentialFuture<'a>;
}
impl<T> TokenCredential for Arc<T>
where
	T: ?Sized + TokenCredential,
{
	fn name(&self) -> &'static str {
		(**self).name()
	}

	fn get_token<'a>(&'a self, scope: &'a TokenScope) -> CredentialFuture<'a> {
		(**self).get_token(scope)
	}
}

/// `expires_on` as emitted by Azure token endpoints: either a JSON number or a string of
/// Unix seconds.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UnixSeconds {
	Number(i64),
	Text(String),
}
impl UnixSeconds {
	pub(crate) fn seconds(&self) -> Result<i64, CredentialError> {
		match self {
			Self::Number(value) => Ok(*value),
			Self::Text(raw) => raw.trim().parse().map_err(|_| CredentialError::InvalidExpiry {
				reason: format!("expires_on `{raw}` is not a Unix timestamp"),
			}),
		}
	}
}

pub(crate) fn parse_json<T>(body: &[u8], status: Option<u16>) -> Result<T, CredentialError>
where
	T: for<'de> Deserialize<'de>,
{
	let deserializer = &mut serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(deserializer)
		.map_err(|source| CredentialError::ResponseParse { source, status })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, Deserialize)]
	struct Expiry {
		expires_on: UnixSeconds,
	}

	#[test]
	fn expires_on_accepts_numbers_and_strings() {
		let number: Expiry = parse_json(br#"{"expires_on":1735693200}"#, None)
			.expect("Numeric expires_on should parse.");
		let text: Expiry = parse_json(br#"{"expires_on":"1735693200"}"#, None)
			.expect("String expires_on should parse.");

		assert_eq!(number.expires_on.seconds().expect("Number should convert."), 1_735_693_200);
		assert_eq!(text.expires_on.seconds().expect("Text should convert."), 1_735_693_200);
	}

	#[test]
	fn malformed_json_reports_path() {
		let err = parse_json::<Expiry>(br#"{"expires_on":true}"#, Some(200))
			.expect_err("Boolean expires_on should be rejected.");

		assert!(matches!(err, CredentialError::ResponseParse { status: Some(200), .. }));
	}
}
