//! Token scope requested from the identity provider.

// self
use crate::{_prelude::*, error::ConfigError};

/// Validated OAuth scope naming the upstream resource domain.
///
/// Entra ID v2.0 endpoints take a `{resource}/.default` scope while managed identity
/// endpoints take the bare resource, so the scope can render both forms.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenScope(Arc<str>);
impl TokenScope {
	/// Scope for Azure OpenAI and the rest of Cognitive Services.
	pub const COGNITIVE_SERVICES: &'static str = "https://cognitiveservices.azure.com/.default";

	const DEFAULT_SUFFIX: &'static str = "/.default";

	/// Validates and wraps a scope string.
	pub fn new(scope: impl Into<String>) -> Result<Self, ConfigError> {
		let scope = scope.into();

		if scope.is_empty() || scope.chars().any(char::is_whitespace) {
			return Err(ConfigError::InvalidScope { scope });
		}

		Ok(Self(scope.into()))
	}

	/// Returns the scope exactly as configured.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns the resource form (scope without the `/.default` suffix).
	pub fn as_resource(&self) -> &str {
		self.0.strip_suffix(Self::DEFAULT_SUFFIX).unwrap_or(&self.0)
	}
}
impl Default for TokenScope {
	fn default() -> Self {
		Self(Self::COGNITIVE_SERVICES.into())
	}
}
impl FromStr for TokenScope {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl TryFrom<String> for TokenScope {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<TokenScope> for String {
	fn from(value: TokenScope) -> Self {
		value.0.to_string()
	}
}
impl AsRef<str> for TokenScope {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}
impl Debug for TokenScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenScope").field(&self.as_str()).finish()
	}
}
impl Display for TokenScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_targets_cognitive_services() {
		let scope = TokenScope::default();

		assert_eq!(scope.as_str(), "https://cognitiveservices.azure.com/.default");
		assert_eq!(scope.as_resource(), "https://cognitiveservices.azure.com");
	}

	#[test]
	fn resource_form_keeps_scopes_without_default_suffix() {
		let scope = TokenScope::new("https://management.azure.com")
			.expect("Scope without suffix should be accepted.");

		assert_eq!(scope.as_resource(), "https://management.azure.com");
	}

	#[test]
	fn rejects_empty_and_whitespace() {
		assert!(matches!(TokenScope::new(""), Err(ConfigError::InvalidScope { .. })));
		assert!(matches!(
			"https://a.example/.default https://b.example/.default".parse::<TokenScope>(),
			Err(ConfigError::InvalidScope { .. })
		));
	}
}
