//! Routing parameters carried in the inbound query string.

// crates.io
use axum::http::HeaderMap;
use url::form_urlencoded;
// self
use crate::error::ValidationError;

/// Validated routing parameters plus the caller's headers.
#[derive(Clone, Debug)]
pub struct ProxyRequestContext {
	/// Azure OpenAI resource name; becomes the first host label.
	pub resource: String,
	/// Model deployment name.
	pub deployment: String,
	/// Value forwarded as the `api-version` query parameter.
	pub api_version: String,
	/// Headers exactly as received.
	pub caller_headers: HeaderMap,
}
impl ProxyRequestContext {
	/// Extracts `resource`, `deployment` and `api_version` from a raw query string.
	///
	/// All three must be present and non-empty. When a key repeats, its first occurrence
	/// wins.
	pub fn from_query(query: Option<&str>, caller_headers: HeaderMap) -> Result<Self, ValidationError> {
		let (mut resource, mut deployment, mut api_version) = (None, None, None);

		for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
			let slot = match key.as_ref() {
				"resource" => &mut resource,
				"deployment" => &mut deployment,
				"api_version" => &mut api_version,
				_ => continue,
			};

			if slot.is_none() {
				*slot = Some(value.into_owned());
			}
		}

		match (resource, deployment, api_version) {
			(Some(resource), Some(deployment), Some(api_version))
				if !resource.is_empty() && !deployment.is_empty() && !api_version.is_empty() =>
				Ok(Self { resource, deployment, api_version, caller_headers }),
			_ => Err(ValidationError::MissingParameters),
		}
	}
}
