//! Upstream host and path derived from the routing parameters.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, ValidationError},
	proxy::ProxyRequestContext,
};

/// Upstream settings shared by every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamSettings {
	domain: String,
}
impl UpstreamSettings {
	/// Public Azure OpenAI domain.
	pub const DEFAULT_DOMAIN: &'static str = "openai.azure.com";

	/// Uses `domain` as the suffix after the resource label.
	pub fn new(domain: impl Into<String>) -> Result<Self, ConfigError> {
		let domain = domain.into();
		let domain = domain.trim_matches('.').to_owned();

		Url::parse(&format!("https://resource.{domain}/"))
			.map_err(|source| ConfigError::InvalidUrl { field: "upstream domain", source })?;

		Ok(Self { domain })
	}

	/// Domain suffix in use.
	pub fn domain(&self) -> &str {
		&self.domain
	}
}
impl Default for UpstreamSettings {
	fn default() -> Self {
		Self { domain: Self::DEFAULT_DOMAIN.into() }
	}
}

/// Target computed fresh for every request; never cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamTarget {
	/// Absolute URL of the deployment's `chat/completions` operation.
	pub url: Url,
}
impl UpstreamTarget {
	/// Builds `https://{resource}.{domain}/openai/deployments/{deployment}/chat/completions?api-version={api_version}`.
	///
	/// `resource` must be a single DNS label so it cannot steer the request to another host.
	/// `deployment` and `api_version` are percent-encoded.
	pub fn resolve(
		ctx: &ProxyRequestContext,
		settings: &UpstreamSettings,
	) -> Result<Self, ValidationError> {
		let invalid = || ValidationError::InvalidResource { resource: ctx.resource.clone() };

		if !is_dns_label(&ctx.resource) {
			return Err(invalid());
		}

		let mut url = Url::parse(&format!("https://{}.{}/", ctx.resource, settings.domain))
			.map_err(|_| invalid())?;

		url.path_segments_mut().map_err(|_| invalid())?.pop_if_empty().extend([
			"openai",
			"deployments",
			ctx.deployment.as_str(),
			"chat",
			"completions",
		]);
		url.query_pairs_mut().append_pair("api-version", &ctx.api_version);

		Ok(Self { url })
	}

	/// Host the request is sent to.
	pub fn host(&self) -> &str {
		self.url.host_str().unwrap_or_default()
	}
}

fn is_dns_label(value: &str) -> bool {
	(1..=63).contains(&value.len())
		&& value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
		&& !value.starts_with('-')
		&& !value.ends_with('-')
}
