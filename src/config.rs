//! Command-line and environment configuration.

// std
use std::net::{IpAddr, SocketAddr};
// crates.io
use clap::{Parser, ValueEnum};
// self
use crate::{
	_prelude::*,
	auth::TokenScope,
	credential::{
		AzureCliCredential, ClientSecretCredential, DefaultCredentialChain, ManagedIdentityCredential,
		TokenCredential, managed_identity::IdentityEndpoint,
	},
	error::ConfigError,
	http::ReqwestHttpClient,
	proxy::UpstreamSettings,
};

/// IMDS probe budget when managed identity is only one option in the chain.
const CHAIN_IMDS_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// Which identity source mints upstream tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CredentialKind {
	/// Client secret (when fully configured), then managed identity, then Azure CLI.
	#[default]
	Auto,
	/// Service principal with `--tenant-id`, `--client-id` and `--client-secret`.
	ClientSecret,
	/// App Service identity endpoint or IMDS.
	ManagedIdentity,
	/// `az account get-access-token`.
	AzureCli,
}

/// Azure OpenAI credential-injecting reverse proxy.
#[derive(Clone, Debug, Parser)]
#[command(name = "azure-openai-proxy", version, about)]
pub struct ProxyConfig {
	/// Port to listen on.
	#[arg(short, long, env = "AZURE_OPENAI_PROXY_PORT", default_value_t = 2000)]
	pub port: u16,
	/// Address to bind.
	#[arg(long, env = "AZURE_OPENAI_PROXY_BIND", default_value = "0.0.0.0")]
	pub bind: IpAddr,
	/// Scope requested from the identity provider.
	#[arg(long, env = "AZURE_OPENAI_PROXY_TOKEN_SCOPE", default_value = TokenScope::COGNITIVE_SERVICES)]
	pub token_scope: TokenScope,
	/// Domain appended to the resource label to form the upstream host.
	#[arg(long, env = "AZURE_OPENAI_PROXY_UPSTREAM_DOMAIN", default_value = UpstreamSettings::DEFAULT_DOMAIN)]
	pub upstream_domain: String,
	/// Seconds before expiry at which a cached token is refreshed.
	#[arg(long, env = "AZURE_OPENAI_PROXY_REFRESH_SKEW_SECS", default_value_t = 300)]
	pub refresh_skew_secs: u64,
	/// Identity source.
	#[arg(long, env = "AZURE_OPENAI_PROXY_CREDENTIAL", value_enum, default_value_t = CredentialKind::Auto)]
	pub credential: CredentialKind,
	/// Overall timeout for identity and upstream requests, in seconds.
	#[arg(long, env = "AZURE_OPENAI_PROXY_REQUEST_TIMEOUT_SECS", default_value_t = 600)]
	pub request_timeout_secs: u64,
	/// Largest inbound body accepted, in bytes.
	#[arg(long, env = "AZURE_OPENAI_PROXY_MAX_BODY_BYTES", default_value_t = 100 * 1024 * 1024)]
	pub max_body_bytes: usize,
	/// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence.
	#[arg(long, default_value = "info")]
	pub log_level: String,
	/// Output logs as JSON instead of human-readable.
	#[arg(long, default_value_t = false)]
	pub json_logs: bool,
	/// Entra ID tenant.
	#[arg(long, env = "AZURE_TENANT_ID")]
	pub tenant_id: Option<String>,
	/// Application (client) id; also selects a user-assigned managed identity.
	#[arg(long, env = "AZURE_CLIENT_ID")]
	pub client_id: Option<String>,
	/// Client secret for the service principal.
	#[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
	pub client_secret: Option<String>,
	/// Entra ID authority host.
	#[arg(long, env = "AZURE_AUTHORITY_HOST", default_value = ClientSecretCredential::DEFAULT_AUTHORITY_HOST)]
	pub authority_host: String,
	/// App Service managed identity endpoint.
	#[arg(long, env = "IDENTITY_ENDPOINT")]
	pub identity_endpoint: Option<String>,
	/// App Service managed identity header secret.
	#[arg(long, env = "IDENTITY_HEADER", hide_env_values = true)]
	pub identity_header: Option<String>,
}
impl ProxyConfig {
	/// Socket address the server binds.
	pub fn listen_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind, self.port)
	}

	/// Refresh skew as a [`Duration`].
	pub fn refresh_skew(&self) -> Duration {
		Duration::seconds(i64::try_from(self.refresh_skew_secs).unwrap_or(i64::MAX))
	}

	/// Timeout applied to every outbound HTTP request.
	pub fn request_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.request_timeout_secs)
	}

	/// Validated upstream settings.
	pub fn upstream_settings(&self) -> Result<UpstreamSettings, ConfigError> {
		UpstreamSettings::new(self.upstream_domain.as_str())
	}

	/// Builds the configured credential over `http_client`.
	pub fn build_credential(
		&self,
		http_client: &ReqwestHttpClient,
	) -> Result<Arc<dyn TokenCredential>, ConfigError> {
		match self.credential {
			CredentialKind::ClientSecret => match self.client_secret_credential(http_client)? {
				Some(credential) => Ok(Arc::new(credential)),
				None => Err(ConfigError::MissingCredentialSetting {
					credential: "ClientSecretCredential",
					missing: "--tenant-id, --client-id and --client-secret",
				}),
			},
			CredentialKind::ManagedIdentity =>
				Ok(Arc::new(self.managed_identity_credential(http_client)?)),
			CredentialKind::AzureCli => Ok(Arc::new(AzureCliCredential::new(self.tenant_id.clone()))),
			CredentialKind::Auto => {
				let mut sources = Vec::<Arc<dyn TokenCredential>>::with_capacity(3);

				if let Some(credential) = self.client_secret_credential(http_client)? {
					sources.push(Arc::new(credential));
				}

				let mut managed_identity = self.managed_identity_credential(http_client)?;

				if matches!(managed_identity.endpoint(), IdentityEndpoint::Imds(_)) {
					managed_identity = managed_identity.with_timeout(CHAIN_IMDS_TIMEOUT);
				}

				sources.push(Arc::new(managed_identity));
				sources.push(Arc::new(AzureCliCredential::new(self.tenant_id.clone())));

				Ok(Arc::new(DefaultCredentialChain::new(sources)))
			},
		}
	}

	fn client_secret_credential(
		&self,
		http_client: &ReqwestHttpClient,
	) -> Result<Option<ClientSecretCredential>, ConfigError> {
		let (Some(tenant_id), Some(client_id), Some(client_secret)) =
			(&self.tenant_id, &self.client_id, &self.client_secret)
		else {
			return Ok(None);
		};
		let authority_host = Url::parse(&self.authority_host)
			.map_err(|source| ConfigError::InvalidUrl { field: "authority host", source })?;

		ClientSecretCredential::new(
			&authority_host,
			tenant_id.as_str(),
			client_id.as_str(),
			client_secret.as_str(),
			http_client.clone(),
		)
		.map(Some)
	}

	fn managed_identity_credential(
		&self,
		http_client: &ReqwestHttpClient,
	) -> Result<ManagedIdentityCredential, ConfigError> {
		let endpoint = IdentityEndpoint::detect(
			self.identity_endpoint.as_deref(),
			self.identity_header.as_deref(),
		)?;

		Ok(ManagedIdentityCredential::new(endpoint, self.client_id.clone(), http_client.clone()))
	}
}
