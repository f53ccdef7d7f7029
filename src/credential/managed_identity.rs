//! Managed identity credential for Azure-hosted workloads.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenScope},
	credential::{self, CredentialFuture, TokenCredential, UnixSeconds},
	error::{ConfigError, CredentialError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata},
};

const NAME: &str = "ManagedIdentityCredential";

/// Where the managed identity token is requested from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityEndpoint {
	/// Azure Instance Metadata Service reachable from VMs, VM scale sets and AKS nodes.
	Imds(Url),
	/// App Service / Functions identity endpoint guarded by a per-site header secret.
	AppService {
		/// Value of `IDENTITY_ENDPOINT`.
		endpoint: Url,
		/// Value of `IDENTITY_HEADER`.
		header: String,
	},
}
impl IdentityEndpoint {
	/// Well-known IMDS token endpoint.
	pub const IMDS_TOKEN_URL: &'static str = "http://169.254.169.254/metadata/identity/oauth2/token";

	const APP_SERVICE_API_VERSION: &'static str = "2019-08-01";
	const IMDS_API_VERSION: &'static str = "2018-02-01";

	/// Returns the default IMDS endpoint.
	pub fn imds() -> Result<Self, ConfigError> {
		Url::parse(Self::IMDS_TOKEN_URL)
			.map(Self::Imds)
			.map_err(|source| ConfigError::InvalidUrl { field: "IMDS endpoint", source })
	}

	/// Picks App Service when both its settings are present, IMDS otherwise.
	pub fn detect(endpoint: Option<&str>, header: Option<&str>) -> Result<Self, ConfigError> {
		match (endpoint, header) {
			(Some(endpoint), Some(header)) => Ok(Self::AppService {
				endpoint: Url::parse(endpoint)
					.map_err(|source| ConfigError::InvalidUrl { field: "identity endpoint", source })?,
				header: header.to_owned(),
			}),
			_ => Self::imds(),
		}
	}

	fn request_url(&self, resource: &str, client_id: Option<&str>) -> Url {
		let (mut url, api_version) = match self {
			Self::Imds(url) => (url.clone(), Self::IMDS_API_VERSION),
			Self::AppService { endpoint, .. } => (endpoint.clone(), Self::APP_SERVICE_API_VERSION),
		};

		{
			let mut query = url.query_pairs_mut();

			query.append_pair("api-version", api_version).append_pair("resource", resource);

			if let Some(client_id) = client_id {
				query.append_pair("client_id", client_id);
			}
		}

		url
	}
}

#[derive(Deserialize)]
struct ManagedIdentityToken {
	access_token: String,
	expires_on: UnixSeconds,
}

#[derive(Deserialize)]
struct ManagedIdentityError {
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
	#[serde(default)]
	message: Option<String>,
}

/// Fetches tokens for the system- or user-assigned identity of the host.
#[derive(Clone, Debug)]
pub struct ManagedIdentityCredential {
	endpoint: IdentityEndpoint,
	client_id: Option<String>,
	http_client: ReqwestHttpClient,
	timeout: Option<std::time::Duration>,
}
impl ManagedIdentityCredential {
	/// Creates a credential for `endpoint`; `client_id` selects a user-assigned identity.
	pub fn new(
		endpoint: IdentityEndpoint,
		client_id: Option<String>,
		http_client: ReqwestHttpClient,
	) -> Self {
		Self { endpoint, client_id, http_client, timeout: None }
	}

	/// Caps each identity request; keeps an unreachable IMDS from stalling a credential chain.
	pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Endpoint this credential talks to.
	pub fn endpoint(&self) -> &IdentityEndpoint {
		&self.endpoint
	}

	async fn request_token(&self, scope: &TokenScope) -> Result<AccessToken, CredentialError> {
		let url = self.endpoint.request_url(scope.as_resource(), self.client_id.as_deref());
		let mut request = self.http_client.get(url);

		request = match &self.endpoint {
			IdentityEndpoint::Imds(_) => request.header("Metadata", "true"),
			IdentityEndpoint::AppService { header, .. } => request.header("X-IDENTITY-HEADER", header),
		};

		if let Some(timeout) = self.timeout {
			request = request.timeout(timeout);
		}

		let response = request.send().await.map_err(map_send_error)?;
		let status = response.status();
		let meta = ResponseMetadata::from_parts(status.as_u16(), response.headers());
		let body = response.bytes().await.map_err(TransportError::from)?;

		if !status.is_success() {
			return Err(map_error_response(status.as_u16(), meta, &body));
		}

		let token: ManagedIdentityToken = credential::parse_json(&body, meta.status)?;

		AccessToken::expiring_at_unix(token.access_token, token.expires_on.seconds()?)
	}
}
impl TokenCredential for ManagedIdentityCredential {
	fn name(&self) -> &'static str {
		NAME
	}

	fn get_token<'a>(&'a self, scope: &'a TokenScope) -> CredentialFuture<'a> {
		Box::pin(self.request_token(scope))
	}
}

fn map_send_error(err: ReqwestError) -> CredentialError {
	if err.is_connect() || err.is_timeout() {
		CredentialError::unavailable(NAME, format!("identity endpoint is unreachable: {err}"))
	} else {
		TransportError::from(err).into()
	}
}

fn map_error_response(status: u16, meta: ResponseMetadata, body: &[u8]) -> CredentialError {
	let detail = serde_json::from_slice::<ManagedIdentityError>(body)
		.ok()
		.and_then(|err| err.error_description.or(err.message).or(err.error))
		.unwrap_or_else(|| String::from_utf8_lossy(body).chars().take(256).collect());

	match status {
		// IMDS answers 400 when the VM has no identity assigned.
		400 if detail.contains("Identity not found") =>
			CredentialError::unavailable(NAME, format!("no identity assigned: {detail}")),
		404 => CredentialError::unavailable(NAME, format!("identity endpoint not found: {detail}")),
		429 | 500..=599 => CredentialError::Endpoint {
			message: detail,
			status: meta.status,
			retry_after: meta.retry_after,
		},
		_ => CredentialError::Rejected { reason: format!("HTTP {status}: {detail}") },
	}
}
