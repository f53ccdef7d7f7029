//! Service-principal credential using the OAuth 2.0 client-credentials grant.

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenScope},
	credential::{CredentialFuture, TokenCredential},
	error::{ConfigError, CredentialError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Authenticates as an Entra ID application with a client secret.
///
/// Tokens are requested from `{authority}/{tenant}/oauth2/v2.0/token`; the secret is sent
/// in the request body as Entra ID expects.
pub struct ClientSecretCredential {
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestHttpClient,
	tenant_id: String,
}
impl ClientSecretCredential {
	/// Public-cloud authority host.
	pub const DEFAULT_AUTHORITY_HOST: &'static str = "https://login.microsoftonline.com";

	/// Builds the credential for `tenant_id`/`client_id` against `authority_host`.
	pub fn new(
		authority_host: &Url,
		tenant_id: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		http_client: ReqwestHttpClient,
	) -> Result<Self, ConfigError> {
		let tenant_id = tenant_id.into();
		let token_url = token_endpoint(authority_host, &tenant_id)?;
		let oauth_client = BasicClient::new(ClientId::new(client_id.into()))
			.set_client_secret(ClientSecret::new(client_secret.into()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(
				TokenUrl::new(token_url.to_string())
					.map_err(|source| ConfigError::InvalidUrl { field: "authority host", source })?,
			);

		Ok(Self { oauth_client, http_client, tenant_id })
	}

	/// Token endpoint this credential posts to.
	pub fn token_url(&self) -> &str {
		self.oauth_client.token_uri().url().as_str()
	}

	async fn request_token(&self, scope: &TokenScope) -> Result<AccessToken, CredentialError> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let response = self
			.oauth_client
			.exchange_client_credentials()
			.add_scope(Scope::new(scope.as_str().to_owned()))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err))?;
		let expires_in = response.expires_in().ok_or_else(|| CredentialError::InvalidExpiry {
			reason: "token response is missing expires_in".into(),
		})?;
		let expires_in = i64::try_from(expires_in.as_secs()).map_err(|_| {
			CredentialError::InvalidExpiry { reason: "expires_in exceeds the supported range".into() }
		})?;

		AccessToken::expiring_in(
			response.access_token().secret().to_owned(),
			OffsetDateTime::now_utc(),
			Duration::seconds(expires_in),
		)
	}
}
impl TokenCredential for ClientSecretCredential {
	fn name(&self) -> &'static str {
		"ClientSecretCredential"
	}

	fn get_token<'a>(&'a self, scope: &'a TokenScope) -> CredentialFuture<'a> {
		Box::pin(async move {
			let token = self.request_token(scope).await;

			match &token {
				Ok(token) => tracing::debug!(
					tenant = %self.tenant_id,
					expires_at = %token.expires_at,
					"client secret token issued"
				),
				Err(e) => tracing::debug!(tenant = %self.tenant_id, error = %e, "client secret token failed"),
			}

			token
		})
	}
}
impl Debug for ClientSecretCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientSecretCredential")
			.field("tenant_id", &self.tenant_id)
			.field("client_id", &self.oauth_client.client_id().as_str())
			.field("client_secret", &"<redacted>")
			.finish()
	}
}

fn token_endpoint(authority_host: &Url, tenant_id: &str) -> Result<Url, ConfigError> {
	let mut url = authority_host.clone();

	url.path_segments_mut()
		.map_err(|_| ConfigError::InvalidUrl {
			field: "authority host",
			source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
		})?
		.pop_if_empty()
		.extend([tenant_id, "oauth2", "v2.0", "token"]);

	Ok(url)
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> CredentialError {
	let status = meta.as_ref().and_then(|value| value.status);
	let retry_after = meta.as_ref().and_then(|value| value.retry_after);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(response, status, retry_after),
		RequestTokenError::Request(error) => map_transport_error(error, status, retry_after),
		RequestTokenError::Parse(source, _body) => CredentialError::ResponseParse { source, status },
		RequestTokenError::Other(message) =>
			CredentialError::Endpoint { message, status, retry_after },
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> CredentialError {
	let message = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_string(),
	};

	// Entra ID reports throttling and outages with 429/5xx alongside an OAuth error body.
	match status {
		Some(code) if code == 429 || code >= 500 =>
			CredentialError::Endpoint { message, status, retry_after },
		_ => CredentialError::Rejected { reason: message },
	}
}

fn map_transport_error(
	err: HttpClientError<ReqwestError>,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> CredentialError {
	match err {
		HttpClientError::Reqwest(inner) if inner.is_timeout() => CredentialError::Endpoint {
			message: "Request timed out while calling the token endpoint".into(),
			status,
			retry_after,
		},
		HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Http(inner) => CredentialError::Endpoint {
			message: format!("Token request could not be built: {inner}"),
			status,
			retry_after,
		},
		HttpClientError::Other(message) => CredentialError::Endpoint { message, status, retry_after },
		_ => CredentialError::Endpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status,
			retry_after,
		},
	}
}
