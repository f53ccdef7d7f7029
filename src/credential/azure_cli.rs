//! Developer credential backed by the signed-in Azure CLI session.

// std
use std::{io::ErrorKind, process::Stdio};
// crates.io
use time::{PrimitiveDateTime, macros::format_description};
use tokio::process::Command;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenScope},
	credential::{CredentialFuture, TokenCredential, UnixSeconds},
	error::{CredentialError, TransportError},
};

const NAME: &str = "AzureCliCredential";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
	access_token: String,
	#[serde(default, rename = "expires_on")]
	expires_on: Option<UnixSeconds>,
	#[serde(default, rename = "expiresOn")]
	expires_on_text: Option<String>,
}

/// Runs `az account get-access-token` for every request.
#[derive(Clone, Debug)]
pub struct AzureCliCredential {
	program: String,
	tenant_id: Option<String>,
}
impl AzureCliCredential {
	/// Uses the `az` executable on `PATH`.
	pub fn new(tenant_id: Option<String>) -> Self {
		Self { program: "az".into(), tenant_id }
	}

	/// Overrides the executable, mainly for tests and non-standard installs.
	pub fn with_program(mut self, program: impl Into<String>) -> Self {
		self.program = program.into();

		self
	}

	fn args<'a>(&'a self, scope: &'a TokenScope) -> Vec<&'a str> {
		let mut args =
			vec!["account", "get-access-token", "--output", "json", "--scope", scope.as_str()];

		if let Some(tenant) = &self.tenant_id {
			args.extend(["--tenant", tenant.as_str()]);
		}

		args
	}

	async fn request_token(&self, scope: &TokenScope) -> Result<AccessToken, CredentialError> {
		let output = Command::new(&self.program)
			.args(self.args(scope))
			.stdin(Stdio::null())
			.kill_on_drop(true)
			.output()
			.await
			.map_err(|e| match e.kind() {
				ErrorKind::NotFound =>
					CredentialError::unavailable(NAME, format!("`{}` was not found on PATH", self.program)),
				_ => TransportError::Io(e).into(),
			})?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			let stderr = stderr.trim();

			if stderr.contains("az login") || stderr.contains("az account set") {
				return Err(CredentialError::unavailable(NAME, "not signed in; run `az login`"));
			}

			return Err(CredentialError::Rejected {
				reason: format!("az exited with {}: {stderr}", output.status),
			});
		}

		parse_cli_token(&output.stdout)
	}
}
impl TokenCredential for AzureCliCredential {
	fn name(&self) -> &'static str {
		NAME
	}

	fn get_token<'a>(&'a self, scope: &'a TokenScope) -> CredentialFuture<'a> {
		Box::pin(self.request_token(scope))
	}
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken, CredentialError> {
	let token: CliToken = super::parse_json(stdout, None)?;

	// Newer CLI builds emit `expires_on` in Unix seconds; older ones only the local-time string.
	if let Some(expires_on) = token.expires_on {
		return AccessToken::expiring_at_unix(token.access_token, expires_on.seconds()?);
	}

	let text = token.expires_on_text.ok_or_else(|| {
		CredentialError::InvalidExpiry { reason: "az output carries no expiry".into() }
	})?;

	Ok(AccessToken::new(token.access_token, parse_expires_on(&text)?))
}

fn parse_expires_on(text: &str) -> Result<OffsetDateTime, CredentialError> {
	let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
	// Fractional seconds carry no useful precision for refresh decisions.
	let whole = text.trim().split('.').next().unwrap_or_default();

	PrimitiveDateTime::parse(whole, &format).map(PrimitiveDateTime::assume_utc).map_err(|e| {
		CredentialError::InvalidExpiry { reason: format!("expiresOn `{text}` is not a timestamp: {e}") }
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn unix_expiry_wins_over_local_text() {
		let token = parse_cli_token(
			br#"{"accessToken":"cli-token","expiresOn":"2024-12-31 17:00:00.000000","expires_on":1735693200,"tokenType":"Bearer"}"#,
		)
		.expect("CLI output with expires_on should parse.");

		assert_eq!(token.secret.expose(), "cli-token");
		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
	}

	#[test]
	fn legacy_output_falls_back_to_expires_on_text() {
		let token = parse_cli_token(
			br#"{"accessToken":"cli-token","expiresOn":"2025-01-01 01:00:00.123456"}"#,
		)
		.expect("Legacy CLI output should parse.");

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
	}

	#[test]
	fn output_without_expiry_is_rejected() {
		assert!(matches!(
			parse_cli_token(br#"{"accessToken":"cli-token"}"#),
			Err(CredentialError::InvalidExpiry { .. })
		));
	}

	#[test]
	fn args_include_tenant_when_configured() {
		let scope = TokenScope::default();
		let credential = AzureCliCredential::new(Some("contoso".into()));

		assert_eq!(
			credential.args(&scope),
			[
				"account",
				"get-access-token",
				"--output",
				"json",
				"--scope",
				"https://cognitiveservices.azure.com/.default",
				"--tenant",
				"contoso",
			]
		);
	}

	#[tokio::test]
	async fn missing_binary_is_unavailable() {
		let credential =
			AzureCliCredential::new(None).with_program("azure-openai-proxy-no-such-az-binary");
		let err = credential
			.get_token(&TokenScope::default())
			.await
			.expect_err("A missing executable should fail.");

		assert!(err.is_unavailable());
	}
}
