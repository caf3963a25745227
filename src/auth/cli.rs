//! Credentials borrowed from an operator's Azure CLI or Azure PowerShell session.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::process::Command;

use super::{scope_to_resource, AccessToken, TokenCredential};
use crate::error::{AzError, Result};

/// Run a tool and return trimmed stdout, or stderr as the error message.
async fn run_tool(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| AzError::unexpected(format!("failed to execute {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AzError::unexpected(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Local time, e.g. `2024-01-01 12:00:00.000000`.
    #[serde(default)]
    expires_on: Option<String>,
    /// Unix seconds. Present on Azure CLI 2.54 and later.
    #[serde(default, rename = "expires_on")]
    expires_on_unix: Option<i64>,
}

fn parse_cli_token(stdout: &str) -> Result<AccessToken> {
    let parsed: CliToken = serde_json::from_str(stdout)
        .map_err(|e| AzError::unexpected(format!("unexpected az output: {}", e)))?;

    let expires_on = match (parsed.expires_on_unix, parsed.expires_on.as_deref()) {
        (Some(unix), _) => Utc.timestamp_opt(unix, 0).single(),
        (None, Some(local)) => NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc)),
        (None, None) => None,
    }
    .ok_or_else(|| AzError::unexpected("az output carried no usable expiry"))?;

    Ok(AccessToken::new(parsed.access_token, expires_on))
}

/// Token from `az account get-access-token`.
#[derive(Debug, Default)]
pub struct AzureCliCredential;

impl AzureCliCredential {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let stdout = run_tool(
            "az",
            &[
                "account",
                "get-access-token",
                "--output",
                "json",
                "--resource",
                scope_to_resource(scope),
            ],
        )
        .await
        .map_err(|e| AzError::unexpected(format!("{}. Run 'az login' first.", e)))?;

        parse_cli_token(&stdout)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PowerShellToken {
    token: String,
    expires_on: i64,
}

fn parse_powershell_token(stdout: &str) -> Result<AccessToken> {
    let parsed: PowerShellToken = serde_json::from_str(stdout)
        .map_err(|e| AzError::unexpected(format!("unexpected pwsh output: {}", e)))?;
    let expires_on = Utc
        .timestamp_opt(parsed.expires_on, 0)
        .single()
        .ok_or_else(|| AzError::unexpected("pwsh output carried an invalid expiry"))?;
    Ok(AccessToken::new(parsed.token, expires_on))
}

fn powershell_script(resource: &str) -> String {
    // Az.Accounts 14+ returns the token as a SecureString.
    format!(
        "$ErrorActionPreference = 'Stop'; \
         $t = Get-AzAccessToken -ResourceUrl '{}'; \
         $v = if ($t.Token -is [securestring]) {{ ConvertFrom-SecureString -AsPlainText $t.Token }} else {{ $t.Token }}; \
         @{{ Token = $v; ExpiresOn = $t.ExpiresOn.ToUnixTimeSeconds() }} | ConvertTo-Json -Compress",
        resource
    )
}

/// Token from the operator's signed-in Az PowerShell session (`Get-AzAccessToken`).
#[derive(Debug, Default)]
pub struct AzurePowerShellCredential;

impl AzurePowerShellCredential {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TokenCredential for AzurePowerShellCredential {
    fn name(&self) -> &'static str {
        "AzurePowerShellCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let script = powershell_script(scope_to_resource(scope));
        let stdout = run_tool(
            "pwsh",
            &["-NoProfile", "-NonInteractive", "-Command", &script],
        )
        .await
        .map_err(|e| AzError::unexpected(format!("{}. Run 'Connect-AzAccount' first.", e)))?;

        parse_powershell_token(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_token_prefers_unix_expiry() {
        let token = parse_cli_token(
            r#"{"accessToken":"abc","expiresOn":"2024-01-01 00:00:00.000000","expires_on":1893456000,"tokenType":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.expires_on.timestamp(), 1893456000);
    }

    #[test]
    fn test_parse_cli_token_local_expiry() {
        let token = parse_cli_token(
            r#"{"accessToken":"abc","expiresOn":"2099-01-01 10:30:00.123456"}"#,
        )
        .unwrap();
        assert!(token.is_fresh());
    }

    #[test]
    fn test_parse_cli_token_rejects_missing_expiry() {
        assert!(parse_cli_token(r#"{"accessToken":"abc"}"#).is_err());
    }

    #[test]
    fn test_parse_powershell_token() {
        let token = parse_powershell_token(r#"{"Token":"xyz","ExpiresOn":4102444800}"#).unwrap();
        assert_eq!(token.token, "xyz");
        assert!(token.is_fresh());
    }

    #[test]
    fn test_powershell_script_targets_resource() {
        let script = powershell_script("https://management.azure.com");
        assert!(script.contains("-ResourceUrl 'https://management.azure.com'"));
    }
}
