//! Credential providers.
//!
//! Credentials come from the ambient environment, the same variables the
//! Terraform azurerm provider reads, so one set of secrets serves both the
//! provisioning and the verification half of a run.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{CloudError, CloudResult};
use crate::session::{AccessToken, Session};

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const RESOURCE_MANAGER_SCOPE: &str = "https://management.azure.com/.default";

/// Obtains an authenticated session.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn authenticate(&self) -> CloudResult<Session>;
}

/// Service principal settings read from the environment.
#[derive(Clone)]
pub struct AzureCredentialConfig {
    pub subscription_id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub authority_host: String,
    pub scope: String,
}

impl std::fmt::Debug for AzureCredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentialConfig")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("authority_host", &self.authority_host)
            .finish()
    }
}

impl AzureCredentialConfig {
    /// Read `ARM_*` variables, falling back to their `AZURE_*` names.
    pub fn from_env() -> CloudResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> CloudResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |arm: &str, azure: &str| -> CloudResult<String> {
            lookup(arm)
                .or_else(|| lookup(azure))
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    CloudError::Authentication(format!(
                        "environment variable {} (or {}) is not set",
                        arm, azure
                    ))
                })
        };

        Ok(Self {
            subscription_id: require("ARM_SUBSCRIPTION_ID", "AZURE_SUBSCRIPTION_ID")?,
            tenant_id: require("ARM_TENANT_ID", "AZURE_TENANT_ID")?,
            client_id: require("ARM_CLIENT_ID", "AZURE_CLIENT_ID")?,
            client_secret: require("ARM_CLIENT_SECRET", "AZURE_CLIENT_SECRET")?,
            authority_host: lookup("AZURE_AUTHORITY_HOST")
                .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
            scope: RESOURCE_MANAGER_SCOPE.to_string(),
        })
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client-credentials flow for a service principal configured in the
/// environment.
pub struct EnvironmentCredentials {
    config: AzureCredentialConfig,
    http: reqwest::Client,
}

impl EnvironmentCredentials {
    pub fn new(config: AzureCredentialConfig) -> CloudResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("verity/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CloudError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> CloudResult<Self> {
        Self::new(AzureCredentialConfig::from_env()?)
    }

    pub fn subscription_id(&self) -> &str {
        &self.config.subscription_id
    }
}

#[async_trait]
impl CredentialProvider for EnvironmentCredentials {
    async fn authenticate(&self) -> CloudResult<Session> {
        let url = self.config.token_url();
        debug!("Requesting token from {}", url);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("scope", self.config.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CloudError::Authentication(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CloudError::Authentication(e.to_string()))?;

        if !status.is_success() {
            let reason = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{}: {}", e.error, desc),
                    None => e.error,
                })
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            return Err(CloudError::Authentication(reason));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| CloudError::Authentication(format!("invalid token response: {}", e)))?;

        let mut session = Session::new(&self.config.subscription_id, AccessToken::new(token.access_token))
            .with_tenant(&self.config.tenant_id);
        if let Some(secs) = token.expires_in {
            session = session.expiring_at(Utc::now() + chrono::Duration::seconds(secs));
        }

        info!(
            "Authenticated client {} for subscription {}",
            self.config.client_id, self.config.subscription_id
        );
        Ok(session)
    }
}

/// Pre-issued token, e.g. from `az account get-access-token`.
pub struct StaticCredentials {
    subscription_id: String,
    token: String,
}

impl StaticCredentials {
    pub fn new(subscription_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn authenticate(&self) -> CloudResult<Session> {
        if self.token.is_empty() {
            return Err(CloudError::Authentication("empty access token".to_string()));
        }
        Ok(Session::new(&self.subscription_id, AccessToken::new(&self.token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_from_arm_variables() {
        let config = AzureCredentialConfig::from_lookup(lookup(&[
            ("ARM_SUBSCRIPTION_ID", "sub"),
            ("ARM_TENANT_ID", "tenant"),
            ("ARM_CLIENT_ID", "client"),
            ("ARM_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.subscription_id, "sub");
        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/token"
        );
        assert!(!format!("{:?}", config).contains("secret\""));
    }

    #[test]
    fn test_config_falls_back_to_azure_names() {
        let config = AzureCredentialConfig::from_lookup(lookup(&[
            ("AZURE_SUBSCRIPTION_ID", "sub"),
            ("AZURE_TENANT_ID", "tenant"),
            ("ARM_CLIENT_ID", "client"),
            ("AZURE_CLIENT_SECRET", "secret"),
            ("AZURE_AUTHORITY_HOST", "https://login.example.test/"),
        ]))
        .unwrap();

        assert_eq!(config.tenant_id, "tenant");
        assert_eq!(
            config.token_url(),
            "https://login.example.test/tenant/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_missing_variable_is_authentication_error() {
        let err = AzureCredentialConfig::from_lookup(lookup(&[
            ("ARM_SUBSCRIPTION_ID", "sub"),
            ("ARM_TENANT_ID", "tenant"),
            ("ARM_CLIENT_ID", "  "),
        ]))
        .unwrap_err();

        match err {
            CloudError::Authentication(msg) => assert!(msg.contains("ARM_CLIENT_ID")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_static_credentials() {
        let session = StaticCredentials::new("sub", "token").authenticate().await.unwrap();
        assert_eq!(session.subscription_id(), "sub");

        let err = StaticCredentials::new("sub", "").authenticate().await.unwrap_err();
        assert!(matches!(err, CloudError::Authentication(_)));
    }
}
