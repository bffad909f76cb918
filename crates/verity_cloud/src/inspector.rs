//! Read-only resource queries against the control plane.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CloudError, CloudResult};
use crate::session::Session;
use crate::snapshot::{ResourceSnapshot, ResourceTarget};

pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";

/// Reads the live state of one resource.
///
/// Implementations issue exactly one query per call and never retry;
/// retrying is the caller's decision.
#[async_trait]
pub trait ResourceInspector: Send + Sync {
    async fn inspect(&self, session: &Session, target: &ResourceTarget) -> CloudResult<ResourceSnapshot>;
}

#[derive(Deserialize)]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

#[derive(Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

fn arm_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ArmErrorBody>(body) {
        Ok(parsed) if !parsed.error.code.is_empty() => {
            format!("{}: {}", parsed.error.code, parsed.error.message)
        }
        _ => format!("HTTP {}", status.as_u16()),
    }
}

/// Map a non-success ARM response to an error kind.
pub fn classify_response(status: StatusCode, body: &str, target: &ResourceTarget) -> CloudError {
    let message = arm_error_message(status, body);
    match status.as_u16() {
        404 => CloudError::ResourceNotFound {
            group: target.resource_group.clone(),
            name: target.name.clone(),
        },
        401 | 403 => CloudError::Authorization(message),
        408 | 429 | 500..=599 => CloudError::Transient(message),
        code => CloudError::Api {
            status: code,
            message,
        },
    }
}

/// Azure Resource Manager inspector.
pub struct ArmInspector {
    http: reqwest::Client,
    endpoint: String,
}

impl ArmInspector {
    pub fn new() -> CloudResult<Self> {
        Self::with_endpoint(DEFAULT_RESOURCE_MANAGER_ENDPOINT)
    }

    /// Use a sovereign-cloud or test endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> CloudResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("verity/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CloudError::Http(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn resource_url(&self, subscription_id: &str, target: &ResourceTarget) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}/{}?api-version={}",
            self.endpoint.trim_end_matches('/'),
            subscription_id,
            target.resource_group,
            target.resource_type.trim_matches('/'),
            target.name,
            target.api_version
        )
    }
}

#[async_trait]
impl ResourceInspector for ArmInspector {
    async fn inspect(&self, session: &Session, target: &ResourceTarget) -> CloudResult<ResourceSnapshot> {
        let url = self.resource_url(session.subscription_id(), target);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(session.token().secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_response(status, &body, target));
        }

        let document: serde_json::Value = serde_json::from_str(&body)?;
        let snapshot = ResourceSnapshot::from_arm_json(target.clone(), &document);
        debug!("Read {} attributes of {}", snapshot.len(), target);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ResourceTarget {
        ResourceTarget::new(
            "rg-agents",
            "vmss-agents",
            "Microsoft.Compute/virtualMachineScaleSets",
            "2019-07-01",
        )
    }

    #[test]
    fn test_resource_url() {
        let inspector = ArmInspector::with_endpoint("https://management.azure.com/").unwrap();
        assert_eq!(
            inspector.resource_url("sub-1", &target()),
            "https://management.azure.com/subscriptions/sub-1/resourceGroups/rg-agents/providers/Microsoft.Compute/virtualMachineScaleSets/vmss-agents?api-version=2019-07-01"
        );
    }

    #[test]
    fn test_classify_not_found() {
        let body = r#"{"error":{"code":"ResourceNotFound","message":"The Resource 'vmss-agents' was not found."}}"#;
        let err = classify_response(StatusCode::NOT_FOUND, body, &target());
        assert!(matches!(err, CloudError::ResourceNotFound { ref name, .. } if name == "vmss-agents"));
    }

    #[test]
    fn test_classify_authorization() {
        let body = r#"{"error":{"code":"AuthorizationFailed","message":"does not have authorization"}}"#;
        let err = classify_response(StatusCode::FORBIDDEN, body, &target());
        match err {
            CloudError::Authorization(msg) => assert!(msg.starts_with("AuthorizationFailed")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_classify_transient_and_other() {
        assert!(classify_response(StatusCode::TOO_MANY_REQUESTS, "", &target()).is_transient());
        assert!(classify_response(StatusCode::SERVICE_UNAVAILABLE, "<html>", &target()).is_transient());

        let err = classify_response(StatusCode::BAD_REQUEST, "", &target());
        assert!(matches!(err, CloudError::Api { status: 400, ref message } if message == "HTTP 400"));
    }
}
