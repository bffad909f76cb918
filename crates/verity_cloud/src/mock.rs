//! Mock credential provider and inspector for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::credentials::CredentialProvider;
use crate::error::{CloudError, CloudResult};
use crate::inspector::ResourceInspector;
use crate::session::{AccessToken, Session};
use crate::snapshot::{AttributeValue, ResourceSnapshot, ResourceTarget};

/// Credential provider that succeeds with a fixed subscription or fails.
#[derive(Clone)]
pub struct MockCredentials {
    subscription_id: String,
    failure: Option<String>,
    /// Calls that succeed before `failure` applies.
    successes_before_failure: usize,
    lifetime: Option<Duration>,
    calls: Arc<RwLock<usize>>,
}

impl MockCredentials {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            failure: None,
            successes_before_failure: 0,
            lifetime: None,
            calls: Arc::new(RwLock::new(0)),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new("")
        }
    }

    /// Succeed `calls` times, then fail with `message`.
    pub fn failing_after(mut self, calls: usize, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self.successes_before_failure = calls;
        self
    }

    /// Issue sessions that expire `lifetime` after authentication.
    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn call_count(&self) -> usize {
        *self.calls.read()
    }
}

#[async_trait]
impl CredentialProvider for MockCredentials {
    async fn authenticate(&self) -> CloudResult<Session> {
        let call = {
            let mut calls = self.calls.write();
            *calls += 1;
            *calls
        };
        if let Some(msg) = &self.failure {
            if call > self.successes_before_failure {
                return Err(CloudError::Authentication(msg.clone()));
            }
        }

        let session = Session::new(&self.subscription_id, AccessToken::new(format!("mock-token-{}", call)));
        Ok(match self.lifetime {
            Some(lifetime) => {
                let lifetime = chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::zero());
                session.expiring_at(Utc::now() + lifetime)
            }
            None => session,
        })
    }
}

/// Scripted answer to one inspect call.
#[derive(Debug, Clone)]
pub enum MockInspection {
    Found(BTreeMap<String, AttributeValue>),
    NotFound,
    Unauthorized(String),
    Transient(String),
}

impl MockInspection {
    pub fn found<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, AttributeValue)>,
        K: Into<String>,
    {
        MockInspection::Found(attributes.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Inspector answering from a per-resource script.
///
/// Answers for a resource are consumed in order and the last one repeats.
/// Unknown resources are not found.
#[derive(Clone, Default)]
pub struct MockInspector {
    script: Arc<RwLock<HashMap<(String, String), Vec<MockInspection>>>>,
    calls: Arc<RwLock<Vec<ResourceTarget>>>,
    reject_expired: bool,
}

impl MockInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, group: &str, name: &str, answers: Vec<MockInspection>) -> Self {
        self.script
            .write()
            .insert((group.to_string(), name.to_string()), answers);
        self
    }

    /// Answer `Authorization` for sessions whose token has expired.
    pub fn rejecting_expired_sessions(mut self) -> Self {
        self.reject_expired = true;
        self
    }

    pub fn calls(&self) -> Vec<ResourceTarget> {
        self.calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }

    fn next_answer(&self, target: &ResourceTarget) -> MockInspection {
        let key = (target.resource_group.clone(), target.name.clone());
        let mut script = self.script.write();
        match script.get_mut(&key) {
            Some(answers) if answers.len() > 1 => answers.remove(0),
            Some(answers) => answers.first().cloned().unwrap_or(MockInspection::NotFound),
            None => MockInspection::NotFound,
        }
    }
}

#[async_trait]
impl ResourceInspector for MockInspector {
    async fn inspect(&self, session: &Session, target: &ResourceTarget) -> CloudResult<ResourceSnapshot> {
        self.calls.write().push(target.clone());
        if self.reject_expired && session.is_expired(Utc::now()) {
            return Err(CloudError::Authorization("ExpiredAuthenticationToken".to_string()));
        }

        match self.next_answer(target) {
            MockInspection::Found(attributes) => Ok(attributes
                .into_iter()
                .fold(ResourceSnapshot::new(target.clone()), |snapshot, (k, v)| {
                    snapshot.with_attribute(k, v)
                })),
            MockInspection::NotFound => Err(CloudError::ResourceNotFound {
                group: target.resource_group.clone(),
                name: target.name.clone(),
            }),
            MockInspection::Unauthorized(msg) => Err(CloudError::Authorization(msg)),
            MockInspection::Transient(msg) => Err(CloudError::Transient(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str) -> ResourceTarget {
        ResourceTarget::new("rg", name, "Microsoft.Compute/virtualMachineScaleSets", "2019-07-01")
    }

    #[tokio::test]
    async fn test_mock_inspector_script_order() {
        let inspector = MockInspector::new().respond(
            "rg",
            "vmss",
            vec![
                MockInspection::NotFound,
                MockInspection::found([("sku.capacity", AttributeValue::Integer(3))]),
            ],
        );
        let session = MockCredentials::new("sub").authenticate().await.unwrap();

        assert!(inspector.inspect(&session, &target("vmss")).await.is_err());
        let snapshot = inspector.inspect(&session, &target("vmss")).await.unwrap();
        assert_eq!(snapshot.get("sku.capacity"), Some(&AttributeValue::Integer(3)));
        // last answer repeats
        assert!(inspector.inspect(&session, &target("vmss")).await.is_ok());
        assert!(inspector.inspect(&session, &target("other")).await.unwrap_err().is_not_found());
        assert_eq!(inspector.call_count(), 4);
    }

    #[tokio::test]
    async fn test_mock_credentials_failure() {
        let creds = MockCredentials::failing("expired secret");
        assert!(matches!(creds.authenticate().await, Err(CloudError::Authentication(_))));
        assert_eq!(creds.call_count(), 1);

        let creds = MockCredentials::new("sub").failing_after(1, "secret rotated");
        assert!(creds.authenticate().await.is_ok());
        assert!(creds.authenticate().await.is_err());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let creds = MockCredentials::new("sub").with_session_lifetime(Duration::from_millis(10));
        let inspector = MockInspector::new()
            .respond("rg", "vmss", vec![MockInspection::found([("sku.capacity", AttributeValue::Integer(3))])])
            .rejecting_expired_sessions();

        let session = creds.authenticate().await.unwrap();
        assert!(session.expires_at().is_some());
        assert!(inspector.inspect(&session, &target("vmss")).await.is_ok());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let err = inspector.inspect(&session, &target("vmss")).await.unwrap_err();
        assert!(matches!(err, CloudError::Authorization(ref msg) if msg == "ExpiredAuthenticationToken"));
    }
}
