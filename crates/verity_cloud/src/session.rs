//! Authenticated control-plane session.

use chrono::{DateTime, Utc};

/// Bearer token. Never printed.
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// An authenticated session against the provider's control plane.
///
/// Built by a credential provider and passed by reference to every
/// inspector call. Not `Clone`; each run authenticates on its own and
/// renews when the token runs out.
#[derive(Debug)]
pub struct Session {
    subscription_id: String,
    tenant_id: Option<String>,
    token: AccessToken,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(subscription_id: impl Into<String>, token: AccessToken) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            tenant_id: None,
            token,
            expires_at: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the token expires before `now + margin`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at.is_some_and(|at| at <= now + margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_is_redacted() {
        let session = Session::new("sub-1", AccessToken::new("eyJ0eXAi.secret"));
        let debug = format!("{:?}", session);
        assert!(debug.contains("sub-1"));
        assert!(!debug.contains("eyJ0eXAi"));
        assert_eq!(session.token().secret(), "eyJ0eXAi.secret");
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let session = Session::new("sub-1", AccessToken::new("t")).expiring_at(now + Duration::minutes(5));
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::minutes(6)));

        assert!(!session.expires_within(now, Duration::minutes(4)));
        assert!(session.expires_within(now, Duration::minutes(5)));

        let no_expiry = Session::new("sub-1", AccessToken::new("t"));
        assert!(!no_expiry.is_expired(now));
        assert!(!no_expiry.expires_within(now, Duration::days(365)));
    }
}
