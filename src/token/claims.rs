//! Claim set carried inside issued tokens.
//! Used by: token::sign, token::verify, handlers::issue, handlers::review.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthToken {
    pub username: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expiry: DateTime<Utc>,
}

impl AuthToken {
    /// Fails instead of overflowing when `ttl` pushes the expiry past what
    /// `DateTime<Utc>` can represent.
    pub fn new<I>(username: String, groups: I, ttl: Duration) -> Result<Self, Error>
    where
        I: IntoIterator<Item = String>,
    {
        let expiry = Utc::now().checked_add_signed(ttl).ok_or_else(|| {
            Error::TokenSerialization(format!("token lifetime {ttl} is out of range"))
        })?;
        Ok(Self::with_expiry(username, groups, expiry))
    }

    pub fn with_expiry<I>(username: String, groups: I, expiry: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            username,
            groups: groups.into_iter().collect(),
            expiry,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_token_expires_in_the_future() {
        let token = AuthToken::new("alice".into(), vec!["dev-ops".into()], Duration::hours(1)).unwrap();
        assert_eq!(token.username, "alice");
        assert!(token.groups.contains("dev-ops"));
        assert!(!token.is_expired());
    }

    #[test]
    fn zero_ttl_is_expired() {
        let token = AuthToken::new("alice".into(), Vec::new(), Duration::zero()).unwrap();
        assert!(token.is_expired());
    }

    #[test]
    fn groups_are_deduplicated_and_sorted() {
        let groups = vec!["ops".to_string(), "dev".to_string(), "ops".to_string()];
        let token = AuthToken::new("alice".into(), groups, Duration::hours(1)).unwrap();
        let ordered: Vec<_> = token.groups.iter().cloned().collect();
        assert_eq!(ordered, vec!["dev", "ops"]);
    }

    #[test]
    fn overflowing_lifetime_is_an_error() {
        let ttl = Duration::try_hours(3_000_000_000).unwrap();
        let result = AuthToken::new("alice".into(), Vec::new(), ttl);
        assert!(matches!(result, Err(Error::TokenSerialization(_))));
    }

    #[test]
    fn expiry_serializes_as_unix_seconds() -> Result<(), serde_json::Error> {
        let expiry = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = AuthToken::with_expiry("alice".into(), vec!["dev".into()], expiry);
        let json = serde_json::to_value(&token)?;
        assert_eq!(
            json,
            serde_json::json!({ "username": "alice", "groups": ["dev"], "exp": 1_700_000_000 })
        );
        Ok(())
    }
}
