//! Service bind, user search, user re-bind, attribute extraction.
//! Used by: state, handlers::issue.
//!
//! Each step consumes the previous state and yields the next one, so a
//! failure can only surface as the error kind owned by that step:
//!
//! `Connected` → `ServiceBound` → `UserResolved` → `UserBound` → [`Identity`]

use std::collections::BTreeSet;
use std::future::Future;

use async_trait::async_trait;
use ldap3::ldap_escape;

use crate::directory::{
    Authenticator, DirectoryConfig, DirectoryConnector, DirectoryEntry, DirectorySession,
    Identity, SessionError,
};
use crate::error::{Error, Result};

pub struct DirectoryVerifier<C> {
    config: DirectoryConfig,
    connector: C,
}

struct Connected {
    session: Box<dyn DirectorySession>,
}

struct ServiceBound {
    session: Box<dyn DirectorySession>,
}

struct UserResolved {
    session: Box<dyn DirectorySession>,
    entry: DirectoryEntry,
}

struct UserBound {
    session: Box<dyn DirectorySession>,
    entry: DirectoryEntry,
}

/// What the directory says about the user, before filtering.
#[derive(Debug)]
struct DirectoryIdentity {
    resolved_dn: String,
    claim_username: String,
    raw_groups: Vec<String>,
}

impl<C: DirectoryConnector> DirectoryVerifier<C> {
    pub fn new(config: DirectoryConfig, connector: C) -> Self {
        Self { config, connector }
    }

    /// Bounds one directory round-trip by the configured timeout.
    async fn step<T, F>(&self, what: &str, fut: F) -> Result<std::result::Result<T, SessionError>>
    where
        F: Future<Output = std::result::Result<T, SessionError>>,
    {
        tokio::time::timeout(self.config.timeout, fut)
            .await
            .map_err(|_| {
                Error::DirectoryConnection(format!(
                    "{what} timed out after {:?}",
                    self.config.timeout
                ))
            })
    }

    async fn connect(&self) -> Result<Connected> {
        let session = self
            .step("connect", self.connector.connect())
            .await?
            .map_err(|e| Error::DirectoryConnection(e.to_string()))?;
        Ok(Connected { session })
    }

    async fn bind_service(&self, mut state: Connected) -> Result<ServiceBound> {
        let dn = &self.config.search_user_dn;
        let password = &self.config.search_user_password;
        match self.step("service bind", state.session.bind(dn, password)).await? {
            Ok(()) => Ok(ServiceBound {
                session: state.session,
            }),
            Err(SessionError::Transport(e)) => Err(Error::DirectoryConnection(e)),
            Err(SessionError::Rejected(e)) => Err(Error::DirectoryServiceBind(e)),
        }
    }

    async fn resolve_user(&self, mut state: ServiceBound, username: &str) -> Result<UserResolved> {
        let filter = format!("({}={})", self.config.login_attribute, ldap_escape(username));
        let attrs = [
            self.config.login_attribute.as_str(),
            self.config.claim_attribute.as_str(),
            self.config.group_attribute.as_str(),
        ];
        let mut entries = self
            .step("search", state.session.search(&self.config.base_dn, &filter, &attrs))
            .await?
            .map_err(|e| Error::DirectoryConnection(format!("search failed: {e}")))?;

        match entries.len() {
            1 => Ok(UserResolved {
                session: state.session,
                entry: entries.remove(0),
            }),
            0 => Err(Error::UserNotFound(username.to_owned())),
            n => {
                tracing::warn!(username, matches = n, "ambiguous directory search");
                Err(Error::UserNotFound(format!("{username} matched {n} entries")))
            }
        }
    }

    async fn bind_user(&self, mut state: UserResolved, password: &str) -> Result<UserBound> {
        // An empty password would be an unauthenticated bind, which servers accept.
        if password.is_empty() {
            return Err(Error::InvalidCredentials);
        }
        match self
            .step("user bind", state.session.bind(&state.entry.dn, password))
            .await?
        {
            Ok(()) => Ok(UserBound {
                session: state.session,
                entry: state.entry,
            }),
            Err(SessionError::Transport(e)) => Err(Error::DirectoryConnection(e)),
            Err(SessionError::Rejected(e)) => {
                tracing::debug!(dn = %state.entry.dn, reason = %e, "user bind rejected");
                Err(Error::InvalidCredentials)
            }
        }
    }

    async fn finish(&self, mut state: UserBound, username: &str) -> Identity {
        let entry = &state.entry;
        let identity = DirectoryIdentity {
            resolved_dn: entry.dn.clone(),
            claim_username: entry
                .first(&self.config.claim_attribute)
                .or_else(|| entry.first(&self.config.login_attribute))
                .unwrap_or(username)
                .to_owned(),
            raw_groups: entry.values(&self.config.group_attribute).to_vec(),
        };

        match self.step("unbind", state.session.unbind()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "directory unbind failed"),
            Err(e) => tracing::debug!(error = %e, "directory unbind failed"),
        }

        let groups: BTreeSet<String> = self.config.filter_groups(identity.raw_groups);
        tracing::info!(
            dn = %identity.resolved_dn,
            username = %identity.claim_username,
            groups = groups.len(),
            "directory authentication succeeded"
        );
        Identity {
            username: identity.claim_username,
            groups,
        }
    }
}

#[async_trait]
impl<C: DirectoryConnector> Authenticator for DirectoryVerifier<C> {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Identity> {
        if username.is_empty() {
            return Err(Error::UserNotFound(String::new()));
        }
        let connected = self.connect().await?;
        let bound = self.bind_service(connected).await?;
        let resolved = self.resolve_user(bound, username).await?;
        let user = self.bind_user(resolved, password).await?;
        Ok(self.finish(user, username).await)
    }
}
