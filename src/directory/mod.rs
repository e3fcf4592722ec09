//! Directory-backed credential verification.
//! Used by: handlers::issue, state.
//!
//! The LDAP primitives (connect, bind, search, unbind) sit behind
//! [`DirectoryConnector`] and [`DirectorySession`] so the bind/search/rebind
//! sequence in [`verifier`] runs the same against a real server and the
//! in-memory directory used by the tests.

pub mod ldap;
#[cfg(test)]
pub mod memory;
pub mod verifier;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::error::Result;

pub const DEFAULT_PORT: u16 = 389;
pub const DEFAULT_LOGIN_ATTRIBUTE: &str = "uid";
pub const DEFAULT_CLAIM_ATTRIBUTE: &str = "mail";
pub const DEFAULT_GROUP_ATTRIBUTE: &str = "memberOf";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain `ldap://`, no encryption.
    Plain,
    /// `ldap://` upgraded with the StartTLS extended operation.
    StartTls,
    /// Implicit TLS, `ldaps://`.
    Ldaps,
}

/// Immutable connection and lookup settings, shared by every request.
#[derive(Clone)]
pub struct DirectoryConfig {
    pub host: String,
    pub port: u16,
    pub tls: TlsMode,
    pub skip_tls_verification: bool,
    pub base_dn: String,
    pub search_user_dn: String,
    pub search_user_password: String,
    pub login_attribute: String,
    pub claim_attribute: String,
    pub group_attribute: String,
    pub group_filter: Option<Regex>,
    pub timeout: Duration,
}

impl DirectoryConfig {
    pub fn new(host: impl Into<String>, base_dn: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            tls: TlsMode::Ldaps,
            skip_tls_verification: false,
            base_dn: base_dn.into(),
            search_user_dn: String::new(),
            search_user_password: String::new(),
            login_attribute: DEFAULT_LOGIN_ATTRIBUTE.into(),
            claim_attribute: DEFAULT_CLAIM_ATTRIBUTE.into(),
            group_attribute: DEFAULT_GROUP_ATTRIBUTE.into(),
            group_filter: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn url(&self) -> String {
        let scheme = match self.tls {
            TlsMode::Ldaps => "ldaps",
            TlsMode::Plain | TlsMode::StartTls => "ldap",
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Groups surviving the configured filter; everything when no filter is set.
    pub fn filter_groups<I>(&self, groups: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = String>,
    {
        groups
            .into_iter()
            .filter(|g| self.group_filter.as_ref().map_or(true, |re| re.is_match(g)))
            .collect()
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("url", &self.url())
            .field("tls", &self.tls)
            .field("skip_tls_verification", &self.skip_tls_verification)
            .field("base_dn", &self.base_dn)
            .field("search_user_dn", &self.search_user_dn)
            .field("search_user_password", &"<redacted>")
            .field("login_attribute", &self.login_attribute)
            .field("claim_attribute", &self.claim_attribute)
            .field("group_attribute", &self.group_attribute)
            .field("group_filter", &self.group_filter.as_ref().map(Regex::as_str))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A verified user, as handed to the token issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub groups: BTreeSet<String>,
}

/// One search result. Attribute names keep the server's spelling.
#[derive(Debug, Clone, Default)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Attribute descriptions are case-insensitive in LDAP.
    pub fn values(&self, attr: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attr))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, attr: &str) -> Option<&str> {
        self.values(attr)
            .iter()
            .map(String::as_str)
            .find(|v| !v.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The server could not be reached or the exchange broke down.
    #[error("{0}")]
    Transport(String),
    /// The server answered with a non-success result code.
    #[error("{0}")]
    Rejected(String),
}

#[async_trait]
pub trait DirectorySession: Send {
    async fn bind(&mut self, dn: &str, password: &str) -> std::result::Result<(), SessionError>;

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attrs: &[&str],
    ) -> std::result::Result<Vec<DirectoryEntry>, SessionError>;

    async fn unbind(&mut self) -> std::result::Result<(), SessionError>;
}

#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self) -> std::result::Result<Box<dyn DirectorySession>, SessionError>;
}

/// Turns a username/password pair into a verified identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Identity>;
}
