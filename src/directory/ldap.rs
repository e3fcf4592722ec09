//! `ldap3` implementation of the directory primitives.
//! Used by: main.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry, SearchOptions};

use crate::directory::{
    DirectoryConfig, DirectoryConnector, DirectoryEntry, DirectorySession, SessionError, TlsMode,
};

/// Result code returned when the server truncates a search at the size limit.
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;

/// Two entries are enough to tell a unique match from an ambiguous one.
const SEARCH_SIZE_LIMIT: i32 = 2;

pub struct LdapConnector {
    url: String,
    settings: LdapConnSettings,
}

impl LdapConnector {
    pub fn new(config: &DirectoryConfig) -> Self {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(config.timeout)
            .set_starttls(config.tls == TlsMode::StartTls)
            .set_no_tls_verify(config.skip_tls_verification);
        if config.skip_tls_verification {
            tracing::warn!("LDAP TLS certificate verification is disabled");
        }
        Self {
            url: config.url(),
            settings,
        }
    }
}

struct LdapSession {
    ldap: Ldap,
}

fn transport(err: LdapError) -> SessionError {
    match err {
        LdapError::LdapResult { result } => SessionError::Rejected(result.to_string()),
        other => SessionError::Transport(other.to_string()),
    }
}

/// `ldap3` moves a whole attribute into `bin_attrs` when any one of its values
/// is not UTF-8. Recover the values that do decode and drop only the rest.
fn into_entry(entry: SearchEntry) -> DirectoryEntry {
    let SearchEntry {
        dn,
        mut attrs,
        bin_attrs,
    } = entry;
    for (name, values) in bin_attrs {
        let mut dropped = 0;
        let decoded: Vec<String> = values
            .into_iter()
            .filter_map(|value| match String::from_utf8(value) {
                Ok(text) => Some(text),
                Err(_) => {
                    dropped += 1;
                    None
                }
            })
            .collect();
        if dropped > 0 {
            tracing::warn!(
                dn = %dn,
                attr = %name,
                dropped,
                "ignoring attribute values that are not valid UTF-8"
            );
        }
        if !decoded.is_empty() {
            attrs.entry(name).or_default().extend(decoded);
        }
    }
    DirectoryEntry { dn, attrs }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, SessionError> {
        let (conn, ldap) = LdapConnAsync::with_settings(self.settings.clone(), &self.url)
            .await
            .map_err(|e| SessionError::Transport(format!("{}: {e}", self.url)))?;
        ldap3::drive!(conn);
        Ok(Box::new(LdapSession { ldap }))
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), SessionError> {
        let result = self.ldap.simple_bind(dn, password).await.map_err(transport)?;
        result.success().map(|_| ()).map_err(transport)
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, SessionError> {
        let ldap3::SearchResult(entries, result) = self
            .ldap
            .with_search_options(SearchOptions::new().sizelimit(SEARCH_SIZE_LIMIT))
            .search(base_dn, Scope::Subtree, filter, attrs)
            .await
            .map_err(transport)?;
        if result.rc != RC_SIZE_LIMIT_EXCEEDED {
            result.success().map_err(transport)?;
        }

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(into_entry)
            .collect())
    }

    async fn unbind(&mut self) -> Result<(), SessionError> {
        self.ldap.unbind().await.map_err(transport)
    }
}
