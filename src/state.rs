//! Shared application state.

use std::sync::Arc;

use crate::config::{IssuerConfig, Settings};
use crate::directory::ldap::LdapConnector;
use crate::directory::verifier::DirectoryVerifier;
use crate::directory::Authenticator;
use crate::error::Result;
use crate::telemetry::Metrics;
use crate::token::keys::KeyPair;
use crate::token::sign::Ps512Signer;
use crate::token::{TokenSigner, TokenVerifier};

pub struct AppStateInner {
    pub signer: Arc<dyn TokenSigner>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub authenticator: Arc<dyn Authenticator>,
    pub issuer: IssuerConfig,
    pub metrics: Metrics,
}

pub type AppState = Arc<AppStateInner>;

struct StateBuilder {
    keys: KeyPair,
    authenticator: Arc<dyn Authenticator>,
    issuer: IssuerConfig,
}

impl StateBuilder {
    fn build(self) -> Result<AppState> {
        let codec = Arc::new(Ps512Signer::new(self.keys)?);
        Ok(Arc::new(AppStateInner {
            signer: codec.clone(),
            verifier: codec,
            authenticator: self.authenticator,
            issuer: self.issuer,
            metrics: Metrics::new(),
        }))
    }
}

/// Loads (or generates) the keypair and wires the LDAP-backed verifier.
pub fn build_state(settings: &Settings) -> Result<AppState> {
    let keys = KeyPair::load_or_generate(&settings.keys.prefix, settings.keys.bits)?;
    let connector = LdapConnector::new(&settings.directory);
    StateBuilder {
        keys,
        authenticator: Arc::new(DirectoryVerifier::new(settings.directory.clone(), connector)),
        issuer: settings.issuer.clone(),
    }
    .build()
}

#[cfg(test)]
pub fn build_test_state(
    authenticator: Arc<dyn Authenticator>,
    token_ttl: chrono::Duration,
) -> Result<AppState> {
    StateBuilder {
        keys: crate::token::keys::testing::keypair(),
        authenticator,
        issuer: IssuerConfig { token_ttl },
    }
    .build()
}
