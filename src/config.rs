//! Command-line flags and the validated settings built from them.
//! Used by: main, state.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use regex::Regex;

use crate::directory::{self, DirectoryConfig, TlsMode};
use crate::error::{Error, Result};
use crate::token::keys::MIN_KEY_BITS;

/// Upper bound on `--token-expire-time`: one year.
pub const MAX_TOKEN_EXPIRE_HOURS: i64 = 24 * 365;

#[derive(Parser, Debug)]
#[command(
    name = "ldap-token-gateway",
    version,
    about = "Issues LDAP-backed bearer tokens and answers Kubernetes token reviews"
)]
pub struct Cli {
    /// Host or IP of the LDAP server.
    #[arg(long)]
    pub ldap_host: Option<String>,

    #[arg(long, default_value_t = directory::DEFAULT_PORT)]
    pub ldap_port: u16,

    /// Disable LDAP TLS.
    #[arg(long)]
    pub ldap_insecure: bool,

    /// Upgrade a plain LDAP connection with StartTLS instead of using ldaps://.
    #[arg(long)]
    pub ldap_start_tls: bool,

    /// Skip LDAP server certificate verification.
    #[arg(long)]
    pub ldap_skip_tls_verification: bool,

    /// User search base, e.g. 'dc=example,dc=com'.
    #[arg(long)]
    pub ldap_base_dn: Option<String>,

    /// Attribute matched against the login username.
    #[arg(long, default_value = directory::DEFAULT_LOGIN_ATTRIBUTE)]
    pub ldap_user_attribute: String,

    /// DN this service binds as to find users (e.g. cn=admin,dc=example,dc=com).
    #[arg(long, default_value = "")]
    pub ldap_search_user_dn: String,

    #[arg(long, default_value = "", hide_default_value = true)]
    pub ldap_search_user_password: String,

    /// Attribute listing the user's group memberships.
    #[arg(long, default_value = directory::DEFAULT_GROUP_ATTRIBUTE)]
    pub ldap_group_attribute: String,

    /// Connect and per-operation timeout, in seconds.
    #[arg(long, default_value_t = directory::DEFAULT_TIMEOUT.as_secs())]
    pub ldap_timeout: u64,

    /// Regex a group must match to be included in the token.
    #[arg(long, default_value = "")]
    pub group_filter: String,

    /// LDAP attribute used as the username in issued tokens.
    #[arg(long, default_value = directory::DEFAULT_CLAIM_ATTRIBUTE)]
    pub token_username_attribute: String,

    /// Hours an issued token stays valid.
    #[arg(long, default_value_t = 12)]
    pub token_expire_time: i64,

    /// Path prefix of the signing keypair (`<prefix>.priv`, `<prefix>.pub`).
    #[arg(long, default_value = "signing")]
    pub keypair: PathBuf,

    /// RSA modulus size used when the keypair has to be generated.
    #[arg(long, default_value_t = MIN_KEY_BITS)]
    pub key_bits: usize,

    /// Port serving /ldapAuth and /authenticate.
    #[arg(long, default_value_t = 4000)]
    pub port: u16,

    /// Port serving /healthz and /metrics.
    #[arg(long, default_value_t = 8080)]
    pub health_port: u16,

    /// Serve the API port over TLS.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub use_tls: bool,

    /// x509 certificate for HTTPS (CA certificates, if any, concatenated after the server cert).
    #[arg(long)]
    pub tls_cert_file: Option<PathBuf>,

    /// Private key matching --tls-cert-file.
    #[arg(long)]
    pub tls_private_key_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct IssuerConfig {
    pub token_ttl: chrono::Duration,
}

#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub health_port: u16,
    pub tls: Option<TlsFiles>,
}

#[derive(Debug, Clone)]
pub struct KeyConfig {
    pub prefix: PathBuf,
    pub bits: usize,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub directory: DirectoryConfig,
    pub issuer: IssuerConfig,
    pub server: ServerConfig,
    pub keys: KeyConfig,
}

fn required(flag: &str, value: Option<String>) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Configuration(format!("--{flag} is required")))
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings> {
        let host = required("ldap-host", self.ldap_host)?;
        let base_dn = required("ldap-base-dn", self.ldap_base_dn)?;

        let tls = match (self.ldap_insecure, self.ldap_start_tls) {
            (true, true) => {
                return Err(Error::Configuration(
                    "--ldap-insecure and --ldap-start-tls are mutually exclusive".into(),
                ))
            }
            (true, false) => TlsMode::Plain,
            (false, true) => TlsMode::StartTls,
            (false, false) => TlsMode::Ldaps,
        };

        let group_filter = match self.group_filter.as_str() {
            "" => None,
            pattern => Some(Regex::new(pattern).map_err(|e| {
                Error::Configuration(format!("invalid --group-filter {pattern:?}: {e}"))
            })?),
        };

        if self.ldap_timeout == 0 {
            return Err(Error::Configuration("--ldap-timeout must be positive".into()));
        }
        if !(1..=MAX_TOKEN_EXPIRE_HOURS).contains(&self.token_expire_time) {
            return Err(Error::Configuration(format!(
                "--token-expire-time must be between 1 and {MAX_TOKEN_EXPIRE_HOURS} hours"
            )));
        }
        let token_ttl = chrono::Duration::hours(self.token_expire_time);
        if self.key_bits < MIN_KEY_BITS {
            return Err(Error::Configuration(format!(
                "--key-bits must be at least {MIN_KEY_BITS}"
            )));
        }

        let server_tls = if self.use_tls {
            let cert = self
                .tls_cert_file
                .ok_or_else(|| Error::Configuration("--tls-cert-file is required".into()))?;
            let key = self
                .tls_private_key_file
                .ok_or_else(|| Error::Configuration("--tls-private-key-file is required".into()))?;
            Some(TlsFiles { cert, key })
        } else {
            None
        };

        if self.ldap_search_user_dn.is_empty() {
            tracing::warn!("no --ldap-search-user-dn given, searching with an anonymous bind");
        }

        let directory = DirectoryConfig {
            port: self.ldap_port,
            tls,
            skip_tls_verification: self.ldap_skip_tls_verification,
            search_user_dn: self.ldap_search_user_dn,
            search_user_password: self.ldap_search_user_password,
            login_attribute: self.ldap_user_attribute,
            claim_attribute: self.token_username_attribute,
            group_attribute: self.ldap_group_attribute,
            group_filter,
            timeout: Duration::from_secs(self.ldap_timeout),
            ..DirectoryConfig::new(host, base_dn)
        };

        Ok(Settings {
            directory,
            issuer: IssuerConfig { token_ttl },
            server: ServerConfig {
                port: self.port,
                health_port: self.health_port,
                tls: server_tls,
            },
            keys: KeyConfig {
                prefix: self.keypair,
                bits: self.key_bits,
            },
        })
    }
}
