//! RSA key pair loading and first-start generation.
//! Used by: token::sign, token::verify, main.
//!
//! Keys live next to each other as `<prefix>.priv` and `<prefix>.pub`, both
//! PKCS#1 PEM. Rotation is not supported: the pair is read once at startup.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{Error, Result};

pub const PRIVATE_SUFFIX: &str = "priv";
pub const PUBLIC_SUFFIX: &str = "pub";

/// Smallest modulus that fits a PSS/SHA-512 encoding.
pub const MIN_KEY_BITS: usize = 2048;

#[derive(Clone)]
pub struct KeyPair {
    pub(crate) private: EncodingKey,
    pub(crate) public: DecodingKey,
}

pub fn load_private_key(pem: &[u8]) -> Result<EncodingKey> {
    EncodingKey::from_rsa_pem(pem)
        .map_err(|e| Error::Configuration(format!("expected an RSA private key: {e}")))
}

pub fn load_public_key(pem: &[u8]) -> Result<DecodingKey> {
    DecodingKey::from_rsa_pem(pem)
        .map_err(|e| Error::Configuration(format!("expected an RSA public key: {e}")))
}

/// Generates a fresh pair and returns `(private_pem, public_pem)`.
pub fn generate_keypair(bits: usize) -> Result<(String, String)> {
    if bits < MIN_KEY_BITS {
        return Err(Error::Configuration(format!(
            "RSA key size must be at least {MIN_KEY_BITS} bits, got {bits}"
        )));
    }
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|e| Error::Configuration(format!("failed to generate RSA key: {e}")))?;
    let public = RsaPublicKey::from(&private);

    let private_pem = private
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| Error::Configuration(format!("failed to encode private key: {e}")))?;
    let public_pem = public
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| Error::Configuration(format!("failed to encode public key: {e}")))?;
    Ok((private_pem.to_string(), public_pem))
}

pub fn key_paths(prefix: &Path) -> (PathBuf, PathBuf) {
    (with_suffix(prefix, PRIVATE_SUFFIX), with_suffix(prefix, PUBLIC_SUFFIX))
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_owned();
    path.push(".");
    path.push(suffix);
    PathBuf::from(path)
}

impl KeyPair {
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self> {
        Ok(Self {
            private: load_private_key(private_pem)?,
            public: load_public_key(public_pem)?,
        })
    }

    pub fn load(prefix: &Path) -> Result<Self> {
        let (private_path, public_path) = key_paths(prefix);
        let private_pem = read_key_file(&private_path)?;
        let public_pem = read_key_file(&public_path)?;
        Self::from_pem(&private_pem, &public_pem)
    }

    /// Loads the pair at `prefix`, generating it first when neither file exists.
    pub fn load_or_generate(prefix: &Path, bits: usize) -> Result<Self> {
        let (private_path, public_path) = key_paths(prefix);
        match (private_path.exists(), public_path.exists()) {
            (true, true) => {
                tracing::info!(path = %private_path.display(), "loading token signing keypair");
            }
            (false, false) => {
                tracing::info!(bits, path = %private_path.display(), "generating token signing keypair");
                let (private_pem, public_pem) = generate_keypair(bits)?;
                write_key_file(&private_path, private_pem.as_bytes(), true)?;
                write_key_file(&public_path, public_pem.as_bytes(), false)?;
            }
            (has_private, _) => {
                let missing = if has_private { &public_path } else { &private_path };
                return Err(Error::Configuration(format!(
                    "incomplete keypair: {} is missing",
                    missing.display()
                )));
            }
        }
        Self::load(prefix)
    }

    pub fn public_key(&self) -> &DecodingKey {
        &self.public
    }
}

fn read_key_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|e| Error::Configuration(format!("cannot read {}: {e}", path.display())))
}

fn write_key_file(path: &Path, contents: &[u8], secret: bool) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(if secret { 0o600 } else { 0o644 });
    }
    #[cfg(not(unix))]
    let _ = secret;

    let mut file = options
        .open(path)
        .map_err(|e| Error::Configuration(format!("cannot create {}: {e}", path.display())))?;
    file.write_all(contents)
        .map_err(|e| Error::Configuration(format!("cannot write {}: {e}", path.display())))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::OnceLock;

    use super::*;

    /// Two independent PEM pairs, generated once per test binary.
    pub fn pems() -> &'static [(String, String); 2] {
        static PEMS: OnceLock<[(String, String); 2]> = OnceLock::new();
        PEMS.get_or_init(|| {
            [
                generate_keypair(MIN_KEY_BITS).unwrap(),
                generate_keypair(MIN_KEY_BITS).unwrap(),
            ]
        })
    }

    pub fn keypair() -> KeyPair {
        let (private_pem, public_pem) = &pems()[0];
        KeyPair::from_pem(private_pem.as_bytes(), public_pem.as_bytes()).unwrap()
    }

    pub fn other_keypair() -> KeyPair {
        let (private_pem, public_pem) = &pems()[1];
        KeyPair::from_pem(private_pem.as_bytes(), public_pem.as_bytes()).unwrap()
    }

    /// Private key of the first pair combined with the public key of the second.
    pub fn mismatched_keypair() -> KeyPair {
        let [(private_pem, _), (_, public_pem)] = pems();
        KeyPair::from_pem(private_pem.as_bytes(), public_pem.as_bytes()).unwrap()
    }
}
