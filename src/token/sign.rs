//! RSA-PSS/SHA-512 token signing.
//! Used by: handlers::issue, state.

use chrono::Duration;
use jsonwebtoken::{EncodingKey, Header};

use crate::error::{Error, Result};
use crate::token::claims::AuthToken;
use crate::token::keys::KeyPair;
use crate::token::verify::Ps512Verifier;
use crate::token::{TokenSigner, TokenVerifier, ALGORITHM};

pub fn sign_token(claims: &AuthToken, key: &EncodingKey) -> Result<String> {
    if claims.username.is_empty() {
        return Err(Error::TokenSerialization("claim set has an empty username".into()));
    }
    let payload =
        serde_json::to_value(claims).map_err(|e| Error::TokenSerialization(e.to_string()))?;
    jsonwebtoken::encode(&Header::new(ALGORITHM), &payload, key)
        .map_err(|e| Error::TokenSigning(e.to_string()))
}

/// Signs with the private half of a key pair and verifies with the public half.
pub struct Ps512Signer {
    key: EncodingKey,
    verifier: Ps512Verifier,
}

impl Ps512Signer {
    /// Fails when the two halves of `keys` do not belong together.
    pub fn new(keys: KeyPair) -> Result<Self> {
        let signer = Self {
            key: keys.private,
            verifier: Ps512Verifier::new(keys.public),
        };
        let probe = AuthToken::new("keypair-probe".into(), Vec::new(), Duration::minutes(1))?;
        let token = signer.sign(&probe)?;
        signer.verifier.verify(&token).map_err(|e| {
            Error::Configuration(format!("private and public keys do not match: {e}"))
        })?;
        Ok(signer)
    }
}

impl TokenSigner for Ps512Signer {
    fn sign(&self, claims: &AuthToken) -> Result<String> {
        sign_token(claims, &self.key)
    }
}

impl TokenVerifier for Ps512Signer {
    fn verify(&self, token: &str) -> Result<AuthToken> {
        self.verifier.verify(token)
    }
}
