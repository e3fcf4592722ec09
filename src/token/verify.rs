//! RSA-PSS/SHA-512 token verification.
//! Used by: handlers::review, token::sign.

use jsonwebtoken::{DecodingKey, Validation};

use crate::error::{Error, Result};
use crate::token::claims::AuthToken;
use crate::token::{TokenVerifier, ALGORITHM};

/// Signature and algorithm checks only; expiry is checked on the decoded claims
/// so that `exp == now` already counts as expired.
fn validation() -> Validation {
    let mut validation = Validation::new(ALGORITHM);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

pub fn verify_token(token: &str, key: &DecodingKey) -> Result<AuthToken> {
    verify_with(token, key, &validation())
}

fn verify_with(token: &str, key: &DecodingKey, validation: &Validation) -> Result<AuthToken> {
    let claims = jsonwebtoken::decode::<AuthToken>(token, key, validation)?.claims;

    if claims.username.is_empty() {
        return Err(Error::MalformedToken("empty username".into()));
    }
    if claims.is_expired() {
        return Err(Error::ExpiredToken);
    }

    Ok(claims)
}

pub struct Ps512Verifier {
    key: DecodingKey,
    validation: Validation,
}

impl Ps512Verifier {
    pub fn new(key: DecodingKey) -> Self {
        Self {
            key,
            validation: validation(),
        }
    }
}

impl TokenVerifier for Ps512Verifier {
    fn verify(&self, token: &str) -> Result<AuthToken> {
        verify_with(token, &self.key, &self.validation)
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{Algorithm, EncodingKey, Header};

    use super::*;
    use crate::token::keys::testing;
    use crate::token::sign::sign_token;

    fn claims() -> AuthToken {
        AuthToken::new(
            "alice".into(),
            vec!["dev-ops".into(), "admin".into()],
            Duration::hours(1),
        )
        .unwrap()
    }

    fn signed(claims: &AuthToken) -> Result<String> {
        sign_token(claims, &testing::keypair().private)
    }

    fn flip_bit(token: &str, segment: usize, byte: usize) -> String {
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let mut bytes = URL_SAFE_NO_PAD.decode(&parts[segment]).unwrap();
        let index = byte.min(bytes.len() - 1);
        bytes[index] ^= 0x01;
        parts[segment] = URL_SAFE_NO_PAD.encode(bytes);
        parts.join(".")
    }

    #[test]
    fn valid_token_round_trips() -> Result<()> {
        let original = claims();
        let token = signed(&original)?;
        let verified = verify_token(&token, testing::keypair().public_key())?;
        assert_eq!(verified.username, original.username);
        assert_eq!(verified.groups, original.groups);
        assert_eq!(verified.expiry.timestamp(), original.expiry.timestamp());
        Ok(())
    }

    #[test]
    fn empty_group_set_round_trips() -> Result<()> {
        let original = AuthToken::new("bob".into(), Vec::new(), Duration::minutes(5))?;
        let token = signed(&original)?;
        let verified = verify_token(&token, testing::keypair().public_key())?;
        assert!(verified.groups.is_empty());
        Ok(())
    }

    #[test]
    fn expired_token_rejected() -> Result<()> {
        let past = AuthToken::with_expiry("alice".into(), Vec::new(), Utc::now() - Duration::seconds(5));
        let token = signed(&past)?;
        let result = verify_token(&token, testing::keypair().public_key());
        assert!(matches!(result, Err(Error::ExpiredToken)));
        Ok(())
    }

    #[test]
    fn payload_bit_flip_rejected() -> Result<()> {
        let token = signed(&claims())?;
        for byte in [0, 10, usize::MAX] {
            let tampered = flip_bit(&token, 1, byte);
            let result = verify_token(&tampered, testing::keypair().public_key());
            assert!(matches!(result, Err(Error::BadSignature)), "byte {byte}");
        }
        Ok(())
    }

    #[test]
    fn signature_bit_flip_rejected() -> Result<()> {
        let token = signed(&claims())?;
        for byte in [0, 100, usize::MAX] {
            let tampered = flip_bit(&token, 2, byte);
            let result = verify_token(&tampered, testing::keypair().public_key());
            assert!(matches!(result, Err(Error::BadSignature)), "byte {byte}");
        }
        Ok(())
    }

    #[test]
    fn wrong_key_rejected() -> Result<()> {
        let token = signed(&claims())?;
        let result = verify_token(&token, testing::other_keypair().public_key());
        assert!(matches!(result, Err(Error::BadSignature)));
        Ok(())
    }

    #[test]
    fn other_rsa_algorithm_rejected() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::RS512),
            &claims(),
            &testing::keypair().private,
        )
        .unwrap();
        let result = verify_token(&token, testing::keypair().public_key());
        assert!(matches!(result, Err(Error::BadSignature)));
    }

    #[test]
    fn hmac_downgrade_rejected() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims(),
            &EncodingKey::from_secret(b"shared-secret"),
        )
        .unwrap();
        let result = verify_token(&token, testing::keypair().public_key());
        assert!(matches!(result, Err(Error::BadSignature)));
    }

    #[test]
    fn missing_segments_rejected() {
        let result = verify_token("no-dots-here", testing::keypair().public_key());
        assert!(matches!(result, Err(Error::MalformedToken(_))));
    }

    #[test]
    fn invalid_base64_rejected() {
        let result = verify_token("%%%.%%%.%%%", testing::keypair().public_key());
        assert!(matches!(result, Err(Error::MalformedToken(_))));
    }

    #[test]
    fn signed_non_claim_payload_rejected() {
        let token = jsonwebtoken::encode(
            &Header::new(ALGORITHM),
            &serde_json::json!({ "sub": "alice" }),
            &testing::keypair().private,
        )
        .unwrap();
        let result = verify_token(&token, testing::keypair().public_key());
        assert!(matches!(result, Err(Error::MalformedToken(_))));
    }

    #[test]
    fn signed_empty_username_rejected() {
        let token = jsonwebtoken::encode(
            &Header::new(ALGORITHM),
            &serde_json::json!({ "username": "", "groups": [], "exp": Utc::now().timestamp() + 60 }),
            &testing::keypair().private,
        )
        .unwrap();
        let result = verify_token(&token, testing::keypair().public_key());
        assert!(matches!(result, Err(Error::MalformedToken(_))));
    }

    #[test]
    fn verifier_trait_object_checks_tokens() -> Result<()> {
        let verifier: Box<dyn TokenVerifier> =
            Box::new(Ps512Verifier::new(testing::keypair().public_key().clone()));
        let token = signed(&claims())?;
        assert_eq!(verifier.verify(&token)?.username, "alice");
        Ok(())
    }
}
