//! Token creation, signing, and verification.
//! Used by: handlers, state.

pub mod claims;
pub mod keys;
pub mod sign;
pub mod verify;

use jsonwebtoken::Algorithm;

use crate::error::Result;
use crate::token::claims::AuthToken;

/// The only algorithm issued or accepted.
pub const ALGORITHM: Algorithm = Algorithm::PS512;

/// Turns a claim set into a compact signed token.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, claims: &AuthToken) -> Result<String>;
}

/// Checks a compact signed token and returns the claim set it carries.
///
/// Implementations must reject expired tokens and tokens signed with any
/// algorithm other than the one they were built for.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthToken>;
}
