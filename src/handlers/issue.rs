//! Token issuance after a directory login.
//! Used by: server.

use axum::extract::State;
use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, Result};
use crate::state::AppState;
use crate::token::claims::AuthToken;

pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Reads `Authorization: Basic <base64(username:password)>`.
pub fn parse_basic(headers: &HeaderMap) -> Option<BasicCredentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(BasicCredentials {
        username: username.to_owned(),
        password: password.to_owned(),
    })
}

async fn issue_token(state: &AppState, headers: &HeaderMap) -> Result<String> {
    let credentials = parse_basic(headers).ok_or_else(|| {
        tracing::debug!("missing or malformed basic credentials");
        Error::InvalidCredentials
    })?;

    let identity = state
        .authenticator
        .authenticate(&credentials.username, &credentials.password)
        .await?;

    let claims = AuthToken::new(identity.username, identity.groups, state.issuer.token_ttl)?;
    let token = state.signer.sign(&claims)?;
    tracing::info!(
        username = %claims.username,
        groups = ?claims.groups,
        exp = %claims.expiry.to_rfc3339(),
        "token issued"
    );
    Ok(token)
}

pub async fn issue(State(state): State<AppState>, headers: HeaderMap) -> Result<String> {
    let result = issue_token(&state, &headers).await;
    match &result {
        Ok(_) => state.metrics.record_issued(),
        Err(e) if e.is_auth_failure() => {
            tracing::info!(reason = %e, "token issuance denied");
            state.metrics.record_denied();
        }
        Err(_) => state.metrics.record_issuance_error(),
    }
    result
}
