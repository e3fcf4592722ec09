//! Kubernetes token review webhook.
//! Used by: server.
//!
//! A token that fails verification is a normal outcome here: the response is
//! still 200 with `authenticated: false`. Only a request body that is not a
//! token review is a 400.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::AppState;
use crate::token::claims::AuthToken;

pub const TOKEN_REVIEW_KIND: &str = "TokenReview";

/// Same message for expired, forged and malformed tokens.
const REJECTED: &str = "invalid bearer token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewRequest {
    pub api_version: String,
    pub kind: String,
    pub spec: TokenReviewSpec,
}

#[derive(Debug, Deserialize)]
pub struct TokenReviewSpec {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub status: TokenReviewStatus,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenReviewStatus {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub username: String,
    pub groups: Vec<String>,
}

impl TokenReviewStatus {
    fn authenticated(claims: AuthToken) -> Self {
        Self {
            authenticated: true,
            user: Some(UserInfo {
                username: claims.username,
                groups: claims.groups.into_iter().collect(),
            }),
            error: None,
        }
    }

    fn rejected() -> Self {
        Self {
            authenticated: false,
            user: None,
            error: Some(REJECTED.into()),
        }
    }
}

pub fn parse_request(body: &[u8]) -> Result<TokenReviewRequest> {
    let request: TokenReviewRequest =
        serde_json::from_slice(body).map_err(|e| Error::MalformedRequest(e.to_string()))?;
    if request.kind != TOKEN_REVIEW_KIND {
        return Err(Error::MalformedRequest(format!(
            "expected kind {TOKEN_REVIEW_KIND}, got {:?}",
            request.kind
        )));
    }
    Ok(request)
}

pub async fn review(State(state): State<AppState>, body: Bytes) -> Result<Json<TokenReviewResponse>> {
    let request = parse_request(&body)?;

    let status = match state.verifier.verify(&request.spec.token) {
        Ok(claims) => {
            tracing::info!(username = %claims.username, "token review authenticated");
            TokenReviewStatus::authenticated(claims)
        }
        Err(e) => {
            tracing::info!(reason = %e, "token review rejected");
            TokenReviewStatus::rejected()
        }
    };
    state.metrics.record_review(status.authenticated);

    Ok(Json(TokenReviewResponse {
        api_version: request.api_version,
        kind: TOKEN_REVIEW_KIND.into(),
        status,
    }))
}
