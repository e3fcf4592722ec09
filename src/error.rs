//! Unified error types for the gateway.
//! Used by: config, token, directory, handlers.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

const UNAUTHORIZED_BODY: &str = "unauthorized";
const INTERNAL_BODY: &str = "internal server error";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("directory connection error: {0}")]
    DirectoryConnection(String),

    #[error("directory service bind failed: {0}")]
    DirectoryServiceBind(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token serialization error: {0}")]
    TokenSerialization(String),

    #[error("token signing error: {0}")]
    TokenSigning(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("invalid signature")]
    BadSignature,

    #[error("token expired")]
    ExpiredToken,

    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl Error {
    /// Unknown user and wrong password look the same to the client.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::UserNotFound(_) | Error::InvalidCredentials)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::UserNotFound(_) | Error::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"ldap\"")],
                UNAUTHORIZED_BODY,
            )
                .into_response(),
            Error::MalformedRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            Error::Configuration(_)
            | Error::DirectoryConnection(_)
            | Error::DirectoryServiceBind(_)
            | Error::TokenSerialization(_)
            | Error::TokenSigning(_)
            // Token review answers these in its 200 body; reaching here is a bug.
            | Error::MalformedToken(_)
            | Error::BadSignature
            | Error::ExpiredToken => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_BODY).into_response()
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Error::BadSignature,
            ErrorKind::ExpiredSignature => Error::ExpiredToken,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::InvalidAlgorithmName => Error::MalformedToken(err.to_string()),
            _ => Error::TokenSigning(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
