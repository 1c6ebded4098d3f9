use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use crate::address::AddressError;
use crate::auth::AuthError;
use crate::directory::DirectoryError;
use crate::group::GroupError;
use crate::identity::IdentityError;
use crate::message::MessageError;
use crate::routing::RoutingError;
use crate::storage::StorageError;

pub type AppResult<T> = Result<T, AppError>;

/// Coarse failure classes shared by every component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: addresses, keys, envelopes
    Format,
    NotFound,
    Authentication,
    /// Well-formed input rejected by a rule
    Validation,
    Forbidden,
    /// DNS or upstream transport failure
    Network,
    /// Upstream data that could not be interpreted
    Parse,
    Storage,
    Internal,
}

/// Application error type returned by every handler
///
/// Wraps the per-component errors so the boundary decides status codes
/// in one place.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

type Class = (ErrorKind, StatusCode, &'static str);

fn classify_routing(err: &RoutingError) -> Class {
    match err.root() {
        RoutingError::InvalidAddress(_) => {
            (ErrorKind::Format, StatusCode::BAD_REQUEST, "INVALID_ADDRESS")
        }
        RoutingError::NoRecord(_) => (ErrorKind::NotFound, StatusCode::NOT_FOUND, "ROUTE_NOT_FOUND"),
        RoutingError::LookupFailed { .. } => {
            (ErrorKind::Network, StatusCode::BAD_GATEWAY, "DNS_LOOKUP_FAILED")
        }
        RoutingError::LookupTimedOut(_) => {
            (ErrorKind::Network, StatusCode::GATEWAY_TIMEOUT, "DNS_TIMEOUT")
        }
        RoutingError::UnparsableRecord(_) => {
            (ErrorKind::Parse, StatusCode::BAD_GATEWAY, "INVALID_ROUTE_RECORD")
        }
        RoutingError::RoutingFailed { .. } => {
            (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR, "ROUTING_ERROR")
        }
    }
}

fn classify_directory(err: &DirectoryError) -> Class {
    match err {
        DirectoryError::Storage(_) => STORAGE,
        DirectoryError::Routing(e) => classify_routing(e),
        DirectoryError::Remote { .. } => (
            ErrorKind::Network,
            StatusCode::BAD_GATEWAY,
            "IDENTITY_LOOKUP_FAILED",
        ),
    }
}

const STORAGE: Class = (
    ErrorKind::Storage,
    StatusCode::INTERNAL_SERVER_ERROR,
    "STORAGE_ERROR",
);

impl AppError {
    fn classify(&self) -> Class {
        match self {
            AppError::Address(_) => (ErrorKind::Format, StatusCode::BAD_REQUEST, "INVALID_ADDRESS"),
            AppError::Identity(IdentityError::InvalidAddress(_)) => {
                (ErrorKind::Format, StatusCode::BAD_REQUEST, "INVALID_ADDRESS")
            }
            AppError::Identity(IdentityError::InvalidPublicKey(_)) => {
                (ErrorKind::Format, StatusCode::BAD_REQUEST, "INVALID_PUBLIC_KEY")
            }
            AppError::Routing(e) => classify_routing(e),
            AppError::Auth(e) => {
                let unauthorized =
                    |code: &'static str| -> Class { (ErrorKind::Authentication, StatusCode::UNAUTHORIZED, code) };
                match e {
                    AuthError::MissingHeader => unauthorized("AUTH_MISSING"),
                    AuthError::BadScheme => unauthorized("AUTH_BAD_SCHEME"),
                    AuthError::MalformedEnvelope(_) => unauthorized("AUTH_MALFORMED"),
                    AuthError::InvalidAddress(_) => unauthorized("AUTH_INVALID_ADDRESS"),
                    AuthError::StaleOrFutureTimestamp { .. } => unauthorized("AUTH_TIMESTAMP"),
                    AuthError::UnknownIdentity(_) => unauthorized("AUTH_UNKNOWN_IDENTITY"),
                    AuthError::BadSignatureEncoding(_) => unauthorized("AUTH_BAD_SIGNATURE"),
                    AuthError::SignatureMismatch => unauthorized("AUTH_SIGNATURE_MISMATCH"),
                    AuthError::ReplayedNonce => unauthorized("AUTH_REPLAYED_NONCE"),
                    AuthError::ReplayCacheFull => (
                        ErrorKind::Internal,
                        StatusCode::SERVICE_UNAVAILABLE,
                        "REPLAY_CACHE_FULL",
                    ),
                    AuthError::NonceQuotaExceeded(_) => (
                        ErrorKind::Validation,
                        StatusCode::TOO_MANY_REQUESTS,
                        "NONCE_QUOTA_EXCEEDED",
                    ),
                    AuthError::IdentityLookup(e) => classify_directory(e),
                }
            }
            AppError::Group(e) => match e {
                GroupError::InvalidAddress(_) => {
                    (ErrorKind::Format, StatusCode::BAD_REQUEST, "INVALID_ADDRESS")
                }
                GroupError::MissingFields(_) => {
                    (ErrorKind::Validation, StatusCode::BAD_REQUEST, "MISSING_FIELDS")
                }
                GroupError::GroupExists(_) => {
                    (ErrorKind::Validation, StatusCode::CONFLICT, "GROUP_EXISTS")
                }
                GroupError::NotFound(_) => {
                    (ErrorKind::NotFound, StatusCode::NOT_FOUND, "GROUP_NOT_FOUND")
                }
                GroupError::AlreadyMember(_) => {
                    (ErrorKind::Validation, StatusCode::CONFLICT, "ALREADY_MEMBER")
                }
                GroupError::NotMember(_) => {
                    (ErrorKind::Validation, StatusCode::CONFLICT, "NOT_MEMBER")
                }
                GroupError::NotPermitted { .. } => {
                    (ErrorKind::Forbidden, StatusCode::FORBIDDEN, "NOT_PERMITTED")
                }
                GroupError::Storage(_) => STORAGE,
            },
            AppError::Message(e) => match e {
                MessageError::MissingFields(_) => {
                    (ErrorKind::Validation, StatusCode::BAD_REQUEST, "MISSING_FIELDS")
                }
                MessageError::InvalidAddress(_) => {
                    (ErrorKind::Format, StatusCode::BAD_REQUEST, "INVALID_ADDRESS")
                }
                MessageError::SenderMismatch { .. } => {
                    (ErrorKind::Forbidden, StatusCode::FORBIDDEN, "SENDER_MISMATCH")
                }
                MessageError::UnknownSender(_) => {
                    (ErrorKind::Validation, StatusCode::BAD_REQUEST, "UNKNOWN_SENDER")
                }
                MessageError::BadSignatureEncoding(_) => {
                    (ErrorKind::Format, StatusCode::BAD_REQUEST, "INVALID_SIGNATURE")
                }
                MessageError::SignatureMismatch => {
                    (ErrorKind::Validation, StatusCode::BAD_REQUEST, "SIGNATURE_MISMATCH")
                }
                MessageError::RelayDenied(_) => {
                    (ErrorKind::Forbidden, StatusCode::FORBIDDEN, "RELAY_DENIED")
                }
                MessageError::IdentityLookup(e) => classify_directory(e),
                MessageError::Routing(e) => classify_routing(e),
                MessageError::Storage(_) => STORAGE,
            },
            AppError::Storage(_) => STORAGE,
            AppError::Forbidden(_) => (ErrorKind::Forbidden, StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::BadRequest(_) => (ErrorKind::Validation, StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::NotFound(_) => (ErrorKind::NotFound, StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Internal(_) => (
                ErrorKind::Internal,
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.classify().0
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        self.classify().1
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        self.classify().2
    }

    /// Get a user-friendly error message (without sensitive details)
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Authentication => format!("Authentication failed: {}", self),
            ErrorKind::Storage | ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Server error occurred"
            );
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                error = %self,
                error_code = %code,
                "Authentication failed"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = %code,
                "Client error occurred"
            );
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        let error_code = self.error_code();

        // Upstream failures stay descriptive; local server faults are masked
        let body = json!({
            "error": self.user_message(),
            "error_code": error_code,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (
                AddressError::InvalidFormat("x".to_string()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                RoutingError::NoRecord("_emsg.x.com".to_string()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                RoutingError::LookupTimedOut("_emsg.x.com".to_string()).into(),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                RoutingError::UnparsableRecord("junk".to_string()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (AuthError::ReplayedNonce.into(), StatusCode::UNAUTHORIZED),
            (
                AuthError::NonceQuotaExceeded("a#x.com".to_string()).into(),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AuthError::IdentityLookup(DirectoryError::Remote {
                    server: "https://x.com".to_string(),
                    reason: "HTTP 500".to_string(),
                })
                .into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                MessageError::RelayDenied("c#y.com".to_string()).into(),
                StatusCode::FORBIDDEN,
            ),
            (
                GroupError::AlreadyMember("a#x.com".to_string()).into(),
                StatusCode::CONFLICT,
            ),
            (
                GroupError::NotFound("g".to_string()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                MessageError::MissingFields("to".to_string()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                MessageError::SenderMismatch {
                    claimed: "a#x.com".to_string(),
                    authenticated: "b#x.com".to_string(),
                }
                .into(),
                StatusCode::FORBIDDEN,
            ),
            (
                StorageError::Backend("down".to_string()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
        }
    }

    #[test]
    fn test_wrapped_routing_failure_uses_root_cause() {
        let err: AppError = MessageError::Routing(RoutingError::RoutingFailed {
            address: "b#y.com".to_string(),
            source: Box::new(RoutingError::LookupFailed {
                name: "_emsg.y.com".to_string(),
                reason: "servfail".to_string(),
            }),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.error_code(), "DNS_LOOKUP_FAILED");
    }

    #[tokio::test]
    async fn test_server_errors_are_masked() {
        let err: AppError = StorageError::Backend("password=hunter2".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["error_code"], "STORAGE_ERROR");
        assert_eq!(body["status"], 500);
    }
}
