use aibtc_auth::AuthError;
use aibtc_kv::KvError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Message shown to callers when the service cannot check credentials.
/// Operational detail only goes to the log.
const UNAVAILABLE_MESSAGE: &str = "Unable to verify credentials";

/// Errors surfaced at the request boundary
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Missing or unparseable request fields
    #[error("{0}")]
    MalformedInput(String),

    /// Missing or wrong shared key, or no session for the supplied identifier
    #[error("{0}")]
    Unauthenticated(String),

    /// A required shared key is absent from the store, or the config is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store failed after retries
    #[error("Store error: {0}")]
    Store(#[from] KvError),

    #[error("Unsupported endpoint: {endpoint}, supported endpoints: {supported}")]
    UnsupportedEndpoint { endpoint: String, supported: String },

    #[error("Unsupported method: {0}, supported method: POST")]
    MethodNotAllowed(String),

    #[error("Request at {0} does not start with base path /auth")]
    OutsideBasePath(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::MalformedInput(_)) | Self::Auth(AuthError::InvalidAddress(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Auth(AuthError::SignatureInvalid)
            | Self::Auth(AuthError::AddressDerivationFailed(_)) => StatusCode::UNAUTHORIZED,
            Self::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) | Self::Configuration(_) | Self::Store(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::UnsupportedEndpoint { .. } | Self::OutsideBasePath(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Whether the failure is an operational fault rather than a caller fault
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Store(_))
    }

    /// Text placed in the response envelope
    pub fn public_message(&self) -> String {
        if self.is_operational() {
            UNAVAILABLE_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_operational() {
            log::error!("{}", self);
        } else if status == StatusCode::UNAUTHORIZED {
            log::warn!("Rejected request: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}
