use std::error::Error;
use std::fmt;

use serde_json::json;
use warp::http::StatusCode;
use warp::reply::Response;

#[derive(Debug, Clone, PartialEq)]
pub enum ArenaError {
    // Identity errors
    Unauthorized,
    AuthError(String),
    Forbidden(String),

    // Lookup and lifecycle errors
    NotFound(String),
    InvalidState(String),
    Conflict(String),

    // Move errors
    IllegalMove(String),

    // Request validation errors
    Validation(String),

    // Stored data no longer makes sense (e.g. an unparseable position)
    InternalInconsistency(String),

    // Collaborator errors
    Storage(String),
    RoomClosed,

    // Configuration errors
    ConfigError(String),
}

impl ArenaError {
    /// HTTP status used when this error reaches a caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::AuthError(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) | Self::IllegalMove(_) | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InternalInconsistency(_)
            | Self::Storage(_)
            | Self::RoomClosed
            | Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing message. Internal details never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized | Self::AuthError(_) => "Unauthorized".to_string(),
            Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::InvalidState(msg)
            | Self::IllegalMove(msg)
            | Self::Conflict(msg)
            | Self::Validation(msg) => msg.clone(),
            Self::InternalInconsistency(_)
            | Self::Storage(_)
            | Self::RoomClosed
            | Self::ConfigError(_) => "Internal server error".to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "Unauthorized access"),
            Self::AuthError(msg) => write!(f, "Authentication error: {}", msg),
            Self::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::IllegalMove(msg) => write!(f, "Illegal move: {}", msg),
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::InternalInconsistency(msg) => write!(f, "Internal inconsistency: {}", msg),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
            Self::RoomClosed => write!(f, "Broadcast room is no longer running"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for ArenaError {}

impl warp::Reply for ArenaError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            log::error!("Request failed with internal error: {}", self);
        } else {
            log::debug!("Request rejected: {}", self);
        }

        let body = json!({
            "status": "error",
            "message": self.public_message(),
        });
        warp::reply::with_status(warp::reply::json(&body), self.status_code()).into_response()
    }
}

// Generic result type for the arena
pub type Result<T> = std::result::Result<T, ArenaError>;
