//! Protocol-level failure kinds and their error payloads.

use serde_json::{json, Value};
use std::fmt;

use crate::status::StatusCode;

/// Failures detected by the dispatcher itself.
///
/// Each kind is bound to a fixed status code and is reported to the client
/// as `{"error": <text>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallError {
    /// `check_data` rejected the request.
    InvalidData,
    /// `check_access` rejected the request.
    AccessDenied,
    /// No route with the requested name is registered.
    RouteNotFound,
    /// The route exists but no handler is registered for it.
    MethodNotImplemented,
    /// The inbound message is not a well-formed request envelope.
    BadRequestFormat,
}

impl CallError {
    /// Client-facing error text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CallError::InvalidData => "Invalid Data",
            CallError::AccessDenied => "Access Denied",
            CallError::RouteNotFound => "Route Not Found",
            CallError::MethodNotImplemented => "Method Not Implemented",
            CallError::BadRequestFormat => "Request Format Error",
        }
    }

    /// Status code reported alongside this error.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            CallError::InvalidData | CallError::BadRequestFormat => StatusCode::BAD_REQUEST,
            CallError::AccessDenied => StatusCode::FORBIDDEN,
            CallError::RouteNotFound => StatusCode::NOT_FOUND,
            CallError::MethodNotImplemented => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the error payload for a failure kind.
#[must_use]
pub fn set_error(error: CallError) -> Value {
    json!({ "error": error.as_str() })
}
