//! Codec for turning raw input into request envelopes and outbound envelopes
//! into wire text.
//!
//! Envelopes are plain JSON objects. Decoding is split in two steps so that a
//! transport can reply to input that is valid JSON but not a valid envelope:
//! [`decode`] turns bytes into a JSON value, [`parse`] validates the value.

use serde::de::Error as _;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::call_error::{set_error, CallError};
use crate::envelope::{CorrelationId, OutboundEnvelope, RequestEnvelope, ResponseEnvelope};

/// Errors raised while decoding, validating or encoding envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Input is not JSON.
    #[error("Malformed JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// Input is JSON but not a request envelope.
    #[error("Invalid request envelope: {0}")]
    InvalidRequest(#[source] serde_json::Error),

    /// Response payload cannot be represented as JSON.
    #[error("Payload is not serializable: {0}")]
    Payload(#[source] serde_json::Error),

    /// Response status is outside the valid range.
    #[error("Status code {0} is out of range")]
    InvalidStatus(u16),

    /// Outbound envelope could not be encoded.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Decode raw bytes into a JSON value.
///
/// # Errors
///
/// Returns an error if the data is not valid JSON.
pub fn decode(data: &[u8]) -> Result<Value, EnvelopeError> {
    serde_json::from_slice(data).map_err(EnvelopeError::Json)
}

/// Validate a decoded message as a request envelope.
///
/// Unknown fields are ignored; `headers` and `payload` default to null.
///
/// # Errors
///
/// Returns an error if `raw` is not an object, if `uuid` or `route` is
/// missing or has the wrong shape, or if `headers` is neither an object nor
/// null.
pub fn parse(raw: &Value) -> Result<RequestEnvelope, EnvelopeError> {
    // Sequences would otherwise deserialize positionally.
    if !raw.is_object() {
        return Err(EnvelopeError::InvalidRequest(serde_json::Error::custom(
            "envelope must be a JSON object",
        )));
    }
    RequestEnvelope::deserialize(raw).map_err(EnvelopeError::InvalidRequest)
}

/// Recover the correlation id from input that failed to parse.
///
/// Falls back to the empty id when `raw` is not an object or its `uuid` is
/// missing or unusable.
#[must_use]
pub fn correlation_hint(raw: &Value) -> CorrelationId {
    raw.get("uuid")
        .and_then(|uuid| CorrelationId::deserialize(uuid).ok())
        .unwrap_or_default()
}

/// Build the `BadRequestFormat` response for input that is not an envelope.
#[must_use]
pub fn reject_malformed(raw: &Value) -> ResponseEnvelope {
    reject_with_id(correlation_hint(raw))
}

/// Build the `BadRequestFormat` response for a known (possibly empty) id.
#[must_use]
pub fn reject_with_id(uuid: CorrelationId) -> ResponseEnvelope {
    let error = CallError::BadRequestFormat;
    ResponseEnvelope {
        uuid,
        status: error.status(),
        headers: None,
        payload: set_error(error),
    }
}

/// Encode an outbound envelope as JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(envelope: &OutboundEnvelope) -> Result<String, EnvelopeError> {
    serde_json::to_string(envelope).map_err(EnvelopeError::Encode)
}
