//! Envelope types for the sockroute protocol.
//!
//! Requests and responses are two shapes of one family: both carry a
//! correlation id (`uuid`), optional `headers` and a `payload`. A request adds
//! the `route` it targets, a response adds the `status` of the call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{error, warn};

use crate::codec::EnvelopeError;
use crate::status::StatusCode;

/// Reserved route used by clients to check that the connection is alive.
pub const HEARTBEAT_ROUTE: &str = "PING";

/// Route carried by the reply to a heartbeat.
pub const HEARTBEAT_ACK_ROUTE: &str = "PONG";

/// Envelope headers: an arbitrary JSON object.
pub type Headers = Map<String, Value>;

/// Correlation id echoed from a request into its response.
///
/// Uniqueness is up to the client; the protocol only echoes the value back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrelationId {
    /// Integer id.
    Int(i64),
    /// Integer id above `i64::MAX`.
    UInt(u64),
    /// String id.
    Text(String),
}

impl CorrelationId {
    /// The id used when none could be recovered from the input.
    #[must_use]
    pub fn empty() -> Self {
        CorrelationId::Text(String::new())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationId::Int(id) => write!(f, "{}", id),
            CorrelationId::UInt(id) => write!(f, "{}", id),
            CorrelationId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for CorrelationId {
    fn from(id: i64) -> Self {
        CorrelationId::Int(id)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        CorrelationId::Text(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        CorrelationId::Text(id.to_string())
    }
}

/// Headers and payload extracted from a request, before hydration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedData {
    /// Request headers.
    pub headers: Option<Headers>,
    /// Raw request payload.
    pub payload: Value,
}

/// An inbound request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Correlation id.
    pub uuid: CorrelationId,
    /// Route selecting the handler.
    pub route: String,
    /// Optional metadata, e.g. an entity id or an API key.
    #[serde(default)]
    pub headers: Option<Headers>,
    /// Request data.
    #[serde(default)]
    pub payload: Value,
}

impl RequestEnvelope {
    /// Create a request with no headers and a null payload.
    #[must_use]
    pub fn new(uuid: impl Into<CorrelationId>, route: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            route: route.into(),
            headers: None,
            payload: Value::Null,
        }
    }

    /// Set the request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Set the request payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether this is a liveness check (`PING`).
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.route == HEARTBEAT_ROUTE
    }

    /// The reply to a heartbeat: route `PONG`, same correlation id, nothing else.
    #[must_use]
    pub fn heartbeat_ack(&self) -> RequestEnvelope {
        RequestEnvelope::new(self.uuid.clone(), HEARTBEAT_ACK_ROUTE)
    }

    /// Copy out the headers and payload.
    #[must_use]
    pub fn fetch_data(&self) -> FetchedData {
        FetchedData {
            headers: self.headers.clone(),
            payload: self.payload.clone(),
        }
    }

    /// Build the response to this request.
    ///
    /// Returns `None` only if neither the requested response nor the degraded
    /// internal-error response could be built. See [`ResponseEnvelope::build`].
    #[must_use]
    pub fn respond<P>(
        &self,
        headers: Option<Headers>,
        payload: &P,
        status: StatusCode,
    ) -> Option<ResponseEnvelope>
    where
        P: Serialize + ?Sized,
    {
        ResponseEnvelope::build(self.uuid.clone(), headers, payload, status)
    }
}

/// An outbound response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Correlation id of the request being answered.
    pub uuid: CorrelationId,
    /// Call status.
    #[serde(default)]
    pub status: StatusCode,
    /// Optional response metadata.
    #[serde(default)]
    pub headers: Option<Headers>,
    /// Response data.
    #[serde(default)]
    pub payload: Value,
}

impl ResponseEnvelope {
    /// Build and validate a response.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented as JSON or the
    /// status is outside `100..=599`.
    pub fn try_new<P>(
        uuid: CorrelationId,
        headers: Option<Headers>,
        payload: &P,
        status: StatusCode,
    ) -> Result<Self, EnvelopeError>
    where
        P: Serialize + ?Sized,
    {
        if !status.is_valid() {
            return Err(EnvelopeError::InvalidStatus(status.as_u16()));
        }

        let payload = serde_json::to_value(payload).map_err(EnvelopeError::Payload)?;

        Ok(Self {
            uuid,
            status,
            headers,
            payload,
        })
    }

    /// The minimal internal-error response for a correlation id.
    ///
    /// # Errors
    ///
    /// Returns an error if the response fails validation.
    pub fn degraded(uuid: CorrelationId) -> Result<Self, EnvelopeError> {
        Self::try_new(uuid, None, &Value::Null, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Build a response, falling back to [`ResponseEnvelope::degraded`] when
    /// the requested one is invalid, and to nothing at all when that fails too.
    ///
    /// Reporting an error must never raise another one, so this never fails.
    #[must_use]
    pub fn build<P>(
        uuid: CorrelationId,
        headers: Option<Headers>,
        payload: &P,
        status: StatusCode,
    ) -> Option<Self>
    where
        P: Serialize + ?Sized,
    {
        match Self::try_new(uuid.clone(), headers, payload, status) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(uuid = %uuid, status = %status, error = %e, "Degrading invalid response");
                match Self::degraded(uuid.clone()) {
                    Ok(response) => Some(response),
                    Err(e) => {
                        error!(uuid = %uuid, error = %e, "Dropping response");
                        None
                    }
                }
            }
        }
    }
}

/// Anything the dispatcher hands to the transport.
///
/// Heartbeat acks are request-shaped (they carry a route), everything else is
/// a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundEnvelope {
    /// `PONG` reply to a heartbeat.
    Heartbeat(RequestEnvelope),
    /// Response to a routed request.
    Response(ResponseEnvelope),
}

impl OutboundEnvelope {
    /// Correlation id of the envelope.
    #[must_use]
    pub fn uuid(&self) -> &CorrelationId {
        match self {
            OutboundEnvelope::Heartbeat(ack) => &ack.uuid,
            OutboundEnvelope::Response(response) => &response.uuid,
        }
    }

    /// Response status, if this is a response.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            OutboundEnvelope::Heartbeat(_) => None,
            OutboundEnvelope::Response(response) => Some(response.status),
        }
    }

    /// Get the response, if this is one.
    #[must_use]
    pub fn as_response(&self) -> Option<&ResponseEnvelope> {
        match self {
            OutboundEnvelope::Response(response) => Some(response),
            OutboundEnvelope::Heartbeat(_) => None,
        }
    }
}

impl From<ResponseEnvelope> for OutboundEnvelope {
    fn from(response: ResponseEnvelope) -> Self {
        OutboundEnvelope::Response(response)
    }
}
