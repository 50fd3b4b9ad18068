//! Contracts between the dispatch core and the transport that feeds it.
//!
//! The transport owns the socket. It builds a [`ConnectionContext`] once at
//! connect time, delivers decoded messages to a [`Session`](crate::Session)
//! and accepts outbound envelopes through an [`EnvelopeSink`].

use async_trait::async_trait;
use serde_json::{Map, Value};
use sockroute_protocol::{EnvelopeError, OutboundEnvelope};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::mpsc;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a unique connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}_{:x}", timestamp, counter))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Connection scope handed to `check_access`.
///
/// Populated once when the connection is accepted and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    id: ConnectionId,
    user: Option<String>,
    attributes: Map<String, Value>,
}

impl ConnectionContext {
    /// Create a context for an unauthenticated connection.
    #[must_use]
    pub fn new(id: impl Into<ConnectionId>) -> Self {
        Self {
            id: id.into(),
            user: None,
            attributes: Map::new(),
        }
    }

    /// A context with a generated id and no identity.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(ConnectionId::generate())
    }

    /// Set the authenticated identity.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Attach an arbitrary attribute, e.g. a tenant or a role list.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// The connection id.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The authenticated identity, if any.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Check if the connection carries an identity.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Get an attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The connection was closed.
    #[error("Connection closed")]
    Closed,

    /// The envelope could not be encoded.
    #[error("Encoding failed: {0}")]
    Encode(#[from] EnvelopeError),

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Where a session delivers outbound envelopes.
#[async_trait]
pub trait EnvelopeSink: Send {
    /// Serialize and send one envelope.
    async fn send(&mut self, envelope: OutboundEnvelope) -> Result<(), SinkError>;
}

/// Collects envelopes in memory.
#[async_trait]
impl EnvelopeSink for Vec<OutboundEnvelope> {
    async fn send(&mut self, envelope: OutboundEnvelope) -> Result<(), SinkError> {
        self.push(envelope);
        Ok(())
    }
}

/// Forwards envelopes to a writer task.
#[async_trait]
impl EnvelopeSink for mpsc::UnboundedSender<OutboundEnvelope> {
    async fn send(&mut self, envelope: OutboundEnvelope) -> Result<(), SinkError> {
        mpsc::UnboundedSender::send(self, envelope).map_err(|_| SinkError::Closed)
    }
}
