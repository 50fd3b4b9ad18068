//! Per-connection dispatch.
//!
//! A [`Session`] owns the sink of one connection and handles messages one at
//! a time through `&mut self`, so responses leave in the order requests
//! arrived. Concurrency comes from running many sessions side by side.

use serde_json::Value;
use sockroute_protocol::{codec, CorrelationId, OutboundEnvelope, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::transport::{ConnectionContext, EnvelopeSink, SinkError};

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An application stage failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The outbound envelope could not be delivered.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// What a session did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A PONG was sent.
    Heartbeat,
    /// A response with this status was sent.
    Response(StatusCode),
    /// Nothing could be sent.
    Dropped,
}

/// One connection's view of the dispatcher.
pub struct Session<S> {
    dispatcher: Dispatcher,
    context: ConnectionContext,
    sink: S,
    handled: u64,
}

impl<S: EnvelopeSink> Session<S> {
    /// Create a session for an accepted connection.
    pub fn new(dispatcher: Dispatcher, context: ConnectionContext, sink: S) -> Self {
        debug!(connection = %context.id(), "Session opened");
        Self {
            dispatcher,
            context,
            sink,
            handled: 0,
        }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    /// Messages handled so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Dispatch a decoded message and deliver its response.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage fails or the sink rejects the envelope.
    pub async fn handle(&mut self, raw: &Value) -> Result<Delivery, SessionError> {
        self.handled += 1;
        let outbound = self.dispatcher.dispatch(raw, &self.context).await?;
        self.deliver(outbound).await
    }

    /// Decode a raw frame, then dispatch it.
    ///
    /// Frames that are not JSON get a Request Format Error with an empty uuid.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage fails or the sink rejects the envelope.
    pub async fn handle_bytes(&mut self, data: &[u8]) -> Result<Delivery, SessionError> {
        match codec::decode(data) {
            Ok(raw) => self.handle(&raw).await,
            Err(e) => {
                self.handled += 1;
                debug!(connection = %self.context.id(), error = %e, "Undecodable frame");
                let reply = codec::reject_with_id(CorrelationId::empty());
                self.deliver(Some(reply.into())).await
            }
        }
    }

    async fn deliver(
        &mut self,
        outbound: Option<OutboundEnvelope>,
    ) -> Result<Delivery, SessionError> {
        let Some(outbound) = outbound else {
            warn!(connection = %self.context.id(), "No response could be built");
            return Ok(Delivery::Dropped);
        };

        let delivery = match outbound.status() {
            Some(status) => Delivery::Response(status),
            None => Delivery::Heartbeat,
        };
        self.sink.send(outbound).await?;
        Ok(delivery)
    }
}
