//! Sequential execution mode.
//!
//! [`BlockingDispatcher`] drives each envelope to completion on the calling
//! thread. Suspending stages still work; they simply block the worker until
//! they finish. Do not call it from inside an async runtime.

use serde_json::Value;
use sockroute_protocol::OutboundEnvelope;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::transport::ConnectionContext;

/// A dispatcher for synchronous workers.
pub struct BlockingDispatcher {
    dispatcher: Dispatcher,
    runtime: Runtime,
}

impl BlockingDispatcher {
    /// Wrap a dispatcher with its own single-threaded runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created.
    pub fn new(dispatcher: Dispatcher) -> std::io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        debug!("Created blocking dispatcher runtime");
        Ok(Self {
            dispatcher,
            runtime,
        })
    }

    /// The wrapped dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispatch a decoded message, blocking until the response is built.
    ///
    /// # Errors
    ///
    /// Returns an error if an application stage fails.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime.
    pub fn dispatch(
        &self,
        raw: &Value,
        connection: &ConnectionContext,
    ) -> Result<Option<OutboundEnvelope>, DispatchError> {
        self.runtime.block_on(self.dispatcher.dispatch(raw, connection))
    }
}
