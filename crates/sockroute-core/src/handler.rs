//! Explicit handler registration.
//!
//! Handlers are keyed by the name [`handler_name`] derives from their route,
//! so registering `"sayHello"` stores the handler as `on_say_hello` and the
//! dispatcher finds it the same way.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auxiliary::AuxiliaryStore;
use crate::payload::{HandlerInput, SocketResult};
use crate::route::handler_name;
use crate::stage::{Handler, HandlerStage, Stage, StageResult};

/// Map from handler name to handler, built at initialization.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerStage>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a direct handler for a route.
    #[must_use]
    pub fn on<F>(mut self, route: &str, f: F) -> Self
    where
        F: Fn(HandlerInput, &mut AuxiliaryStore) -> StageResult<SocketResult>
            + Send
            + Sync
            + 'static,
    {
        self.register(handler_name(route), Stage::Direct(Arc::new(f)));
        self
    }

    /// Register a suspending handler for a route.
    #[must_use]
    pub fn on_async(mut self, route: &str, handler: impl Handler + 'static) -> Self {
        self.register(handler_name(route), Stage::Suspending(Arc::new(handler)));
        self
    }

    /// Register a handler under an explicit handler name.
    ///
    /// Returns the handler previously registered under that name, if any.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: HandlerStage,
    ) -> Option<HandlerStage> {
        let name = name.into();
        debug!(handler = %name, kind = ?handler, "Registered handler");

        let previous = self.handlers.insert(name.clone(), handler);
        if previous.is_some() {
            warn!(handler = %name, "Replaced existing handler");
        }
        previous
    }

    /// Find the handler for a route.
    #[must_use]
    pub fn resolve(&self, route: &str) -> Option<&HandlerStage> {
        self.handlers.get(&handler_name(route))
    }

    /// Get a handler by its name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HandlerStage> {
        self.handlers.get(name)
    }

    /// All registered handler names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.handlers.iter()).finish()
    }
}
