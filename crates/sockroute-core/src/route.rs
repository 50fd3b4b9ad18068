//! Route descriptors and the frozen route table.
//!
//! A [`RouteTable`] is built once from an ordered list of descriptors and is
//! read-only afterwards, so it can be shared across connections without
//! locking.

use serde_json::Value;
use sockroute_protocol::{FetchedData, HEARTBEAT_ROUTE};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::auxiliary::AuxiliaryStore;
use crate::payload::Payload;
use crate::stage::{
    AccessCheck, CheckAccessStage, CheckDataStage, DataCheck, DehydrateStage, Dehydrator,
    HydrateStage, Hydrator, Stage, StageResult,
};
use crate::transport::ConnectionContext;

/// Route table errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteTableError {
    /// A descriptor has an empty route name.
    #[error("Empty route name at position {0}")]
    EmptyRoute(usize),

    /// Two descriptors share a route name.
    #[error("Duplicate route: {0}")]
    DuplicateRoute(String),

    /// A descriptor uses the heartbeat route, which never reaches the table.
    #[error("Reserved route: {0}")]
    ReservedRoute(String),
}

/// Derive the handler name for a route: `on_<snake_case(route)>`.
///
/// `sayHello` maps to `on_say_hello`, `HTTPRequest` to `on_http_request` and
/// `load-node` to `on_load_node`. The [`HandlerRegistry`](crate::HandlerRegistry)
/// keys registrations with it and the dispatcher resolves with it.
#[must_use]
pub fn handler_name(route: &str) -> String {
    format!("on_{}", snake_case(route))
}

fn snake_case(route: &str) -> String {
    let chars: Vec<char> = route.chars().collect();
    let mut out = String::with_capacity(route.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '_' | '-' | '.' | ' ') {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            // Split "sayHello" and "item2Name", and the acronym in "HTTPRequest".
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Describes one route and the optional stages around its handler.
#[derive(Clone)]
pub struct RouteDescriptor {
    route: String,
    check_data: Option<CheckDataStage>,
    check_access: Option<CheckAccessStage>,
    hydrate: Option<HydrateStage>,
    dehydrate: Option<DehydrateStage>,
}

impl RouteDescriptor {
    /// Create a descriptor with no stages.
    #[must_use]
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            check_data: None,
            check_access: None,
            hydrate: None,
            dehydrate: None,
        }
    }

    /// Validate headers and payload with a closure.
    #[must_use]
    pub fn check_data<F>(mut self, f: F) -> Self
    where
        F: Fn(&FetchedData, &mut AuxiliaryStore) -> StageResult<bool> + Send + Sync + 'static,
    {
        self.check_data = Some(Stage::Direct(Arc::new(f)));
        self
    }

    /// Validate headers and payload with a suspending check.
    #[must_use]
    pub fn check_data_async(mut self, check: impl DataCheck + 'static) -> Self {
        self.check_data = Some(Stage::Suspending(Arc::new(check)));
        self
    }

    /// Authorize the call with a closure.
    #[must_use]
    pub fn check_access<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConnectionContext, &FetchedData, &mut AuxiliaryStore) -> StageResult<bool>
            + Send
            + Sync
            + 'static,
    {
        self.check_access = Some(Stage::Direct(Arc::new(f)));
        self
    }

    /// Authorize the call with a suspending check.
    #[must_use]
    pub fn check_access_async(mut self, check: impl AccessCheck + 'static) -> Self {
        self.check_access = Some(Stage::Suspending(Arc::new(check)));
        self
    }

    /// Load the handler payload with a closure.
    #[must_use]
    pub fn hydrate<F>(mut self, f: F) -> Self
    where
        F: Fn(&FetchedData) -> StageResult<Payload> + Send + Sync + 'static,
    {
        self.hydrate = Some(Stage::Direct(Arc::new(f)));
        self
    }

    /// Load the handler payload with a suspending hydrator.
    #[must_use]
    pub fn hydrate_async(mut self, hydrator: impl Hydrator + 'static) -> Self {
        self.hydrate = Some(Stage::Suspending(Arc::new(hydrator)));
        self
    }

    /// Serialize successful handler payloads with a closure.
    #[must_use]
    pub fn dehydrate<F>(mut self, f: F) -> Self
    where
        F: Fn(Payload) -> StageResult<Value> + Send + Sync + 'static,
    {
        self.dehydrate = Some(Stage::Direct(Arc::new(f)));
        self
    }

    /// Serialize successful handler payloads with a suspending dehydrator.
    #[must_use]
    pub fn dehydrate_async(mut self, dehydrator: impl Dehydrator + 'static) -> Self {
        self.dehydrate = Some(Stage::Suspending(Arc::new(dehydrator)));
        self
    }

    /// The route name.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Handler name derived from the route.
    #[must_use]
    pub fn handler_name(&self) -> String {
        handler_name(&self.route)
    }

    /// The `check_data` stage, if declared.
    #[must_use]
    pub fn data_check(&self) -> Option<&CheckDataStage> {
        self.check_data.as_ref()
    }

    /// The `check_access` stage, if declared.
    #[must_use]
    pub fn access_check(&self) -> Option<&CheckAccessStage> {
        self.check_access.as_ref()
    }

    /// The `hydrate` stage, if declared.
    #[must_use]
    pub fn hydrator(&self) -> Option<&HydrateStage> {
        self.hydrate.as_ref()
    }

    /// The `dehydrate` stage, if declared.
    #[must_use]
    pub fn dehydrator(&self) -> Option<&DehydrateStage> {
        self.dehydrate.as_ref()
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("route", &self.route)
            .field("check_data", &self.check_data)
            .field("check_access", &self.check_access)
            .field("hydrate", &self.hydrate)
            .field("dehydrate", &self.dehydrate)
            .finish()
    }
}

/// Immutable registry of route descriptors.
///
/// There is no way to add a route to a built table; build a new one instead.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    /// Descriptors in registration order.
    descriptors: Vec<RouteDescriptor>,
    /// Route name -> index into `descriptors`.
    index: HashMap<String, usize>,
}

impl RouteTable {
    /// Build a table from descriptors.
    ///
    /// # Errors
    ///
    /// Returns an error if a route name is empty, duplicated, or reserved for
    /// the heartbeat.
    pub fn build(
        descriptors: impl IntoIterator<Item = RouteDescriptor>,
    ) -> Result<Self, RouteTableError> {
        let mut table = Self::default();

        for (position, descriptor) in descriptors.into_iter().enumerate() {
            let route = descriptor.route();
            if route.is_empty() {
                return Err(RouteTableError::EmptyRoute(position));
            }
            if route == HEARTBEAT_ROUTE {
                return Err(RouteTableError::ReservedRoute(route.to_string()));
            }
            if table.index.contains_key(route) {
                return Err(RouteTableError::DuplicateRoute(route.to_string()));
            }

            debug!(route = %route, handler = %descriptor.handler_name(), "Registered route");
            table.index.insert(route.to_string(), table.descriptors.len());
            table.descriptors.push(descriptor);
        }

        Ok(table)
    }

    /// Look up a route by name.
    #[must_use]
    pub fn lookup(&self, route: &str) -> Option<&RouteDescriptor> {
        self.index.get(route).map(|&i| &self.descriptors[i])
    }

    /// Check if a route exists.
    #[must_use]
    pub fn contains(&self, route: &str) -> bool {
        self.index.contains_key(route)
    }

    /// Route names in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(RouteDescriptor::route)
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
