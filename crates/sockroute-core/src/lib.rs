//! # sockroute-core
//!
//! Route table, dispatch pipeline and per-connection sessions for sockroute.
//!
//! This crate provides the building blocks of the dispatch core:
//!
//! - **RouteTable** - Frozen registry of route descriptors
//! - **HandlerRegistry** - Explicit map from handler name to handler
//! - **Dispatcher** - Runs one envelope through the stage pipeline
//! - **Session** - Per-connection, strictly ordered dispatch into a sink
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│   Session   │────▶│ Dispatcher  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                                       │
//!        │            ┌─────────────┐            ▼
//!        └────────────│    Sink     │◀──── check_data ─▶ check_access
//!                     └─────────────┘      ─▶ hydrate ─▶ handler ─▶ dehydrate
//! ```
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use sockroute_core::{
//!     ConnectionContext, Dispatcher, HandlerRegistry, RouteDescriptor, RouteTable, SocketResult,
//! };
//!
//! # tokio_test_block_on(async {
//! let routes = RouteTable::build([RouteDescriptor::new("sayHello")]).unwrap();
//! let handlers = HandlerRegistry::new()
//!     .on("sayHello", |_input, _aux| Ok(SocketResult::ok(json!({"msg": "hi"}))));
//! let dispatcher = Dispatcher::new(routes, handlers);
//!
//! let raw = json!({"uuid": "abc", "route": "sayHello", "headers": null, "payload": null});
//! let reply = dispatcher
//!     .dispatch(&raw, &ConnectionContext::anonymous())
//!     .await
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(
//!     serde_json::to_value(&reply).unwrap(),
//!     json!({"uuid": "abc", "status": 200, "headers": null, "payload": {"msg": "hi"}})
//! );
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod auxiliary;
pub mod blocking;
pub mod dispatcher;
pub mod handler;
pub mod payload;
pub mod route;
pub mod session;
pub mod stage;
pub mod transport;

pub use auxiliary::AuxiliaryStore;
pub use blocking::BlockingDispatcher;
pub use dispatcher::{DispatchError, Dispatcher};
pub use handler::HandlerRegistry;
pub use payload::{DomainValue, HandlerInput, HydratedMessageData, Payload, SocketResult};
pub use route::{handler_name, RouteDescriptor, RouteTable, RouteTableError};
pub use session::{Delivery, Session, SessionError};
pub use stage::{
    AccessCheck, BoxError, DataCheck, Dehydrator, Handler, Hydrator, Stage, StageKind, StageResult,
};
pub use transport::{ConnectionContext, ConnectionId, EnvelopeSink, SinkError};

pub use sockroute_protocol::{
    CallError, CorrelationId, FetchedData, Headers, OutboundEnvelope, RequestEnvelope,
    ResponseEnvelope, StatusCode,
};
