//! # sockroute-protocol
//!
//! Wire envelope definitions for the sockroute message dispatch core.
//!
//! Clients and servers exchange JSON envelopes. A request names a route and
//! carries a correlation id; the matching response echoes the id and carries
//! an HTTP-like status code.
//!
//! ## Envelopes
//!
//! - Request: `{"uuid": string|number, "route": string, "headers": object|null, "payload": any}`
//! - Response: `{"uuid": string|number, "status": integer, "headers": object|null, "payload": any}`
//! - Heartbeat: a request for route `PING` is answered with a `PONG` envelope
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use sockroute_protocol::{codec, StatusCode};
//!
//! let raw = json!({"uuid": "abc", "route": "sayHello", "headers": null, "payload": null});
//! let request = codec::parse(&raw).unwrap();
//!
//! let response = request
//!     .respond(None, &json!({"msg": "hi"}), StatusCode::OK)
//!     .unwrap();
//! assert_eq!(response.status, StatusCode::OK);
//! assert_eq!(response.uuid, request.uuid);
//! ```

pub mod call_error;
pub mod codec;
pub mod envelope;
pub mod status;

pub use call_error::{set_error, CallError};
pub use codec::{decode, encode, parse, EnvelopeError};
pub use envelope::{
    CorrelationId, FetchedData, Headers, OutboundEnvelope, RequestEnvelope, ResponseEnvelope,
    HEARTBEAT_ACK_ROUTE, HEARTBEAT_ROUTE,
};
pub use status::StatusCode;
