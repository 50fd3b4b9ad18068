//! Payload values flowing through the pipeline.
//!
//! On the wire every payload is JSON. Between `hydrate` and `dehydrate` a
//! payload may instead hold a domain value of any type, carried type-erased
//! in a [`DomainValue`].

use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::Value;
use sockroute_protocol::{FetchedData, Headers, StatusCode};
use std::any::{type_name, Any};
use std::fmt;

type ToJsonFn = fn(&(dyn Any + Send + Sync)) -> serde_json::Result<Value>;

fn serialize_as<T>(value: &(dyn Any + Send + Sync)) -> serde_json::Result<Value>
where
    T: Serialize + Any,
{
    match value.downcast_ref::<T>() {
        Some(value) => serde_json::to_value(value),
        None => Err(serde_json::Error::custom("domain value type mismatch")),
    }
}

/// A type-erased domain value.
///
/// Values created with [`DomainValue::serializable`] can be turned into JSON
/// when they reach the wire without a dehydrate step; values created with
/// [`DomainValue::opaque`] cannot, and such a response is degraded to an
/// internal error.
pub struct DomainValue {
    value: Box<dyn Any + Send + Sync>,
    to_json: Option<ToJsonFn>,
    type_name: &'static str,
}

impl DomainValue {
    /// Wrap a value that has no JSON representation.
    #[must_use]
    pub fn opaque<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            value: Box::new(value),
            to_json: None,
            type_name: type_name::<T>(),
        }
    }

    /// Wrap a value that can be serialized to JSON.
    #[must_use]
    pub fn serializable<T>(value: T) -> Self
    where
        T: Serialize + Any + Send + Sync,
    {
        Self {
            value: Box::new(value),
            to_json: Some(serialize_as::<T>),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the wrapped type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check if the wrapped value has type `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrow the wrapped value as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the wrapped value out as `T`, or get `self` back on mismatch.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if the value is not a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        if !self.value.is::<T>() {
            return Err(self);
        }
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self { value, ..self }),
        }
    }

    /// Convert to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error for opaque values and when serialization fails.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        match self.to_json {
            Some(to_json) => to_json(self.value.as_ref()),
            None => Err(serde_json::Error::custom(format!(
                "{} is not serializable",
                self.type_name
            ))),
        }
    }
}

impl fmt::Debug for DomainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainValue")
            .field("type", &self.type_name)
            .field("serializable", &self.to_json.is_some())
            .finish()
    }
}

/// A payload: raw JSON or a domain value.
#[derive(Debug)]
pub enum Payload {
    /// Wire JSON.
    Json(Value),
    /// Hydrated or handler-produced domain value.
    Domain(DomainValue),
}

impl Payload {
    /// Wrap an opaque domain value.
    #[must_use]
    pub fn domain<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Payload::Domain(DomainValue::opaque(value))
    }

    /// Wrap a serializable domain value.
    #[must_use]
    pub fn serializable<T>(value: T) -> Self
    where
        T: Serialize + Any + Send + Sync,
    {
        Payload::Domain(DomainValue::serializable(value))
    }

    /// Borrow the JSON value, if this is one.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Domain(_) => None,
        }
    }

    /// Take the JSON value, if this is one.
    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Domain(_) => None,
        }
    }

    /// Borrow the domain value as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Payload::Domain(value) => value.downcast_ref::<T>(),
            Payload::Json(_) => None,
        }
    }

    /// Take the domain value out as `T`, or get `self` back on mismatch.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if this is JSON or a domain value of another type.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        match self {
            Payload::Domain(value) => value.downcast::<T>().map_err(Payload::Domain),
            json => Err(json),
        }
    }

    /// Convert to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a domain value without a JSON form.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        match self {
            Payload::Json(value) => Ok(value.clone()),
            Payload::Domain(value) => value.to_json(),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Json(Value::Null)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Json(value) => value.serialize(serializer),
            Payload::Domain(value) => value
                .to_json()
                .map_err(S::Error::custom)?
                .serialize(serializer),
        }
    }
}

/// Headers and payload after `hydrate` ran.
#[derive(Debug)]
pub struct HydratedMessageData {
    /// Request headers, untouched.
    pub headers: Option<Headers>,
    /// Output of `hydrate`.
    pub payload: Payload,
}

/// What a handler receives.
#[derive(Debug)]
pub enum HandlerInput {
    /// The route has no `hydrate` stage.
    Fetched(FetchedData),
    /// The route's `hydrate` stage produced the payload.
    Hydrated(HydratedMessageData),
}

impl HandlerInput {
    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> Option<&Headers> {
        match self {
            HandlerInput::Fetched(data) => data.headers.as_ref(),
            HandlerInput::Hydrated(data) => data.headers.as_ref(),
        }
    }

    /// Check if the payload went through `hydrate`.
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        matches!(self, HandlerInput::Hydrated(_))
    }

    /// Borrow the raw JSON payload, when the route does not hydrate.
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        match self {
            HandlerInput::Fetched(data) => Some(&data.payload),
            HandlerInput::Hydrated(data) => data.payload.as_json(),
        }
    }

    /// Take the payload.
    #[must_use]
    pub fn into_payload(self) -> Payload {
        match self {
            HandlerInput::Fetched(data) => Payload::Json(data.payload),
            HandlerInput::Hydrated(data) => data.payload,
        }
    }
}

/// Result of a handler call.
#[derive(Debug, Default)]
pub struct SocketResult {
    /// Response headers.
    pub headers: Option<Headers>,
    /// Response payload, before `dehydrate`.
    pub payload: Payload,
    /// Response status; `None` means 200.
    pub status: Option<StatusCode>,
}

impl SocketResult {
    /// A result with the default status.
    #[must_use]
    pub fn ok(payload: impl Into<Payload>) -> Self {
        Self {
            headers: None,
            payload: payload.into(),
            status: None,
        }
    }

    /// A result with an explicit status.
    #[must_use]
    pub fn with_status(payload: impl Into<Payload>, status: StatusCode) -> Self {
        Self {
            headers: None,
            payload: payload.into(),
            status: Some(status),
        }
    }

    /// Attach response headers.
    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// The effective status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }
}
