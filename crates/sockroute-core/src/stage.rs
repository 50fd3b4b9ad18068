//! Pipeline stage contracts.
//!
//! Every stage a route can declare (and the handler itself) comes in two
//! flavours:
//!
//! - **Direct** - a plain closure, run to completion on the calling task.
//! - **Suspending** - an async trait object that may yield while it waits on
//!   I/O.
//!
//! An absent stage is simply `None` on the route descriptor. Errors returned
//! by stages are not interpreted by the dispatcher; they are handed back to
//! the caller as [`DispatchError`](crate::DispatchError).

use async_trait::async_trait;
use serde_json::Value;
use sockroute_protocol::FetchedData;
use std::fmt;
use std::sync::Arc;

use crate::auxiliary::AuxiliaryStore;
use crate::payload::{HandlerInput, Payload, SocketResult};
use crate::transport::ConnectionContext;

/// Error type returned by application stages.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by application stages.
pub type StageResult<T> = Result<T, BoxError>;

/// Validates request headers and payload.
#[async_trait]
pub trait DataCheck: Send + Sync {
    /// Return `false` to reject the request as invalid data.
    async fn check(&self, data: &FetchedData, aux: &mut AuxiliaryStore) -> StageResult<bool>;
}

/// Decides whether the connection may call the route.
#[async_trait]
pub trait AccessCheck: Send + Sync {
    /// Return `false` to reject the request as forbidden.
    async fn check(
        &self,
        connection: &ConnectionContext,
        data: &FetchedData,
        aux: &mut AuxiliaryStore,
    ) -> StageResult<bool>;
}

/// Loads a domain value from the request, e.g. an entity by id.
#[async_trait]
pub trait Hydrator: Send + Sync {
    /// Produce the payload the handler will receive.
    async fn hydrate(&self, data: &FetchedData) -> StageResult<Payload>;
}

/// Handles a routed request.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Process the request.
    async fn handle(
        &self,
        input: HandlerInput,
        aux: &mut AuxiliaryStore,
    ) -> StageResult<SocketResult>;
}

/// Turns a successful handler payload into wire JSON.
#[async_trait]
pub trait Dehydrator: Send + Sync {
    /// Serialize the payload.
    async fn dehydrate(&self, payload: Payload) -> StageResult<Value>;
}

/// Direct form of [`DataCheck`].
pub type CheckDataFn =
    dyn Fn(&FetchedData, &mut AuxiliaryStore) -> StageResult<bool> + Send + Sync;
/// Direct form of [`AccessCheck`].
pub type CheckAccessFn =
    dyn Fn(&ConnectionContext, &FetchedData, &mut AuxiliaryStore) -> StageResult<bool>
        + Send
        + Sync;
/// Direct form of [`Hydrator`].
pub type HydrateFn = dyn Fn(&FetchedData) -> StageResult<Payload> + Send + Sync;
/// Direct form of [`Handler`].
pub type HandlerFn =
    dyn Fn(HandlerInput, &mut AuxiliaryStore) -> StageResult<SocketResult> + Send + Sync;
/// Direct form of [`Dehydrator`].
pub type DehydrateFn = dyn Fn(Payload) -> StageResult<Value> + Send + Sync;

/// A stage implementation: direct closure or suspending trait object.
pub enum Stage<D: ?Sized, S: ?Sized> {
    /// Runs synchronously.
    Direct(Arc<D>),
    /// May suspend.
    Suspending(Arc<S>),
}

/// A route's `check_data` stage.
pub type CheckDataStage = Stage<CheckDataFn, dyn DataCheck>;
/// A route's `check_access` stage.
pub type CheckAccessStage = Stage<CheckAccessFn, dyn AccessCheck>;
/// A route's `hydrate` stage.
pub type HydrateStage = Stage<HydrateFn, dyn Hydrator>;
/// A registered handler.
pub type HandlerStage = Stage<HandlerFn, dyn Handler>;
/// A route's `dehydrate` stage.
pub type DehydrateStage = Stage<DehydrateFn, dyn Dehydrator>;

impl<D: ?Sized, S: ?Sized> Stage<D, S> {
    /// Check if the stage may suspend.
    #[must_use]
    pub fn is_suspending(&self) -> bool {
        matches!(self, Stage::Suspending(_))
    }
}

impl<D: ?Sized, S: ?Sized> Clone for Stage<D, S> {
    fn clone(&self) -> Self {
        match self {
            Stage::Direct(f) => Stage::Direct(Arc::clone(f)),
            Stage::Suspending(s) => Stage::Suspending(Arc::clone(s)),
        }
    }
}

impl<D: ?Sized, S: ?Sized> fmt::Debug for Stage<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Direct(_) => f.write_str("Direct"),
            Stage::Suspending(_) => f.write_str("Suspending"),
        }
    }
}

impl CheckDataStage {
    pub(crate) async fn run(
        &self,
        data: &FetchedData,
        aux: &mut AuxiliaryStore,
    ) -> StageResult<bool> {
        match self {
            Stage::Direct(f) => f(data, aux),
            Stage::Suspending(s) => s.check(data, aux).await,
        }
    }
}

impl CheckAccessStage {
    pub(crate) async fn run(
        &self,
        connection: &ConnectionContext,
        data: &FetchedData,
        aux: &mut AuxiliaryStore,
    ) -> StageResult<bool> {
        match self {
            Stage::Direct(f) => f(connection, data, aux),
            Stage::Suspending(s) => s.check(connection, data, aux).await,
        }
    }
}

impl HydrateStage {
    pub(crate) async fn run(&self, data: &FetchedData) -> StageResult<Payload> {
        match self {
            Stage::Direct(f) => f(data),
            Stage::Suspending(s) => s.hydrate(data).await,
        }
    }
}

impl HandlerStage {
    pub(crate) async fn run(
        &self,
        input: HandlerInput,
        aux: &mut AuxiliaryStore,
    ) -> StageResult<SocketResult> {
        match self {
            Stage::Direct(f) => f(input, aux),
            Stage::Suspending(s) => s.handle(input, aux).await,
        }
    }
}

impl DehydrateStage {
    pub(crate) async fn run(&self, payload: Payload) -> StageResult<Value> {
        match self {
            Stage::Direct(f) => f(payload),
            Stage::Suspending(s) => s.dehydrate(payload).await,
        }
    }
}

/// Names of the pipeline stages, used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Payload and header validation.
    CheckData,
    /// Authorization against the connection.
    CheckAccess,
    /// Payload to domain value conversion.
    Hydrate,
    /// The route's handler.
    Handler,
    /// Domain value to JSON conversion.
    Dehydrate,
}

impl StageKind {
    /// Stage name as used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StageKind::CheckData => "check_data",
            StageKind::CheckAccess => "check_access",
            StageKind::Hydrate => "hydrate",
            StageKind::Handler => "handler",
            StageKind::Dehydrate => "dehydrate",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
