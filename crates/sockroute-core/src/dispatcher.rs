//! The dispatch pipeline.
//!
//! Each inbound envelope walks a fixed sequence of steps:
//!
//! ```text
//! Received ─▶ RouteResolved ─▶ Checked ─▶ Hydrated ─▶ Handled ─▶ Dehydrated ─▶ Responded
//! ```
//!
//! Any gate may short-circuit straight to `Responded` with an error response.
//! No step runs twice, and a short-circuit skips every later step, the
//! handler included.

use serde_json::Value;
use sockroute_protocol::{codec, set_error, CallError, OutboundEnvelope, RequestEnvelope};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::auxiliary::AuxiliaryStore;
use crate::handler::HandlerRegistry;
use crate::payload::{HandlerInput, HydratedMessageData, Payload, SocketResult};
use crate::route::{RouteDescriptor, RouteTable};
use crate::stage::{BoxError, StageKind};
use crate::transport::ConnectionContext;

/// Dispatch errors.
///
/// Protocol failures never show up here; they become error responses. Only
/// failures raised by application stages are returned.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// An application stage returned an error.
    #[error("{stage} failed on route {route}: {source}")]
    Stage {
        /// Route being dispatched.
        route: String,
        /// Stage that failed.
        stage: StageKind,
        /// Error returned by the stage.
        source: BoxError,
    },
}

impl DispatchError {
    fn stage(route: &RouteDescriptor, stage: StageKind) -> impl FnOnce(BoxError) -> Self + '_ {
        move |source| DispatchError::Stage {
            route: route.route().to_string(),
            stage,
            source,
        }
    }

    /// The stage that failed.
    #[must_use]
    pub fn failed_stage(&self) -> StageKind {
        match self {
            DispatchError::Stage { stage, .. } => *stage,
        }
    }
}

/// Routes envelopes through the pipeline.
///
/// The route table and handler registry are shared read-only, so a
/// dispatcher is cheap to clone and safe to use from any number of
/// connections at once.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    handlers: Arc<HandlerRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over a frozen route table and handler set.
    #[must_use]
    pub fn new(routes: RouteTable, handlers: HandlerRegistry) -> Self {
        info!(
            routes = routes.len(),
            handlers = handlers.len(),
            "Creating dispatcher"
        );

        for route in routes.routes() {
            if handlers.resolve(route).is_none() {
                warn!(
                    route = %route,
                    "Route has no handler and will answer Method Not Implemented"
                );
            }
        }

        Self {
            routes: Arc::new(routes),
            handlers: Arc::new(handlers),
        }
    }

    /// The route table.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// The handler registry.
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Dispatch a decoded message.
    ///
    /// Returns the envelope to send back, or `None` if no response could be
    /// built at all.
    ///
    /// # Errors
    ///
    /// Returns an error if an application stage fails.
    pub async fn dispatch(
        &self,
        raw: &Value,
        connection: &ConnectionContext,
    ) -> Result<Option<OutboundEnvelope>, DispatchError> {
        match codec::parse(raw) {
            Ok(request) => self.dispatch_request(request, connection).await,
            Err(e) => {
                debug!(connection = %connection.id(), error = %e, "Rejecting malformed envelope");
                Ok(Some(codec::reject_malformed(raw).into()))
            }
        }
    }

    /// Dispatch an already parsed request.
    ///
    /// # Errors
    ///
    /// Returns an error if an application stage fails.
    pub async fn dispatch_request(
        &self,
        request: RequestEnvelope,
        connection: &ConnectionContext,
    ) -> Result<Option<OutboundEnvelope>, DispatchError> {
        if request.is_heartbeat() {
            trace!(connection = %connection.id(), uuid = %request.uuid, "Heartbeat");
            return Ok(Some(OutboundEnvelope::Heartbeat(request.heartbeat_ack())));
        }

        let Some(route) = self.routes.lookup(&request.route) else {
            return Ok(reject(&request, CallError::RouteNotFound));
        };

        // Resolve before any stage runs so a missing handler never leaves a
        // half-executed pipeline behind.
        let Some(handler) = self.handlers.resolve(route.route()) else {
            return Ok(reject(&request, CallError::MethodNotImplemented));
        };

        let mut aux = AuxiliaryStore::new();
        let fetched = request.fetch_data();

        if let Some(check) = route.data_check() {
            let valid = check
                .run(&fetched, &mut aux)
                .await
                .map_err(DispatchError::stage(route, StageKind::CheckData))?;
            if !valid {
                return Ok(reject(&request, CallError::InvalidData));
            }
        }

        if let Some(check) = route.access_check() {
            let allowed = check
                .run(connection, &fetched, &mut aux)
                .await
                .map_err(DispatchError::stage(route, StageKind::CheckAccess))?;
            if !allowed {
                return Ok(reject(&request, CallError::AccessDenied));
            }
        }

        let input = match route.hydrator() {
            Some(hydrator) => {
                let payload = hydrator
                    .run(&fetched)
                    .await
                    .map_err(DispatchError::stage(route, StageKind::Hydrate))?;
                HandlerInput::Hydrated(HydratedMessageData {
                    headers: fetched.headers,
                    payload,
                })
            }
            None => HandlerInput::Fetched(fetched),
        };

        let result = handler
            .run(input, &mut aux)
            .await
            .map_err(DispatchError::stage(route, StageKind::Handler))?;

        let status = result.status();
        let SocketResult {
            headers, payload, ..
        } = result;

        let payload = match route.dehydrator() {
            Some(dehydrator) if status.is_success() => Payload::Json(
                dehydrator
                    .run(payload)
                    .await
                    .map_err(DispatchError::stage(route, StageKind::Dehydrate))?,
            ),
            _ => payload,
        };

        debug!(
            connection = %connection.id(),
            route = %route.route(),
            uuid = %request.uuid,
            status = %status,
            "Dispatched"
        );

        Ok(request
            .respond(headers, &payload, status)
            .map(OutboundEnvelope::Response))
    }
}

fn reject(request: &RequestEnvelope, error: CallError) -> Option<OutboundEnvelope> {
    debug!(route = %request.route, uuid = %request.uuid, error = %error, "Rejecting request");
    request
        .respond(None, &set_error(error), error.status())
        .map(OutboundEnvelope::Response)
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(RouteTable::default(), HandlerRegistry::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{AccessCheck, DataCheck, Dehydrator, Handler, Hydrator, StageResult};
    use async_trait::async_trait;
    use serde::Serialize;
    use serde_json::json;
    use sockroute_protocol::{CorrelationId, FetchedData, ResponseEnvelope, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Invocation counters shared by the stages of a test route.
    #[derive(Default)]
    struct Calls {
        check_data: AtomicUsize,
        check_access: AtomicUsize,
        hydrate: AtomicUsize,
        handler: AtomicUsize,
        dehydrate: AtomicUsize,
        order: Mutex<Vec<StageKind>>,
    }

    impl Calls {
        fn hit(&self, stage: StageKind) {
            let counter = match stage {
                StageKind::CheckData => &self.check_data,
                StageKind::CheckAccess => &self.check_access,
                StageKind::Hydrate => &self.hydrate,
                StageKind::Handler => &self.handler,
                StageKind::Dehydrate => &self.dehydrate,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            self.order.lock().unwrap().push(stage);
        }

        fn count(&self, stage: StageKind) -> usize {
            let counter = match stage {
                StageKind::CheckData => &self.check_data,
                StageKind::CheckAccess => &self.check_access,
                StageKind::Hydrate => &self.hydrate,
                StageKind::Handler => &self.handler,
                StageKind::Dehydrate => &self.dehydrate,
            };
            counter.load(Ordering::SeqCst)
        }

        fn total(&self) -> usize {
            self.order.lock().unwrap().len()
        }
    }

    /// Route with every stage instrumented.
    struct Fixture {
        data_ok: bool,
        access_ok: bool,
        status: Option<StatusCode>,
    }

    impl Fixture {
        fn passing() -> Self {
            Self {
                data_ok: true,
                access_ok: true,
                status: None,
            }
        }

        fn build(self, calls: &Arc<Calls>) -> Dispatcher {
            let (c1, c2, c3, c4, c5) = (
                calls.clone(),
                calls.clone(),
                calls.clone(),
                calls.clone(),
                calls.clone(),
            );
            let Fixture {
                data_ok,
                access_ok,
                status,
            } = self;

            let route = RouteDescriptor::new("loadNode")
                .check_data(move |_, aux| {
                    c1.hit(StageKind::CheckData);
                    aux.insert("checked", true);
                    Ok(data_ok)
                })
                .check_access(move |_, _, aux| {
                    c2.hit(StageKind::CheckAccess);
                    assert_eq!(aux.get::<bool>("checked"), Some(&true));
                    Ok(access_ok)
                })
                .hydrate(move |data| {
                    c3.hit(StageKind::Hydrate);
                    Ok(Payload::domain(data.payload["id"].as_u64().unwrap_or(0)))
                })
                .dehydrate(move |payload| {
                    c5.hit(StageKind::Dehydrate);
                    let id = payload.downcast::<u64>().map_err(|_| "not a node id")?;
                    Ok(json!({"node": id}))
                });

            let handlers = HandlerRegistry::new().on("loadNode", move |input, aux| {
                c4.hit(StageKind::Handler);
                assert!(aux.contains_key("checked"));
                let payload = input.into_payload();
                Ok(match status {
                    Some(status) => SocketResult::with_status(payload, status),
                    None => SocketResult::ok(payload),
                })
            });

            Dispatcher::new(RouteTable::build([route]).unwrap(), handlers)
        }
    }

    fn expect_response(outbound: Option<OutboundEnvelope>) -> ResponseEnvelope {
        match outbound {
            Some(OutboundEnvelope::Response(response)) => response,
            other => panic!("Expected response, got {:?}", other),
        }
    }

    fn load_node(id: u64) -> Value {
        json!({"uuid": "n-1", "route": "loadNode", "headers": null, "payload": {"id": id}})
    }

    #[tokio::test]
    async fn test_say_hello_example() {
        let routes = RouteTable::build([RouteDescriptor::new("sayHello")]).unwrap();
        let handlers = HandlerRegistry::new()
            .on("sayHello", |_, _| Ok(SocketResult::ok(json!({"msg": "hi"}))));
        let dispatcher = Dispatcher::new(routes, handlers);

        let raw = json!({"uuid": "abc", "route": "sayHello", "headers": null, "payload": null});
        let outbound = dispatcher
            .dispatch(&raw, &ConnectionContext::anonymous())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            serde_json::to_value(&outbound).unwrap(),
            json!({"uuid": "abc", "status": 200, "headers": null, "payload": {"msg": "hi"}})
        );
    }

    #[tokio::test]
    async fn test_full_pipeline_order() {
        let calls = Arc::new(Calls::default());
        let dispatcher = Fixture::passing().build(&calls);

        let response = expect_response(
            dispatcher
                .dispatch(&load_node(7), &ConnectionContext::anonymous())
                .await
                .unwrap(),
        );

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.payload, json!({"node": 7}));
        assert_eq!(
            *calls.order.lock().unwrap(),
            vec![
                StageKind::CheckData,
                StageKind::CheckAccess,
                StageKind::Hydrate,
                StageKind::Handler,
                StageKind::Dehydrate,
            ]
        );
    }

    #[tokio::test]
    async fn test_heartbeat_runs_no_stage() {
        let calls = Arc::new(Calls::default());
        let dispatcher = Fixture::passing().build(&calls);

        let raw = json!({"uuid": 99, "route": "PING", "payload": {"ignored": true}});
        let outbound = dispatcher
            .dispatch(&raw, &ConnectionContext::anonymous())
            .await
            .unwrap()
            .unwrap();

        match outbound {
            OutboundEnvelope::Heartbeat(ack) => {
                assert_eq!(ack.route, "PONG");
                assert_eq!(ack.uuid, CorrelationId::Int(99));
                assert_eq!(ack.payload, Value::Null);
            }
            other => panic!("Expected PONG, got {:?}", other),
        }
        assert_eq!(calls.total(), 0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let calls = Arc::new(Calls::default());
        let dispatcher = Fixture::passing().build(&calls);

        let raw = json!({"uuid": "u", "route": "nope", "headers": null, "payload": null});
        let response = expect_response(
            dispatcher
                .dispatch(&raw, &ConnectionContext::anonymous())
                .await
                .unwrap(),
        );

        assert_eq!(response.uuid, CorrelationId::from("u"));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.payload, json!({"error": "Route Not Found"}));
        assert_eq!(calls.total(), 0);
    }

    #[tokio::test]
    async fn test_missing_handler_runs_no_stage() {
        let calls = Arc::new(Calls::default());
        let counter = calls.clone();
        let route = RouteDescriptor::new("orphan").check_data(move |_, _| {
            counter.hit(StageKind::CheckData);
            Ok(true)
        });
        let dispatcher = Dispatcher::new(
            RouteTable::build([route]).unwrap(),
            HandlerRegistry::new(),
        );

        let raw = json!({"uuid": 1, "route": "orphan"});
        let response = expect_response(
            dispatcher
                .dispatch(&raw, &ConnectionContext::anonymous())
                .await
                .unwrap(),
        );

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.payload, json!({"error": "Method Not Implemented"}));
        assert_eq!(calls.total(), 0);
    }

    #[tokio::test]
    async fn test_invalid_data_short_circuits() {
        let calls = Arc::new(Calls::default());
        let dispatcher = Fixture {
            data_ok: false,
            ..Fixture::passing()
        }
        .build(&calls);

        let response = expect_response(
            dispatcher
                .dispatch(&load_node(1), &ConnectionContext::anonymous())
                .await
                .unwrap(),
        );

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.payload, json!({"error": "Invalid Data"}));
        assert_eq!(calls.count(StageKind::CheckData), 1);
        assert_eq!(calls.count(StageKind::CheckAccess), 0);
        assert_eq!(calls.count(StageKind::Handler), 0);
    }

    #[tokio::test]
    async fn test_access_denied_short_circuits() {
        let calls = Arc::new(Calls::default());
        let dispatcher = Fixture {
            access_ok: false,
            ..Fixture::passing()
        }
        .build(&calls);

        let response = expect_response(
            dispatcher
                .dispatch(&load_node(1), &ConnectionContext::anonymous())
                .await
                .unwrap(),
        );

        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.payload, json!({"error": "Access Denied"}));
        assert_eq!(calls.count(StageKind::CheckAccess), 1);
        assert_eq!(calls.count(StageKind::Hydrate), 0);
        assert_eq!(calls.count(StageKind::Handler), 0);
        assert_eq!(calls.count(StageKind::Dehydrate), 0);
    }

    #[tokio::test]
    async fn test_dehydrate_skipped_on_failure_status() {
        let calls = Arc::new(Calls::default());
        let routes = RouteTable::build([RouteDescriptor::new("find").dehydrate({
            let calls = calls.clone();
            move |_| {
                calls.hit(StageKind::Dehydrate);
                Ok(json!("dehydrated"))
            }
        })])
        .unwrap();
        let original = json!({"error": "missing", "ids": [1, 2, 3], "ratio": 0.5});
        let returned = original.clone();
        let handlers = HandlerRegistry::new().on("find", move |_, _| {
            Ok(SocketResult::with_status(returned.clone(), StatusCode::NOT_FOUND))
        });
        let dispatcher = Dispatcher::new(routes, handlers);

        let raw = json!({"uuid": "f", "route": "find"});
        let response = expect_response(
            dispatcher
                .dispatch(&raw, &ConnectionContext::anonymous())
                .await
                .unwrap(),
        );

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.payload, original);
        assert_eq!(calls.count(StageKind::Dehydrate), 0);
    }

    #[tokio::test]
    async fn test_dehydrate_runs_on_any_success_status() {
        let calls = Arc::new(Calls::default());
        let dispatcher = Fixture {
            status: Some(StatusCode::new(201)),
            ..Fixture::passing()
        }
        .build(&calls);

        let response = expect_response(
            dispatcher
                .dispatch(&load_node(3), &ConnectionContext::anonymous())
                .await
                .unwrap(),
        );

        assert_eq!(response.status, StatusCode::new(201));
        assert_eq!(response.payload, json!({"node": 3}));
        assert_eq!(calls.count(StageKind::Dehydrate), 1);
    }

    #[tokio::test]
    async fn test_malformed_input() {
        let dispatcher = Dispatcher::default();
        let context = ConnectionContext::anonymous();

        let response = expect_response(
            dispatcher
                .dispatch(&json!({"uuid": "x1", "payload": {}}), &context)
                .await
                .unwrap(),
        );
        assert_eq!(response.uuid, CorrelationId::from("x1"));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.payload, json!({"error": "Request Format Error"}));

        let response = expect_response(
            dispatcher
                .dispatch(&json!({"route": "sayHello"}), &context)
                .await
                .unwrap(),
        );
        assert_eq!(response.uuid, CorrelationId::empty());
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_object_input_is_format_error() {
        let calls = Arc::new(Calls::default());
        let dispatcher = Fixture::passing().build(&calls);
        let context = ConnectionContext::anonymous();

        for raw in [
            json!(["n-1", "loadNode", null, {"id": 7}]),
            json!([]),
            json!("PING"),
            json!(42),
            json!(true),
            Value::Null,
        ] {
            let response = expect_response(dispatcher.dispatch(&raw, &context).await.unwrap());
            assert_eq!(response.uuid, CorrelationId::empty(), "input {raw}");
            assert_eq!(response.status, StatusCode::BAD_REQUEST, "input {raw}");
            assert_eq!(
                response.payload,
                json!({"error": "Request Format Error"}),
                "input {raw}"
            );
        }

        assert_eq!(calls.count(StageKind::Handler), 0);
        assert_eq!(calls.total(), 0);
    }

    #[tokio::test]
    async fn test_headers_echoed_from_result() {
        let routes = RouteTable::build([RouteDescriptor::new("withHeaders")]).unwrap();
        let handlers = HandlerRegistry::new().on("withHeaders", |input, _| {
            let headers = input.headers().cloned().unwrap_or_default();
            Ok(SocketResult::ok(json!(null)).headers(headers))
        });
        let dispatcher = Dispatcher::new(routes, handlers);

        let raw = json!({"uuid": 2, "route": "withHeaders", "headers": {"trace": "t-1"}});
        let response = expect_response(
            dispatcher
                .dispatch(&raw, &ConnectionContext::anonymous())
                .await
                .unwrap(),
        );

        assert_eq!(response.headers.unwrap()["trace"], json!("t-1"));
    }

    #[tokio::test]
    async fn test_opaque_payload_degrades_response() {
        struct Socket;

        let routes = RouteTable::build([RouteDescriptor::new("leak")]).unwrap();
        let handlers = HandlerRegistry::new()
            .on("leak", |_, _| Ok(SocketResult::ok(Payload::domain(Socket))));
        let dispatcher = Dispatcher::new(routes, handlers);

        let raw = json!({"uuid": "l", "route": "leak"});
        let response = expect_response(
            dispatcher
                .dispatch(&raw, &ConnectionContext::anonymous())
                .await
                .unwrap(),
        );

        assert_eq!(response.uuid, CorrelationId::from("l"));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.payload, Value::Null);
        assert_eq!(response.headers, None);
    }

    #[tokio::test]
    async fn test_stage_error_propagates() {
        let routes = RouteTable::build([RouteDescriptor::new("broken")]).unwrap();
        let handlers = HandlerRegistry::new().on("broken", |_, _| Err("database is down".into()));
        let dispatcher = Dispatcher::new(routes, handlers);

        let raw = json!({"uuid": "b", "route": "broken"});
        let err = dispatcher
            .dispatch(&raw, &ConnectionContext::anonymous())
            .await
            .unwrap_err();

        assert_eq!(err.failed_stage(), StageKind::Handler);
        assert_eq!(
            err.to_string(),
            "handler failed on route broken: database is down"
        );
    }

    #[derive(Debug, Serialize)]
    struct Article {
        title: String,
        author: String,
    }

    struct RequireTitle;

    #[async_trait]
    impl DataCheck for RequireTitle {
        async fn check(&self, data: &FetchedData, aux: &mut AuxiliaryStore) -> StageResult<bool> {
            tokio::task::yield_now().await;
            match data.payload["title"].as_str() {
                Some(title) => {
                    aux.insert("title", title.to_string());
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    struct RequireUser;

    #[async_trait]
    impl AccessCheck for RequireUser {
        async fn check(
            &self,
            connection: &ConnectionContext,
            _data: &FetchedData,
            aux: &mut AuxiliaryStore,
        ) -> StageResult<bool> {
            tokio::task::yield_now().await;
            if let Some(user) = connection.user() {
                aux.insert("author", user.to_string());
            }
            Ok(connection.is_authenticated())
        }
    }

    struct LoadArticle;

    #[async_trait]
    impl Hydrator for LoadArticle {
        async fn hydrate(&self, data: &FetchedData) -> StageResult<Payload> {
            tokio::task::yield_now().await;
            let title = data.payload["title"].as_str().ok_or("title vanished")?;
            Ok(Payload::domain(title.to_uppercase()))
        }
    }

    struct CreateArticle;

    #[async_trait]
    impl Handler for CreateArticle {
        async fn handle(
            &self,
            input: HandlerInput,
            aux: &mut AuxiliaryStore,
        ) -> StageResult<SocketResult> {
            tokio::task::yield_now().await;
            let title = input
                .into_payload()
                .downcast::<String>()
                .map_err(|_| "expected hydrated title")?;
            let author = aux.remove::<String>("author").unwrap_or_default();
            Ok(SocketResult::with_status(
                Payload::serializable(Article { title, author }),
                StatusCode::new(201),
            ))
        }
    }

    struct ArticleToJson;

    #[async_trait]
    impl Dehydrator for ArticleToJson {
        async fn dehydrate(&self, payload: Payload) -> StageResult<Value> {
            tokio::task::yield_now().await;
            let article = payload
                .downcast::<Article>()
                .map_err(|_| "expected an article")?;
            Ok(json!({"title": article.title, "by": article.author}))
        }
    }

    fn article_dispatcher() -> Dispatcher {
        let route = RouteDescriptor::new("postArticle")
            .check_data_async(RequireTitle)
            .check_access_async(RequireUser)
            .hydrate_async(LoadArticle)
            .dehydrate_async(ArticleToJson);
        let handlers = HandlerRegistry::new().on_async("postArticle", CreateArticle);
        Dispatcher::new(RouteTable::build([route]).unwrap(), handlers)
    }

    #[tokio::test]
    async fn test_suspending_pipeline() {
        let dispatcher = article_dispatcher();
        let raw = json!({"uuid": 5, "route": "postArticle", "payload": {"title": "rust"}});

        let response = expect_response(
            dispatcher
                .dispatch(&raw, &ConnectionContext::new("c-1").with_user("ada"))
                .await
                .unwrap(),
        );
        assert_eq!(response.status, StatusCode::new(201));
        assert_eq!(response.payload, json!({"title": "RUST", "by": "ada"}));

        let response = expect_response(
            dispatcher
                .dispatch(&raw, &ConnectionContext::new("c-2"))
                .await
                .unwrap(),
        );
        assert_eq!(response.status, StatusCode::FORBIDDEN);

        let raw = json!({"uuid": 6, "route": "postArticle", "payload": {}});
        let response = expect_response(
            dispatcher
                .dispatch(&raw, &ConnectionContext::new("c-1").with_user("ada"))
                .await
                .unwrap(),
        );
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }
}
