//! Routes served by the reference server.
//!
//! `sayHello` and `echo` have no stages. `postArticle` and `getArticle` run
//! the full pipeline against an in-memory [`ArticleStore`].

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sockroute_core::{
    AuxiliaryStore, Dispatcher, FetchedData, Handler, HandlerInput, HandlerRegistry, Hydrator,
    Payload, RouteDescriptor, RouteTable, RouteTableError, SocketResult, StageResult, StatusCode,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Aux key under which `check_access` leaves the author for the handler.
const AUTHOR_KEY: &str = "author";

/// A stored article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub author: String,
}

/// An article as posted by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    pub body: String,
}

/// In-memory article storage shared by all connections.
#[derive(Debug, Default)]
pub struct ArticleStore {
    articles: DashMap<u64, Article>,
    next_id: AtomicU64,
}

impl ArticleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a draft and return the created article.
    pub fn insert(&self, draft: ArticleDraft, author: impl Into<String>) -> Article {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let article = Article {
            id,
            title: draft.title,
            body: draft.body,
            author: author.into(),
        };
        self.articles.insert(id, article.clone());
        article
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<Article> {
        self.articles.get(&id).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.articles.len()
    }
}

/// Build the dispatcher with all demo routes.
///
/// # Errors
///
/// Returns an error if the route table is inconsistent.
pub fn build_dispatcher(store: Arc<ArticleStore>) -> Result<Dispatcher, RouteTableError> {
    let routes = RouteTable::build([
        RouteDescriptor::new("sayHello"),
        RouteDescriptor::new("echo"),
        RouteDescriptor::new("postArticle")
            .check_data(|data, _| Ok(is_valid_draft(&data.payload)))
            .check_access(|connection, _, aux| match connection.user() {
                Some(user) => {
                    aux.insert(AUTHOR_KEY, user.to_string());
                    Ok(true)
                }
                None => Ok(false),
            })
            .hydrate(|data| {
                let draft: ArticleDraft = serde_json::from_value(data.payload.clone())?;
                Ok(Payload::domain(draft))
            })
            .dehydrate(article_to_json),
        RouteDescriptor::new("getArticle")
            .check_data(|data, _| Ok(data.payload.get("id").is_some_and(Value::is_u64)))
            .hydrate_async(LoadArticle {
                store: Arc::clone(&store),
            })
            .dehydrate(article_to_json),
    ])?;

    let handlers = HandlerRegistry::new()
        .on("sayHello", say_hello)
        .on("echo", |input, _| {
            let headers = input.headers().cloned();
            let result = SocketResult::ok(input.into_payload());
            Ok(match headers {
                Some(headers) => result.headers(headers),
                None => result,
            })
        })
        .on_async("postArticle", CreateArticle { store })
        .on_async("getArticle", ShowArticle);

    Ok(Dispatcher::new(routes, handlers))
}

fn say_hello(input: HandlerInput, _aux: &mut AuxiliaryStore) -> StageResult<SocketResult> {
    let msg = match input
        .json()
        .and_then(|payload| payload.get("name"))
        .and_then(Value::as_str)
    {
        Some(name) => format!("hi {name}"),
        None => "hi".to_string(),
    };
    Ok(SocketResult::ok(json!({ "msg": msg })))
}

fn is_valid_draft(payload: &Value) -> bool {
    let title = payload.get("title").and_then(Value::as_str);
    title.is_some_and(|t| !t.trim().is_empty())
        && payload.get("body").is_some_and(Value::is_string)
}

fn article_to_json(payload: Payload) -> StageResult<Value> {
    let article = payload
        .downcast::<Article>()
        .map_err(|other| format!("expected an article, got {other:?}"))?;
    Ok(serde_json::to_value(article)?)
}

/// Loads the article named by `payload.id`; a miss hydrates to `None`.
struct LoadArticle {
    store: Arc<ArticleStore>,
}

#[async_trait]
impl Hydrator for LoadArticle {
    async fn hydrate(&self, data: &FetchedData) -> StageResult<Payload> {
        let id = data
            .payload
            .get("id")
            .and_then(Value::as_u64)
            .ok_or("missing article id")?;
        let article = self.store.get(id);
        debug!(id, found = article.is_some(), "Loaded article");
        Ok(Payload::domain(article))
    }
}

struct CreateArticle {
    store: Arc<ArticleStore>,
}

#[async_trait]
impl Handler for CreateArticle {
    async fn handle(
        &self,
        input: HandlerInput,
        aux: &mut AuxiliaryStore,
    ) -> StageResult<SocketResult> {
        let draft = input
            .into_payload()
            .downcast::<ArticleDraft>()
            .map_err(|other| format!("expected a draft, got {other:?}"))?;
        let author = aux
            .remove::<String>(AUTHOR_KEY)
            .ok_or("author missing from aux store")?;

        let article = self.store.insert(draft, author);
        debug!(id = article.id, total = self.store.len(), "Created article");
        Ok(SocketResult::with_status(
            Payload::domain(article),
            StatusCode::new(201),
        ))
    }
}

struct ShowArticle;

#[async_trait]
impl Handler for ShowArticle {
    async fn handle(
        &self,
        input: HandlerInput,
        _aux: &mut AuxiliaryStore,
    ) -> StageResult<SocketResult> {
        let article = input
            .into_payload()
            .downcast::<Option<Article>>()
            .map_err(|other| format!("expected a loaded article, got {other:?}"))?;

        Ok(match article {
            Some(article) => SocketResult::ok(Payload::domain(article)),
            None => SocketResult::with_status(
                json!({"error": "Article Not Found"}),
                StatusCode::NOT_FOUND,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sockroute_core::{ConnectionContext, OutboundEnvelope};

    async fn call(dispatcher: &Dispatcher, context: &ConnectionContext, raw: Value) -> Value {
        let outbound: OutboundEnvelope =
            dispatcher.dispatch(&raw, context).await.unwrap().unwrap();
        serde_json::to_value(outbound).unwrap()
    }

    #[tokio::test]
    async fn test_say_hello() {
        let dispatcher = build_dispatcher(Arc::new(ArticleStore::new())).unwrap();
        let context = ConnectionContext::anonymous();

        let reply = call(
            &dispatcher,
            &context,
            json!({"uuid": "abc", "route": "sayHello", "headers": null, "payload": null}),
        )
        .await;
        assert_eq!(
            reply,
            json!({"uuid": "abc", "status": 200, "headers": null, "payload": {"msg": "hi"}})
        );

        let reply = call(
            &dispatcher,
            &context,
            json!({"uuid": 1, "route": "sayHello", "payload": {"name": "ada"}}),
        )
        .await;
        assert_eq!(reply["payload"], json!({"msg": "hi ada"}));
    }

    #[tokio::test]
    async fn test_echo_returns_headers_and_payload() {
        let dispatcher = build_dispatcher(Arc::new(ArticleStore::new())).unwrap();
        let reply = call(
            &dispatcher,
            &ConnectionContext::anonymous(),
            json!({"uuid": 5, "route": "echo", "headers": {"trace": "t1"}, "payload": [1, 2]}),
        )
        .await;
        assert_eq!(reply["headers"], json!({"trace": "t1"}));
        assert_eq!(reply["payload"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_post_then_get_article() {
        let store = Arc::new(ArticleStore::new());
        let dispatcher = build_dispatcher(Arc::clone(&store)).unwrap();
        let ada = ConnectionContext::anonymous().with_user("ada");

        let created = call(
            &dispatcher,
            &ada,
            json!({"uuid": 1, "route": "postArticle", "payload": {"title": "Hi", "body": "..."}}),
        )
        .await;
        assert_eq!(created["status"], 201);
        assert_eq!(
            created["payload"],
            json!({"id": 1, "title": "Hi", "body": "...", "author": "ada"})
        );
        assert_eq!(store.len(), 1);

        let fetched = call(
            &dispatcher,
            &ConnectionContext::anonymous(),
            json!({"uuid": 2, "route": "getArticle", "payload": {"id": 1}}),
        )
        .await;
        assert_eq!(fetched["status"], 200);
        assert_eq!(fetched["payload"]["author"], "ada");
    }

    #[tokio::test]
    async fn test_post_article_gates() {
        let store = Arc::new(ArticleStore::new());
        let dispatcher = build_dispatcher(Arc::clone(&store)).unwrap();

        let invalid = call(
            &dispatcher,
            &ConnectionContext::anonymous().with_user("ada"),
            json!({"uuid": 1, "route": "postArticle", "payload": {"title": "  ", "body": "x"}}),
        )
        .await;
        assert_eq!(invalid["status"], 400);
        assert_eq!(invalid["payload"], json!({"error": "Invalid Data"}));

        let denied = call(
            &dispatcher,
            &ConnectionContext::anonymous(),
            json!({"uuid": 2, "route": "postArticle", "payload": {"title": "T", "body": "x"}}),
        )
        .await;
        assert_eq!(denied["status"], 403);
        assert_eq!(denied["payload"], json!({"error": "Access Denied"}));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_missing_article_skips_dehydrate() {
        let dispatcher = build_dispatcher(Arc::new(ArticleStore::new())).unwrap();
        let reply = call(
            &dispatcher,
            &ConnectionContext::anonymous(),
            json!({"uuid": 3, "route": "getArticle", "payload": {"id": 42}}),
        )
        .await;
        assert_eq!(reply["status"], 404);
        assert_eq!(reply["payload"], json!({"error": "Article Not Found"}));
    }
}
