//! HTTP transport for CosmoQL.
//!
//! ```text
//! POST /graphql           GraphQL request JSON in, GraphQL response JSON out
//! GET  /graphql?query=...  the same for queries; mutations answer 405
//! GET  /graphql            GraphiQL IDE
//! GET  /health             liveness check
//! ```
//!
//! Every response carries permissive CORS headers and every `OPTIONS`
//! request is answered directly with `200`.

use async_graphql::http::GraphiQLSource;
use async_graphql::parser::parse_query;
use async_graphql::parser::types::OperationType;
use async_graphql::Variables;
use axum::extract::{Query, Request, State};
use axum::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::loader::LoaderConfig;
use crate::resolve::RequestScope;
use crate::schema::{build_schema, CosmoSchema};
use crate::storage::Stores;

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    schema: CosmoSchema,
    stores: Stores,
    loader_config: LoaderConfig,
}

impl AppState {
    /// Builds the schema once over `stores`.
    #[must_use]
    pub fn new(stores: Stores, loader_config: LoaderConfig) -> Self {
        Self {
            schema: build_schema(),
            stores,
            loader_config,
        }
    }
}

/// Builds the application router over `stores`.
pub fn router(stores: Stores, loader_config: LoaderConfig) -> Router {
    Router::new()
        .route("/graphql", post(graphql).get(graphql_get))
        .route("/health", get(health))
        .layer(middleware::from_fn(cors))
        .with_state(AppState::new(stores, loader_config))
}

/// GraphQL parameters carried in a GET query string.
#[derive(Debug, Deserialize)]
struct GetParams {
    query: Option<String>,
    #[serde(rename = "operationName")]
    operation_name: Option<String>,
    variables: Option<String>,
}

async fn execute(
    state: &AppState,
    request: async_graphql::Request,
) -> Json<async_graphql::Response> {
    let scope = RequestScope::new(&state.stores, state.loader_config);
    let response = state.schema.execute(request.data(scope)).await;
    if response.is_err() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        warn!(errors = ?messages, "graphql request failed");
    }
    Json(response)
}

async fn graphql(
    State(state): State<AppState>,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    execute(&state, request).await
}

async fn graphql_get(State(state): State<AppState>, Query(params): Query<GetParams>) -> Response {
    let Some(query) = params.query else {
        return graphiql().await.into_response();
    };

    if selects_mutation(&query, params.operation_name.as_deref()) {
        return request_error(
            StatusCode::METHOD_NOT_ALLOWED,
            "Can only perform a mutation operation from a POST request.",
        );
    }

    let mut request = async_graphql::Request::new(query);
    if let Some(name) = params.operation_name {
        request = request.operation_name(name);
    }
    if let Some(raw) = params.variables {
        match serde_json::from_str::<Value>(&raw) {
            Ok(variables) => request = request.variables(Variables::from_json(variables)),
            Err(err) => {
                return request_error(
                    StatusCode::BAD_REQUEST,
                    &format!("Variables are invalid JSON: {err}"),
                )
            }
        }
    }
    execute(&state, request).await.into_response()
}

/// Whether the operation a GET would run is a mutation. Documents that do not
/// parse are left for execution to report.
fn selects_mutation(query: &str, operation_name: Option<&str>) -> bool {
    let Ok(document) = parse_query(query) else {
        return false;
    };
    document.operations.iter().any(|(name, operation)| {
        operation.node.ty == OperationType::Mutation
            && (operation_name.is_none() || name.map(|n| n.as_str()) == operation_name)
    })
}

fn request_error(status: StatusCode, message: &str) -> Response {
    warn!(status = %status, reason = message, "graphql request rejected");
    (status, Json(json!({ "errors": [{ "message": message }] }))).into_response()
}

async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST,GET,OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStores;
    use axum::body::{to_bytes, Body};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        router(InMemoryStores::new().stores(), LoaderConfig::default())
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_preflight_is_ok_with_cors_headers() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/graphql")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_METHODS],
            "POST,GET,OPTIONS"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_graphql_post() {
        let response = app()
            .oneshot(
                Request::post("/graphql")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"query":"{ cosmonauts { _id } }"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let json = body_json(response).await;
        assert_eq!(json["data"]["cosmonauts"], json!([]));
        assert!(json.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_graphql_get_runs_query() {
        let response = app()
            .oneshot(
                Request::get("/graphql?query=%7B%20superpowers%20%7B%20name%20%7D%20%7D")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["superpowers"], json!([]));
    }

    #[tokio::test]
    async fn test_graphql_get_passes_variables() {
        // query ($b: Boolean!) { __typename @include(if: $b) } with {"b":true}
        let uri = "/graphql?query=query%20(%24b%3A%20Boolean!)%20\
                   %7B%20__typename%20%40include(if%3A%20%24b)%20%7D\
                   &variables=%7B%22b%22%3Atrue%7D";
        let response = app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["__typename"], "RootQuery");
    }

    #[tokio::test]
    async fn test_graphql_get_rejects_mutation() {
        let uri = "/graphql?query=mutation%20%7B%20createSuperpower(inputSuperpower%3A%20\
                   %7B%20name%3A%20%22Flight%22%20%7D)%20%7B%20_id%20%7D%20%7D";
        let stores = InMemoryStores::new();
        let response = router(stores.stores(), LoaderConfig::default())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let json = body_json(response).await;
        assert!(json["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("POST"));
        assert!(stores.superpowers.is_empty().unwrap());
    }

    #[test]
    fn test_selects_mutation_honours_operation_name() {
        let document = r#"
            query Read { cosmonauts { _id } }
            mutation Write { removeCosmonaut(cosmonautId: "x") { _id } }
        "#;
        assert!(!selects_mutation(document, Some("Read")));
        assert!(selects_mutation(document, Some("Write")));
        assert!(selects_mutation(document, None));
        assert!(!selects_mutation("{ cosmonauts { _id } }", None));
        assert!(!selects_mutation("not graphql", None));
    }

    #[tokio::test]
    async fn test_graphiql_page() {
        let response = app()
            .oneshot(Request::get("/graphql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("graphiql"));
    }
}
