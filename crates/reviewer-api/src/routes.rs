use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, DEFAULT_PAGE_SIZE};
use crate::error::AppError;
use crate::store::{Record, RecordTable};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    records: Arc<RecordTable>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            records: Arc::new(RecordTable::new()),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/collections/{collection}/records",
            get(list_records).post(create_record),
        )
        .route(
            "/collections/{collection}/records/{id}",
            put(update_record).delete(delete_record),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    records: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        records: state.records.count().await,
    })
}

async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.config.api_token.as_deref() {
        let token = extract_bearer_token(request.headers())?;
        if token != expected {
            return Err(AppError::unauthorized("Invalid bearer token"));
        }
    }
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

fn validate_collection(collection: &str) -> Result<(), AppError> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::bad_request(format!(
            "invalid collection name '{collection}'"
        )))
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    modified_after: i64,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    records: Vec<Record>,
}

async fn list_records(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    validate_collection(&collection)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, state.config.max_page_size);

    let records = state
        .records
        .list_modified_after(&collection, query.modified_after, limit)
        .await;
    tracing::debug!(
        collection = %collection,
        modified_after = query.modified_after,
        count = records.len(),
        "Listed records"
    );
    Ok(Json(ListResponse { records }))
}

async fn create_record(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(record): Json<Record>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    validate_collection(&collection)?;
    let (record, inserted) = state.records.create(&collection, record).await?;
    if inserted {
        tracing::info!(collection = %collection, id = %record.id, "Created record");
        Ok((StatusCode::CREATED, Json(record)))
    } else {
        tracing::debug!(collection = %collection, id = %record.id, "Record already exists");
        Ok((StatusCode::OK, Json(record)))
    }
}

async fn update_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(record): Json<Record>,
) -> Result<Json<Record>, AppError> {
    validate_collection(&collection)?;
    let record = state.records.update(&collection, &id, record).await?;
    tracing::info!(collection = %collection, id = %record.id, "Updated record");
    Ok(Json(record))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    validate_collection(&collection)?;
    let existed = state.records.delete(&collection, &id).await;
    tracing::info!(collection = %collection, id = %id, existed, "Deleted record");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{self, header, Method};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    fn router_with_token(token: Option<&str>) -> Router {
        let config = AppConfig {
            api_token: token.map(str::to_string),
            ..AppConfig::default()
        };
        app_router(AppState::from_config(Arc::new(config)))
    }

    fn json_request(method: Method, uri: &str, body: &Value) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(router: &Router, request: Request) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn note(id: &str, title: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "content": "body",
            "vault_id": "v1",
            "updated_at": 1
        })
    }

    #[tokio::test]
    async fn records_lifecycle() {
        let router = router_with_token(None);
        let records = "/v1/collections/notes/records";

        let (status, created) = send(
            &router,
            json_request(Method::POST, records, &note("n1", "first")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created["updated_at"].as_i64().unwrap() > 1);

        // A retried create whose first response was lost
        let (status, repeated) = send(
            &router,
            json_request(Method::POST, records, &note("n1", "first")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(repeated["updated_at"], created["updated_at"]);

        let (status, body) = send(
            &router,
            json_request(Method::POST, records, &note("n1", "again")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("n1"));

        let (status, updated) = send(
            &router,
            json_request(Method::PUT, &format!("{records}/n1"), &note("n1", "edited")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "edited");

        let (status, listed) = send(
            &router,
            empty_request(Method::GET, &format!("{records}?modified_after=0&limit=10")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["records"].as_array().unwrap().len(), 1);
        assert_eq!(listed["records"][0]["title"], "edited");

        let after = updated["updated_at"].as_i64().unwrap();
        let (_, listed) = send(
            &router,
            empty_request(Method::GET, &format!("{records}?modified_after={after}")),
        )
        .await;
        assert!(listed["records"].as_array().unwrap().is_empty());

        for _ in 0..2 {
            let (status, _) =
                send(&router, empty_request(Method::DELETE, &format!("{records}/n1"))).await;
            assert_eq!(status, StatusCode::NO_CONTENT);
        }

        let (_, health) = send(&router, empty_request(Method::GET, "/healthz")).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["records"], 0);
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let router = router_with_token(None);
        let (status, _) = send(
            &router,
            json_request(
                Method::PUT,
                "/v1/collections/notes/records/ghost",
                &note("ghost", "missing"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rejects_invalid_collection_name() {
        let router = router_with_token(None);
        let (status, _) = send(
            &router,
            empty_request(Method::GET, "/v1/collections/no%20tes/records"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn token_guards_v1_routes_but_not_health() {
        let router = router_with_token(Some("secret"));
        let uri = "/v1/collections/notes/records";

        let (status, _) = send(&router, empty_request(Method::GET, uri)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let wrong = http::Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&router, wrong).await.0, StatusCode::UNAUTHORIZED);

        let right = http::Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, "Bearer secret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&router, right).await.0, StatusCode::OK);

        let (status, _) = send(&router, empty_request(Method::GET, "/healthz")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
