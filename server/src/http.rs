use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use entity::employee;
use platform_db::DbPool;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, EntityTrait, QueryFilter,
    QueryOrder, Set, Statement,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "directory server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/employees", get(list_employees).post(create_employee))
        .route(
            "/employees/{id}",
            patch(update_employee).delete(delete_employee),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewEmployee {
    full_name: String,
    role: String,
}

// Unknown keys are rejected so a misspelled field cannot silently turn the
// whole mutation into a no-op.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct EmployeePatch {
    full_name: Option<String>,
    role: Option<String>,
    is_active: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeBody {
    id: i32,
    full_name: String,
    role: String,
    is_active: bool,
}

impl From<employee::Model> for EmployeeBody {
    fn from(value: employee::Model) -> Self {
        Self {
            id: value.id,
            full_name: value.full_name,
            role: value.role,
            is_active: value.is_active,
        }
    }
}

#[derive(Serialize)]
struct MutationAck {
    affected: u64,
}

async fn create_employee(
    State(state): State<AppState>,
    payload: Result<Json<NewEmployee>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EmployeeBody>)> {
    let Json(input) = payload.map_err(bad_body)?;
    let record = employee::ActiveModel {
        full_name: Set(non_blank("fullName", &input.full_name)?),
        role: Set(non_blank("role", &input.role)?),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(&state.pool)
    .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

async fn list_employees(State(state): State<AppState>) -> ApiResult<Json<Vec<EmployeeBody>>> {
    let records = employee::Entity::find()
        .order_by_desc(employee::Column::Id)
        .all(&state.pool)
        .await?;
    Ok(Json(records.into_iter().map(EmployeeBody::from).collect()))
}

async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Result<Json<EmployeePatch>, JsonRejection>,
) -> ApiResult<Json<MutationAck>> {
    let Json(patch) = payload.map_err(bad_body)?;
    if patch.full_name.is_none() && patch.role.is_none() && patch.is_active.is_none() {
        return Err(ApiError::Validation(
            "at least one field must be provided for PATCH".to_string(),
        ));
    }
    let mut active = employee::ActiveModel {
        ..Default::default()
    };
    if let Some(full_name) = &patch.full_name {
        active.full_name = Set(non_blank("fullName", full_name)?);
    }
    if let Some(role) = &patch.role {
        active.role = Set(non_blank("role", role)?);
    }
    if let Some(is_active) = patch.is_active {
        active.is_active = Set(is_active);
    }
    let res = employee::Entity::update_many()
        .set(active)
        .filter(employee::Column::Id.eq(id))
        .exec(&state.pool)
        .await?;
    Ok(Json(MutationAck {
        affected: res.rows_affected,
    }))
}

async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MutationAck>> {
    let res = employee::Entity::delete_by_id(id)
        .exec(&state.pool)
        .await?;
    Ok(Json(MutationAck {
        affected: res.rows_affected,
    }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state
        .pool
        .execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] sea_orm::DbErr),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ApiError::Store(err) => {
                error!(error = %err, "store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
                    .into_response()
            }
        }
    }
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(format!("invalid request body: {rejection}"))
}

fn non_blank(field: &'static str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    async fn test_router() -> Router {
        let pool = Database::connect("sqlite::memory:")
            .await
            .expect("open in-memory db");
        Migrator::up(&pool, None).await.expect("apply migrations");
        build_router(AppState {
            pool,
            config: Arc::new(AppConfig::default()),
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("response expected");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body should be readable");
        if body.is_empty() {
            return (status, Value::Null);
        }
        let value = serde_json::from_slice::<Value>(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
        (status, value)
    }

    async fn send_json(
        app: &Router,
        method: Method,
        uri: &str,
        payload: Value,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request should build");
        send(app, request).await
    }

    async fn send_empty(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request should build");
        send(app, request).await
    }

    #[tokio::test]
    async fn create_returns_record_with_active_default() {
        let app = test_router().await;

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez", "role": "Engineer" }),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 1);
        assert_eq!(body["fullName"], "Ana Lopez");
        assert_eq!(body["role"], "Engineer");
        assert_eq!(body["isActive"], true);
    }

    #[tokio::test]
    async fn create_rejects_missing_role() {
        let app = test_router().await;

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_rejects_blank_full_name() {
        let app = test_router().await;

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "   ", "role": "QA Analyst" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, Value::String("fullName must not be blank".into()));
    }

    #[tokio::test]
    async fn create_ignores_supplied_active_flag() {
        let app = test_router().await;

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez", "role": "Engineer", "isActive": false }),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["isActive"], true);
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let app = test_router().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/employees")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request should build");
        let (status, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let app = test_router().await;

        for (name, role) in [
            ("Ana Lopez", "Engineer"),
            ("Bob Smith", "QA Analyst"),
            ("Carla Diaz", "Product Manager"),
        ] {
            let (status, _) = send_json(
                &app,
                Method::POST,
                "/employees",
                json!({ "fullName": name, "role": role }),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send_empty(&app, Method::GET, "/employees").await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body
            .as_array()
            .expect("array body")
            .iter()
            .map(|record| record["id"].as_i64().expect("integer id"))
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn patch_updates_only_supplied_fields() {
        let app = test_router().await;
        send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez", "role": "Engineer" }),
        )
        .await;

        let (status, ack) = send_json(
            &app,
            Method::PATCH,
            "/employees/1",
            json!({ "role": "Staff Engineer" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["affected"], 1);
        let (_, body) = send_empty(&app, Method::GET, "/employees").await;
        assert_eq!(body[0]["fullName"], "Ana Lopez");
        assert_eq!(body[0]["role"], "Staff Engineer");
        assert_eq!(body[0]["isActive"], true);
    }

    #[tokio::test]
    async fn patch_on_missing_id_reports_zero_affected() {
        let app = test_router().await;

        let (status, ack) = send_json(
            &app,
            Method::PATCH,
            "/employees/999",
            json!({ "isActive": false }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["affected"], 0);
    }

    #[tokio::test]
    async fn patch_rejects_empty_body() {
        let app = test_router().await;
        send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez", "role": "Engineer" }),
        )
        .await;

        let (status, body) = send_json(&app, Method::PATCH, "/employees/1", json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            Value::String("at least one field must be provided for PATCH".into())
        );
    }

    #[tokio::test]
    async fn patch_rejects_unknown_fields() {
        let app = test_router().await;
        send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez", "role": "Engineer" }),
        )
        .await;

        let (status, _) = send_json(
            &app,
            Method::PATCH,
            "/employees/1",
            json!({ "fullname": "Anna Lopez" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, body) = send_empty(&app, Method::GET, "/employees").await;
        assert_eq!(body[0]["fullName"], "Ana Lopez");
    }

    #[tokio::test]
    async fn patch_rejects_blank_role() {
        let app = test_router().await;
        send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez", "role": "Engineer" }),
        )
        .await;

        let (status, body) =
            send_json(&app, Method::PATCH, "/employees/1", json!({ "role": "  " })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, Value::String("role must not be blank".into()));
        let (_, body) = send_empty(&app, Method::GET, "/employees").await;
        assert_eq!(body[0]["role"], "Engineer");
    }

    #[tokio::test]
    async fn path_id_must_be_an_integer() {
        let app = test_router().await;

        let (status, _) = send_json(
            &app,
            Method::PATCH,
            "/employees/abc",
            json!({ "isActive": false }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_reports_affected_and_repeats_as_noop() {
        let app = test_router().await;
        send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez", "role": "Engineer" }),
        )
        .await;

        let (status, ack) = send_empty(&app, Method::DELETE, "/employees/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["affected"], 1);

        let (status, ack) = send_empty(&app, Method::DELETE, "/employees/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["affected"], 0);

        let (_, body) = send_empty(&app, Method::GET, "/employees").await;
        assert_eq!(body.as_array().expect("array body").len(), 0);
    }

    #[tokio::test]
    async fn delete_on_missing_id_leaves_records_untouched() {
        let app = test_router().await;
        send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez", "role": "Engineer" }),
        )
        .await;

        let (status, ack) = send_empty(&app, Method::DELETE, "/employees/999").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["affected"], 0);
        let (_, body) = send_empty(&app, Method::GET, "/employees").await;
        assert_eq!(body.as_array().expect("array body").len(), 1);
        assert_eq!(body[0]["fullName"], "Ana Lopez");
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reused() {
        let app = test_router().await;
        send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez", "role": "Engineer" }),
        )
        .await;
        send_empty(&app, Method::DELETE, "/employees/1").await;

        let (_, body) = send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Bob Smith", "role": "QA Analyst" }),
        )
        .await;

        assert_eq!(body["id"], 2);
    }

    #[tokio::test]
    async fn health_reports_database_status() {
        let app = test_router().await;

        let (status, body) = send_empty(&app, Method::GET, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["db_ok"], true);
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let app = test_router().await;

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("response expected");

        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn end_to_end_directory_flow() {
        let app = test_router().await;

        send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Ana Lopez", "role": "Engineer" }),
        )
        .await;
        send_json(
            &app,
            Method::POST,
            "/employees",
            json!({ "fullName": "Bob Smith", "role": "QA Analyst" }),
        )
        .await;

        let (_, ack) = send_json(
            &app,
            Method::PATCH,
            "/employees/1",
            json!({ "role": "Staff Engineer" }),
        )
        .await;
        assert_eq!(ack["affected"], 1);
        let (_, ack) = send_json(
            &app,
            Method::PATCH,
            "/employees/2",
            json!({ "isActive": false }),
        )
        .await;
        assert_eq!(ack["affected"], 1);

        let (_, body) = send_empty(&app, Method::GET, "/employees").await;
        assert_eq!(body[0]["fullName"], "Bob Smith");
        assert_eq!(body[0]["isActive"], false);
        assert_eq!(body[1]["role"], "Staff Engineer");
        assert_eq!(body[1]["isActive"], true);

        let (_, ack) = send_empty(&app, Method::DELETE, "/employees/2").await;
        assert_eq!(ack["affected"], 1);
        let (_, body) = send_empty(&app, Method::GET, "/employees").await;
        assert_eq!(body.as_array().expect("array body").len(), 1);
        assert_eq!(body[0]["id"], 1);
    }
}
