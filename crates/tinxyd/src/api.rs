use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::Phase;
use crate::engine::SyncCoordinator;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    phase: Phase,
    cycles: u64,
    endpoints: Vec<String>,
}

#[derive(Serialize)]
struct EntityResponse {
    entity: Entity,
    state: Option<EntityState>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Body of POST /v1/entities/{entity_id}/state
#[derive(Debug, Deserialize)]
struct SetStateRequest {
    on: bool,
    #[serde(default)]
    brightness: Option<u8>,
}

/// Query of GET /v1/entities/{entity_id}/state
#[derive(Debug, Deserialize)]
struct StateQuery {
    /// Read the device directly instead of serving the snapshot
    #[serde(default)]
    refresh: bool,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    coordinator: Arc<SyncCoordinator>,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            phase: state.coordinator.phase(),
            cycles: state.coordinator.cycles(),
            endpoints: state.coordinator.endpoint_names(),
        }),
    )
}

#[tracing::instrument(skip(state))]
async fn list_entities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.coordinator.catalog().entities().to_vec())
}

#[tracing::instrument(skip(state))]
async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Response {
    let catalog = state.coordinator.catalog();
    let Some(entity) = catalog.entity(&entity_id) else {
        return error(StatusCode::NOT_FOUND, format!("unknown entity {}", entity_id));
    };

    Json(EntityResponse {
        entity: entity.clone(),
        state: state.coordinator.current_snapshot().get(&entity_id).cloned(),
    })
    .into_response()
}

#[tracing::instrument(skip(state))]
async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.coordinator.catalog().devices().to_vec())
}

#[tracing::instrument(skip(state))]
async fn device_metadata(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Response {
    match state.coordinator.metadata(&device_id) {
        Some(metadata) => Json(metadata).into_response(),
        None => error(
            StatusCode::NOT_FOUND,
            format!("no metadata for device {}", device_id),
        ),
    }
}

#[tracing::instrument(skip(state))]
async fn snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.coordinator.current_snapshot().as_ref().clone())
}

#[tracing::instrument(skip(state))]
async fn get_entity_state(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Query(query): Query<StateQuery>,
) -> Response {
    let catalog = state.coordinator.catalog();
    let Some(entity) = catalog.entity(&entity_id) else {
        return error(StatusCode::NOT_FOUND, format!("unknown entity {}", entity_id));
    };

    if !query.refresh {
        return match state.coordinator.current_snapshot().get(&entity_id) {
            Some(current) => Json(current.clone()).into_response(),
            None => error(
                StatusCode::NOT_FOUND,
                format!("no state yet for entity {}", entity_id),
            ),
        };
    }

    let Some(commander) = state.coordinator.commander() else {
        return error(
            StatusCode::SERVICE_UNAVAILABLE,
            "no integration reads single entities",
        );
    };

    match commander.get_state(entity).await {
        Ok(fresh) => {
            state.coordinator.publish_state(&entity_id, fresh.clone()).await;
            Json(fresh).into_response()
        }
        Err(e) => {
            tracing::warn!("Reading {} failed: {}", entity_id, e);
            error(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

#[tracing::instrument(skip(state))]
async fn set_state(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(request): Json<SetStateRequest>,
) -> Response {
    let catalog = state.coordinator.catalog();
    let Some(entity) = catalog.entity(&entity_id) else {
        return error(StatusCode::NOT_FOUND, format!("unknown entity {}", entity_id));
    };
    let Some(commander) = state.coordinator.commander() else {
        return error(
            StatusCode::SERVICE_UNAVAILABLE,
            "no integration accepts commands",
        );
    };

    match commander
        .set_state(entity, request.on, request.brightness.map(|b| b.min(100)))
        .await
    {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            tracing::warn!("Command for {} failed: {}", entity_id, e);
            error(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/entities", get(list_entities))
        .route("/v1/entities/:entity_id", get(get_entity))
        .route(
            "/v1/entities/:entity_id/state",
            get(get_entity_state).post(set_state),
        )
        .route("/v1/devices", get(list_devices))
        .route("/v1/devices/:device_id/metadata", get(device_metadata))
        .route("/v1/snapshot", get(snapshot))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Serves the coordinator's catalog and snapshot until `shutdown_rx` fires.
pub async fn serve(
    listen: IpAddr,
    port: u16,
    coordinator: Arc<SyncCoordinator>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState {
        version,
        coordinator,
    });
    let app = create_router(state);

    let addr = SocketAddr::new(listen, port);
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
