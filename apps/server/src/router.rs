use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use quanx_domain::{Instance, ServerConfig};
use quanx_registry::{Registry, RegistryError, SharedRegistry};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Debug)]
pub(crate) struct AppState {
    pub(crate) config: ServerConfig,
    pub(crate) registry: Option<SharedRegistry>,
}

#[derive(Debug, Serialize)]
struct Health<'a> {
    status: &'static str,
    name: &'a str,
    host: &'a str,
    port: &'a std::collections::BTreeMap<String, u16>,
}

#[derive(Debug, Serialize)]
struct Problem {
    error: String,
}

pub(crate) fn init(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/discovery/{service}", get(discovery))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    Json(Health {
        status: "ok",
        name: state.config.name(),
        host: state.config.host(),
        port: &state.config.port,
    })
    .into_response()
}

async fn discovery(State(state): State<Arc<AppState>>, Path(service): Path<String>) -> Response {
    let Some(registry) = &state.registry else {
        return problem(StatusCode::SERVICE_UNAVAILABLE, "no registry configured");
    };
    match registry.select_all(&service).await {
        Ok(instances) => Json::<Vec<Instance>>(instances).into_response(),
        Err(err) => {
            warn!(service = %service, error = %err, "Discovery lookup failed");
            let status = match err {
                RegistryError::NoHealthyInstance { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            };
            problem(status, err.to_string())
        }
    }
}

fn problem(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(Problem { error: error.into() })).into_response()
}
