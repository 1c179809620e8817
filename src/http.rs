use crate::error::{ProcgraphError, Result};
use crate::facade::ProcessFacade;
use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// HTTP front for [`ProcessFacade`]; one route per operation.
pub struct HttpServer {
    facade: Arc<ProcessFacade>,
}

impl HttpServer {
    pub fn new(facade: ProcessFacade) -> Self {
        Self {
            facade: Arc::new(facade),
        }
    }

    /// Run the HTTP server until the process is stopped
    pub async fn run(&self, addr: &str) -> Result<()> {
        let app = create_router(Arc::clone(&self.facade));

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            ProcgraphError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to bind to {}: {}. Set http_server.port in config.toml to use another port.",
                    addr, e
                ),
            ))
        })?;
        log::info!("Serving process models on http://{}", addr);

        axum::serve(listener, app).await.map_err(|e| {
            ProcgraphError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }
}

/// Build the router
pub fn create_router(facade: Arc<ProcessFacade>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/getStartByName/:name", get(handle_start_by_name))
        .route("/getNodeById/:id", get(handle_node_by_id))
        .route("/getNextById/:id", get(handle_next_by_id))
        .route("/getStuffById/:id", get(handle_stuff_by_id))
        .route("/getStuffById/:id/:stuff_type", get(handle_stuff_by_id_and_type))
        .route("/traverseTreeById/:id", get(handle_traverse_tree_by_id))
        .route("/getAllStuffById/:id", get(handle_all_stuff_by_id))
        .route(
            "/getAllStuffById/:id/:stuff_type",
            get(handle_all_stuff_by_id_and_type),
        )
        .route("/health", get(handle_health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(facade)
}

type AppState = State<Arc<ProcessFacade>>;

async fn handle_start_by_name(State(facade): AppState, Path(name): Path<String>) -> Response {
    json_text(facade.get_start_by_name(&name).await)
}

async fn handle_node_by_id(State(facade): AppState, Path(id): Path<String>) -> Response {
    json_text(facade.get_node_by_id(&id).await)
}

async fn handle_next_by_id(State(facade): AppState, Path(id): Path<String>) -> Response {
    json_text(facade.get_next_by_id(&id).await)
}

async fn handle_stuff_by_id(State(facade): AppState, Path(id): Path<String>) -> Response {
    json_text(facade.get_stuff_by_id(&id, None).await)
}

async fn handle_stuff_by_id_and_type(
    State(facade): AppState,
    Path((id, stuff_type)): Path<(String, String)>,
) -> Response {
    json_text(facade.get_stuff_by_id(&id, Some(&stuff_type)).await)
}

// The only structured result; serialized here rather than by the facade.
async fn handle_traverse_tree_by_id(State(facade): AppState, Path(id): Path<String>) -> Response {
    match facade.traverse_tree_by_id(&id).await {
        Ok(graph) => (StatusCode::OK, Json(graph)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_all_stuff_by_id(State(facade): AppState, Path(id): Path<String>) -> Response {
    json_text(facade.get_all_stuff_by_id(&id, None).await)
}

async fn handle_all_stuff_by_id_and_type(
    State(facade): AppState,
    Path((id, stuff_type)): Path<(String, String)>,
) -> Response {
    json_text(facade.get_all_stuff_by_id(&id, Some(&stuff_type)).await)
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "procgraph",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

/// Pre-rendered JSON text goes out verbatim.
fn json_text(result: Result<String>) -> Response {
    match result {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

impl ProcgraphError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProcgraphError::EmptyResult(_) => StatusCode::NOT_FOUND,
            ProcgraphError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ProcgraphError::Database(_)
            | ProcgraphError::Config(_)
            | ProcgraphError::Io(_)
            | ProcgraphError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProcgraphError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::debug!("Request rejected: {}", self);
        }
        (
            status,
            Json(serde_json::json!({
                "error": status.canonical_reason().unwrap_or("error"),
                "message": self.to_string()
            })),
        )
            .into_response()
    }
}
