//! `chess-serve`: an `axum` HTTP surface exposing the agent registry's
//! move selection as `POST /move`.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use llm_chess_minimax::config::OracleConfig;
use llm_chess_minimax::registry::{AgentRegistry, CallAgentError, Descriptor, Model};
use llm_chess_minimax::rules::{GameState, Move};

#[derive(Deserialize)]
struct MoveRequest {
    state: GameState,
    /// One of `human`, `random`, `minimax(gpt-3.5)`, `minimax(gpt-4)`.
    descriptor: String,
}

#[derive(Serialize)]
struct MoveResponse {
    mv: Move,
}

enum AppError {
    UnknownDescriptor(String),
    CallAgent(CallAgentError),
}

impl From<CallAgentError> for AppError {
    fn from(e: CallAgentError) -> Self {
        AppError::CallAgent(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            AppError::UnknownDescriptor(d) => format!("unknown descriptor `{d}`"),
            AppError::CallAgent(e) => e.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn parse_descriptor(raw: &str) -> Result<Descriptor, AppError> {
    match raw {
        "human" => Ok(Descriptor::Human),
        "random" => Ok(Descriptor::Random),
        "minimax(gpt-3.5)" | "gpt-3.5" | "gpt3.5" => Ok(Descriptor::Minimax(Model::Gpt35)),
        "minimax(gpt-4)" | "gpt-4" | "gpt4" => Ok(Descriptor::Minimax(Model::Gpt4)),
        other => Err(AppError::UnknownDescriptor(other.to_string())),
    }
}

async fn choose_move(
    State(registry): State<Arc<AgentRegistry>>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, AppError> {
    let descriptor = parse_descriptor(&req.descriptor)?;
    let mv = registry.call_agent(&req.state, descriptor).await?;
    Ok(Json(MoveResponse { mv }))
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guards = llm_chess_minimax::logging::init(
        Path::new("logs/oracle_calls.jsonl"),
        Path::new("logs/minimax_iter.jsonl"),
    )?;

    let config = OracleConfig::from_env()?;
    let registry = Arc::new(AgentRegistry::new(config.api_key, config.organization));

    let app = Router::new()
        .route("/move", post(choose_move))
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(registry);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!(%addr, "chess-serve listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
