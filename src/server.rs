//! HTTP and WebSocket routes over [`GameService`].

use axum::http::{HeaderValue, Method};
use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::actions::{ActionResponse, GameId, UserName};
use crate::application::{GameService, GameSummary};
use crate::enums::{ActionType, GameConfiguration};
use crate::errors::{GameError, ServiceError};
use crate::game_log::LogEntry;
use crate::state::{GameState, PlayerSeat};
use crate::websocket::WebSocketService;

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    #[serde(default)]
    pub config: GameConfiguration,
    pub players: Vec<PlayerSeat>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGameResponse {
    pub game_id: GameId,
}

#[derive(Debug, Deserialize)]
pub struct SubmitActionRequest {
    pub user_name: UserName,
    /// Decoded by the engine so bad payloads are logged rejections.
    pub action: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub since: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps service errors onto HTTP status codes.
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::GameNotFound { .. }
            | ServiceError::Game(GameError::PlayerUserNameNotFound { .. }) => StatusCode::NOT_FOUND,
            ServiceError::InvalidConfiguration { .. } | ServiceError::Game(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        log::debug!("❌ {} -> {}", self.0, status);
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn hello_world() -> &'static str {
    "Hello from the Machi Koro backend!"
}

async fn create_game(
    State(service): State<GameService>,
    Json(request): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<CreateGameResponse>), ApiError> {
    log::info!(
        "Creating game with {} players: {:?}",
        request.players.len(),
        request.config
    );
    let game_id = service.create_game(request.config, request.players).await?;
    Ok((StatusCode::CREATED, Json(CreateGameResponse { game_id })))
}

async fn list_games(State(service): State<GameService>) -> Json<Vec<GameSummary>> {
    Json(service.list_games().await)
}

async fn get_game(
    State(service): State<GameService>,
    Path(game_id): Path<String>,
) -> Result<Json<GameState>, ApiError> {
    Ok(Json(service.game_state(&game_id).await?))
}

async fn delete_game(
    State(service): State<GameService>,
    Path(game_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service.remove_game(&game_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_log(
    State(service): State<GameService>,
    Path(game_id): Path<String>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    Ok(Json(service.log_since(&game_id, query.since).await?))
}

async fn get_possible_actions(
    State(service): State<GameService>,
    Path((game_id, user_name)): Path<(String, String)>,
) -> Result<Json<Vec<ActionType>>, ApiError> {
    Ok(Json(service.possible_actions(&game_id, &user_name).await?))
}

/// Rejected actions are still `200 OK`; the verdict is in the body.
async fn submit_action(
    State(service): State<GameService>,
    Path(game_id): Path<String>,
    Json(request): Json<SubmitActionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let response = service
        .submit_raw_action(&game_id, &request.user_name, request.action)
        .await?;
    Ok(Json(response))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<String>,
    Query(query): Query<LogQuery>,
    State(service): State<GameService>,
) -> impl IntoResponse {
    let ws_service = WebSocketService::new(service);
    ws.on_upgrade(move |socket| async move {
        ws_service
            .handle_connection(socket, game_id, query.since)
            .await
    })
}

fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);
    match allowed_origin.and_then(|origin| origin.parse::<HeaderValue>().ok()) {
        Some(origin) => cors.allow_origin(origin),
        None => cors.allow_origin(Any),
    }
}

/// Create router with routes
pub fn build_router(service: GameService, allowed_origin: Option<&str>) -> Router {
    Router::new()
        .route("/", get(hello_world))
        .route("/games", post(create_game).get(list_games))
        .route("/games/{game_id}", get(get_game).delete(delete_game))
        .route("/games/{game_id}/log", get(get_log))
        .route("/games/{game_id}/actions", post(submit_action))
        .route(
            "/games/{game_id}/actions/{user_name}",
            get(get_possible_actions),
        )
        .route("/ws/games/{game_id}", get(ws_handler))
        .with_state(service)
        .layer(cors_layer(allowed_origin))
}
