//! 只读的 HTTP 查询接口

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use literature_core::{Card, ErrorKind, GameError, GameSnapshot, PlayerId, PlayerSummary, RoomId, Team};

use crate::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room_id}/players", get(room_players))
        .route("/rooms/{room_id}/turn", get(room_turn))
        .route("/players/{player_id}/hand", get(player_hand))
        .route("/players/{player_id}/team", get(player_team))
}

pub struct ApiError(GameError);

#[derive(Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            GameError::RoomNotFound | GameError::PlayerNotFound => StatusCode::NOT_FOUND,
            GameError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        };
        let body = ErrorBody { kind: self.0.kind(), message: self.0.client_message() };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct PlayersBody {
    players: Vec<PlayerSummary>,
}

#[derive(Serialize)]
struct HandBody {
    hand: Vec<Card>,
}

#[derive(Serialize)]
struct TeamBody {
    team: Team,
}

async fn room_players(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<PlayersBody>, ApiError> {
    let players = state.service.players(room_id).await?;
    Ok(Json(PlayersBody { players }))
}

async fn room_turn(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<GameSnapshot>, ApiError> {
    Ok(Json(state.service.snapshot(room_id).await?))
}

async fn player_hand(
    State(state): State<SharedState>,
    Path(player_id): Path<PlayerId>,
) -> Result<Json<HandBody>, ApiError> {
    let hand = state.service.hand(player_id).await?;
    Ok(Json(HandBody { hand }))
}

async fn player_team(
    State(state): State<SharedState>,
    Path(player_id): Path<PlayerId>,
) -> Result<Json<TeamBody>, ApiError> {
    let team = state.service.team(player_id).await?;
    Ok(Json(TeamBody { team }))
}
