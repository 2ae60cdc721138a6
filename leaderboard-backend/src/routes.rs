use crate::AppState;
use crate::auth::{self, Payload};
use crate::error::AppError;

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use axum_macros::debug_handler;
use leaderboard_db::{
    Collection, DeleteResult, Document, Filter, InsertOneResult, PlayerFields, RankedPlayer,
    RecordId, UpdateResult,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub(crate) const BANNER: &str = "server is running data will appear soon...";

const PLAYER_NOT_FOUND: &str = "Player not found";
const NO_PLAYERS: &str = "No players found";

/// Every data endpoint that can be placed behind the auth guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListUsers,
    CreateUser,
    CreatePlayer,
    ListPlayers,
    PlayerByRank,
    RandomPlayer,
    GetPlayer,
    UpdatePlayer,
    DeletePlayer,
}

impl Endpoint {
    pub const ALL: [Endpoint; 9] = [
        Endpoint::ListUsers,
        Endpoint::CreateUser,
        Endpoint::CreatePlayer,
        Endpoint::ListPlayers,
        Endpoint::PlayerByRank,
        Endpoint::RandomPlayer,
        Endpoint::GetPlayer,
        Endpoint::UpdatePlayer,
        Endpoint::DeletePlayer,
    ];

    /// Name used in `PROTECTED_ROUTES`.
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::ListUsers => "list_users",
            Endpoint::CreateUser => "create_user",
            Endpoint::CreatePlayer => "create_player",
            Endpoint::ListPlayers => "list_players",
            Endpoint::PlayerByRank => "player_by_rank",
            Endpoint::RandomPlayer => "random_player",
            Endpoint::GetPlayer => "get_player",
            Endpoint::UpdatePlayer => "update_player",
            Endpoint::DeletePlayer => "delete_player",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }
}

#[derive(Serialize)]
pub(crate) struct Ack {
    success: bool,
}

#[derive(Serialize)]
pub(crate) struct UserExists {
    user: &'static str,
}

pub(crate) async fn banner() -> &'static str {
    BANNER
}

#[debug_handler]
pub(crate) async fn issue_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<Payload>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.tokens.issue(payload)?;
    Ok((
        jar.add(state.tokens.session_cookie(token)),
        Json(Ack { success: true }),
    ))
}

pub(crate) async fn logout(jar: CookieJar) -> impl IntoResponse {
    (auth::invalidate(jar), Json(Ack { success: true }))
}

pub(crate) async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.db.find_all(Collection::Users).await?))
}

/// Insert a user unless one with the same email exists. The check and the
/// insert are separate calls, so concurrent signups can still race.
#[debug_handler]
pub(crate) async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(user): Json<Document>,
) -> Result<Response, AppError> {
    let email = user.get("email").cloned().unwrap_or(Value::Null);

    if state
        .db
        .find_one(Collection::Users, Filter::eq("email", email))
        .await?
        .is_some()
    {
        return Ok(Json(UserExists { user: "Exist" }).into_response());
    }

    let result = state.db.insert_one(Collection::Users, user).await?;
    Ok(Json(result).into_response())
}

pub(crate) async fn create_player(
    State(state): State<Arc<AppState>>,
    Json(player): Json<Document>,
) -> Result<Json<InsertOneResult>, AppError> {
    Ok(Json(state.db.insert_one(Collection::Players, player).await?))
}

pub(crate) async fn list_players(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.db.find_all(Collection::Players).await?))
}

/// Player at a 1-based position in descending score order.
pub(crate) async fn player_by_rank(
    State(state): State<Arc<AppState>>,
    Path(val): Path<String>,
) -> Result<Json<RankedPlayer>, AppError> {
    let rank = parse_rank(&val).ok_or(AppError::NotFound(PLAYER_NOT_FOUND))?;

    state
        .db
        .ranked_by_score(Collection::Players)
        .await?
        .into_iter()
        .nth(rank - 1)
        .map(Json)
        .ok_or(AppError::NotFound(PLAYER_NOT_FOUND))
}

/// Leading-digit parse: `"2abc"` and `"2.9"` are rank 2. Zero, negatives and
/// inputs without leading digits have no rank.
fn parse_rank(val: &str) -> Option<usize> {
    let val = val.trim_start();
    let val = val.strip_prefix('+').unwrap_or(val);
    let end = val.find(|c: char| !c.is_ascii_digit()).unwrap_or(val.len());
    val[..end].parse::<usize>().ok().filter(|&rank| rank >= 1)
}

pub(crate) async fn random_player(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Document>, AppError> {
    state
        .db
        .sample_random(Collection::Players, 1)
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or(AppError::NotFound(NO_PLAYERS))
}

pub(crate) async fn get_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let id: RecordId = id.parse()?;

    state
        .db
        .find_by_id(Collection::Players, &id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound(PLAYER_NOT_FOUND))
}

#[debug_handler]
pub(crate) async fn update_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(fields): Json<PlayerFields>,
) -> Result<Json<UpdateResult>, AppError> {
    let id: RecordId = id.parse()?;
    Ok(Json(
        state
            .db
            .upsert_by_id(Collection::Players, &id, fields)
            .await?,
    ))
}

pub(crate) async fn delete_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, AppError> {
    let id: RecordId = id.parse()?;
    Ok(Json(state.db.delete_by_id(Collection::Players, &id).await?))
}
