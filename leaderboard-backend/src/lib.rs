pub mod auth;
pub mod config;
mod error;
pub mod helpers;
mod routes;

pub use routes::Endpoint;

use axum::{
    Router,
    http::{HeaderName, Method, StatusCode, header},
    middleware,
    routing::{MethodRouter, delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::TokenService;
use crate::config::Config;

pub struct AppState {
    pub db: leaderboard_db::Database,
    pub tokens: TokenService,
}

/// Create the application router with the given database and configuration
pub fn create_app(db: leaderboard_db::Database, config: &Config) -> Router {
    let tokens = TokenService::new(&config.access_token_secret, config.token_ttl);
    let state = Arc::new(AppState { db, tokens });

    let guard = middleware::from_fn_with_state(state.clone(), auth::require_token);
    let protected = config.protected_routes.clone();
    let route = |endpoint: Endpoint, handler: MethodRouter<Arc<AppState>>| {
        if protected.contains(endpoint) {
            handler.route_layer(guard.clone())
        } else {
            handler
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(config.allowed_origins.iter().cloned()))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-requested-with")]);

    let session_routes = Router::new()
        .route("/jwt", post(routes::issue_token))
        .route("/logout", post(routes::logout));

    let user_routes = Router::new().route(
        "/users",
        route(Endpoint::ListUsers, get(routes::list_users))
            .merge(route(Endpoint::CreateUser, post(routes::create_user))),
    );

    let player_routes = Router::new()
        .route(
            "/players",
            route(Endpoint::ListPlayers, get(routes::list_players))
                .merge(route(Endpoint::CreatePlayer, post(routes::create_player))),
        )
        .route(
            "/players/rank/{val}",
            route(Endpoint::PlayerByRank, get(routes::player_by_rank)),
        )
        .route(
            "/players/random",
            route(Endpoint::RandomPlayer, get(routes::random_player)),
        )
        .route(
            "/players/{id}",
            route(Endpoint::GetPlayer, get(routes::get_player))
                .merge(route(Endpoint::UpdatePlayer, put(routes::update_player)))
                .merge(route(Endpoint::DeletePlayer, delete(routes::delete_player))),
        );

    Router::new()
        .route("/", get(routes::banner))
        .route("/health", get(|| async { StatusCode::OK }))
        .merge(session_routes)
        .merge(user_routes)
        .merge(player_routes)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(config.request_body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
