pub mod auth;
pub mod library;
pub mod user;
pub mod user_data;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tracing::error;

use crate::auth::extract_token;
use crate::state::{AppState, AuthContext};
use crate::utils::json_error_response;

/// Routes mounted under `/api`.
pub fn api_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    let protected = Router::new()
        .route("/ai/recommend", post(library::recommend_songs))
        .route(
            "/playlists",
            get(user_data::list_playlists).post(user_data::create_playlist),
        )
        .route("/playlists/add_song", post(user_data::add_song))
        .route("/playlists/:playlist_id", get(user_data::get_playlist))
        .route(
            "/likes",
            get(user_data::list_likes).post(user_data::toggle_like),
        )
        .route("/user/me", get(user::me))
        .route(
            "/user/upload_profile_pic",
            post(user::upload_profile_pic).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/songs", get(library::list_songs))
        .route("/artists/image", get(library::artist_image))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .merge(protected)
        .with_state(state)
}

async fn require_auth(
    State(state): State<AppState>,
    mut req: axum::http::Request<Body>,
    next: Next,
) -> Response {
    let token = match extract_token(req.headers()) {
        Some(token) => token,
        None => return json_error_response(StatusCode::UNAUTHORIZED, "Missing token"),
    };

    match state.auth.user_from_token(&token) {
        Ok(Some(user)) => {
            req.extensions_mut().insert(AuthContext { user });
            next.run(req).await
        }
        Ok(None) => json_error_response(StatusCode::UNAUTHORIZED, "Invalid or expired token"),
        Err(err) => {
            error!("Token lookup failed: {}", err);
            json_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}
