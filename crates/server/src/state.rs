use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use common::{LikeStatus, Song, User};
use library::Catalog;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::auth::AuthStore;
use crate::config::{FrontendPaths, ServerConfig};
use crate::external::{ArtistSearch, TextModel};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub auth: AuthStore,
    pub config: Arc<ServerConfig>,
    pub frontend: FrontendPaths,
    pub model: Option<Arc<dyn TextModel>>,
    pub artist_search: Arc<dyn ArtistSearch>,
    pub shutdown: CancellationToken,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Clone)]
pub struct AuthContext {
    pub user: User,
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub profile_pic: Option<String>,
}

#[derive(Serialize)]
pub struct ProfilePicResponse {
    pub message: String,
    pub profile_pic: String,
}

#[derive(Serialize)]
pub struct PlaylistSummary {
    pub id: i64,
    pub name: String,
    pub is_system: bool,
}

#[derive(Serialize)]
pub struct PlaylistDetail {
    pub id: i64,
    pub name: String,
    pub is_system: bool,
    pub songs: Vec<Song>,
}

#[derive(Serialize)]
pub struct CreatedPlaylist {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct AddSongRequest {
    pub playlist_id: i64,
    pub song_id: i64,
}

#[derive(Deserialize)]
pub struct LikeRequest {
    pub song_id: i64,
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub status: LikeStatus,
}

#[derive(Default, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Deserialize)]
pub struct ArtistImageQuery {
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct ArtistImageResponse {
    pub artist: String,
    pub image_url: String,
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;
