use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use tracing::error;

use crate::state::{
    AddSongRequest, AppState, AuthContext, CreatePlaylistRequest, CreatedPlaylist, ErrorResponse,
    JsonResult, LikeRequest, LikeResponse, PlaylistDetail, PlaylistSummary,
};
use crate::utils::{json_error, json_error_response, json_message, JsonBody};

fn internal(context: &str, err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    error!("{}: {}", context, err);
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
}

pub async fn list_playlists(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> JsonResult<Vec<PlaylistSummary>> {
    let playlists = state
        .catalog
        .list_visible_playlists(ctx.user.id)
        .map_err(|err| internal("Failed to list playlists", err))?;
    Ok(Json(
        playlists
            .into_iter()
            .map(|playlist| PlaylistSummary {
                id: playlist.id,
                name: playlist.name,
                is_system: playlist.is_system,
            })
            .collect(),
    ))
}

pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(playlist_id): Path<i64>,
) -> JsonResult<PlaylistDetail> {
    let playlist = state
        .catalog
        .get_playlist(playlist_id)
        .map_err(|err| internal("Failed to load playlist", err))?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Not found"))?;
    if !playlist.readable_by(ctx.user.id) {
        return Err(json_error(StatusCode::FORBIDDEN, "Access denied"));
    }
    let songs = state
        .catalog
        .playlist_songs(playlist.id)
        .map_err(|err| internal("Failed to load playlist songs", err))?;
    Ok(Json(PlaylistDetail {
        id: playlist.id,
        name: playlist.name,
        is_system: playlist.is_system,
        songs,
    }))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    JsonBody(payload): JsonBody<CreatePlaylistRequest>,
) -> Response {
    let name = payload.name.trim();
    if name.is_empty() {
        return json_error_response(StatusCode::BAD_REQUEST, "Playlist name required");
    }
    match state.catalog.create_user_playlist(name, ctx.user.id) {
        Ok(playlist) => (
            StatusCode::CREATED,
            Json(CreatedPlaylist {
                id: playlist.id,
                name: playlist.name,
            }),
        )
            .into_response(),
        Err(err) => internal("Failed to create playlist", err).into_response(),
    }
}

pub async fn add_song(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    JsonBody(payload): JsonBody<AddSongRequest>,
) -> Response {
    let owned = match state
        .catalog
        .find_owned_playlist(payload.playlist_id, ctx.user.id)
    {
        Ok(owned) => owned,
        Err(err) => return internal("Failed to load playlist", err).into_response(),
    };
    if owned.is_none() {
        return json_error_response(StatusCode::NOT_FOUND, "Error");
    }
    match state.catalog.get_song(payload.song_id) {
        Ok(Some(_)) => {}
        Ok(None) => return json_error_response(StatusCode::NOT_FOUND, "Song not found"),
        Err(err) => return internal("Failed to load song", err).into_response(),
    }
    match state
        .catalog
        .ensure_playlist_song(payload.playlist_id, payload.song_id)
    {
        Ok(_) => json_message(StatusCode::OK, "Added"),
        Err(err) => internal("Failed to add song", err).into_response(),
    }
}

pub async fn list_likes(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> JsonResult<Vec<i64>> {
    state
        .catalog
        .list_liked_song_ids(ctx.user.id)
        .map(Json)
        .map_err(|err| internal("Failed to list likes", err))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    JsonBody(payload): JsonBody<LikeRequest>,
) -> JsonResult<LikeResponse> {
    if state
        .catalog
        .get_song(payload.song_id)
        .map_err(|err| internal("Failed to load song", err))?
        .is_none()
    {
        return Err(json_error(StatusCode::NOT_FOUND, "Song not found"));
    }
    let status = state
        .catalog
        .toggle_like(ctx.user.id, payload.song_id)
        .map_err(|err| internal("Failed to toggle like", err))?;
    Ok(Json(LikeResponse { status }))
}
