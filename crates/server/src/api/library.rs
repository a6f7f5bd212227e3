use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use common::Song;
use tracing::{debug, error};

use crate::artist_images::resolve_artist_image;
use crate::recommend::recommend;
use crate::state::{AppState, ArtistImageQuery, ArtistImageResponse, JsonResult, RecommendRequest};
use crate::utils::{json_error, JsonBody};

pub async fn list_songs(State(state): State<AppState>) -> JsonResult<Vec<Song>> {
    state.catalog.list_songs().map(Json).map_err(|err| {
        error!("Failed to list songs: {}", err);
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load songs")
    })
}

/// The body is optional: without a model the prompt is never read.
pub async fn recommend_songs(
    State(state): State<AppState>,
    payload: Option<JsonBody<RecommendRequest>>,
) -> JsonResult<Vec<Song>> {
    let request = payload.map(|JsonBody(body)| body).unwrap_or_default();
    let result = recommend(&state.catalog, state.model.as_deref(), &request.prompt)
        .await
        .map_err(|err| {
            error!("Recommendation failed: {}", err);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load songs")
        })?;
    debug!(
        "Recommended {} songs ({:?})",
        result.songs.len(),
        result.source
    );
    Ok(Json(result.songs))
}

pub async fn artist_image(
    State(state): State<AppState>,
    Query(query): Query<ArtistImageQuery>,
) -> JsonResult<ArtistImageResponse> {
    let name = query.name.unwrap_or_default().trim().to_string();
    if name.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "Artist name required"));
    }
    let image = resolve_artist_image(&state.catalog, state.artist_search.as_ref(), &name).await;
    Ok(Json(ArtistImageResponse {
        artist: name,
        image_url: image.url,
    }))
}
