use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use base64::{engine::general_purpose, Engine as _};
use library::LibraryError;
use tracing::{error, info, warn};

use crate::state::{AppState, AuthContext, ErrorResponse, JsonResult, ProfilePicResponse, ProfileResponse};
use crate::utils::json_error;

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

pub async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> JsonResult<ProfileResponse> {
    // Re-read so a freshly uploaded picture shows up.
    let user = state
        .catalog
        .get_user(ctx.user.id)
        .map_err(|err| {
            error!("Failed to load user {}: {}", ctx.user.id, err);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "User not found"))?;
    Ok(Json(ProfileResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        profile_pic: user.profile_pic,
    }))
}

struct UploadedImage {
    filename: String,
    mime: String,
    data: Vec<u8>,
}

fn multipart_error(err: MultipartError) -> (StatusCode, Json<ErrorResponse>) {
    warn!("Error reading multipart upload: {}", err);
    json_error(err.status(), err.body_text())
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Option<UploadedImage>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let mime = field
            .content_type()
            .filter(|mime| !mime.is_empty())
            .unwrap_or(DEFAULT_IMAGE_MIME)
            .to_string();
        let data = field.bytes().await?.to_vec();
        return Ok(Some(UploadedImage {
            filename,
            mime,
            data,
        }));
    }
    Ok(None)
}

pub fn data_uri(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(data))
}

/// Stores the picture inline on the user row as a data URI.
pub async fn upload_profile_pic(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    mut multipart: Multipart,
) -> JsonResult<ProfilePicResponse> {
    let image = read_image_field(&mut multipart)
        .await
        .map_err(multipart_error)?
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "No file part"))?;
    if image.filename.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "No selected file"));
    }

    let profile_pic = data_uri(&image.mime, &image.data);
    match state.catalog.set_profile_pic(ctx.user.id, &profile_pic) {
        Ok(()) => {}
        Err(LibraryError::NotFound) => {
            return Err(json_error(StatusCode::NOT_FOUND, "User not found"))
        }
        Err(err) => {
            error!("Failed to store profile picture: {}", err);
            return Err(json_error(StatusCode::INTERNAL_SERVER_ERROR, "Upload failed"));
        }
    }
    info!(
        "Stored {} byte profile picture for user {}",
        image.data.len(),
        ctx.user.id
    );
    Ok(Json(ProfilePicResponse {
        message: "Uploaded successfully".to_string(),
        profile_pic,
    }))
}
