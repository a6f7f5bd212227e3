use axum::{extract::State, http::StatusCode, response::Response, Json};
use tracing::{error, info};

use crate::auth::{run_blocking, AuthError};
use crate::state::{AppState, JsonResult, LoginRequest, LoginResponse, SignupRequest, UserSummary};
use crate::utils::{json_error, json_error_response, json_message, JsonBody};

pub async fn signup(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SignupRequest>,
) -> Response {
    let auth = state.auth.clone();
    let signup =
        run_blocking(move || auth.signup(&payload.name, &payload.email, &payload.password)).await;
    match signup {
        Ok(user_id) => {
            info!("Registered user {}", user_id);
            json_message(StatusCode::CREATED, "User created successfully")
        }
        Err(AuthError::UserExists) => {
            json_error_response(StatusCode::BAD_REQUEST, "Email already registered")
        }
        Err(err) => {
            error!("Signup failed: {}", err);
            json_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error creating account")
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> JsonResult<LoginResponse> {
    let auth = state.auth.clone();
    let login = run_blocking(move || {
        let Some(user) = auth.authenticate(&payload.email, &payload.password)? else {
            return Ok(None);
        };
        let session = auth.create_session(user.id)?;
        Ok(Some((user, session)))
    })
    .await;
    let (user, session) = match login {
        Ok(Some(found)) => found,
        Ok(None) => return Err(json_error(StatusCode::UNAUTHORIZED, "Invalid")),
        Err(err) => {
            error!("Login failed: {}", err);
            return Err(json_error(StatusCode::INTERNAL_SERVER_ERROR, "Login failed"));
        }
    };

    Ok(Json(LoginResponse {
        token: session.token,
        user: UserSummary {
            id: user.id,
            name: user.name,
        },
    }))
}
