use crate::{AppState, error::ApiError, extract::JsonBody};
use axum::{Json, extract::State, http::header, response::IntoResponse};
use gallery::app::accounts::{self, AuthToken, SignupRequest};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
pub struct SigninRequest {
    username: String,
    password: String,
}

/// Answers with the token body and mirrors the token in the `Authorization` header.
pub async fn signin(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = accounts::signin(&state.db, &state.keys, &request.username, &request.password)
        .await?;

    Ok(with_authorization(token))
}

pub async fn signup(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = accounts::signup(&state.db, &state.keys, state.config.bcrypt_cost, request).await?;

    Ok(with_authorization(token))
}

/// Tokens are not tracked server side, so there is nothing to revoke.
pub async fn signout() -> Json<Value> {
    Json(json!({ "message": "Signed out successfully" }))
}

fn with_authorization(token: AuthToken) -> impl IntoResponse {
    (
        [(header::AUTHORIZATION, format!("Bearer {}", token.token))],
        Json(token),
    )
}
