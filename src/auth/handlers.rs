use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderValue},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, SignupRequest, UpdateUserRequest},
        extractors::{AuthUser, AUTH_HEADER},
        services::{
            authenticate, create_principal, issue_token, remove_token, to_public_view,
            update_principal, UserChanges,
        },
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(signup))
        .route("/users/login", post(login))
        .route("/users/me/token", delete(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).patch(update_me))
        .route("/me", get(get_me))
}

fn auth_header(token: &str) -> Result<HeaderMap, AppError> {
    let value = HeaderValue::from_str(token)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token is not a valid header: {e}")))?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTH_HEADER, value);
    Ok(headers)
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<PublicUser>), AppError> {
    let Json(payload) = payload?;

    let user = create_principal(&state, &payload.email, payload.password)
        .await
        .inspect_err(|e| warn!(error = %e, "signup rejected"))?;
    let token = issue_token(&state, &user).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((auth_header(&token)?, Json(to_public_view(&user))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<PublicUser>), AppError> {
    let Json(payload) = payload?;

    let user = match authenticate(&state, &payload.email, payload.password).await {
        Ok(u) => u,
        Err(e) => {
            warn!(email = %payload.email.trim(), "login rejected");
            return Err(e);
        }
    };
    let token = issue_token(&state, &user).await?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((auth_header(&token)?, Json(to_public_view(&user))))
}

#[instrument(skip(state, auth))]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<(), AppError> {
    remove_token(&state, &auth.user, &auth.token).await?;
    info!(user_id = %auth.user.id, "user logged out");
    Ok(())
}

#[instrument(skip(auth))]
pub async fn get_me(auth: AuthUser) -> Json<PublicUser> {
    Json(to_public_view(&auth.user))
}

#[instrument(skip(state, auth, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<PublicUser>, AppError> {
    let Json(payload) = payload?;
    let changes = UserChanges {
        email: payload.email,
        password: payload.password,
    };
    let user = update_principal(&state, &auth.user, changes).await?;
    info!(user_id = %user.id, "user updated");
    Ok(Json(to_public_view(&user)))
}
