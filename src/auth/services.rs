use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::TokenPurpose,
        dto::PublicUser,
        repo_types::{NewUser, TokenEntry, User, UserPatch},
    },
    config::ValidationPolicy,
    error::AppError,
    state::AppState,
    store::StoreError,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str, policy: &ValidationPolicy) -> Result<String, AppError> {
    let email = raw.trim();
    if email.chars().count() < policy.min_email_len || !is_valid_email(email) {
        return Err(AppError::validation(format!("{email} is not a valid email")));
    }
    Ok(email.to_string())
}

fn check_password(password: &str, policy: &ValidationPolicy) -> Result<(), AppError> {
    if password.chars().count() < policy.min_password_len {
        return Err(AppError::validation(format!(
            "password must be at least {} characters",
            policy.min_password_len
        )));
    }
    Ok(())
}

fn map_duplicate(e: StoreError) -> AppError {
    match e {
        StoreError::Duplicate(_) => AppError::Conflict,
        other => AppError::Store(other),
    }
}

/// Explicit set of fields a profile update touches.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn create_principal(
    state: &AppState,
    email: &str,
    password: String,
) -> Result<User, AppError> {
    let policy = &state.config.validation;
    let email = normalize_email(email, policy)?;
    check_password(&password, policy)?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict);
    }

    let password_hash = state.hasher.hash_blocking(password).await?;
    let user = state
        .store
        .insert_user(NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash,
        })
        .await
        .map_err(map_duplicate)?;
    Ok(user)
}

/// Appends a fresh auth token to the user's live set and hands it back.
pub async fn issue_token(state: &AppState, user: &User) -> Result<String, AppError> {
    let token = state.keys.sign(user.id, TokenPurpose::Auth)?;
    let entry = TokenEntry {
        access: TokenPurpose::Auth,
        token: token.clone(),
    };
    if !state.store.push_token(user.id, entry).await? {
        warn!(user_id = %user.id, "token issued for a user that no longer exists");
        return Err(AppError::Unauthenticated);
    }
    Ok(token)
}

pub async fn resolve_by_token(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = state
        .keys
        .verify(token)
        .map_err(|e| {
            debug!(error = %e, "token rejected");
            AppError::Unauthenticated
        })?;

    let entry = TokenEntry {
        access: TokenPurpose::Auth,
        token: token.to_string(),
    };
    state
        .store
        .find_user_with_token(claims.sub, &entry)
        .await?
        .ok_or_else(|| {
            debug!(user_id = %claims.sub, "token is not live");
            AppError::Unauthenticated
        })
}

/// Unknown email and wrong password fail the same way.
pub async fn authenticate(
    state: &AppState,
    email: &str,
    password: String,
) -> Result<User, AppError> {
    let Some(user) = state.store.find_user_by_email(email.trim()).await? else {
        state.hasher.verify_decoy_blocking(password).await?;
        return Err(AppError::InvalidCredentials);
    };
    let ok = state
        .hasher
        .verify_blocking(password, user.password_hash.clone())
        .await?;
    if !ok {
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}

pub async fn remove_token(state: &AppState, user: &User, token: &str) -> Result<(), AppError> {
    state.store.pull_token(user.id, token).await?;
    Ok(())
}

/// Applies only the listed changes; the password is hashed only when present.
/// Outstanding tokens are left untouched.
pub async fn update_principal(
    state: &AppState,
    user: &User,
    changes: UserChanges,
) -> Result<User, AppError> {
    let policy = &state.config.validation;
    let email = changes
        .email
        .as_deref()
        .map(|e| normalize_email(e, policy))
        .transpose()?;

    let password_hash = match changes.password {
        Some(password) => {
            check_password(&password, policy)?;
            Some(state.hasher.hash_blocking(password).await?)
        }
        None => None,
    };

    state
        .store
        .update_user(
            user.id,
            UserPatch {
                email,
                password_hash,
            },
        )
        .await
        .map_err(map_duplicate)?
        .ok_or(AppError::Unauthenticated)
}

pub fn to_public_view(user: &User) -> PublicUser {
    PublicUser::from(user)
}
