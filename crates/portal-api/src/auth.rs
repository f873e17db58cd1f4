use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use portal_core::email::{is_valid_email, normalize_email};
use portal_core::identity::{Elevation, PortalAccess, auto_elevation, portal_access};
use portal_db::Database;
use portal_db::models::NewUser;
use portal_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use portal_types::models::{Role, User};

use crate::config::PortalConfig;
use crate::error::ApiError;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

/// POST /auth/register: new accounts start pending unless auto-elevated.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("invalid email address"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }
    let full_name = req.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ApiError::bad_request("full name is required"));
    }
    if req.role == Role::Admin {
        return Err(ApiError::bad_request("admin accounts cannot be requested at signup"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })?
        .to_string();

    let config = state.config.clone();
    let role = req.role;
    let user = state
        .with_db(move |db| {
            if db.get_user_by_email(&email)?.is_some() {
                return Err(ApiError::Conflict("email is already registered".into()));
            }
            // Concurrent signups for one address are settled by the unique index.
            let user = db
                .create_user(&NewUser {
                    id: Uuid::new_v4(),
                    email: &email,
                    password_hash: &password_hash,
                    full_name: &full_name,
                    role,
                })?
                .ok_or_else(|| ApiError::Conflict("email is already registered".into()))?;
            Ok(apply_elevation(db, &config, user)?)
        })
        .await?;

    info!("Registered {} as {} ({})", user.id, user.role, user.approval_status);
    let token = create_token(&state.jwt_secret, user.id, &user.email)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// POST /auth/login: rejected accounts are refused outright.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    let row = state
        .with_db(move |db| Ok(db.get_user_by_email(&email)?))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&row.password).map_err(|e| {
        error!("Stored hash for {} is unreadable: {}", row.user.id, e);
        ApiError::Internal
    })?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let config = state.config.clone();
    let user = state
        .with_db(move |db| Ok(apply_elevation(db, &config, row.user)?))
        .await?;

    if portal_access(user.approval_status) == PortalAccess::SignedOut {
        info!("Refused login for rejected account {}", user.id);
        return Err(ApiError::Unauthorized);
    }

    let token = create_token(&state.jwt_secret, user.id, &user.email)?;
    Ok(Json(AuthResponse { token, user }))
}

/// Promotes the primary admin address or a freshly granted email. A grant is
/// consumed once used; an expired one is cleared.
fn apply_elevation(db: &Database, config: &PortalConfig, user: User) -> anyhow::Result<User> {
    let grant = db.get_admin_grant(&user.email)?;
    let elevation = auto_elevation(&user.email, config.primary_admin_email.as_deref(), grant, Utc::now());

    if grant.is_some() && elevation != Some(Elevation::PrimaryAdmin) {
        db.delete_admin_grant(&user.email)?;
    }

    match elevation {
        Some(reason) => {
            info!("Elevating {} to admin ({:?})", user.id, reason);
            Ok(db.elevate_to_admin(user.id)?.unwrap_or(user))
        }
        None => Ok(user),
    }
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(|e| {
        error!("Token encoding failed: {}", e);
        ApiError::Internal
    })
}
