use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use yatube_db::Database;
use yatube_types::api::{
    Claims, LoginPage, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};

use crate::cache::{MemoryPageCache, PageCache};
use crate::config::Config;
use crate::error::AppError;
use crate::with_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
    pub cache: Arc<dyn PageCache>,
}

impl AppStateInner {
    pub fn new(db: Database, config: Config) -> AppState {
        let cache = MemoryPageCache::with_limit(config.index_cache_max_entries);
        Self::with_cache(db, config, Arc::new(cache))
    }

    pub fn with_cache(db: Database, config: Config, cache: Arc<dyn PageCache>) -> AppState {
        Arc::new(Self { db, config, cache })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// GET /auth/login/. Guarded routes send anonymous visitors here.
pub async fn login_page(Query(query): Query<LoginQuery>) -> Json<LoginPage> {
    Json(LoginPage {
        fields: vec!["username".into(), "password".into()],
        next: query.next,
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(errors) = req.validate() {
        let echo = serde_json::json!({ "username": req.username });
        return Err(AppError::validation(&echo, &errors));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let username = req.username.clone();
    // The UNIQUE constraint decides between concurrent registrations.
    let created = with_db(&state, move |db| {
        Ok(db.create_user(&user_id.to_string(), &username, &password_hash)?)
    })
    .await?;
    if !created {
        return Err(AppError::Conflict("username is taken"));
    }

    info!("Registered user {}", req.username);
    let token = create_token(&state.config.jwt_secret, user_id, &req.username)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = req.username.clone();
    let user = with_db(&state, move |db| Ok(db.get_user_by_username(&username)?))
        .await?
        .ok_or(AppError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored hash is unreadable: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized)?;

    let user_id: Uuid = user.id.parse().map_err(anyhow::Error::from)?;
    let token = create_token(&state.config.jwt_secret, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip_with_same_secret() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id, "alice").unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn tokens_from_other_secret_are_rejected() {
        let token = create_token("secret", Uuid::new_v4(), "alice").unwrap();
        assert!(decode_token("other", &token).is_err());
    }
}
