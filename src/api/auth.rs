//! Registration, login, and bearer-token verification. Password hashing
//! and token issuance are opaque primitives (bcrypt, HS256 JWT); user
//! identity everywhere else derives from the verified token, never from
//! request payloads.

use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::SharedState;
use crate::error::{AppError, AppResult};

const TOKEN_TTL_DAYS: i64 = 30;
const MIN_PASSWORD_LEN: usize = 6;

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtKeys(..)")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    exp: usize,
}

fn issue_token(keys: &JwtKeys, user_id: &str, email: &str) -> AppResult<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &keys.encoding)
        .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
}

/// The authenticated caller, extracted from the `Authorization: Bearer`
/// header. Missing header rejects with 401, invalid/expired with 403.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::MissingToken)?;
        let token = header.strip_prefix("Bearer ").ok_or(AppError::MissingToken)?;

        let data = decode::<Claims>(token, &state.jwt.decoding, &Validation::default())
            .map_err(|_| AppError::InvalidToken)?;

        Ok(Self {
            user_id: data.claims.sub,
            email: data.claims.email,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl CredentialsBody {
    fn validate(&self) -> AppResult<()> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

pub async fn register(
    State(state): State<SharedState>,
    Json(body): Json<CredentialsBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    if body.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let password = body.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || {
        bcrypt::hash(password, bcrypt::DEFAULT_COST)
    })
    .await
    .map_err(|e| AppError::Internal(format!("hash task panicked: {e}")))?
    .map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))?;

    let user_id = Uuid::new_v4().to_string();
    state
        .store
        .create_user(&user_id, &body.email, &password_hash, Utc::now())?;

    let token = issue_token(&state.jwt, &user_id, &body.email)?;
    tracing::info!(%user_id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "token": token,
            "user": { "id": user_id, "email": body.email },
        })),
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    Json(body): Json<CredentialsBody>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let user = state
        .store
        .find_user_by_email(&body.email)?
        .ok_or(AppError::InvalidCredentials)?;

    let password = body.password.clone();
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify task panicked: {e}")))?
        .map_err(|e| AppError::Internal(format!("failed to verify password: {e}")))?;

    if !valid {
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_token(&state.jwt, &user.id, &user.email)?;

    Ok(Json(json!({
        "message": "Login successful",
        "token": token,
        "user": { "id": user.id, "email": user.email },
    })))
}

pub async fn verify(auth: AuthUser) -> Json<Value> {
    Json(json!({
        "valid": true,
        "user": { "id": auth.user_id, "email": auth.email },
    }))
}
