/**
 * Authentication Routes
 * JWT-based authentication with register, login and verify
 */
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::{AppState, JwtConfig};
use crate::db::{self, models::NewUser, models::UserView, storage};
use crate::routes::{validation_details, ErrorResponse};

pub const ROLES: &[&str] = &["admin", "editor", "viewer"];

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,   // User ID
    pub email: String, // User email
    pub role: String,  // User role
    pub exp: i64,      // Expiry timestamp
    pub iat: i64,      // Issued at timestamp
}

/// Identity decoded from a bearer token, as returned by /api/auth/verify
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: TokenUser,
}

// ============================================================================
// Token helpers
// ============================================================================

/// Create a signed access token for a user identity.
pub fn create_token(
    jwt: &JwtConfig,
    user_id: &str,
    email: &str,
    role: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::days(jwt.expiry_days);

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
}

/// Verify and decode an access token
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Duplicate-key message keyed on the violated constraint, for registrations
/// that lose a race after the pre-insert existence checks.
fn duplicate_user_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(name) if name.contains("username") => "Username already taken",
        _ => "User with this email already exists",
    }
}

/// Bearer-token request gate for admin handlers. A missing header is 401
/// Unauthorized; a present-but-invalid token is 403.
pub fn require_auth(
    headers: &HeaderMap,
    jwt: &JwtConfig,
) -> Result<Claims, (StatusCode, Json<ErrorResponse>)> {
    let token = extract_bearer_token(headers).ok_or((
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("Unauthorized")),
    ))?;

    verify_token(&jwt.secret, &token).map_err(|e| {
        tracing::debug!("Token verification failed: {}", e);
        (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("Invalid token")),
        )
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/register
/// Create an admin panel user and return a token plus a public-safe view.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details(
                "Invalid registration data",
                validation_details(&errors),
            )),
        )
            .into_response();
    }

    let role = payload.role.unwrap_or_else(|| "admin".to_string());
    if !ROLES.contains(&role.as_str()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Role must be one of: admin, editor, viewer",
            )),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    match storage::get_user_by_email(pool.as_ref(), &payload.email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("User with this email already exists")),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Database error during registration: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Registration failed")),
            )
                .into_response();
        }
    }

    match storage::get_user_by_username(pool.as_ref(), &payload.username).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Username already taken")),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Database error during registration: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Registration failed")),
            )
                .into_response();
        }
    }

    // Hash password — bcrypt is intentionally CPU-intensive; run it outside
    // the async executor so it doesn't block other in-flight tasks.
    let password = payload.password.clone();
    let password_hash = match tokio::task::spawn_blocking(move || hash(&password, DEFAULT_COST))
        .await
    {
        Ok(Ok(h)) => h,
        Ok(Err(e)) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to process password")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("spawn_blocking panic during hash: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to process password")),
            )
                .into_response();
        }
    };

    let new_user = NewUser {
        username: payload.username,
        email: payload.email,
        password_hash,
        role,
    };

    let user = match storage::create_user(pool.as_ref(), &new_user).await {
        Ok(user) => user,
        Err(e) if db::is_unique_violation(&e) => {
            // Lost the race against a concurrent registration
            let message =
                duplicate_user_message(e.as_database_error().and_then(|db| db.constraint()));
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(message)),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Registration failed")),
            )
                .into_response();
        }
    };

    let token = match create_token(
        &state.config.jwt,
        &user.id.to_string(),
        &user.email,
        &user.role,
    ) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to create access token: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create token")),
            )
                .into_response();
        }
    };

    tracing::info!("User registered successfully: {}", user.email);
    (
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    )
        .into_response()
}

/// POST /api/auth/login
/// Authenticate by email and password; stamps last_login_at on success.
/// Unknown email and wrong password yield the same response.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    if payload.email.is_empty() || payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Email and password are required")),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    let user = match storage::get_user_by_email(pool.as_ref(), &payload.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!("Login attempt for unknown user: {}", payload.email);
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Invalid credentials")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error during login: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Login failed")),
            )
                .into_response();
        }
    };

    // Verify password — bcrypt is CPU-bound; keep the async executor free.
    let password = payload.password.clone();
    let password_hash = user.password_hash.clone();
    let password_ok =
        tokio::task::spawn_blocking(move || verify(&password, &password_hash).unwrap_or(false))
            .await
            .unwrap_or(false);
    if !password_ok {
        tracing::warn!("Failed login attempt for: {}", user.email);
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Invalid credentials")),
        )
            .into_response();
    }

    if let Err(e) = storage::touch_user_login(pool.as_ref(), user.id).await {
        tracing::error!("Failed to update last login: {}", e);
    }

    let token = match create_token(
        &state.config.jwt,
        &user.id.to_string(),
        &user.email,
        &user.role,
    ) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to create access token: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create token")),
            )
                .into_response();
        }
    };

    tracing::info!("Successful login for user: {}", user.email);
    (
        StatusCode::OK,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    )
        .into_response()
}

/// GET /api/auth/verify
/// Confirm token validity and echo the decoded identity.
pub async fn verify_token_route(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    match require_auth(&headers, &state.config.jwt) {
        Ok(claims) => (
            StatusCode::OK,
            Json(VerifyResponse {
                valid: true,
                user: TokenUser {
                    id: claims.sub,
                    email: claims.email,
                    role: claims.role,
                },
            }),
        )
            .into_response(),
        Err(err_response) => err_response.into_response(),
    }
}
