/**
 * Announcement Routes
 * Public listing with active/pinned filters, admin CRUD with HTML sanitization
 */
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::config::AppState;
use crate::db::{
    self,
    models::{Announcement, AnnouncementPatch, NewAnnouncement},
    storage,
};
use crate::routes::auth::require_auth;
use crate::routes::{parse_datetime, validation_details, ErrorResponse, MessageResponse};
use crate::slug::{slugify, with_suffix};

pub const ANNOUNCEMENT_KINDS: &[&str] = &["graphic", "non_graphic"];

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/announcements
#[derive(Debug, Deserialize)]
pub struct AnnouncementListQuery {
    pub active: Option<bool>,
    pub pinned: Option<bool>,
}

/// Request body for POST /api/admin/announcements
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content_html: Option<String>,
    pub graphic_url: Option<String>,
    pub published_at: Option<String>,
    pub expires_at: Option<String>,
    pub pinned: Option<bool>,
}

/// Request body for PUT /api/admin/announcements/:id. Absent fields stay
/// unchanged (explicit `null` clears a nullable column), except `expiresAt`
/// which is always written (cleared when absent).
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub content_html: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub graphic_url: Option<Option<String>>,
    pub published_at: Option<String>,
    pub expires_at: Option<String>,
    pub pinned: Option<bool>,
}

fn is_announcement_kind(kind: &str) -> bool {
    ANNOUNCEMENT_KINDS.contains(&kind)
}

async fn unique_announcement_slug(
    pool: &sqlx::PgPool,
    title: &str,
) -> Result<String, sqlx::Error> {
    let base = {
        let s = slugify(title);
        if s.is_empty() {
            "announcement".to_string()
        } else {
            s
        }
    };
    let mut counter = 0;
    loop {
        let candidate = with_suffix(&base, counter);
        if storage::get_announcement_by_slug(pool, &candidate)
            .await?
            .is_none()
        {
            return Ok(candidate);
        }
        counter += 1;
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/announcements - List announcements, optionally filtered
pub async fn list_announcements(Query(query): Query<AnnouncementListQuery>) -> impl IntoResponse {
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

    let result = if query.active == Some(true) {
        storage::list_active_announcements(pool.as_ref()).await
    } else if query.pinned == Some(true) {
        storage::list_pinned_announcements(pool.as_ref()).await
    } else {
        storage::list_announcements(pool.as_ref()).await
    };

    match result {
        Ok(announcements) => (StatusCode::OK, Json(announcements)).into_response(),
        Err(e) => {
            tracing::error!("Database error fetching announcements: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch announcements")),
            )
                .into_response()
        }
    }
}

/// GET /api/announcements/:slug_or_id - Slug lookup first, id fallback
pub async fn get_announcement(Path(slug_or_id): Path<String>) -> impl IntoResponse {
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

    let by_slug = match storage::get_announcement_by_slug(pool.as_ref(), &slug_or_id).await {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Database error fetching announcement: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch announcement")),
            )
                .into_response();
        }
    };

    let announcement: Option<Announcement> = match by_slug {
        Some(a) => Some(a),
        None => match slug_or_id.parse::<Uuid>() {
            Ok(id) => match storage::get_announcement(pool.as_ref(), id).await {
                Ok(a) => a,
                Err(e) => {
                    tracing::error!("Database error fetching announcement: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(ErrorResponse::new("Failed to fetch announcement")),
                    )
                        .into_response();
                }
            },
            Err(_) => None,
        },
    };

    match announcement {
        Some(a) => (StatusCode::OK, Json(a)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Announcement not found")),
        )
            .into_response(),
    }
}

/// POST /api/admin/announcements - Create announcement (auth required)
pub async fn create_announcement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers, &state.config.jwt) {
        return err_response.into_response();
    }

    if let Err(errors) = payload.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details(
                "Invalid announcement data",
                validation_details(&errors),
            )),
        )
            .into_response();
    }

    if !is_announcement_kind(&payload.kind) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Type must be one of: graphic, non_graphic",
            )),
        )
            .into_response();
    }

    let published_at = match &payload.published_at {
        Some(s) => match parse_datetime(s) {
            Some(dt) => dt,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Invalid publishedAt")),
                )
                    .into_response();
            }
        },
        None => chrono::Utc::now(),
    };

    let expires_at = match &payload.expires_at {
        Some(s) => match parse_datetime(s) {
            Some(dt) => Some(dt),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Invalid expiresAt")),
                )
                    .into_response();
            }
        },
        None => None,
    };

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

    let slug = match unique_announcement_slug(pool.as_ref(), &payload.title).await {
        Ok(slug) => slug,
        Err(e) => {
            tracing::error!("Database error deriving announcement slug: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create announcement")),
            )
                .into_response();
        }
    };

    let new_announcement = NewAnnouncement {
        slug,
        title: payload.title,
        kind: payload.kind,
        content_html: payload.content_html.map(|html| ammonia::clean(&html)),
        graphic_url: payload.graphic_url,
        published_at,
        expires_at,
        pinned: payload.pinned.unwrap_or(false),
    };

    match storage::create_announcement(pool.as_ref(), &new_announcement).await {
        Ok(announcement) => (StatusCode::CREATED, Json(announcement)).into_response(),
        Err(e) if db::is_unique_violation(&e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Slug already exists")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error creating announcement: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create announcement")),
            )
                .into_response()
        }
    }
}

/// PUT /api/admin/announcements/:id - Merge a partial update (auth required)
pub async fn update_announcement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAnnouncementRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers, &state.config.jwt) {
        return err_response.into_response();
    }

    if let Some(kind) = payload.kind.as_deref() {
        if !is_announcement_kind(kind) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "Type must be one of: graphic, non_graphic",
                )),
            )
                .into_response();
        }
    }

    let published_at = match &payload.published_at {
        Some(s) => match parse_datetime(s) {
            Some(dt) => Some(dt),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Invalid publishedAt")),
                )
                    .into_response();
            }
        },
        None => None,
    };

    // expiresAt is always written: a value sets it, absence clears it.
    let expires_at = match &payload.expires_at {
        Some(s) => match parse_datetime(s) {
            Some(dt) => Some(dt),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Invalid expiresAt")),
                )
                    .into_response();
            }
        },
        None => None,
    };

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

    let patch = AnnouncementPatch {
        title: payload.title,
        kind: payload.kind,
        content_html: payload
            .content_html
            .map(|inner| inner.map(|html| ammonia::clean(&html))),
        graphic_url: payload.graphic_url,
        published_at,
        expires_at: Some(expires_at),
        pinned: payload.pinned,
    };

    match storage::update_announcement(pool.as_ref(), id, &patch).await {
        Ok(Some(announcement)) => (StatusCode::OK, Json(announcement)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Announcement not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error updating announcement: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update announcement")),
            )
                .into_response()
        }
    }
}

/// DELETE /api/admin/announcements/:id (auth required)
pub async fn delete_announcement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers, &state.config.jwt) {
        return err_response.into_response();
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

    match storage::delete_announcement(pool.as_ref(), id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(MessageResponse::new("Announcement deleted")),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Announcement not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error deleting announcement: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete announcement")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, JwtConfig};
    use crate::routes::auth::create_token;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(AppConfig {
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                expiry_days: 7,
            },
            cloudinary: None,
        })
    }

    fn announcement_router() -> Router {
        Router::new()
            .route("/api/announcements", get(list_announcements))
            .route("/api/announcements/{slug_or_id}", get(get_announcement))
            .route("/api/admin/announcements", post(create_announcement))
            .with_state(test_state())
    }

    fn bearer() -> String {
        let jwt = JwtConfig {
            secret: "test-secret".to_string(),
            expiry_days: 7,
        };
        format!(
            "Bearer {}",
            create_token(&jwt, &Uuid::new_v4().to_string(), "a@x.org", "admin").unwrap()
        )
    }

    #[test]
    fn test_is_announcement_kind() {
        assert!(is_announcement_kind("graphic"));
        assert!(is_announcement_kind("non_graphic"));
        assert!(!is_announcement_kind("banner"));
    }

    #[test]
    fn test_update_request_null_clears_graphic_url() {
        let payload: UpdateAnnouncementRequest =
            serde_json::from_value(serde_json::json!({"graphicUrl": null})).unwrap();
        assert_eq!(payload.graphic_url, Some(None));
        assert_eq!(payload.content_html, None);
    }

    #[test]
    fn test_kind_deserializes_from_type_field() {
        let payload: CreateAnnouncementRequest = serde_json::from_value(serde_json::json!({
            "title": "Easter Service",
            "type": "graphic"
        }))
        .unwrap();
        assert_eq!(payload.kind, "graphic");
    }

    #[tokio::test]
    async fn test_create_announcement_without_token_returns_unauthorized() {
        let body = serde_json::json!({"title": "Easter Service", "type": "graphic"});
        let req = Request::post("/api/admin/announcements")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = announcement_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_announcement_invalid_kind_returns_bad_request() {
        let body = serde_json::json!({"title": "Easter Service", "type": "banner"});
        let req = Request::post("/api/admin/announcements")
            .header("content-type", "application/json")
            .header("authorization", bearer())
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = announcement_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_announcement_invalid_published_at_returns_bad_request() {
        let body = serde_json::json!({
            "title": "Easter Service",
            "type": "graphic",
            "publishedAt": "soon"
        });
        let req = Request::post("/api/admin/announcements")
            .header("content-type", "application/json")
            .header("authorization", bearer())
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = announcement_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_announcements_without_database_returns_service_unavailable() {
        let req = Request::get("/api/announcements?active=true")
            .body(Body::empty())
            .unwrap();
        let res = announcement_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
