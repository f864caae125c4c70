/**
 * Sermon Routes
 * Public listing/detail plus admin CRUD with slug derivation
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
    models::{NewSermon, Sermon, SermonPatch},
    storage,
};
use crate::routes::auth::require_auth;
use crate::routes::{parse_datetime, validation_details, ErrorResponse, MessageResponse};
use crate::slug::{slugify, with_suffix};

pub const SERVICE_DAYS: &[&str] = &["sun", "tue", "fri"];

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/sermons
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SermonListQuery {
    pub featured: Option<bool>,
    pub service_day: Option<String>,
}

/// Request body for POST /api/admin/sermons
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSermonRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Preacher is required"))]
    pub preacher: String,
    pub service_day: String,
    pub date: Option<String>,
    #[validate(length(min = 1, message = "Video URL is required"))]
    pub video_url: String,
    pub start_sec: Option<i32>,
    pub end_sec: Option<i32>,
    pub excerpt: Option<String>,
    pub outline: Option<String>,
    pub outline_rich_text: Option<String>,
    pub outline_doc_url: Option<String>,
    pub scriptures: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
}

/// Request body for PUT /api/admin/sermons/:id. Absent fields stay unchanged;
/// an explicit `null` clears a nullable column.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSermonRequest {
    pub title: Option<String>,
    pub preacher: Option<String>,
    pub service_day: Option<String>,
    pub date: Option<String>,
    pub video_url: Option<String>,
    pub start_sec: Option<i32>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub end_sec: Option<Option<i32>>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub excerpt: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub outline: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub outline_rich_text: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub outline_doc_url: Option<Option<String>>,
    pub scriptures: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
}

fn is_service_day(day: &str) -> bool {
    SERVICE_DAYS.contains(&day)
}

/// Probe storage for a free slug: `base`, `base-1`, `base-2`, ...
async fn unique_sermon_slug(pool: &sqlx::PgPool, title: &str) -> Result<String, sqlx::Error> {
    let base = {
        let s = slugify(title);
        if s.is_empty() {
            "sermon".to_string()
        } else {
            s
        }
    };
    let mut counter = 0;
    loop {
        let candidate = with_suffix(&base, counter);
        if storage::get_sermon_by_slug(pool, &candidate).await?.is_none() {
            return Ok(candidate);
        }
        counter += 1;
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/sermons - List sermons, optionally filtered
pub async fn list_sermons(Query(query): Query<SermonListQuery>) -> impl IntoResponse {
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

    let result = if query.featured == Some(true) {
        storage::list_featured_sermons(pool.as_ref()).await
    } else if let Some(day) = query.service_day.as_deref() {
        storage::list_sermons_by_service_day(pool.as_ref(), day).await
    } else {
        storage::list_sermons(pool.as_ref()).await
    };

    match result {
        Ok(sermons) => (StatusCode::OK, Json(sermons)).into_response(),
        Err(e) => {
            tracing::error!("Database error fetching sermons: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch sermons")),
            )
                .into_response()
        }
    }
}

/// GET /api/sermons/:slug_or_id - Slug lookup first, id fallback
pub async fn get_sermon(Path(slug_or_id): Path<String>) -> impl IntoResponse {
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

    let by_slug = match storage::get_sermon_by_slug(pool.as_ref(), &slug_or_id).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Database error fetching sermon: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch sermon")),
            )
                .into_response();
        }
    };

    let sermon: Option<Sermon> = match by_slug {
        Some(s) => Some(s),
        None => match slug_or_id.parse::<Uuid>() {
            Ok(id) => match storage::get_sermon(pool.as_ref(), id).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Database error fetching sermon: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(ErrorResponse::new("Failed to fetch sermon")),
                    )
                        .into_response();
                }
            },
            Err(_) => None,
        },
    };

    match sermon {
        Some(s) => (StatusCode::OK, Json(s)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Sermon not found")),
        )
            .into_response(),
    }
}

/// POST /api/admin/sermons - Create sermon (auth required)
pub async fn create_sermon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateSermonRequest>,
) -> impl IntoResponse {
    let claims = match require_auth(&headers, &state.config.jwt) {
        Ok(c) => c,
        Err(err_response) => return err_response.into_response(),
    };

    if let Err(errors) = payload.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details(
                "Invalid sermon data",
                validation_details(&errors),
            )),
        )
            .into_response();
    }

    if !is_service_day(&payload.service_day) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Service day must be one of: sun, tue, fri")),
        )
            .into_response();
    }

    let date = match &payload.date {
        Some(s) => match parse_datetime(s) {
            Some(dt) => dt,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Invalid date")),
                )
                    .into_response();
            }
        },
        None => chrono::Utc::now(),
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

    let slug = match unique_sermon_slug(pool.as_ref(), &payload.title).await {
        Ok(slug) => slug,
        Err(e) => {
            tracing::error!("Database error deriving sermon slug: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create sermon")),
            )
                .into_response();
        }
    };

    let new_sermon = NewSermon {
        slug,
        title: payload.title,
        preacher: payload.preacher,
        service_day: payload.service_day,
        date,
        video_url: payload.video_url,
        start_sec: payload.start_sec.unwrap_or(0),
        end_sec: payload.end_sec,
        excerpt: payload.excerpt,
        outline: payload.outline,
        outline_rich_text: payload.outline_rich_text,
        outline_doc_url: payload.outline_doc_url,
        scriptures: payload.scriptures.unwrap_or_default(),
        tags: payload.tags.unwrap_or_default(),
        featured: payload.featured.unwrap_or(false),
        created_by: claims.sub.parse::<Uuid>().ok(),
    };

    match storage::create_sermon(pool.as_ref(), &new_sermon).await {
        Ok(sermon) => (StatusCode::CREATED, Json(sermon)).into_response(),
        Err(e) if db::is_unique_violation(&e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Slug already exists")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error creating sermon: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create sermon")),
            )
                .into_response()
        }
    }
}

/// PUT /api/admin/sermons/:id - Merge a partial update (auth required)
pub async fn update_sermon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSermonRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers, &state.config.jwt) {
        return err_response.into_response();
    }

    if let Some(day) = payload.service_day.as_deref() {
        if !is_service_day(day) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Service day must be one of: sun, tue, fri")),
            )
                .into_response();
        }
    }

    let date = match &payload.date {
        Some(s) => match parse_datetime(s) {
            Some(dt) => Some(dt),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Invalid date")),
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

    let patch = SermonPatch {
        title: payload.title,
        preacher: payload.preacher,
        service_day: payload.service_day,
        date,
        video_url: payload.video_url,
        start_sec: payload.start_sec,
        end_sec: payload.end_sec,
        excerpt: payload.excerpt,
        outline: payload.outline,
        outline_rich_text: payload.outline_rich_text,
        outline_doc_url: payload.outline_doc_url,
        scriptures: payload.scriptures,
        tags: payload.tags,
        featured: payload.featured,
    };

    match storage::update_sermon(pool.as_ref(), id, &patch).await {
        Ok(Some(sermon)) => (StatusCode::OK, Json(sermon)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Sermon not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error updating sermon: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update sermon")),
            )
                .into_response()
        }
    }
}

/// DELETE /api/admin/sermons/:id (auth required)
pub async fn delete_sermon(
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

    match storage::delete_sermon(pool.as_ref(), id).await {
        Ok(true) => (StatusCode::OK, Json(MessageResponse::new("Sermon deleted"))).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Sermon not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error deleting sermon: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete sermon")),
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

    fn sermon_router() -> Router {
        Router::new()
            .route("/api/sermons", get(list_sermons))
            .route("/api/sermons/{slug_or_id}", get(get_sermon))
            .route("/api/admin/sermons", post(create_sermon))
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
    fn test_update_request_null_clears_and_absence_keeps() {
        let payload: UpdateSermonRequest =
            serde_json::from_value(serde_json::json!({"excerpt": null, "endSec": null})).unwrap();
        // Explicit nulls request clearing the columns
        assert_eq!(payload.excerpt, Some(None));
        assert_eq!(payload.end_sec, Some(None));
        // Absent fields leave the columns unchanged
        assert_eq!(payload.outline, None);
        assert_eq!(payload.title, None);

        let payload: UpdateSermonRequest =
            serde_json::from_value(serde_json::json!({"excerpt": "A short summary"})).unwrap();
        assert_eq!(payload.excerpt, Some(Some("A short summary".to_string())));
    }

    #[test]
    fn test_is_service_day() {
        assert!(is_service_day("sun"));
        assert!(is_service_day("tue"));
        assert!(is_service_day("fri"));
        assert!(!is_service_day("sat"));
        assert!(!is_service_day(""));
    }

    #[tokio::test]
    async fn test_list_sermons_without_database_returns_service_unavailable() {
        let req = Request::get("/api/sermons").body(Body::empty()).unwrap();
        let res = sermon_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_create_sermon_without_token_returns_unauthorized() {
        let body = serde_json::json!({
            "title": "Grace Upon Grace",
            "preacher": "Rev. John",
            "serviceDay": "sun",
            "videoUrl": "https://youtu.be/abc123def45"
        });
        let req = Request::post("/api/admin/sermons")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = sermon_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_sermon_invalid_service_day_returns_bad_request() {
        let body = serde_json::json!({
            "title": "Grace Upon Grace",
            "preacher": "Rev. John",
            "serviceDay": "sat",
            "videoUrl": "https://youtu.be/abc123def45"
        });
        let req = Request::post("/api/admin/sermons")
            .header("content-type", "application/json")
            .header("authorization", bearer())
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = sermon_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_sermon_empty_title_returns_bad_request() {
        let body = serde_json::json!({
            "title": "",
            "preacher": "Rev. John",
            "serviceDay": "sun",
            "videoUrl": "https://youtu.be/abc123def45"
        });
        let req = Request::post("/api/admin/sermons")
            .header("content-type", "application/json")
            .header("authorization", bearer())
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = sermon_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_sermon_invalid_date_returns_bad_request() {
        let body = serde_json::json!({
            "title": "Grace Upon Grace",
            "preacher": "Rev. John",
            "serviceDay": "sun",
            "videoUrl": "https://youtu.be/abc123def45",
            "date": "next sunday"
        });
        let req = Request::post("/api/admin/sermons")
            .header("content-type", "application/json")
            .header("authorization", bearer())
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = sermon_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
