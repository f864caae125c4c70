/**
 * Worship/Prayer Routes
 * Public listing by category plus admin CRUD
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
    models::{NewWorshipPrayer, WorshipPrayerPatch},
    storage,
};
use crate::routes::auth::require_auth;
use crate::routes::{validation_details, ErrorResponse, MessageResponse};

pub const WORSHIP_CATEGORIES: &[&str] = &["worship", "prayer"];

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/worship-prayer
#[derive(Debug, Deserialize)]
pub struct WorshipListQuery {
    pub category: Option<String>,
}

/// Request body for POST /api/admin/worship-prayer
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorshipPrayerRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub category: String,
    pub video_url: Option<String>,
    pub start_sec: Option<i32>,
    pub end_sec: Option<i32>,
    pub lyrics: Option<String>,
    pub chord_chart: Option<String>,
    pub attachments: Option<Vec<String>>,
}

/// Request body for PUT /api/admin/worship-prayer/:id. Absent fields stay
/// unchanged; an explicit `null` clears a nullable column.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorshipPrayerRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub video_url: Option<Option<String>>,
    pub start_sec: Option<i32>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub end_sec: Option<Option<i32>>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub lyrics: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub chord_chart: Option<Option<String>>,
    pub attachments: Option<Vec<String>>,
}

fn is_worship_category(category: &str) -> bool {
    WORSHIP_CATEGORIES.contains(&category)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/worship-prayer - List items, optionally filtered by category
pub async fn list_worship_prayer(Query(query): Query<WorshipListQuery>) -> impl IntoResponse {
    if let Some(category) = query.category.as_deref() {
        if !is_worship_category(category) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "Category must be one of: worship, prayer",
                )),
            )
                .into_response();
        }
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

    let result = match query.category.as_deref() {
        Some(category) => storage::list_worship_prayer_by_category(pool.as_ref(), category).await,
        None => storage::list_worship_prayer(pool.as_ref()).await,
    };

    match result {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => {
            tracing::error!("Database error fetching worship/prayer items: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch worship/prayer items")),
            )
                .into_response()
        }
    }
}

/// GET /api/worship-prayer/:id
pub async fn get_worship_prayer(Path(id): Path<Uuid>) -> impl IntoResponse {
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

    match storage::get_worship_prayer(pool.as_ref(), id).await {
        Ok(Some(item)) => (StatusCode::OK, Json(item)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Item not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching worship/prayer item: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch worship/prayer item")),
            )
                .into_response()
        }
    }
}

/// POST /api/admin/worship-prayer - Create item (auth required)
pub async fn create_worship_prayer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateWorshipPrayerRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers, &state.config.jwt) {
        return err_response.into_response();
    }

    if let Err(errors) = payload.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details(
                "Invalid worship/prayer data",
                validation_details(&errors),
            )),
        )
            .into_response();
    }

    if !is_worship_category(&payload.category) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Category must be one of: worship, prayer",
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

    let new_item = NewWorshipPrayer {
        title: payload.title,
        category: payload.category,
        video_url: payload.video_url,
        start_sec: payload.start_sec.unwrap_or(0),
        end_sec: payload.end_sec,
        lyrics: payload.lyrics,
        chord_chart: payload.chord_chart,
        attachments: payload.attachments.unwrap_or_default(),
    };

    match storage::create_worship_prayer(pool.as_ref(), &new_item).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => {
            tracing::error!("Database error creating worship/prayer item: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create worship/prayer item")),
            )
                .into_response()
        }
    }
}

/// PUT /api/admin/worship-prayer/:id - Merge a partial update (auth required)
pub async fn update_worship_prayer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWorshipPrayerRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers, &state.config.jwt) {
        return err_response.into_response();
    }

    if let Some(category) = payload.category.as_deref() {
        if !is_worship_category(category) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "Category must be one of: worship, prayer",
                )),
            )
                .into_response();
        }
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

    let patch = WorshipPrayerPatch {
        title: payload.title,
        category: payload.category,
        video_url: payload.video_url,
        start_sec: payload.start_sec,
        end_sec: payload.end_sec,
        lyrics: payload.lyrics,
        chord_chart: payload.chord_chart,
        attachments: payload.attachments,
    };

    match storage::update_worship_prayer(pool.as_ref(), id, &patch).await {
        Ok(Some(item)) => (StatusCode::OK, Json(item)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Item not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error updating worship/prayer item: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update worship/prayer item")),
            )
                .into_response()
        }
    }
}

/// DELETE /api/admin/worship-prayer/:id (auth required)
pub async fn delete_worship_prayer(
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

    match storage::delete_worship_prayer(pool.as_ref(), id).await {
        Ok(true) => (StatusCode::OK, Json(MessageResponse::new("Item deleted"))).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Item not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error deleting worship/prayer item: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete worship/prayer item")),
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

    fn worship_router() -> Router {
        Router::new()
            .route("/api/worship-prayer", get(list_worship_prayer))
            .route("/api/admin/worship-prayer", post(create_worship_prayer))
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
    fn test_update_request_null_clears_lyrics() {
        let payload: UpdateWorshipPrayerRequest =
            serde_json::from_value(serde_json::json!({"lyrics": null, "videoUrl": null})).unwrap();
        assert_eq!(payload.lyrics, Some(None));
        assert_eq!(payload.video_url, Some(None));
        assert_eq!(payload.chord_chart, None);
    }

    #[test]
    fn test_is_worship_category() {
        assert!(is_worship_category("worship"));
        assert!(is_worship_category("prayer"));
        assert!(!is_worship_category("sermon"));
    }

    #[tokio::test]
    async fn test_list_with_unknown_category_returns_bad_request() {
        let req = Request::get("/api/worship-prayer?category=sermon")
            .body(Body::empty())
            .unwrap();
        let res = worship_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_without_token_returns_unauthorized() {
        let body = serde_json::json!({"title": "Amazing Grace", "category": "worship"});
        let req = Request::post("/api/admin/worship-prayer")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = worship_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_invalid_category_returns_bad_request() {
        let body = serde_json::json!({"title": "Amazing Grace", "category": "hymn"});
        let req = Request::post("/api/admin/worship-prayer")
            .header("content-type", "application/json")
            .header("authorization", bearer())
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = worship_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
