/**
 * Subscriber Routes
 * Public newsletter signup plus admin CRUD
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
    models::{NewSubscriber, Subscriber, SubscriberPatch},
    storage,
};
use crate::routes::auth::require_auth;
use crate::routes::sermons::SERVICE_DAYS;
use crate::routes::{validation_details, ErrorResponse, MessageResponse};

pub const SUBSCRIBER_STATUSES: &[&str] = &["active", "unsubscribed"];

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the public POST /api/subscribe
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub preferred_service_day: Option<String>,
}

/// Request body for POST /api/admin/subscribers
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriberRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
    pub preferred_service_day: Option<String>,
    pub status: Option<String>,
}

/// Request body for PUT /api/admin/subscribers/:id. Absent fields stay
/// unchanged; an explicit `null` clears `preferredServiceDay`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriberRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "crate::routes::double_option")]
    pub preferred_service_day: Option<Option<String>>,
    pub status: Option<String>,
}

/// Response for a reactivated subscription
#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub message: String,
    pub subscriber: Subscriber,
}

/// Query parameters for GET /api/admin/subscribers
#[derive(Debug, Deserialize)]
pub struct SubscriberListQuery {
    pub active: Option<bool>,
}

fn is_subscriber_status(status: &str) -> bool {
    SUBSCRIBER_STATUSES.contains(&status)
}

fn is_service_day_opt(day: Option<&str>) -> bool {
    match day {
        Some(d) => SERVICE_DAYS.contains(&d),
        None => true,
    }
}

/// Reactivation touches only the status; the stored name, tags and
/// preferred day survive the round trip unchanged.
fn reactivation_patch() -> SubscriberPatch {
    SubscriberPatch {
        status: Some("active".to_string()),
        ..Default::default()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/subscribe - Public signup. An active duplicate is rejected, an
/// unsubscribed one is reactivated.
pub async fn subscribe(Json(payload): Json<SubscribeRequest>) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details(
                "Invalid subscription data",
                validation_details(&errors),
            )),
        )
            .into_response();
    }

    if !is_service_day_opt(payload.preferred_service_day.as_deref()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Preferred service day must be one of: sun, tue, fri",
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

    let existing = match storage::get_subscriber_by_email(pool.as_ref(), &payload.email).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Database error looking up subscriber: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to subscribe")),
            )
                .into_response();
        }
    };

    if let Some(subscriber) = existing {
        if subscriber.status == "active" {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Email already subscribed")),
            )
                .into_response();
        }

        let patch = reactivation_patch();
        return match storage::update_subscriber(pool.as_ref(), subscriber.id, &patch).await {
            Ok(Some(reactivated)) => (
                StatusCode::OK,
                Json(SubscribeResponse {
                    message: "Subscription reactivated".to_string(),
                    subscriber: reactivated,
                }),
            )
                .into_response(),
            Ok(None) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Subscriber not found")),
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Database error reactivating subscriber: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("Failed to subscribe")),
                )
                    .into_response()
            }
        };
    }

    let new_subscriber = NewSubscriber {
        name: payload.name,
        email: payload.email,
        source: "website".to_string(),
        tags: vec!["newsletter".to_string()],
        preferred_service_day: payload.preferred_service_day,
        status: "active".to_string(),
    };

    match storage::create_subscriber(pool.as_ref(), &new_subscriber).await {
        Ok(subscriber) => (StatusCode::CREATED, Json(subscriber)).into_response(),
        Err(e) if db::is_unique_violation(&e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Email already subscribed")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error creating subscriber: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to subscribe")),
            )
                .into_response()
        }
    }
}

/// GET /api/admin/subscribers - List subscribers (auth required)
pub async fn list_subscribers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SubscriberListQuery>,
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

    let result = if query.active == Some(true) {
        storage::list_active_subscribers(pool.as_ref()).await
    } else {
        storage::list_subscribers(pool.as_ref()).await
    };

    match result {
        Ok(subscribers) => (StatusCode::OK, Json(subscribers)).into_response(),
        Err(e) => {
            tracing::error!("Database error fetching subscribers: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch subscribers")),
            )
                .into_response()
        }
    }
}

/// POST /api/admin/subscribers - Create subscriber (auth required)
pub async fn create_subscriber(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateSubscriberRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers, &state.config.jwt) {
        return err_response.into_response();
    }

    if let Err(errors) = payload.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details(
                "Invalid subscriber data",
                validation_details(&errors),
            )),
        )
            .into_response();
    }

    if !is_service_day_opt(payload.preferred_service_day.as_deref()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Preferred service day must be one of: sun, tue, fri",
            )),
        )
            .into_response();
    }

    let status = payload.status.unwrap_or_else(|| "active".to_string());
    if !is_subscriber_status(&status) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Status must be one of: active, unsubscribed",
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

    let new_subscriber = NewSubscriber {
        name: payload.name,
        email: payload.email,
        source: payload.source.unwrap_or_else(|| "admin".to_string()),
        tags: payload.tags.unwrap_or_default(),
        preferred_service_day: payload.preferred_service_day,
        status,
    };

    match storage::create_subscriber(pool.as_ref(), &new_subscriber).await {
        Ok(subscriber) => (StatusCode::CREATED, Json(subscriber)).into_response(),
        Err(e) if db::is_unique_violation(&e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Email already subscribed")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error creating subscriber: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create subscriber")),
            )
                .into_response()
        }
    }
}

/// PUT /api/admin/subscribers/:id - Merge a partial update (auth required)
pub async fn update_subscriber(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSubscriberRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers, &state.config.jwt) {
        return err_response.into_response();
    }

    if let Some(status) = payload.status.as_deref() {
        if !is_subscriber_status(status) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "Status must be one of: active, unsubscribed",
                )),
            )
                .into_response();
        }
    }

    if let Some(Some(day)) = payload.preferred_service_day.as_ref() {
        if !is_service_day_opt(Some(day)) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "Preferred service day must be one of: sun, tue, fri",
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

    let patch = SubscriberPatch {
        name: payload.name,
        email: payload.email,
        source: payload.source,
        tags: payload.tags,
        preferred_service_day: payload.preferred_service_day,
        status: payload.status,
    };

    match storage::update_subscriber(pool.as_ref(), id, &patch).await {
        Ok(Some(subscriber)) => (StatusCode::OK, Json(subscriber)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Subscriber not found")),
        )
            .into_response(),
        Err(e) if db::is_unique_violation(&e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Email already subscribed")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error updating subscriber: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update subscriber")),
            )
                .into_response()
        }
    }
}

/// DELETE /api/admin/subscribers/:id (auth required)
pub async fn delete_subscriber(
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

    match storage::delete_subscriber(pool.as_ref(), id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(MessageResponse::new("Subscriber deleted")),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Subscriber not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error deleting subscriber: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete subscriber")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, JwtConfig};
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

    fn subscriber_router() -> Router {
        Router::new()
            .route("/api/subscribe", post(subscribe))
            .route("/api/admin/subscribers", get(list_subscribers))
            .with_state(test_state())
    }

    #[test]
    fn test_reactivation_patch_touches_only_status() {
        let patch = reactivation_patch();
        assert_eq!(patch.status.as_deref(), Some("active"));
        assert!(patch.name.is_none());
        assert!(patch.email.is_none());
        assert!(patch.tags.is_none());
        assert!(patch.preferred_service_day.is_none());
    }

    #[test]
    fn test_update_request_null_clears_preferred_service_day() {
        let payload: UpdateSubscriberRequest =
            serde_json::from_value(serde_json::json!({"preferredServiceDay": null})).unwrap();
        assert_eq!(payload.preferred_service_day, Some(None));
        assert_eq!(payload.name, None);
    }

    #[test]
    fn test_is_subscriber_status() {
        assert!(is_subscriber_status("active"));
        assert!(is_subscriber_status("unsubscribed"));
        assert!(!is_subscriber_status("paused"));
    }

    #[tokio::test]
    async fn test_subscribe_invalid_email_returns_bad_request() {
        let body = serde_json::json!({"name": "Jane", "email": "not-an-email"});
        let req = Request::post("/api/subscribe")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = subscriber_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_subscribe_missing_name_returns_bad_request() {
        let body = serde_json::json!({"name": "", "email": "jane@example.org"});
        let req = Request::post("/api/subscribe")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = subscriber_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_subscribe_invalid_service_day_returns_bad_request() {
        let body = serde_json::json!({
            "name": "Jane",
            "email": "jane@example.org",
            "preferredServiceDay": "sat"
        });
        let req = Request::post("/api/subscribe")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = subscriber_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_subscribers_without_token_returns_unauthorized() {
        let req = Request::get("/api/admin/subscribers")
            .body(Body::empty())
            .unwrap();
        let res = subscriber_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
