/**
 * Admin Routes
 * Dashboard stats and user listing
 */
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::config::AppState;
use crate::db::{self, models::UserView, storage};
use crate::routes::auth::require_auth;
use crate::routes::ErrorResponse;

/// Dashboard counters for GET /api/admin/stats
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_sermons: i64,
    pub featured_sermons: i64,
    pub total_announcements: i64,
    pub active_announcements: i64,
    pub total_subscribers: i64,
    pub active_subscribers: i64,
}

/// GET /api/admin/stats (auth required)
pub async fn get_stats(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
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

    match storage::content_counts(pool.as_ref()).await {
        Ok(counts) => (
            StatusCode::OK,
            Json(StatsResponse {
                total_sermons: counts.total_sermons,
                featured_sermons: counts.featured_sermons,
                total_announcements: counts.total_announcements,
                active_announcements: counts.active_announcements,
                total_subscribers: counts.total_subscribers,
                active_subscribers: counts.active_subscribers,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error computing stats: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch stats")),
            )
                .into_response()
        }
    }
}

/// GET /api/admin/users - List users without password hashes (auth required)
pub async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
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

    match storage::list_users(pool.as_ref()).await {
        Ok(users) => {
            let views: Vec<UserView> = users.into_iter().map(UserView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => {
            tracing::error!("Database error fetching users: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch users")),
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
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_state() -> AppState {
        AppState::new(AppConfig {
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                expiry_days: 7,
            },
            cloudinary: None,
        })
    }

    fn admin_router() -> Router {
        Router::new()
            .route("/api/admin/stats", get(get_stats))
            .route("/api/admin/users", get(list_users))
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
    fn test_stats_response_uses_camel_case() {
        let stats = StatsResponse {
            total_sermons: 3,
            featured_sermons: 1,
            total_announcements: 2,
            active_announcements: 2,
            total_subscribers: 10,
            active_subscribers: 8,
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["totalSermons"], 3);
        assert_eq!(value["activeAnnouncements"], 2);
        assert_eq!(value["activeSubscribers"], 8);
    }

    #[tokio::test]
    async fn test_stats_without_token_returns_unauthorized() {
        let req = Request::get("/api/admin/stats").body(Body::empty()).unwrap();
        let res = admin_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_users_with_token_but_no_database_returns_service_unavailable() {
        let req = Request::get("/api/admin/users")
            .header("authorization", bearer())
            .body(Body::empty())
            .unwrap();
        let res = admin_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
