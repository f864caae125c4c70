/**
 * YouTube Metadata Route
 * Resolves a video URL or bare id through the public oEmbed endpoint
 */
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::AppState;
use crate::routes::ErrorResponse;

lazy_static! {
    static ref YOUTUBE_URL_RE: Regex = Regex::new(
        r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([A-Za-z0-9_-]{11})"
    )
    .unwrap();
    static ref YOUTUBE_ID_RE: Regex = Regex::new(r"^([A-Za-z0-9_-]{11})$").unwrap();
}

/// Query parameters for GET /api/youtube/metadata
#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    pub url: String,
}

/// Response body for GET /api/youtube/metadata
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub title: String,
    pub author: String,
    pub thumbnail: String,
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
struct OembedResponse {
    title: String,
    author_name: String,
}

/// Pull an 11-character video id out of a watch/short/embed URL or a bare id.
pub fn extract_video_id(input: &str) -> Option<String> {
    if let Some(caps) = YOUTUBE_URL_RE.captures(input) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    YOUTUBE_ID_RE
        .captures(input.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// GET /api/youtube/metadata?url=...
pub async fn get_metadata(
    State(state): State<AppState>,
    Query(query): Query<MetadataQuery>,
) -> impl IntoResponse {
    let video_id = match extract_video_id(&query.url) {
        Some(id) => id,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Invalid YouTube URL")),
            )
                .into_response();
        }
    };

    let oembed_url = format!(
        "https://www.youtube.com/oembed?url=https://www.youtube.com/watch?v={}&format=json",
        video_id
    );

    let response = match state.http.get(&oembed_url).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("oEmbed request failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch video metadata")),
            )
                .into_response();
        }
    };

    if !response.status().is_success() {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Video not found")),
        )
            .into_response();
    }

    let oembed: OembedResponse = match response.json().await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("oEmbed response parse failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch video metadata")),
            )
                .into_response();
        }
    };

    let metadata = MetadataResponse {
        title: oembed.title,
        author: oembed.author_name,
        thumbnail: format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", video_id),
        video_id,
    };
    (StatusCode::OK, Json(metadata)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, JwtConfig};
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn test_extract_video_id_from_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_extract_video_id_from_short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_extract_video_id_from_embed_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ?start=30"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_extract_video_id_from_bare_id() {
        assert_eq!(
            extract_video_id("dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_extract_video_id_rejects_garbage() {
        assert_eq!(extract_video_id("https://vimeo.com/12345"), None);
        assert_eq!(extract_video_id("too-short"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[tokio::test]
    async fn test_metadata_invalid_url_returns_bad_request() {
        let state = AppState::new(AppConfig {
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                expiry_days: 7,
            },
            cloudinary: None,
        });
        let app = Router::new()
            .route("/api/youtube/metadata", get(get_metadata))
            .with_state(state);
        let req = Request::get("/api/youtube/metadata?url=https://vimeo.com/12345")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
