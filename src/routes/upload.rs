/**
 * Upload Routes
 * Document text extraction (.docx/.pdf) and Cloudinary image upload proxy
 */
use std::io::Read;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use lazy_static::lazy_static;
use quick_xml::events::Event;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::config::{AppState, CloudinaryConfig};
use crate::routes::ErrorResponse;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

lazy_static! {
    static ref EXCESS_NEWLINES_RE: Regex = Regex::new(r"\n{3,}").unwrap();
}

// ============================================================================
// Response Types
// ============================================================================

/// Response body for POST /api/extract-document
#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub text: String,
    pub filename: String,
    pub size: usize,
}

/// Response body for POST /api/upload-image
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageResponse {
    pub url: String,
    pub public_id: String,
    pub filename: String,
    pub size: usize,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
    public_id: String,
    width: Option<u32>,
    height: Option<u32>,
}

// ============================================================================
// Extraction helpers
// ============================================================================

/// Identify an image by its magic bytes. Content-Type headers are not trusted.
pub fn sniff_image_kind(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 12 {
        return None;
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

/// Collapse Windows line endings and runs of blank lines, then trim.
pub fn normalize_text(raw: &str) -> String {
    let unix = raw.replace("\r\n", "\n").replace('\r', "\n");
    EXCESS_NEWLINES_RE
        .replace_all(&unix, "\n\n")
        .trim()
        .to_string()
}

/// Pull paragraph text out of the main document part of a .docx archive.
fn extract_docx_text(bytes: &[u8]) -> Result<String, String> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive =
        zip::ZipArchive::new(cursor).map_err(|e| format!("not a valid docx archive: {}", e))?;

    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("missing document part: {}", e))?
        .read_to_string(&mut document_xml)
        .map_err(|e| format!("unreadable document part: {}", e))?;

    let mut reader = quick_xml::Reader::from_str(&document_xml);
    let mut text = String::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"w:br" => text.push('\n'),
            Ok(Event::Text(t)) if in_text_run => {
                text.push_str(&t.unescape().unwrap_or_default());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed document xml: {}", e)),
            _ => {}
        }
    }
    Ok(text)
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, String> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| format!("not a valid pdf: {}", e))?;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&page_numbers)
        .map_err(|e| format!("pdf text extraction failed: {}", e))
}

fn cloudinary_signature(config: &CloudinaryConfig, timestamp: i64) -> String {
    let payload = format!(
        "folder={}&timestamp={}{}",
        config.folder, timestamp, config.api_secret
    );
    let mut hasher = Sha1::new();
    hasher.update(payload.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/extract-document - Extract plain text from an uploaded
/// .docx or .pdf file
pub async fn extract_document(mut multipart: Multipart) -> impl IntoResponse {
    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("document") {
                    continue;
                }
                let filename = field.file_name().unwrap_or("document").to_string();
                match field.bytes().await {
                    Ok(data) => {
                        upload = Some((filename, data.to_vec()));
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read uploaded document: {}", e);
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(ErrorResponse::new("Failed to read uploaded file")),
                        )
                            .into_response();
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Invalid multipart request: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Invalid multipart request")),
                )
                    .into_response();
            }
        }
    }

    let (filename, data) = match upload {
        Some(pair) => pair,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("No document file provided")),
            )
                .into_response();
        }
    };

    if data.len() > MAX_UPLOAD_BYTES {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("File too large (max 10MB)")),
        )
            .into_response();
    }

    let lower = filename.to_lowercase();
    let extracted = if lower.ends_with(".docx") {
        extract_docx_text(&data)
    } else if lower.ends_with(".pdf") {
        extract_pdf_text(&data)
    } else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Unsupported file type. Only .docx and .pdf are accepted",
            )),
        )
            .into_response();
    };

    let raw = match extracted {
        Ok(text) => text,
        Err(reason) => {
            tracing::warn!("Document extraction failed for {}: {}", filename, reason);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Could not extract text from document")),
            )
                .into_response();
        }
    };

    let text = normalize_text(&raw);
    if text.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("No text found in document")),
        )
            .into_response();
    }

    let size = data.len();
    (
        StatusCode::OK,
        Json(ExtractResponse {
            text,
            filename,
            size,
        }),
    )
        .into_response()
}

/// POST /api/upload-image - Validate an image and forward it to Cloudinary
/// with a signed request
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let cloudinary = match &state.config.cloudinary {
        Some(c) => c.clone(),
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Image uploads are not configured")),
            )
                .into_response();
        }
    };

    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("image") {
                    continue;
                }
                let filename = field.file_name().unwrap_or("image").to_string();
                match field.bytes().await {
                    Ok(data) => {
                        upload = Some((filename, data.to_vec()));
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read uploaded image: {}", e);
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(ErrorResponse::new("Failed to read uploaded file")),
                        )
                            .into_response();
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Invalid multipart request: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Invalid multipart request")),
                )
                    .into_response();
            }
        }
    }

    let (filename, data) = match upload {
        Some(pair) => pair,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("No image file provided")),
            )
                .into_response();
        }
    };

    if data.len() > MAX_UPLOAD_BYTES {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("File too large (max 10MB)")),
        )
            .into_response();
    }

    let mime = match sniff_image_kind(&data) {
        Some(m) => m,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "Invalid image. Only JPEG, PNG, GIF and WebP are accepted",
                )),
            )
                .into_response();
        }
    };

    let timestamp = chrono::Utc::now().timestamp();
    let signature = cloudinary_signature(&cloudinary, timestamp);
    let size = data.len();

    let file_part = match reqwest::multipart::Part::bytes(data)
        .file_name(filename.clone())
        .mime_str(mime)
    {
        Ok(part) => part,
        Err(e) => {
            tracing::error!("Failed to build upload part: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to upload image")),
            )
                .into_response();
        }
    };

    let form = reqwest::multipart::Form::new()
        .text("api_key", cloudinary.api_key.clone())
        .text("timestamp", timestamp.to_string())
        .text("folder", cloudinary.folder.clone())
        .text("signature", signature)
        .part("file", file_part);

    let response = match state
        .http
        .post(cloudinary.upload_url())
        .multipart(form)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Cloudinary request failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to upload image")),
            )
                .into_response();
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::error!("Cloudinary upload rejected ({}): {}", status, body);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to upload image")),
        )
            .into_response();
    }

    let uploaded: CloudinaryUploadResponse = match response.json().await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("Cloudinary response parse failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to upload image")),
            )
                .into_response();
        }
    };

    (
        StatusCode::OK,
        Json(UploadImageResponse {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
            filename,
            size,
            width: uploaded.width,
            height: uploaded.height,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, JwtConfig};
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use std::io::Write;
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

    fn multipart_body(field: &str, filename: &str, content: &[u8]) -> (String, Vec<u8>) {
        let boundary = "test-boundary-7MA4YWxkTrZu0gW";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                boundary, field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", boundary),
            body,
        )
    }

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let cursor = std::io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(cursor);
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_sniff_image_kind() {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
        jpeg.resize(16, 0);
        assert_eq!(sniff_image_kind(&jpeg), Some("image/jpeg"));

        let mut png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        png.resize(16, 0);
        assert_eq!(sniff_image_kind(&png), Some("image/png"));

        let mut gif = b"GIF89a".to_vec();
        gif.resize(16, 0);
        assert_eq!(sniff_image_kind(&gif), Some("image/gif"));

        let mut webp = b"RIFF\x00\x00\x00\x00WEBP".to_vec();
        webp.resize(16, 0);
        assert_eq!(sniff_image_kind(&webp), Some("image/webp"));

        assert_eq!(sniff_image_kind(b"plain text that is long"), None);
        assert_eq!(sniff_image_kind(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            normalize_text("line one\r\nline two\r\n"),
            "line one\nline two"
        );
        assert_eq!(normalize_text("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize_text("   \n\n  "), "");
    }

    #[test]
    fn test_extract_docx_text_paragraphs() {
        let xml = r#"<?xml version="1.0"?><w:document xmlns:w="ns"><w:body><w:p><w:r><w:t>First paragraph</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t><w:t> paragraph</w:t></w:r></w:p></w:body></w:document>"#;
        let text = extract_docx_text(&docx_bytes(xml)).unwrap();
        assert_eq!(normalize_text(&text), "First paragraph\nSecond paragraph");
    }

    #[test]
    fn test_extract_docx_text_rejects_non_zip() {
        assert!(extract_docx_text(b"definitely not a zip").is_err());
    }

    #[test]
    fn test_cloudinary_signature_is_hex_sha1() {
        let config = CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: "church-announcements".to_string(),
        };
        let sig = cloudinary_signature(&config, 1700000000);
        assert_eq!(sig.len(), 40);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        // Stable for identical inputs
        assert_eq!(sig, cloudinary_signature(&config, 1700000000));
        assert_ne!(sig, cloudinary_signature(&config, 1700000001));
    }

    #[tokio::test]
    async fn test_extract_document_rejects_unsupported_extension() {
        let app = Router::new()
            .route("/api/extract-document", post(extract_document))
            .with_state(test_state());
        let (content_type, body) = multipart_body("document", "notes.txt", b"hello");
        let req = Request::post("/api/extract-document")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_extract_document_needs_no_authorization_header() {
        let app = Router::new()
            .route("/api/extract-document", post(extract_document))
            .with_state(test_state());
        let xml = r#"<?xml version="1.0"?><w:document xmlns:w="ns"><w:body><w:p><w:r><w:t>Open to all</w:t></w:r></w:p></w:body></w:document>"#;
        let (content_type, body) = multipart_body("document", "outline.docx", &docx_bytes(xml));
        let req = Request::post("/api/extract-document")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_extract_document_docx_roundtrip() {
        let app = Router::new()
            .route("/api/extract-document", post(extract_document))
            .with_state(test_state());
        let xml = r#"<?xml version="1.0"?><w:document xmlns:w="ns"><w:body><w:p><w:r><w:t>Sunday outline</w:t></w:r></w:p></w:body></w:document>"#;
        let (content_type, body) = multipart_body("document", "outline.docx", &docx_bytes(xml));
        let req = Request::post("/api/extract-document")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["text"], "Sunday outline");
        assert_eq!(parsed["filename"], "outline.docx");
    }

    #[tokio::test]
    async fn test_upload_image_without_cloudinary_returns_service_unavailable() {
        let app = Router::new()
            .route("/api/upload-image", post(upload_image))
            .with_state(test_state());
        let (content_type, body) = multipart_body("image", "photo.jpg", &[0xFF, 0xD8, 0xFF, 0xE0]);
        let req = Request::post("/api/upload-image")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_upload_image_rejects_non_image_payload() {
        let state = AppState::new(AppConfig {
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                expiry_days: 7,
            },
            cloudinary: Some(CloudinaryConfig {
                cloud_name: "demo".to_string(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
                folder: "church-announcements".to_string(),
            }),
        });
        let app = Router::new()
            .route("/api/upload-image", post(upload_image))
            .with_state(state);
        let (content_type, body) =
            multipart_body("image", "photo.jpg", b"this is not an image at all");
        let req = Request::post("/api/upload-image")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
