//! HTTP routes for the stamp server
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET  | `/health` | [`health::health_check`] |
//! | POST | `/upload` | [`upload::upload`] |
//! | GET  | `/api/pdf/:session_id/info` | [`pdf::document_info`] |
//! | GET  | `/api/pdf/:session_id/page/:page_num` | [`pdf::render_page`] |
//! | GET  | `/api/stamps/:session_id` | [`stamps::list_stamps`] |
//! | GET  | `/api/stamp/:session_id/:stamp_index` | [`stamps::get_stamp_image`] |
//! | POST | `/api/apply_stamps` | [`stamps::apply_stamps`] |
//! | GET  | `/download/:session_id` | [`download::download`] |

pub mod download;
pub mod health;
pub mod pdf;
pub mod stamps;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::geometry::PageGeometry;
use crate::session::{SessionId, StampHandle};
use crate::state::AppState;

/// Page count and per-page native sizes
#[derive(Debug, Serialize)]
pub struct PdfInfo {
    pub page_count: usize,
    pub pages: Vec<PageGeometry>,
}

impl PdfInfo {
    pub fn new(pages: Vec<PageGeometry>) -> Self {
        Self {
            page_count: pages.len(),
            pages,
        }
    }
}

/// Stamp as listed to clients
#[derive(Debug, Serialize)]
pub struct StampSummary {
    pub id: String,
    pub index: u32,
    pub filename: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

pub(crate) fn stamp_summary(session: SessionId, handle: &StampHandle) -> StampSummary {
    StampSummary {
        id: format!("stamp_{}", handle.index),
        index: handle.index,
        filename: handle.filename.clone(),
        url: format!("/api/stamp/{}/{}", session, handle.index),
        width: handle.width,
        height: handle.height,
    }
}

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let upload_limit = state.config().limits.max_upload_bytes();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/upload",
            post(upload::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/pdf/:session_id/info", get(pdf::document_info))
        .route("/api/pdf/:session_id/page/:page_num", get(pdf::render_page))
        .route("/api/stamps/:session_id", get(stamps::list_stamps))
        .route("/api/stamp/:session_id/:stamp_index", get(stamps::get_stamp_image))
        .route("/api/apply_stamps", post(stamps::apply_stamps))
        .route("/download/:session_id", get(download::download))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::formats::pdf::fixtures;
    use crate::session::SessionStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "stamp-test-boundary";

    fn test_app() -> Router {
        app(AppState::with_store(Config::default(), SessionStore::in_memory()))
    }

    fn multipart_body(files: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (field, filename, data) in files {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    field, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(files: &[(&str, &str, Vec<u8>)]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(files)))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, value: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn upload_session(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(upload_request(&[
                ("pdf_file", "contract.pdf", fixtures::three_page_pdf()),
                ("stamp_files", "seal.png", fixtures::red_stamp()),
                ("stamp_files", "notes.txt", b"not an image".to_vec()),
                ("stamp_files", "sig.png", fixtures::stamp_png(30, 10, [0, 0, 0, 200])),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["pdf_info"]["page_count"], 3);
        assert_eq!(body["pdf_info"]["pages"][0]["width"], 600.0);
        // Rejected file keeps its slot, leaving a gap
        let indices: Vec<u64> = body["stamps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["index"].as_u64().unwrap())
            .collect();
        assert_eq!(indices, vec![0, 2]);

        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_full_round_trip() {
        let app = test_app();
        let session = upload_session(&app).await;

        // Page preview at the fixed scale
        let response = app
            .clone()
            .oneshot(get(&format!("/api/pdf/{}/page/2", session)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = json_body(response).await;
        assert_eq!(page["width"], 1200);
        assert_eq!(page["height"], 1600);
        assert_eq!(page["page_width"], 600.0);
        assert!(page["image"].as_str().unwrap().starts_with("data:image/png;base64,"));

        // Stamp listing and raw bytes
        let response = app
            .clone()
            .oneshot(get(&format!("/api/stamps/{}", session)))
            .await
            .unwrap();
        let stamps = json_body(response).await;
        assert_eq!(stamps["stamps"][0]["id"], "stamp_0");
        assert_eq!(stamps["stamps"][0]["width"], 40);
        assert_eq!(stamps["stamps"][1]["filename"], "sig.png");

        let response = app
            .clone()
            .oneshot(get(&format!("/api/stamp/{}/0", session)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        // Nothing to download yet
        let response = app
            .clone()
            .oneshot(get(&format!("/download/{}", session)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Apply: one valid stamp, one missing index, one unparseable id
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/apply_stamps",
                json!({
                    "session_id": session,
                    "stamps": [
                        {"stamp_id": "stamp_0", "x": 50, "y": 50, "width": 100, "height": 40},
                        {"stamp_id": "stamp_7", "x": 0, "y": 0, "width": 10, "height": 10},
                        {"stamp_id": "bogus", "x": 0, "y": 0, "width": 10, "height": 10},
                    ],
                    "apply_mode": "current_page",
                    "current_page": 2,
                    "random_variation": false
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report = json_body(response).await;
        assert_eq!(report["success"], true);
        assert_eq!(report["pages_processed"], 1);
        assert_eq!(report["stamps_drawn"], 1);
        assert_eq!(report["skipped_missing"], 2);
        assert_eq!(report["download_url"], format!("/download/{}", session));

        // Preview copy is readable through the page endpoints
        let response = app
            .clone()
            .oneshot(get(&format!("/api/pdf/{}/info?source=preview", session)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["page_count"], 3);

        let response = app
            .clone()
            .oneshot(get(&format!("/download/{}", session)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("signed_document.pdf"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_preview_before_apply_is_not_found() {
        let app = test_app();
        let session = upload_session(&app).await;
        let response = app
            .oneshot(get(&format!("/api/pdf/{}/page/1?source=preview", session)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_page_is_bad_request() {
        let app = test_app();
        let session = upload_session(&app).await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/pdf/{}/page/4", session)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(
                "/api/apply_stamps",
                json!({"session_id": session, "stamps": [], "apply_mode": "single-page", "current_page": 0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let app = test_app();
        for uri in [
            "/api/pdf/not-a-session/info".to_string(),
            format!("/api/stamps/{}", SessionId::new()),
            format!("/download/{}", SessionId::new()),
        ] {
            let response = app.clone().oneshot(get(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_upload_rejects_wrong_document_type() {
        let response = test_app()
            .oneshot(upload_request(&[("pdf_file", "contract.docx", b"PK".to_vec())]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_upload_rejects_undecodable_document() {
        let response = test_app()
            .oneshot(upload_request(&[("pdf_file", "broken.pdf", b"%PDF-1.7 junk".to_vec())]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_upload_requires_document() {
        let response = test_app()
            .oneshot(upload_request(&[("stamp_files", "seal.png", fixtures::red_stamp())]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
