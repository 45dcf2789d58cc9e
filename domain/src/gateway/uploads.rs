//! Upload endpoints: multipart submission, paged listing and retry.

use super::BackendClient;
use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::*;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Multipart field every staged file is sent under.
pub const FILES_FIELD: &str = "files";

/// Where the content of a staged video comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoBody {
    /// Opened and streamed from disk each time the request is built.
    File { path: PathBuf, len: u64 },
    /// Shared in-memory content.
    Memory(Bytes),
}

impl VideoBody {
    pub fn len(&self) -> u64 {
        match self {
            VideoBody::File { len, .. } => *len,
            VideoBody::Memory(bytes) => bytes.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A video staged for upload. Only its description is held; content is
/// streamed when the request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFile {
    pub file_name: String,
    pub media_type: String,
    pub body: VideoBody,
}

impl VideoFile {
    pub fn in_memory(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            body: VideoBody::Memory(bytes.into()),
        }
    }

    async fn part(&self) -> Result<Part, Error> {
        let part = match &self.body {
            VideoBody::File { path, len } => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| unreadable_file(path, e))?;
                Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), *len)
            }
            VideoBody::Memory(bytes) => {
                Part::stream_with_length(bytes.clone(), bytes.len() as u64)
            }
        };
        Ok(part
            .file_name(self.file_name.clone())
            .mime_str(&self.media_type)?)
    }
}

pub(crate) fn unreadable_file(path: &Path, e: std::io::Error) -> Error {
    warn!("Failed to read {}: {e}", path.display());
    Error {
        source: Some(Box::new(e)),
        error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(format!(
            "Could not read {}",
            path.display()
        ))),
    }
}

/// Aspect of one processed version. Unknown backend values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Orientation {
    Square,
    Portrait,
    Landscape,
    Original,
    Other(String),
}

impl Orientation {
    /// Orientations the backend can generate from a source video.
    pub const GENERATED: [Orientation; 3] = [
        Orientation::Square,
        Orientation::Portrait,
        Orientation::Landscape,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Orientation::Square => "square",
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
            Orientation::Original => "original",
            Orientation::Other(value) => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Orientation::Square => "Square (1:1)",
            Orientation::Portrait => "Portrait (9:16)",
            Orientation::Landscape => "Landscape (16:9)",
            Orientation::Original => "Original",
            Orientation::Other(value) => value,
        }
    }
}

impl From<String> for Orientation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "square" => Orientation::Square,
            "portrait" => Orientation::Portrait,
            "landscape" => Orientation::Landscape,
            "original" => Orientation::Original,
            _ => Orientation::Other(value),
        }
    }
}

impl From<Orientation> for String {
    fn from(orientation: Orientation) -> Self {
        orientation.as_str().to_string()
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UploadStatus {
    Queued,
    Processing,
    Success,
    Error,
    Other(String),
}

impl UploadStatus {
    pub fn as_str(&self) -> &str {
        match self {
            UploadStatus::Queued => "queued",
            UploadStatus::Processing => "processing",
            UploadStatus::Success => "success",
            UploadStatus::Error => "error",
            UploadStatus::Other(value) => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            UploadStatus::Queued => "Queued",
            UploadStatus::Processing => "Processing",
            UploadStatus::Success => "Uploaded",
            UploadStatus::Error => "Error",
            UploadStatus::Other(value) => value,
        }
    }
}

impl From<String> for UploadStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => UploadStatus::Queued,
            "processing" => UploadStatus::Processing,
            "success" => UploadStatus::Success,
            "error" => UploadStatus::Error,
            _ => UploadStatus::Other(value),
        }
    }
}

impl From<UploadStatus> for String {
    fn from(status: UploadStatus) -> Self {
        status.as_str().to_string()
    }
}

/// One processed version of an uploaded source, as listed in the uploads table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItem {
    pub id: Uuid,
    pub source_id: Uuid,
    pub original_filename: String,
    pub orientation: Orientation,
    pub duration_sec: f64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub youtube_url: Option<String>,
    pub status: UploadStatus,
    #[serde(default)]
    pub error_text: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadVersion {
    pub id: Uuid,
    pub orientation: Orientation,
    pub status: UploadStatus,
    #[serde(default)]
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub error_text: Option<String>,
    pub duration_sec: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadResponse {
    pub source_id: Uuid,
    pub original_filename: String,
    pub versions: Vec<UploadVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadListResponse {
    pub items: Vec<UploadItem>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryResponse {
    pub status: String,
    #[serde(default)]
    pub youtube_url: Option<String>,
}

/// Query string for an upload submission. Empty unless generation is on.
fn upload_query(generate_orientations: bool, orientations: &[Orientation]) -> Vec<(&'static str, String)> {
    if !generate_orientations {
        return Vec::new();
    }
    let mut query = vec![("generate_orientations", "true".to_string())];
    query.extend(
        orientations
            .iter()
            .map(|orientation| ("orientations", orientation.as_str().to_string())),
    );
    query
}

impl BackendClient {
    /// Sends every file in one multipart request.
    ///
    /// `orientations` is only sent when `generate_orientations` is set.
    pub async fn upload_videos(
        &self,
        files: &[VideoFile],
        generate_orientations: bool,
        orientations: &[Orientation],
    ) -> Result<UploadResponse, Error> {
        const FALLBACK: &str = "Failed to upload videos";
        let url = self.url("/uploads/");

        let mut form = Form::new();
        for file in files {
            let part = file.part().await?;
            form = form.part(FILES_FIELD, part);
        }

        info!(
            "Uploading {} file(s), generate_orientations: {generate_orientations}",
            files.len()
        );
        let request = self
            .http()
            .post(&url)
            .query(&upload_query(generate_orientations, orientations))
            .multipart(form);
        let uploaded: UploadResponse = self.send_json(request, FALLBACK).await?;
        info!(
            "Upload accepted: source {} with {} version(s)",
            uploaded.source_id,
            uploaded.versions.len()
        );
        Ok(uploaded)
    }

    pub async fn list_uploads(&self, skip: u64, limit: u64) -> Result<UploadListResponse, Error> {
        let url = self.url("/uploads/");
        debug!("Listing uploads (skip: {skip}, limit: {limit})");

        let request = self
            .http()
            .get(&url)
            .query(&[("skip", skip), ("limit", limit)]);
        self.send_json(request, "Failed to load uploads").await
    }

    pub async fn retry_upload(&self, upload_id: Uuid) -> Result<RetryResponse, Error> {
        let url = self.url(&format!("/uploads/{upload_id}/retry"));

        let retried: RetryResponse = self
            .send_json(self.http().post(&url), "Failed to retry upload")
            .await?;
        info!("Retried upload {upload_id}: {}", retried.status);
        Ok(retried)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> BackendClient {
        BackendClient::new(reqwest::Client::new(), format!("{}/api/v1", server.url()))
    }

    fn clip(name: &str) -> VideoFile {
        VideoFile::in_memory(name, "video/mp4", &b"fake mp4 payload"[..])
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("uploads-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn created_response() -> String {
        json!({
            "source_id": "0b9d3c1a-2f4e-4c55-8d6e-1a2b3c4d5e6f",
            "original_filename": "disk.mp4",
            "versions": []
        })
        .to_string()
    }

    #[test]
    fn unknown_status_and_orientation_are_preserved() {
        let item: UploadItem = serde_json::from_value(json!({
            "id": "6a1c6d2e-8b1f-4b7a-9a62-6f0f2f2f7a10",
            "source_id": "0b9d3c1a-2f4e-4c55-8d6e-1a2b3c4d5e6f",
            "original_filename": "clip.mp4",
            "orientation": "panoramic",
            "duration_sec": 65.4,
            "width": 1920,
            "height": 1080,
            "youtube_url": null,
            "status": "moderation",
            "error_text": null,
            "created_at": "2024-05-01T10:00:00+00:00",
            "uploaded_at": null
        }))
        .unwrap();

        assert_eq!(item.orientation, Orientation::Other("panoramic".to_string()));
        assert_eq!(item.orientation.label(), "panoramic");
        assert_eq!(item.status, UploadStatus::Other("moderation".to_string()));
        assert_eq!(item.status.label(), "moderation");
    }

    #[test]
    fn query_is_empty_unless_generating() {
        assert!(upload_query(false, &[Orientation::Square]).is_empty());
        assert_eq!(
            upload_query(true, &[Orientation::Portrait, Orientation::Square]),
            vec![
                ("generate_orientations", "true".to_string()),
                ("orientations", "portrait".to_string()),
                ("orientations", "square".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn upload_sends_multipart_files_and_orientation_query() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/api/v1/uploads/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("generate_orientations".into(), "true".into()),
                Matcher::UrlEncoded("orientations".into(), "square".into()),
                Matcher::UrlEncoded("orientations".into(), "landscape".into()),
            ]))
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=".to_string()),
            )
            .match_body(Matcher::Regex(r#"name="files"; filename="a.mp4""#.to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "source_id": "0b9d3c1a-2f4e-4c55-8d6e-1a2b3c4d5e6f",
                    "original_filename": "a.mp4",
                    "versions": [{
                        "id": "6a1c6d2e-8b1f-4b7a-9a62-6f0f2f2f7a10",
                        "orientation": "original",
                        "status": "queued",
                        "youtube_url": null,
                        "error_text": null,
                        "duration_sec": 12.0,
                        "width": 1280,
                        "height": 720
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let uploaded = client_for(&server)
            .upload_videos(
                &[clip("a.mp4"), clip("b.mp4")],
                true,
                &[Orientation::Square, Orientation::Landscape],
            )
            .await
            .unwrap();

        assert_eq!(uploaded.versions.len(), 1);
        assert_eq!(uploaded.versions[0].orientation, Orientation::Original);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn upload_streams_file_content_from_disk() {
        let dir = scratch_dir();
        let path = dir.join("disk.mp4");
        std::fs::write(&path, b"streamed from disk").unwrap();

        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/api/v1/uploads/")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"filename="disk.mp4""#.to_string()),
                Matcher::Regex("streamed from disk".to_string()),
            ]))
            .with_status(200)
            .with_body(created_response())
            .create_async()
            .await;

        let file = VideoFile {
            file_name: "disk.mp4".to_string(),
            media_type: "video/mp4".to_string(),
            body: VideoBody::File {
                path: path.clone(),
                len: 18,
            },
        };
        let uploaded = client_for(&server)
            .upload_videos(&[file], false, &[])
            .await
            .unwrap();

        assert_eq!(uploaded.original_filename, "disk.mp4");
        m.assert_async().await;
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn vanished_file_fails_before_any_request() {
        let dir = scratch_dir();
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let file = VideoFile {
            file_name: "gone.mp4".to_string(),
            media_type: "video/mp4".to_string(),
            body: VideoBody::File {
                path: dir.join("gone.mp4"),
                len: 10,
            },
        };
        let err = client_for(&server)
            .upload_videos(&[file], false, &[])
            .await
            .unwrap_err();

        assert!(err.message().starts_with("Could not read"));
        m.assert_async().await;
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn upload_rejection_uses_detail() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v1/uploads/")
            .with_status(400)
            .with_body(r#"{"detail":"Unsupported container"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .upload_videos(&[clip("a.mp4")], false, &[])
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unsupported container");
    }

    #[tokio::test]
    async fn unreachable_backend_uses_upload_fallbacks() {
        // Nothing listens on port 1 of localhost in test environments.
        let client = BackendClient::new(reqwest::Client::new(), "http://127.0.0.1:1/api/v1");

        let err = client
            .upload_videos(&[clip("a.mp4")], false, &[])
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Failed to upload videos");

        let err = client.list_uploads(0, 50).await.unwrap_err();
        assert_eq!(err.message(), "Failed to load uploads");

        let err = client.retry_upload(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.message(), "Failed to retry upload");
    }

    #[tokio::test]
    async fn list_uploads_sends_paging() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/api/v1/uploads/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("skip".into(), "0".into()),
                Matcher::UrlEncoded("limit".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body(json!({"items": [], "total": 0}).to_string())
            .create_async()
            .await;

        let list = client_for(&server).list_uploads(0, 50).await.unwrap();
        assert_eq!(list.total, 0);
        assert!(list.items.is_empty());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn retry_failure_falls_back_to_endpoint_message() {
        let mut server = Server::new_async().await;
        let id = Uuid::new_v4();
        let _m = server
            .mock("POST", format!("/api/v1/uploads/{id}/retry").as_str())
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let err = client_for(&server).retry_upload(id).await.unwrap_err();
        assert_eq!(err.message(), "Failed to retry upload");
    }
}
