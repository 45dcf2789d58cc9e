//! Read-only table of processed upload versions with per-row retry.

use crate::error::{Error, ValidationErrorKind};
use crate::gateway::uploads::{RetryResponse, UploadItem, UploadListResponse, UploadStatus};
use crate::gateway::BackendClient;
use chrono::Local;
use dashmap::DashSet;
use events::{DomainEvent, EventPublisher};
use log::*;
use uuid::Uuid;

pub const EMPTY_TABLE: &str = "No videos uploaded yet";

/// Formats a duration in seconds as `m:ss`, truncating fractions.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

pub fn format_dimensions(width: u32, height: u32) -> String {
    format!("{width} × {height}")
}

/// Only failed versions can be retried.
pub fn can_retry(item: &UploadItem) -> bool {
    item.status == UploadStatus::Error
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: Uuid,
    pub file_name: String,
    pub created: String,
    pub orientation: String,
    pub duration: String,
    pub dimensions: String,
    pub status: UploadStatus,
    pub status_label: String,
    pub youtube_url: Option<String>,
    pub error_text: Option<String>,
    pub can_retry: bool,
    pub retrying: bool,
}

/// Clears a row's in-flight flag when its retry settles.
struct RetryGuard<'a> {
    in_flight: &'a DashSet<Uuid>,
    id: Uuid,
}

impl Drop for RetryGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

pub struct UploadsTable {
    client: BackendClient,
    publisher: EventPublisher,
    in_flight: DashSet<Uuid>,
}

impl UploadsTable {
    pub fn new(client: BackendClient, publisher: EventPublisher) -> Self {
        Self {
            client,
            publisher,
            in_flight: DashSet::new(),
        }
    }

    pub fn is_retrying(&self, id: Uuid) -> bool {
        self.in_flight.contains(&id)
    }

    pub fn rows(&self, list: &UploadListResponse) -> Vec<RowView> {
        list.items.iter().map(|item| self.row(item)).collect()
    }

    pub fn row(&self, item: &UploadItem) -> RowView {
        RowView {
            id: item.id,
            file_name: item.original_filename.clone(),
            created: item
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            orientation: item.orientation.label().to_string(),
            duration: format_duration(item.duration_sec),
            dimensions: format_dimensions(item.width, item.height),
            status: item.status.clone(),
            status_label: item.status.label().to_string(),
            youtube_url: item.youtube_url.clone(),
            error_text: item.error_text.clone(),
            can_retry: can_retry(item),
            retrying: self.is_retrying(item.id),
        }
    }

    fn begin_retry(&self, id: Uuid) -> Result<RetryGuard<'_>, Error> {
        if !self.in_flight.insert(id) {
            debug!("Retry of upload {id} already in flight");
            return Err(Error::busy());
        }
        Ok(RetryGuard {
            in_flight: &self.in_flight,
            id,
        })
    }

    /// Retries a failed upload.
    ///
    /// Different rows may retry at the same time; a second retry of the same
    /// row while one is in flight is refused. The uploads list is refreshed
    /// once the call settles, whatever the outcome.
    pub async fn retry(&self, item: &UploadItem) -> Result<RetryResponse, Error> {
        if !can_retry(item) {
            return Err(Error::validation(ValidationErrorKind::UnsupportedOperation));
        }

        let guard = self.begin_retry(item.id)?;
        let result = self.client.retry_upload(item.id).await;
        drop(guard);

        if let Err(e) = &result {
            error!("Retry of upload {} failed: {e}", item.id);
        }
        self.publisher
            .publish(DomainEvent::UploadRetried {
                upload_id: item.id,
                succeeded: result.is_ok(),
            })
            .await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, InternalErrorKind};
    use crate::gateway::uploads::Orientation;
    use async_trait::async_trait;
    use chrono::Utc;
    use events::EventHandler;
    use mockito::Server;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::{oneshot, Notify};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<DomainEvent>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &DomainEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn item(status: UploadStatus) -> UploadItem {
        UploadItem {
            id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            original_filename: "clip.mp4".to_string(),
            orientation: Orientation::Portrait,
            duration_sec: 125.9,
            width: 1080,
            height: 1920,
            youtube_url: None,
            status,
            error_text: None,
            created_at: Utc::now(),
            uploaded_at: None,
        }
    }

    /// Backend that answers one request only after `release` is notified.
    /// `received` fires once the request has arrived.
    async fn held_backend(release: Arc<Notify>, received: oneshot::Sender<()>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            let _ = received.send(());

            release.notified().await;
            let body = r#"{"status":"success","youtube_url":null}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/api/v1")
    }

    fn table(server: &Server) -> (UploadsTable, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let client = BackendClient::new(reqwest::Client::new(), format!("{}/api/v1", server.url()));
        let table = UploadsTable::new(client, EventPublisher::new().with_handler(recorder.clone()));
        (table, recorder)
    }

    #[test]
    fn durations_render_as_minutes_and_padded_seconds() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(5.7), "0:05");
        assert_eq!(format_duration(65.0), "1:05");
        assert_eq!(format_duration(3600.0), "60:00");
        assert_eq!(format_duration(f64::NAN), "0:00");
        assert_eq!(format_dimensions(1920, 1080), "1920 × 1080");
    }

    #[tokio::test]
    async fn retry_is_offered_only_for_error_rows() {
        let server = Server::new_async().await;
        let (table, _) = table(&server);

        let rows = table.rows(&UploadListResponse {
            items: vec![
                item(UploadStatus::Success),
                item(UploadStatus::Error),
                item(UploadStatus::Queued),
                item(UploadStatus::Other("moderation".to_string())),
            ],
            total: 4,
        });
        let offered: Vec<bool> = rows.iter().map(|r| r.can_retry).collect();
        assert_eq!(offered, vec![false, true, false, false]);
        assert_eq!(rows[0].duration, "2:05");
        assert_eq!(rows[0].orientation, "Portrait (9:16)");
        assert_eq!(rows[3].status_label, "moderation");

        let err = table.retry(&item(UploadStatus::Success)).await.unwrap_err();
        assert_eq!(
            err.validation_kind(),
            Some(ValidationErrorKind::UnsupportedOperation)
        );
    }

    #[tokio::test]
    async fn in_flight_row_refuses_second_retry_but_others_proceed() {
        let mut server = Server::new_async().await;
        let busy = item(UploadStatus::Error);
        let other = item(UploadStatus::Error);
        let _m = server
            .mock("POST", format!("/api/v1/uploads/{}/retry", other.id).as_str())
            .with_status(200)
            .with_body(json!({"status": "success", "youtube_url": "https://youtu.be/x"}).to_string())
            .create_async()
            .await;
        let (table, _) = table(&server);

        let guard = table.begin_retry(busy.id).unwrap();
        assert!(table.row(&busy).retrying);
        assert!(!table.row(&other).retrying);

        let err = table.retry(&busy).await.unwrap_err();
        assert_eq!(err.error_kind, DomainErrorKind::Internal(InternalErrorKind::Busy));

        let retried = table.retry(&other).await.unwrap();
        assert_eq!(retried.youtube_url.as_deref(), Some("https://youtu.be/x"));
        assert!(table.is_retrying(busy.id));

        drop(guard);
        assert!(!table.is_retrying(busy.id));
    }

    #[tokio::test]
    async fn pending_retry_marks_only_its_row() {
        let release = Arc::new(Notify::new());
        let (received_tx, received_rx) = oneshot::channel();
        let api_root = held_backend(release.clone(), received_tx).await;
        let recorder = Arc::new(Recorder::default());
        let table = UploadsTable::new(
            BackendClient::new(reqwest::Client::new(), api_root),
            EventPublisher::new().with_handler(recorder.clone()),
        );
        let pending = item(UploadStatus::Error);
        let idle = item(UploadStatus::Error);

        let while_pending = async {
            received_rx.await.unwrap();
            assert!(table.is_retrying(pending.id));
            assert!(table.row(&pending).retrying);
            assert!(!table.is_retrying(idle.id));
            assert!(recorder.events.lock().unwrap().is_empty());

            let err = table.retry(&pending).await.unwrap_err();
            assert_eq!(err.error_kind, DomainErrorKind::Internal(InternalErrorKind::Busy));
            release.notify_one();
        };
        let (result, ()) = tokio::join!(table.retry(&pending), while_pending);

        assert_eq!(result.unwrap().status, "success");
        assert!(!table.is_retrying(pending.id));
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![DomainEvent::UploadRetried {
                upload_id: pending.id,
                succeeded: true
            }]
        );
    }

    #[tokio::test]
    async fn failed_retry_clears_flag_and_still_refreshes() {
        let mut server = Server::new_async().await;
        let failed = item(UploadStatus::Error);
        let _m = server
            .mock("POST", format!("/api/v1/uploads/{}/retry", failed.id).as_str())
            .with_status(500)
            .create_async()
            .await;
        let (table, recorder) = table(&server);

        assert!(table.retry(&failed).await.is_err());
        assert!(!table.is_retrying(failed.id));
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![DomainEvent::UploadRetried {
                upload_id: failed.id,
                succeeded: false
            }]
        );
    }
}
