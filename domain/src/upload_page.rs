//! The upload page: the uploads query, an upload zone and the uploads table.

use crate::error::Error;
use crate::gateway::uploads::{UploadItem, UploadListResponse};
use crate::gateway::BackendClient;
use crate::query::{Fetcher, Query, QueryView, UPLOADS_KEY};
use crate::upload_zone::UploadZone;
use crate::uploads_table::{RowView, UploadsTable};
use async_trait::async_trait;
use events::EventPublisher;
use std::sync::Arc;
use uuid::Uuid;

pub struct UploadsFetcher {
    client: BackendClient,
    skip: u64,
    limit: u64,
}

impl UploadsFetcher {
    pub fn new(client: BackendClient, skip: u64, limit: u64) -> Self {
        Self {
            client,
            skip,
            limit,
        }
    }
}

#[async_trait]
impl Fetcher<UploadListResponse> for UploadsFetcher {
    async fn fetch(&self) -> Result<UploadListResponse, Error> {
        self.client.list_uploads(self.skip, self.limit).await
    }
}

pub fn uploads_query(client: BackendClient, skip: u64, limit: u64) -> Query<UploadListResponse> {
    Query::new(UPLOADS_KEY, Arc::new(UploadsFetcher::new(client, skip, limit)))
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableView {
    Loading,
    Error(String),
    Empty,
    Rows { rows: Vec<RowView>, total: u64 },
}

pub struct UploadPage {
    query: Arc<Query<UploadListResponse>>,
    zone: UploadZone,
    table: UploadsTable,
}

impl UploadPage {
    /// `publisher` is expected to carry a handler that refreshes `query`.
    pub fn new(
        client: BackendClient,
        query: Arc<Query<UploadListResponse>>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            query,
            zone: UploadZone::new(client.clone(), publisher.clone()),
            table: UploadsTable::new(client, publisher),
        }
    }

    pub fn zone(&self) -> &UploadZone {
        &self.zone
    }

    pub fn zone_mut(&mut self) -> &mut UploadZone {
        &mut self.zone
    }

    pub fn table(&self) -> &UploadsTable {
        &self.table
    }

    pub async fn load(&self) -> QueryView {
        self.query.ensure_loaded().await.view()
    }

    pub fn find(&self, id: Uuid) -> Option<UploadItem> {
        self.query
            .snapshot()
            .data
            .and_then(|list| list.items.into_iter().find(|item| item.id == id))
    }

    pub fn table_view(&self) -> TableView {
        let snapshot = self.query.snapshot();
        match (snapshot.view(), snapshot.data) {
            (QueryView::Ready, Some(list)) if list.items.is_empty() => TableView::Empty,
            (QueryView::Ready, Some(list)) => TableView::Rows {
                rows: self.table.rows(&list),
                total: list.total,
            },
            (QueryView::Error, _) => {
                TableView::Error(snapshot.error.unwrap_or_else(|| "Failed to load uploads".to_string()))
            }
            _ => TableView::Loading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::uploads::VideoFile;
    use crate::query::QueryInvalidationHandler;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn page(server: &Server) -> UploadPage {
        let client = BackendClient::new(reqwest::Client::new(), format!("{}/api/v1", server.url()));
        let query = Arc::new(uploads_query(client.clone(), 0, 50));
        let publisher = EventPublisher::new()
            .with_handler(Arc::new(QueryInvalidationHandler::new().with_uploads(query.clone())));
        UploadPage::new(client, query, publisher)
    }

    fn list_body(status: &str) -> String {
        json!({
            "items": [{
                "id": "6a1c6d2e-8b1f-4b7a-9a62-6f0f2f2f7a10",
                "source_id": "0b9d3c1a-2f4e-4c55-8d6e-1a2b3c4d5e6f",
                "original_filename": "clip.mp4",
                "orientation": "square",
                "duration_sec": 61,
                "width": 1080,
                "height": 1080,
                "youtube_url": null,
                "status": status,
                "error_text": null,
                "created_at": "2024-05-01T10:00:00+00:00",
                "uploaded_at": null
            }],
            "total": 1
        })
        .to_string()
    }

    #[tokio::test]
    async fn empty_list_is_empty_view() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/uploads/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"items": [], "total": 0}).to_string())
            .create_async()
            .await;
        let page = page(&server);
        assert_eq!(page.table_view(), TableView::Loading);

        page.load().await;
        assert_eq!(page.table_view(), TableView::Empty);
    }

    #[tokio::test]
    async fn successful_upload_refreshes_the_list() {
        let mut server = Server::new_async().await;
        let list = server
            .mock("GET", "/api/v1/uploads/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("skip".into(), "0".into()),
                Matcher::UrlEncoded("limit".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body(list_body("queued"))
            .expect(2)
            .create_async()
            .await;
        let _upload = server
            .mock("POST", "/api/v1/uploads/")
            .with_status(200)
            .with_body(
                json!({
                    "source_id": "0b9d3c1a-2f4e-4c55-8d6e-1a2b3c4d5e6f",
                    "original_filename": "clip.mp4",
                    "versions": []
                })
                .to_string(),
            )
            .create_async()
            .await;
        let mut page = page(&server);
        page.load().await;

        page.zone_mut()
            .add_files(vec![VideoFile::in_memory("clip.mp4", "video/mp4", vec![1u8, 2, 3])]);
        page.zone_mut().submit().await.unwrap();

        let TableView::Rows { rows, total } = page.table_view() else {
            panic!("expected rows");
        };
        assert_eq!(total, 1);
        assert_eq!(rows[0].duration, "1:01");
        assert_eq!(rows[0].dimensions, "1080 × 1080");
        list.assert_async().await;
    }

    #[tokio::test]
    async fn retry_finds_row_and_refreshes() {
        let mut server = Server::new_async().await;
        let list = server
            .mock("GET", "/api/v1/uploads/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(list_body("error"))
            .expect(2)
            .create_async()
            .await;
        let _retry = server
            .mock("POST", "/api/v1/uploads/6a1c6d2e-8b1f-4b7a-9a62-6f0f2f2f7a10/retry")
            .with_status(200)
            .with_body(json!({"status": "queued", "youtube_url": null}).to_string())
            .create_async()
            .await;
        let page = page(&server);
        page.load().await;

        let id: Uuid = "6a1c6d2e-8b1f-4b7a-9a62-6f0f2f2f7a10".parse().unwrap();
        let item = page.find(id).unwrap();
        page.table().retry(&item).await.unwrap();
        assert!(page.find(Uuid::new_v4()).is_none());
        list.assert_async().await;
    }
}
