//! A record source that queries a Notion database

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::SyncError;
use crate::record::SourceRecord;
use crate::traits::RecordSource;

static NOTION_API_BASE: &str = "https://api.notion.com/v1/";
static NOTION_VERSION: &str = "2022-06-28";
/// The maximum page size the query endpoint accepts
const PAGE_SIZE: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One page of results of a database query
#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<SourceRecord>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}


/// The pages of a Notion database, fetched through the public API
pub struct NotionSource {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    database_id: String,
}

impl NotionSource {
    /// Create a source. This does not start a connection
    pub fn new<T: ToString, D: ToString>(token: T, database_id: D) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| SyncError::source_unavailable(format!("Unable to build an HTTP client: {}", err)))?;
        let base_url = Url::parse(NOTION_API_BASE)
            .map_err(|err| SyncError::config(format!("Invalid Notion API URL: {}", err)))?;

        Ok(Self {
            http,
            base_url,
            token: token.to_string(),
            database_id: database_id.to_string(),
        })
    }

    /// Send the requests to another server (e.g. a local mock of the API)
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    fn query_url(&self) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::config(format!("{} cannot be used as a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(&["databases", self.database_id.as_str(), "query"]);
        Ok(url)
    }

    async fn query_page(&self, cursor: Option<&str>) -> Result<QueryResponse, SyncError> {
        let mut body = json!({ "page_size": PAGE_SIZE });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }

        let response = self.http
            .post(self.query_url()?)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| SyncError::source_unavailable(format!("Unable to query the Notion database: {}", err)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::source_unavailable(format!("Notion refused the credentials (HTTP {})", status)));
        }
        if status.is_success() == false {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::source_unavailable(format!("Unexpected HTTP status code {} from Notion: {}", status, text)));
        }

        response.json::<QueryResponse>()
            .await
            .map_err(|err| SyncError::source_unavailable(format!("Invalid reply from Notion: {}", err)))
    }
}

#[async_trait]
impl RecordSource for NotionSource {
    async fn list_records(&mut self) -> Result<Vec<SourceRecord>, SyncError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.query_page(cursor.as_deref()).await?;
            log::debug!("Fetched {} records from database {}", page.results.len(), self.database_id);
            records.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                (true, None) => {
                    log::warn!("Notion announced more results but gave no cursor, stopping at {} records", records.len());
                    break;
                },
                (false, _) => break,
            }
        }

        Ok(records)
    }
}
