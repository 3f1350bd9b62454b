// src/hrms_client.rs
//
// reqwest implementation of `TimesheetStore` against the HRMS REST backend.
// The backend authenticates through a bearer token and stamps its own audit
// lines from the authenticated user, so the actor name passed to
// `update_entry_statuses` is informational on this path.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::model::{format_work_date, Allocation, Associate, EntryStatus, NewTimeEntry, TimeEntry};
use crate::store::{EntryFilter, StoreError, TimesheetStore};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct HrmsConfig {
    /// Base URL of the HRMS API, e.g. "http://localhost:8000/api".
    pub base_url: String,
    pub api_token: Option<String>,
}

pub struct HrmsClient {
    http: Client,
    config: HrmsConfig,
}

/// Body of `POST /timesheets/bulk-status`.
#[derive(Debug, Serialize)]
struct BulkStatusUpdate<'a> {
    row_indices: &'a [u32],
    status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

/// Error payload the backend returns for 4xx/5xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

impl HrmsClient {
    pub fn new(config: HrmsConfig) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(HrmsClient { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        match &self.config.api_token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    /// Surface the server-provided `detail` message when there is one, with
    /// a generic fallback otherwise.
    async fn check<T: DeserializeOwned>(&self, response: Response) -> Result<T, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(ErrorBody {
                detail: Some(detail),
            }) => detail,
            _ => format!("HRMS backend request failed with status {status}"),
        };
        error!(%status, %message, "HRMS backend returned an error");
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn check_no_body(&self, response: Response) -> Result<(), StoreError> {
        // Mutation endpoints answer with {"success": true, "message": ...};
        // nothing in it is needed beyond the status check.
        let _: serde_json::Value = self.check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl TimesheetStore for HrmsClient {
    async fn list_time_entries(&self, filter: &EntryFilter) -> Result<Vec<TimeEntry>, StoreError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(aid) = &filter.associate_id {
            query.push(("associate_id", aid.clone()));
        }
        if let Some(start) = filter.start_date {
            query.push(("start_date", format_work_date(start)));
        }
        if let Some(end) = filter.end_date {
            query.push(("end_date", format_work_date(end)));
        }
        debug!(?query, "listing time entries");
        let response = self
            .request(self.http.get(self.url("timesheets/")).query(&query))
            .send()
            .await?;
        self.check(response).await
    }

    async fn create_time_entries(&self, entries: Vec<NewTimeEntry>) -> Result<(), StoreError> {
        debug!(count = entries.len(), "bulk creating time entries");
        let response = self
            .request(self.http.post(self.url("timesheets/bulk")).json(&entries))
            .send()
            .await?;
        self.check_no_body(response).await
    }

    async fn delete_time_entry(&self, row_index: u32) -> Result<(), StoreError> {
        debug!(row_index, "deleting time entry");
        let response = self
            .request(self.http.delete(self.url(&format!("timesheets/{row_index}"))))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::RowNotFound { row_index });
        }
        self.check_no_body(response).await
    }

    async fn update_entry_statuses(
        &self,
        row_refs: &[u32],
        status: EntryStatus,
        _actor_name: &str,
        note: Option<&str>,
    ) -> Result<(), StoreError> {
        debug!(rows = row_refs.len(), %status, "bulk updating entry statuses");
        let body = BulkStatusUpdate {
            row_indices: row_refs,
            status,
            reason: note,
        };
        let response = self
            .request(self.http.post(self.url("timesheets/bulk-status")).json(&body))
            .send()
            .await?;
        self.check_no_body(response).await
    }

    async fn list_allocations(
        &self,
        associate_id: Option<&str>,
    ) -> Result<Vec<Allocation>, StoreError> {
        let query: Vec<(&str, String)> = associate_id
            .map(|aid| vec![("associate_id", aid.to_string())])
            .unwrap_or_default();
        let response = self
            .request(self.http.get(self.url("allocations/")).query(&query))
            .send()
            .await?;
        self.check(response).await
    }

    async fn list_associates(&self) -> Result<Vec<Associate>, StoreError> {
        let response = self
            .request(self.http.get(self.url("associates/")))
            .send()
            .await?;
        self.check(response).await
    }
}
