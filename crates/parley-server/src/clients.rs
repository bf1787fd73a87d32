//! HTTP collaborator clients
//!
//! - [`HttpTaskExecutor`]: `POST {base}/tasks`
//! - [`HttpSuggestionSource`]: `GET {base}/entities/recent`
//!
//! Both forward the caller's tenant and user in `x-tenant-id` and
//! `x-user-id`.

use parley_core::{
    HandoffError, RecentQuery, SourceError, SuggestionSource, TaskAcknowledgement, TaskExecutor,
    TaskRequest,
};
use parley_dialogue::Suggestion;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Shown when the task service cannot be reached at all
pub const TASK_SERVICE_UNREACHABLE: &str =
    "The task service is unreachable right now. Please try again later.";

fn client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Task service client
#[derive(Debug, Clone)]
pub struct HttpTaskExecutor {
    client: reqwest::Client,
    url: String,
}

impl HttpTaskExecutor {
    /// Create client for a base URL
    ///
    /// # Errors
    /// Returns `reqwest::Error` if the client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: client(timeout)?,
            url: join(base_url, "tasks"),
        })
    }
}

#[async_trait::async_trait]
impl TaskExecutor for HttpTaskExecutor {
    async fn execute(&self, request: &TaskRequest) -> Result<TaskAcknowledgement, HandoffError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-tenant-id", &request.tenant_id)
            .header("x-user-id", &request.user_id)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %self.url, error = %e, "task service request failed");
                HandoffError::Execution(TASK_SERVICE_UNREACHABLE.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HandoffError::Execution(failure_message(status, &body)));
        }

        response.json::<TaskAcknowledgement>().await.map_err(|e| {
            tracing::error!(url = %self.url, error = %e, "unreadable task acknowledgement");
            HandoffError::Execution(format!(
                "The task service answered in an unexpected format ({status})."
            ))
        })
    }
}

/// User-facing text of a failed task call
///
/// Prefers a `message` or `error` string in a JSON body, then the raw body.
fn failure_message(status: reqwest::StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        ["message", "error"]
            .iter()
            .find_map(|key| json.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => format!("The task service rejected the request ({status})."),
    }
}

/// One record from the recent-records service
#[derive(Debug, Deserialize)]
struct RecentRecord {
    id: Value,
    label: String,
}

/// Recent-records service client
#[derive(Debug, Clone)]
pub struct HttpSuggestionSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSuggestionSource {
    /// Create client for a base URL
    ///
    /// # Errors
    /// Returns `reqwest::Error` if the client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: client(timeout)?,
            url: join(base_url, "entities/recent"),
        })
    }
}

#[async_trait::async_trait]
impl SuggestionSource for HttpSuggestionSource {
    async fn recent(&self, query: &RecentQuery) -> Result<Vec<Suggestion>, SourceError> {
        let limit = query.limit.to_string();
        let response = self
            .client
            .get(&self.url)
            .header("x-tenant-id", &query.tenant_id)
            .header("x-user-id", &query.user_id)
            .query(&[("entity", query.entity.as_str()), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout
                } else {
                    SourceError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!("status {status}")));
        }

        let records: Vec<RecentRecord> = response
            .json()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        Ok(records
            .into_iter()
            .take(query.limit)
            .map(|record| Suggestion::new(query.parameter.clone(), record.label, record.id))
            .collect())
    }
}
