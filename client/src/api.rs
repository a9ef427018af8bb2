//! HTTP access to the directory service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Directory record as the service returns it.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: i32,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
}

/// Payload for creating a record. The service decides the id and the
/// initial active flag.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    pub full_name: String,
    pub role: String,
}

/// Partial update. Unset fields are left out of the request body so the
/// service only touches what the caller names.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Row count reported back for updates and deletes.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct MutationAck {
    pub affected: u64,
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
}

/// Operations the rest of the client needs from the service. Kept as a
/// trait so the event loop can be driven against a stub in tests.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Employee>, RequestError>;
    async fn create(&self, employee: NewEmployee) -> Result<Employee, RequestError>;
    async fn update(&self, id: i32, patch: EmployeePatch) -> Result<MutationAck, RequestError>;
    async fn delete(&self, id: i32) -> Result<MutationAck, RequestError>;
}

/// [`DirectoryApi`] backed by reqwest against a live service.
pub struct HttpDirectoryApi {
    base: String,
    client: Client,
}

impl HttpDirectoryApi {
    /// Requests that outlive `timeout` are surfaced as transport errors.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RequestError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

#[async_trait]
impl DirectoryApi for HttpDirectoryApi {
    async fn list(&self) -> Result<Vec<Employee>, RequestError> {
        let response = self.client.get(self.url("/employees")).send().await?;
        read_json(response).await
    }

    async fn create(&self, employee: NewEmployee) -> Result<Employee, RequestError> {
        let response = self
            .client
            .post(self.url("/employees"))
            .json(&employee)
            .send()
            .await?;
        read_json(response).await
    }

    async fn update(&self, id: i32, patch: EmployeePatch) -> Result<MutationAck, RequestError> {
        let response = self
            .client
            .patch(self.url(&format!("/employees/{id}")))
            .json(&patch)
            .send()
            .await?;
        read_json(response).await
    }

    async fn delete(&self, id: i32) -> Result<MutationAck, RequestError> {
        let response = self
            .client
            .delete(self.url(&format!("/employees/{id}")))
            .send()
            .await?;
        read_json(response).await
    }
}

/// The service reports failures as plain-text bodies, so a non-success
/// status turns the body into the rejection message.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RequestError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(RequestError::Rejected { status, message });
    }
    Ok(response.json().await?)
}
