use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use urlencoding::encode;

use super::domain::{CourtCase, PrisonerId, Prisoner, Recall, RecallId, RecallPayload};
use crate::config::RecallApiConfig;

/// Downstream case-management API holding prisoners, court cases and recalls.
#[async_trait]
pub trait RecallApi: Send + Sync {
    async fn prisoner(&self, prisoner_id: &PrisonerId) -> Result<Prisoner, ApiError>;
    async fn recalls(&self, prisoner_id: &PrisonerId) -> Result<Vec<Recall>, ApiError>;
    async fn recall(&self, recall_id: &RecallId) -> Result<Recall, ApiError>;
    async fn court_cases(&self, prisoner_id: &PrisonerId) -> Result<Vec<CourtCase>, ApiError>;
    async fn create_recall(&self, payload: &RecallPayload) -> Result<RecallId, ApiError>;
    async fn update_recall(
        &self,
        recall_id: &RecallId,
        payload: &RecallPayload,
    ) -> Result<(), ApiError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("case-management API rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("case-management API unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("case-management API returned an unexpected body: {0}")]
    Decode(String),
    #[error("case-management API unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedRecall {
    recall_uuid: String,
}

/// `reqwest` client for the case-management API.
#[derive(Debug, Clone)]
pub struct HttpRecallApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRecallApi {
    pub fn new(config: &RecallApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// `path` must already have its dynamic segments percent-encoded.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "calling case-management API");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn checked(
        builder: RequestBuilder,
        resource: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await.map_err(|err| {
            warn!(resource, error = %err, "case-management API request failed");
            ApiError::Transport(err)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(resource.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(resource, status = status.as_u16(), "case-management API rejected request");
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        resource: &str,
    ) -> Result<T, ApiError> {
        let response = Self::checked(self.request(Method::GET, path), resource).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

#[async_trait]
impl RecallApi for HttpRecallApi {
    async fn prisoner(&self, prisoner_id: &PrisonerId) -> Result<Prisoner, ApiError> {
        self.fetch(&format!("/person/{}", encode(&prisoner_id.0)), "prisoner")
            .await
    }

    async fn recalls(&self, prisoner_id: &PrisonerId) -> Result<Vec<Recall>, ApiError> {
        self.fetch(&format!("/recall/person/{}", encode(&prisoner_id.0)), "recalls")
            .await
    }

    async fn recall(&self, recall_id: &RecallId) -> Result<Recall, ApiError> {
        self.fetch(&format!("/recall/{}", encode(&recall_id.0)), "recall").await
    }

    async fn court_cases(&self, prisoner_id: &PrisonerId) -> Result<Vec<CourtCase>, ApiError> {
        self.fetch(&format!("/court-case/person/{}", encode(&prisoner_id.0)), "court cases")
            .await
    }

    async fn create_recall(&self, payload: &RecallPayload) -> Result<RecallId, ApiError> {
        let builder = self.request(Method::POST, "/recall").json(payload);
        let created: CreatedRecall = Self::checked(builder, "recall")
            .await?
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(RecallId(created.recall_uuid))
    }

    async fn update_recall(
        &self,
        recall_id: &RecallId,
        payload: &RecallPayload,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::PUT, &format!("/recall/{}", encode(&recall_id.0)))
            .json(payload);
        Self::checked(builder, "recall").await?;
        Ok(())
    }
}
