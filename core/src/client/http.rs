use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::MissionConfig;
use crate::contracts::{
    BatchPropagationResponse, Conjunction, ConjunctionSummary, JobStatusResponse, NoradId,
    PropagationResponse, ScreeningRequest, StartScreeningResponse,
};
use crate::prelude::{MissionError, MissionResult, MissionService};

/// [`MissionService`] over the screening service's HTTP+JSON API.
#[derive(Debug, Clone)]
pub struct HttpMissionService {
    client: Client,
    base_url: String,
}

impl HttpMissionService {
    /// Every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MissionResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| MissionError::Transport(err.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &MissionConfig) -> MissionResult<Self> {
        Self::new(config.service_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `path` with `segment` appended as one percent-encoded path segment.
    fn url_with_segment(&self, path: &str, segment: &str) -> MissionResult<Url> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|err| MissionError::InvalidInput(format!("{}: {}", self.base_url, err)))?;
        url.path_segments_mut()
            .map_err(|_| {
                MissionError::InvalidInput(format!("{} cannot carry a path", self.base_url))
            })?
            .push(segment);
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> MissionResult<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(service_error(status, body));
        }
        response.json::<T>().await.map_err(transport_error)
    }
}

fn transport_error(err: reqwest::Error) -> MissionError {
    if err.is_decode() {
        MissionError::Decode(err.to_string())
    } else {
        MissionError::Transport(err.to_string())
    }
}

fn service_error(status: StatusCode, body: String) -> MissionError {
    MissionError::Service {
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl MissionService for HttpMissionService {
    async fn start_screening(
        &self,
        request: &ScreeningRequest,
    ) -> MissionResult<StartScreeningResponse> {
        self.fetch(self.client.post(self.url("/api/screening/run")).json(request))
            .await
    }

    async fn screening_status(&self, job_id: &str) -> MissionResult<JobStatusResponse> {
        let url = self.url_with_segment("/api/screening/status", job_id)?;
        self.fetch(self.client.get(url)).await
    }

    async fn propagate(
        &self,
        norad_id: NoradId,
        steps: u32,
        step_seconds: f64,
    ) -> MissionResult<PropagationResponse> {
        self.fetch(
            self.client
                .get(self.url(&format!("/api/orbit/{}/propagate", norad_id)))
                .query(&[("steps", steps.to_string()), ("step_seconds", step_seconds.to_string())]),
        )
        .await
    }

    async fn propagate_batch(
        &self,
        norad_ids: &[NoradId],
    ) -> MissionResult<BatchPropagationResponse> {
        self.fetch(
            self.client
                .post(self.url("/api/orbit/propagate-batch"))
                .json(norad_ids),
        )
        .await
    }

    async fn list_conjunctions(&self) -> MissionResult<Vec<Conjunction>> {
        self.fetch(self.client.get(self.url("/api/conjunctions")))
            .await
    }

    async fn conjunction(&self, id: u64) -> MissionResult<Conjunction> {
        self.fetch(self.client.get(self.url(&format!("/api/conjunctions/{}", id))))
            .await
    }

    async fn conjunction_summary(&self) -> MissionResult<ConjunctionSummary> {
        self.fetch(self.client.get(self.url("/api/conjunctions/summary")))
            .await
    }
}
