//! `reqwest`-backed implementation of [`TaskApi`].

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::api::TaskApi;
use crate::config::ClientConfig;
use crate::models::status::WatchResponse;
use crate::models::task::{CreateTaskResponse, FormPayload, TaskId};
use crate::{AppError, Result};

/// HTTP client for the task service.
///
/// Both endpoints take a form-encoded POST body and answer with JSON.
pub struct HttpTaskApi {
    client: reqwest::Client,
    create_url: String,
    watch_url: String,
}

impl HttpTaskApi {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(ref agent) = config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            create_url: config.create_url(),
            watch_url: config.watch_url(),
        })
    }

    async fn post_form<T>(&self, url: &str, form: &FormPayload) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.client.post(url).form(form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(url, %status, len = body.len(), "task service response");
        Ok(serde_json::from_slice(&body)?)
    }
}

impl TaskApi for HttpTaskApi {
    fn create_task<'a>(
        &'a self,
        payload: &'a FormPayload,
    ) -> Pin<Box<dyn Future<Output = Result<CreateTaskResponse>> + Send + 'a>> {
        Box::pin(async move { self.post_form(&self.create_url, payload).await })
    }

    fn watch_task<'a>(
        &'a self,
        task_id: &'a TaskId,
    ) -> Pin<Box<dyn Future<Output = Result<WatchResponse>> + Send + 'a>> {
        Box::pin(async move {
            let mut form = FormPayload::new();
            form.set("taskid", task_id.as_str());
            self.post_form(&self.watch_url, &form).await
        })
    }
}
