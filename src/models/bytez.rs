use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ChatModel, ChatOutput, ChatTurn, ImageModel, ImageOutput, ModelOutcome};
use crate::config::SharedConfig;

/// Connection to the Bytez inference API, shared by all models.
#[derive(Clone)]
pub struct BytezClient {
    http: reqwest::Client,
    api_base: Arc<str>,
    auth: HeaderValue,
}

impl BytezClient {
    pub fn new(api_key: &str, api_base: &str, timeout: Option<Duration>) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let mut auth = HeaderValue::from_str(&format!("Key {}", api_key))?;
        auth.set_sensitive(true);

        Ok(Self {
            http: builder.build()?,
            api_base: api_base.trim_end_matches('/').into(),
            auth,
        })
    }

    pub fn from_config(config: &SharedConfig) -> Result<Self, Error> {
        Self::new(
            &config.bytez_api_key,
            &config.bytez_api_base,
            config.model_timeout.map(Duration::from_secs),
        )
    }

    pub fn model<S: Into<String>>(&self, model_id: S) -> BytezModel {
        BytezModel {
            client: self.clone(),
            model_id: model_id.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
}

impl RunResponse {
    fn into_outcome<T, F>(self, parse: F) -> ModelOutcome<T>
    where
        F: FnOnce(&Value) -> T,
    {
        match self.error {
            Value::Null => ModelOutcome::Success(parse(&self.output)),
            Value::String(message) if message.is_empty() => {
                ModelOutcome::Success(parse(&self.output))
            }
            Value::String(message) => ModelOutcome::Failure(message),
            other => ModelOutcome::Failure(other.to_string()),
        }
    }
}

/// A single model hosted on Bytez.
#[derive(Clone)]
pub struct BytezModel {
    client: BytezClient,
    model_id: String,
}

impl BytezModel {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.client.api_base, self.model_id)
    }

    async fn run(&self, input: Value) -> Result<RunResponse, Error> {
        debug!("Requesting model {}", self.model_id);
        let resp = self
            .client
            .http
            .post(self.endpoint())
            .header(AUTHORIZATION, self.client.auth.clone())
            .json(&input)
            .send()
            .await?;

        // Error responses usually still carry the `{output, error}` body.
        let status = resp.status();
        let body = resp.bytes().await?;
        match serde_json::from_slice::<RunResponse>(&body) {
            Ok(run_resp) => Ok(run_resp),
            Err(_) if !status.is_success() => Err(anyhow!(
                "Model {} responded with HTTP {}",
                self.model_id,
                status
            )),
            Err(err) => Err(anyhow!(
                "Model {} responded with malformed data: {}",
                self.model_id,
                err
            )),
        }
    }
}

#[async_trait]
impl ChatModel for BytezModel {
    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<ModelOutcome<ChatOutput>, Error> {
        let resp = self.run(json!({ "messages": turns })).await?;
        Ok(resp.into_outcome(ChatOutput::from_output))
    }
}

#[async_trait]
impl ImageModel for BytezModel {
    async fn generate(&self, prompt: &str) -> Result<ModelOutcome<ImageOutput>, Error> {
        let resp = self.run(json!({ "text": prompt })).await?;
        Ok(resp.into_outcome(ImageOutput::from_output))
    }
}
