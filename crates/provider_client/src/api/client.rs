//! Direct model-provider client over HTTP.
//!
//! Transport concerns live here: retry middleware, SSE decoding, and
//! correlation-id capture. The rest of the system talks to this through
//! [`ModelClient`].

use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use log::{error, info, warn};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use chat_core::settings::ModelSettings;

use crate::api::models::{ChatCompletionResponse, CompletionChunk, ModelInvocationArgs};
use crate::client_trait::{ChunkStream, ModelClient, ProviderResponse, ProviderStream};
use crate::error::ProviderError;

/// Header carrying the provider-assigned correlation id.
pub const CORRELATION_HEADER: &str = "apim-request-id";

const USER_AGENT: &str = "chat-orchestrator/1.0";
const DONE_SENTINEL: &str = "[DONE]";

pub struct ModelProviderClient {
    client: Arc<ClientWithMiddleware>,
    endpoint: String,
    api_key: Option<String>,
}

impl ModelProviderClient {
    pub fn new(settings: &ModelSettings) -> Result<Self, ProviderError> {
        let endpoint = settings
            .endpoint
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("MODEL_ENDPOINT is required".to_string()))?;
        if settings.model.is_none() {
            return Err(ProviderError::NotConfigured(
                "MODEL_NAME is required".to_string(),
            ));
        }

        let client = Client::builder()
            .default_headers(Self::default_headers())
            .build()?;

        Ok(Self {
            client: Arc::new(Self::build_retry_client(client)),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: settings.key.clone(),
        })
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
        headers.insert("accept", HeaderValue::from_static("application/json"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers
    }

    fn build_retry_client(client: Client) -> ClientWithMiddleware {
        // Exponential backoff: 1s, 2s, 4s with jitter
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }

    async fn send(&self, args: &ModelInvocationArgs) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let mut request = self.client.post(&url);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.json(args).send().await.map_err(|e| {
            error!("failed to send chat completion request: {e}");
            ProviderError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("chat completion failed with status {status}: {message}");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    fn correlation_id(response: &reqwest::Response) -> Option<String> {
        response
            .headers()
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }
}

#[async_trait]
impl ModelClient for ModelProviderClient {
    async fn complete(
        &self,
        args: &ModelInvocationArgs,
    ) -> Result<ProviderResponse, ProviderError> {
        info!(
            "dispatching completion with {} messages to {}",
            args.messages.len(),
            args.model
        );
        let response = self.send(args).await?;
        let correlation_id = Self::correlation_id(&response);
        let body = response.bytes().await?;
        let completion: ChatCompletionResponse = serde_json::from_slice(&body)?;
        Ok(ProviderResponse {
            completion,
            correlation_id,
        })
    }

    async fn complete_stream(
        &self,
        args: &ModelInvocationArgs,
    ) -> Result<ProviderStream, ProviderError> {
        info!(
            "dispatching streamed completion with {} messages to {}",
            args.messages.len(),
            args.model
        );
        let response = self.send(args).await?;
        let correlation_id = Self::correlation_id(&response);

        let mut event_stream = response.bytes_stream().eventsource();
        let chunks: ChunkStream = Box::pin(async_stream::stream! {
            while let Some(event) = event_stream.next().await {
                match event {
                    Ok(message) => {
                        if message.data == DONE_SENTINEL {
                            info!("received {DONE_SENTINEL} signal, closing stream");
                            break;
                        }
                        match serde_json::from_str::<CompletionChunk>(&message.data) {
                            Ok(chunk) => yield Ok(chunk),
                            Err(e) => {
                                // Malformed chunks are skipped, not fatal.
                                error!("failed to parse stream chunk: {e}, data: {}", message.data);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("error in SSE stream: {e}");
                        yield Err(ProviderError::Transport(e.to_string()));
                        break;
                    }
                }
            }
        });

        Ok(ProviderStream {
            chunks,
            correlation_id,
        })
    }
}
