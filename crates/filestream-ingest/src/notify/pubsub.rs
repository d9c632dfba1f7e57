//! Pub/Sub publisher over the REST API.
//!
//! `POST {endpoint}/v1/{topic}:publish` with a body of
//! `{"messages": [{"data": <base64>, "attributes": {"file_name": ...}}]}`.
//! Works against the managed service (with a bearer token) and the local
//! emulator (no token).

use super::{Channel, FILE_NAME_ATTRIBUTE, Publisher, Topics};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the Pub/Sub publisher.
#[derive(Debug, Clone)]
pub struct PubSubConfig {
    /// Service base URL, e.g. "https://pubsub.googleapis.com" or the emulator.
    pub endpoint: String,

    /// Bearer token for the managed service.
    pub auth_token: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://pubsub.googleapis.com".to_string(),
            auth_token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    messages: Vec<PubsubMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct PubsubMessage<'a> {
    data: String,
    attributes: HashMap<&'static str, &'a str>,
}

/// Publisher for the success and error topics of one project.
pub struct PubSubPublisher {
    client: reqwest::Client,
    config: PubSubConfig,
    topics: Topics,
}

impl PubSubPublisher {
    pub fn new(config: PubSubConfig, topics: Topics) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        tracing::info!(
            endpoint = %config.endpoint,
            success_topic = %topics.success,
            error_topic = %topics.error,
            "Pub/Sub publisher initialized"
        );

        Ok(Self {
            client,
            config,
            topics,
        })
    }

    fn publish_url(&self, channel: Channel) -> String {
        format!(
            "{}/v1/{}:publish",
            self.config.endpoint.trim_end_matches('/'),
            self.topics.topic(channel)
        )
    }
}

fn encode_request<'a>(payload: &[u8], file_name: &'a str) -> PublishRequest<'a> {
    PublishRequest {
        messages: vec![PubsubMessage {
            data: BASE64.encode(payload),
            attributes: HashMap::from([(FILE_NAME_ATTRIBUTE, file_name)]),
        }],
    }
}

#[async_trait]
impl Publisher for PubSubPublisher {
    async fn publish(&self, channel: Channel, payload: Vec<u8>, file_name: &str) -> Result<()> {
        let mut request = self
            .client
            .post(self.publish_url(channel))
            .json(&encode_request(&payload, file_name));
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Publish(format!(
                "{} returned HTTP {}: {}",
                self.topics.topic(channel),
                status,
                body
            )));
        }

        tracing::debug!("Published to {} for {}", self.topics.topic(channel), file_name);
        Ok(())
    }
}
