//! S3-compatible object store client.

use super::{ObjectStore, StoreError};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::SdkError;

/// Object store backed by `aws-sdk-s3`.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS credential/region chain.
    ///
    /// `endpoint` overrides the service URL for S3-compatible stores; path
    /// style addressing is forced in that case since most of them do not
    /// serve virtual-host buckets.
    pub async fn from_env(endpoint: Option<&str>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&config);
        if let Some(endpoint) = endpoint {
            tracing::info!("Using S3 endpoint override {}", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(S3Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| map_s3_error(e, bucket, name))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Fetch {
                bucket: bucket.to_string(),
                name: name.to_string(),
                reason: format!("failed to read body: {e}"),
            })?
            .into_bytes()
            .to_vec();

        tracing::debug!("Downloaded {} bytes from {}/{}", bytes.len(), bucket, name);
        Ok(bytes)
    }
}

/// Map an SDK error, turning HTTP 404 into [`StoreError::NotFound`].
fn map_s3_error<E: std::fmt::Debug>(err: SdkError<E>, bucket: &str, name: &str) -> StoreError {
    let reason = match &err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            if status == 404 {
                return StoreError::NotFound {
                    bucket: bucket.to_string(),
                    name: name.to_string(),
                };
            }
            format!("HTTP {status}: {:?}", service_err.err())
        }
        SdkError::TimeoutError(_) => "request timed out".to_string(),
        SdkError::DispatchFailure(_) => format!("connection error: {err:?}"),
        _ => format!("{err:?}"),
    };

    StoreError::Fetch {
        bucket: bucket.to_string(),
        name: name.to_string(),
        reason,
    }
}
