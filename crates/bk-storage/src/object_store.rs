//! Object-store client contract and the S3 implementation.

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;

use bk_config::{resolve_credentials, RemoteConfig};

/// Minimal object-store surface the remote replicator consumes.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn put_object(&self, bucket: &str, key: &str, body: &Path) -> crate::Result<()>;
    async fn delete_object(&self, bucket: &str, key: &str) -> crate::Result<()>;
    async fn object_exists(&self, bucket: &str, key: &str) -> crate::Result<bool>;
}

/// S3-backed object store client.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Build a client from the remote config. Credentials resolve in the
    /// order config field, `S3_*` environment, `AWS_*` environment; missing
    /// credentials are fatal here.
    pub async fn connect(remote: &RemoteConfig) -> crate::Result<Self> {
        let credentials = resolve_credentials(remote)?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(aws_credential_types::Credentials::from_keys(
                credentials.access_key_id,
                credentials.secret_access_key,
                None,
            ));
        if let Some(region) = &remote.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &remote.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if remote.endpoint.is_some() {
            // Custom endpoints (minio et al.) want path-style addressing.
            builder = builder.force_path_style(true);
        }
        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
        })
    }
}

#[async_trait]
impl ObjectStoreClient for S3ObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: &Path) -> crate::Result<()> {
        let stream = ByteStream::from_path(body)
            .await
            .map_err(|e| crate::Error::backend(format!("failed to read {}: {}", body.display(), e)))?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(stream)
            .send()
            .await
            .map_err(|e| crate::Error::backend(format!("put {}/{}: {}", bucket, key, e)))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> crate::Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| crate::Error::backend(format!("delete {}/{}: {}", bucket, key, e)))?;
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> crate::Result<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(crate::Error::backend(format!(
                        "head {}/{}: {}",
                        bucket, key, service_err
                    )))
                }
            }
        }
    }
}
