//! bucketsync-remote — S3-compatible adapter for `bucketsync_core::ports::RemoteObjectStore`
//!
//! This crate supplies the one concrete adapter a runnable daemon needs.
//! Credentials are sourced exclusively from `AWS_ACCESS_KEY_ID` /
//! `AWS_SECRET_ACCESS_KEY` — no other part of the default AWS credential
//! chain is consulted; this daemon's only interface to credentials is the
//! two named environment variables.

use anyhow::{Context, Result};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use bucketsync_core::domain::newtypes::{BucketName, RemoteKey};
use bucketsync_core::ports::RemoteObjectStore;

/// Credential source for [`S3ObjectStore::new`]: the two AWS environment
/// variables, nothing else.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    /// `AWS_ACCESS_KEY_ID`.
    pub access_key_id: String,
    /// `AWS_SECRET_ACCESS_KEY`.
    pub secret_access_key: String,
}

impl EnvCredentials {
    /// Reads both required environment variables.
    ///
    /// # Errors
    /// Returns an error naming whichever variable is missing.
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID is not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY is not set")?;
        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }
}

/// `RemoteObjectStore` adapter backed by `aws-sdk-s3`.
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Builds a client from explicit credentials, with no further lookup
    /// against the ambient AWS credential chain (profile files, IMDS, SSO,
    /// ...) beyond what `aws-config` needs for region resolution.
    pub async fn new(credentials: EnvCredentials) -> Self {
        let creds = Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            None,
            None,
            "bucketsync-env",
        );
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(creds)
            .load()
            .await;
        Self {
            client: Client::new(&config),
        }
    }

    /// Wraps an already-constructed client (used by tests against a local
    /// S3-compatible endpoint).
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RemoteObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &RemoteKey,
        bytes: Vec<u8>,
    ) -> Result<()> {
        debug!(bucket = %bucket, key = %key, size = bytes.len(), "put_object");
        self.client
            .put_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .body(ByteStream::from(bytes))
            .send()
            .await
            .with_context(|| format!("PUT {key} to bucket {bucket} failed"))?;
        Ok(())
    }

    async fn head_object(&self, bucket: &BucketName, key: &RemoteKey) -> Result<bool> {
        debug!(bucket = %bucket, key = %key, "head_object");
        match self
            .client
            .head_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err)) if service_err.err().is_not_found() => {
                Ok(false)
            }
            Err(err) => {
                Err(anyhow::Error::new(err).context(format!("HEAD {key} in bucket {bucket} failed")))
            }
        }
    }

    async fn bucket_region(&self, bucket_name: &BucketName) -> Result<String> {
        let output = self
            .client
            .get_bucket_location()
            .bucket(bucket_name.as_str())
            .send()
            .await
            .with_context(|| format!("region lookup for bucket {bucket_name} failed"))?;

        Ok(output
            .location_constraint()
            .map(|c| c.as_str().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "us-east-1".to_string()))
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .context("list_buckets failed")?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `std::env` is process-global; serialize tests that mutate it so they
    // don't race each other under the default multi-threaded test runner.
    static ENV_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn from_env_reads_both_variables() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("AWS_ACCESS_KEY_ID", "AKIAEXAMPLE");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "secretexample");

        let creds = EnvCredentials::from_env().unwrap();
        assert_eq!(creds.access_key_id, "AKIAEXAMPLE");
        assert_eq!(creds.secret_access_key, "secretexample");

        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");
    }

    #[test]
    fn from_env_errors_when_access_key_missing() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "secretexample");

        assert!(EnvCredentials::from_env().is_err());

        std::env::remove_var("AWS_SECRET_ACCESS_KEY");
    }
}
