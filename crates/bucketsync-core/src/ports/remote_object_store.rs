//! Remote object-store port (driven/secondary port)
//!
//! The remote object-store client library itself lives outside this crate;
//! this trait is the interface the bucket engine is written against. The
//! concrete adapter (`bucketsync-remote::S3ObjectStore`) implements it.

use crate::domain::newtypes::{BucketName, RemoteKey};

/// Port trait for the remote object-store collaborator.
///
/// Narrowed to what a PUT/HEAD/region-discovery upload workflow needs.
#[async_trait::async_trait]
pub trait RemoteObjectStore: Send + Sync {
    /// Uploads `bytes` to `bucket` under `key`, overwriting any existing
    /// object at that key.
    ///
    /// # Errors
    /// Returns an error on any network or remote failure.
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &RemoteKey,
        bytes: Vec<u8>,
    ) -> anyhow::Result<()>;

    /// Issues a metadata HEAD for `key` in `bucket`.
    ///
    /// Returns `Ok(true)` if the object exists, `Ok(false)` if the remote
    /// reports it absent. Any thrown error is treated by the caller as
    /// `exists = false`, so this trait is free to surface errors directly
    /// rather than pre-collapsing them.
    ///
    /// # Errors
    /// Returns an error on any network or remote failure other than a
    /// clean "not found" response.
    async fn head_object(&self, bucket: &BucketName, key: &RemoteKey) -> anyhow::Result<bool>;

    /// Resolves the remote region hosting `bucket_name`.
    ///
    /// # Errors
    /// Returns an error if the bucket cannot be located or the lookup
    /// fails.
    async fn bucket_region(&self, bucket_name: &BucketName) -> anyhow::Result<String>;

    /// Lists the names of buckets visible to the configured credentials.
    ///
    /// # Errors
    /// Returns an error on any network or remote failure.
    async fn list_buckets(&self) -> anyhow::Result<Vec<String>>;
}
