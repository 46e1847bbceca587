//! The seam between the gateway and whatever actually hosts buckets.
//!
//! Error variants follow the codes an S3-style service reports so the
//! facade can translate them without knowing which backend answered.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("bucket `{0}` is already owned by you")]
    BucketAlreadyOwnedByYou(String),
    #[error("bucket `{0}` does not exist")]
    NoSuchBucket(String),
    #[error("access denied to bucket `{0}`")]
    AccessDenied(String),
    #[error("bucket `{0}` is not empty")]
    BucketNotEmpty(String),
    #[error("region `{0}` is not supported")]
    InvalidLocationConstraint(String),
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[async_trait]
pub trait BucketProvider: Send + Sync {
    /// Names of buckets visible to this account.
    async fn list_buckets(&self) -> ProviderResult<Vec<String>>;

    /// Create a bucket; yields the region as the provider recorded it.
    async fn create_bucket(&self, name: &str, region: &str) -> ProviderResult<String>;

    /// Existence/access probe; yields the bucket's region.
    async fn head_bucket(&self, name: &str) -> ProviderResult<String>;

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> ProviderResult<()>;

    /// Remove an empty bucket.
    async fn delete_bucket(&self, name: &str) -> ProviderResult<()>;

    /// Cheap readiness probe.
    async fn health_check(&self) -> ProviderResult<()>;
}
