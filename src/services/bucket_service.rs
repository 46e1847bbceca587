//! BucketService: the bucket operations behind `/buckets/*`.
//!
//! Every call is a straight pass-through to a [`BucketProvider`] wrapped in
//! name validation and error translation. Nothing is cached and nothing is
//! retried; provider failures surface immediately.

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::{
    bucket_name::{self, BucketName},
    provider::{BucketProvider, ProviderError},
};

pub const DEFAULT_FOLDER_NAME: &str = "new-folder/";
const MAX_FOLDER_NAME_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("invalid bucket name `{name}`: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("invalid folder name `{name}`: {reason}")]
    InvalidFolderName { name: String, reason: String },
    #[error("bucket `{0}` already exists")]
    Conflict(String),
    #[error("bucket `{0}` not found")]
    NotFound(String),
    #[error("access to bucket `{0}` is forbidden")]
    Forbidden(String),
    #[error("{0}")]
    Provider(String),
}

pub type BucketResult<T> = Result<T, BucketError>;

impl From<ProviderError> for BucketError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::BucketAlreadyExists(name)
            | ProviderError::BucketAlreadyOwnedByYou(name) => BucketError::Conflict(name),
            ProviderError::NoSuchBucket(name) => BucketError::NotFound(name),
            ProviderError::AccessDenied(name) => BucketError::Forbidden(name),
            other => BucketError::Provider(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedBucket {
    pub bucket_name: BucketName,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedBucketWithFolder {
    pub bucket_name: BucketName,
    pub region: String,
    pub folder_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketDetails {
    pub bucket_name: BucketName,
    pub region: String,
}

#[derive(Clone)]
pub struct BucketService {
    provider: Arc<dyn BucketProvider>,
    default_region: String,
    rollback_on_folder_failure: bool,
}

impl BucketService {
    pub fn new(provider: Arc<dyn BucketProvider>, default_region: impl Into<String>) -> Self {
        Self {
            provider,
            default_region: default_region.into(),
            rollback_on_folder_failure: false,
        }
    }

    /// Delete the bucket again when its folder marker cannot be written.
    pub fn with_rollback_on_folder_failure(mut self, enabled: bool) -> Self {
        self.rollback_on_folder_failure = enabled;
        self
    }

    pub fn provider(&self) -> &Arc<dyn BucketProvider> {
        &self.provider
    }

    pub async fn list(&self) -> BucketResult<Vec<String>> {
        let names = self.provider.list_buckets().await.map_err(|err| {
            warn!("listing buckets failed: {}", err);
            BucketError::Provider(err.to_string())
        })?;
        info!(count = names.len(), "listed buckets");
        Ok(names)
    }

    /// Create a bucket, generating a name when none is supplied.
    ///
    /// Repeating a create with the same explicit name yields `Conflict`.
    pub async fn create(
        &self,
        name: Option<&str>,
        region: Option<&str>,
    ) -> BucketResult<CreatedBucket> {
        let bucket_name = match name {
            Some(name) => BucketName::parse(name)?,
            None => bucket_name::generate_default(),
        };
        let requested = region.unwrap_or(self.default_region.as_str());

        match self
            .provider
            .create_bucket(bucket_name.as_str(), requested)
            .await
        {
            Ok(region) => {
                info!(bucket = %bucket_name, region = %region, "created bucket");
                Ok(CreatedBucket {
                    bucket_name,
                    region,
                })
            }
            Err(err) => {
                warn!(bucket = %bucket_name, region = %requested, "create bucket failed: {}", err);
                Err(err.into())
            }
        }
    }

    /// Create a bucket and seed it with a zero-length folder marker.
    ///
    /// The marker is only written after a successful create. If the marker
    /// write fails the bucket is left in place unless rollback is enabled;
    /// either way the caller gets an error describing what happened.
    pub async fn create_with_folder(
        &self,
        name: Option<&str>,
        region: Option<&str>,
        folder_name: Option<&str>,
    ) -> BucketResult<CreatedBucketWithFolder> {
        let folder_name = normalize_folder_name(folder_name.unwrap_or(DEFAULT_FOLDER_NAME))?;
        let created = self.create(name, region).await?;

        if let Err(err) = self
            .provider
            .put_object(created.bucket_name.as_str(), &folder_name, Bytes::new())
            .await
        {
            warn!(
                bucket = %created.bucket_name,
                folder = %folder_name,
                "folder marker write failed: {}",
                err
            );
            let outcome = self.after_folder_failure(&created.bucket_name).await;
            return Err(BucketError::Provider(format!(
                "bucket `{}` was created but folder `{}` could not be written ({}); {}",
                created.bucket_name, folder_name, err, outcome
            )));
        }

        info!(bucket = %created.bucket_name, folder = %folder_name, "created folder marker");
        Ok(CreatedBucketWithFolder {
            bucket_name: created.bucket_name,
            region: created.region,
            folder_name,
        })
    }

    /// Validate the name, then ask the provider whether it exists and is ours.
    pub async fn get_details(&self, name: &str) -> BucketResult<BucketDetails> {
        let bucket_name = BucketName::parse(name)?;
        let region = self
            .provider
            .head_bucket(bucket_name.as_str())
            .await
            .map_err(|err| {
                warn!(bucket = %bucket_name, "head bucket failed: {}", err);
                BucketError::from(err)
            })?;
        Ok(BucketDetails {
            bucket_name,
            region,
        })
    }

    async fn after_folder_failure(&self, bucket: &BucketName) -> String {
        if !self.rollback_on_folder_failure {
            return "the bucket was kept".into();
        }
        match self.provider.delete_bucket(bucket.as_str()).await {
            Ok(()) => {
                info!(bucket = %bucket, "rolled back bucket after folder failure");
                "the bucket was rolled back".into()
            }
            Err(err) => {
                warn!(bucket = %bucket, "rollback failed: {}", err);
                format!("rollback failed ({err}), the bucket still exists")
            }
        }
    }
}

/// Folder keys must be relative, traversal-free, and end in `/` so consoles
/// render them as folders.
fn normalize_folder_name(raw: &str) -> BucketResult<String> {
    let invalid = |reason: &str| BucketError::InvalidFolderName {
        name: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.is_empty() || raw == "/" {
        return Err(invalid("must not be empty"));
    }
    if raw.starts_with('/') {
        return Err(invalid("must not start with `/`"));
    }
    if raw.contains("..") || raw.chars().any(|c| c.is_control() || c == '\\') {
        return Err(invalid("contains forbidden characters"));
    }

    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    // The bound applies to the stored key, trailing `/` included.
    if normalized.len() > MAX_FOLDER_NAME_LEN {
        return Err(invalid("is too long"));
    }
    Ok(normalized)
}
