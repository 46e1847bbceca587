//! HTTP handlers for the bucket routes. Each one is a thin adapter over
//! `BucketService`; all of them sit behind the bearer-token gate.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    errors::AppError,
    middleware::auth::AuthenticatedSubject,
    services::bucket_service::{
        BucketDetails, BucketService, CreatedBucket, CreatedBucketWithFolder,
    },
};

/// Query params for both create routes. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct CreateBucketQuery {
    pub bucket_name: Option<String>,
    pub region: Option<String>,
    pub folder_name: Option<String>,
}

impl CreateBucketQuery {
    fn bucket_name(&self) -> Option<&str> {
        non_empty(&self.bucket_name)
    }

    fn region(&self) -> Option<&str> {
        non_empty(&self.region)
    }

    fn folder_name(&self) -> Option<&str> {
        non_empty(&self.folder_name)
    }
}

/// Success body: a human-readable message next to the operation's result.
#[derive(Debug, Serialize)]
pub struct WithMessage<T> {
    pub message: &'static str,
    #[serde(flatten)]
    pub body: T,
}

/// GET `/buckets/`: names of all buckets visible to the provider account.
pub async fn list_buckets(
    State(service): State<BucketService>,
    Extension(subject): Extension<AuthenticatedSubject>,
) -> Result<Json<Vec<String>>, AppError> {
    info!(subject = %subject.0, "list buckets");
    Ok(Json(service.list().await?))
}

/// POST `/buckets/create?bucket_name=&region=`
pub async fn create_bucket(
    State(service): State<BucketService>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Query(q): Query<CreateBucketQuery>,
) -> Result<(StatusCode, Json<WithMessage<CreatedBucket>>), AppError> {
    info!(subject = %subject.0, bucket = ?q.bucket_name(), "create bucket");
    let created = service.create(q.bucket_name(), q.region()).await?;
    Ok((
        StatusCode::CREATED,
        Json(WithMessage {
            message: "Bucket created successfully",
            body: created,
        }),
    ))
}

/// POST `/buckets/create-with-folder?bucket_name=&region=&folder_name=`
pub async fn create_bucket_with_folder(
    State(service): State<BucketService>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Query(q): Query<CreateBucketQuery>,
) -> Result<(StatusCode, Json<WithMessage<CreatedBucketWithFolder>>), AppError> {
    info!(subject = %subject.0, bucket = ?q.bucket_name(), "create bucket with folder");
    let created = service
        .create_with_folder(q.bucket_name(), q.region(), q.folder_name())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(WithMessage {
            message: "Bucket and folder created successfully",
            body: created,
        }),
    ))
}

/// GET `/buckets/{bucket_name}`
pub async fn get_bucket_details(
    State(service): State<BucketService>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path(bucket_name): Path<String>,
) -> Result<Json<WithMessage<BucketDetails>>, AppError> {
    info!(subject = %subject.0, bucket = %bucket_name, "get bucket details");
    let details = service.get_details(&bucket_name).await?;
    Ok(Json(WithMessage {
        message: "Bucket details retrieved successfully",
        body: details,
    }))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
