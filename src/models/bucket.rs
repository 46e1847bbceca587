//! Represents a bucket as recorded by the local provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A storage bucket owned by some provider account.
///
/// The gateway itself never persists buckets; only the local provider keeps
/// these rows, standing in for a hosted object store.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bucket {
    /// Unique identifier for this bucket (UUID for internal DB use).
    pub id: Uuid,

    /// Globally unique bucket name.
    pub name: String,

    /// Account that created the bucket. Other accounts are denied access.
    pub owner_id: String,

    /// Region where the bucket is hosted (e.g. "us-west-2").
    pub region: String,

    /// When this bucket was created.
    pub created_at: DateTime<Utc>,
}
