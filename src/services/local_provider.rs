//! src/services/local_provider.rs
//!
//! LocalProvider: a self-hosted stand-in for a hosted object store. Bucket
//! and object metadata live in SQLite; object payloads live on disk sharded
//! beneath `base_path/{bucket}/{shard}/{shard}/{md5(key)}`.
//!
//! The provider acts on behalf of a single account. Buckets created by a
//! different account share the global namespace but are access-denied.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::provider::{BucketProvider, ProviderError, ProviderResult};
use crate::models::{bucket::Bucket, object::Object};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");
const MAX_OBJECT_KEY_LEN: usize = 1024;
const SUPPORTED_REGIONS: [&str; 16] = [
    "local",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "ap-southeast-1",
    "ap-northeast-1",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-northeast-2",
    "ap-northeast-3",
    "me-south-1",
];

#[derive(Clone)]
pub struct LocalProvider {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// Account every call is made as.
    pub account_id: String,
}

impl LocalProvider {
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            account_id: account_id.into(),
        }
    }

    /// Open (creating if needed) the metadata database and payload directory.
    pub async fn connect(
        database_url: &str,
        base_path: impl Into<PathBuf>,
        account_id: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
            info!("Created storage directory at {}", base_path.display());
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
                info!("Created missing directory {:?}", parent);
            }
        }
        debug!("Connecting to provider metadata at {}", database_url);

        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self::new(Arc::new(db), base_path, account_id))
    }

    /// Apply the embedded schema. Statements are idempotent.
    pub async fn migrate(&self) -> ProviderResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        info!("Running {} migration statements...", statements.len());
        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    fn ensure_key_safe(&self, key: &str) -> ProviderResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.contains("..")
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\');
        if invalid {
            return Err(ProviderError::InvalidObjectKey(key.to_string()));
        }
        Ok(())
    }

    /// Case-insensitive match against SUPPORTED_REGIONS.
    fn ensure_region_valid(&self, region: &str) -> ProviderResult<()> {
        if SUPPORTED_REGIONS
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(region))
        {
            Ok(())
        } else {
            Err(ProviderError::InvalidLocationConstraint(region.to_string()))
        }
    }

    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// Payload path for an object. Keys may end in `/` (folder markers), so
    /// the file is named by the key's digest rather than the key itself.
    fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        let mut path = self.bucket_root(bucket_name);
        path.push(format!("{:02x}", digest[0]));
        path.push(format!("{:02x}", digest[1]));
        path.push(format!("{:x}", digest));
        path
    }

    async fn find_bucket(&self, name: &str) -> ProviderResult<Option<Bucket>> {
        let bucket = sqlx::query_as::<_, Bucket>(
            "SELECT id, name, owner_id, region, created_at FROM buckets WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&*self.db)
        .await?;
        Ok(bucket)
    }

    /// Fetch a bucket this account may act on.
    async fn owned_bucket(&self, name: &str) -> ProviderResult<Bucket> {
        match self.find_bucket(name).await? {
            None => Err(ProviderError::NoSuchBucket(name.to_string())),
            Some(bucket) if bucket.owner_id != self.account_id => {
                Err(ProviderError::AccessDenied(name.to_string()))
            }
            Some(bucket) => Ok(bucket),
        }
    }

    /// Name already taken: tell our own buckets apart from someone else's.
    async fn conflict_for(&self, name: &str) -> ProviderError {
        match self.find_bucket(name).await {
            Ok(Some(existing)) if existing.owner_id == self.account_id => {
                ProviderError::BucketAlreadyOwnedByYou(name.to_string())
            }
            _ => ProviderError::BucketAlreadyExists(name.to_string()),
        }
    }

    /// Write bytes to a temp file beside `path`, fsync, then rename into place.
    async fn write_payload(path: &Path, body: &[u8]) -> ProviderResult<()> {
        let parent = path.parent().map(Path::to_path_buf).ok_or_else(|| {
            std::io::Error::other("object path missing parent directory")
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(body).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, path).await
        }
        .await;

        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }
}

#[async_trait]
impl BucketProvider for LocalProvider {
    async fn list_buckets(&self) -> ProviderResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM buckets WHERE owner_id = ? ORDER BY name ASC",
        )
        .bind(&self.account_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(names)
    }

    /// Insert the bucket row, then create its directory. The UNIQUE
    /// constraint on `name` arbitrates concurrent creates.
    async fn create_bucket(&self, name: &str, region: &str) -> ProviderResult<String> {
        let region = region.to_lowercase();
        self.ensure_region_valid(&region)?;

        let bucket = Bucket {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id: self.account_id.clone(),
            region,
            created_at: Utc::now(),
        };

        let inserted = sqlx::query(
            "INSERT INTO buckets (id, name, owner_id, region, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(bucket.id)
        .bind(&bucket.name)
        .bind(&bucket.owner_id)
        .bind(&bucket.region)
        .bind(bucket.created_at)
        .execute(&*self.db)
        .await;

        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => return Err(self.conflict_for(name).await),
            Err(err) => return Err(err.into()),
        }

        if let Err(err) = fs::create_dir_all(self.bucket_root(name)).await {
            let _ = sqlx::query("DELETE FROM buckets WHERE id = ?")
                .bind(bucket.id)
                .execute(&*self.db)
                .await;
            return Err(err.into());
        }

        Ok(bucket.region)
    }

    async fn head_bucket(&self, name: &str) -> ProviderResult<String> {
        Ok(self.owned_bucket(name).await?.region)
    }

    /// Upsert an object: payload first, then the metadata row.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> ProviderResult<()> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.owned_bucket(bucket).await?;

        let file_path = self.object_path(&bucket_rec.name, key);
        Self::write_payload(&file_path, &body).await?;

        let etag = format!("{:x}", md5::compute(&body));
        let upserted = sqlx::query_as::<_, Object>(
            r#"
            INSERT INTO objects (id, bucket_id, key, size_bytes, etag, last_modified)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket_id, key) DO UPDATE SET
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            RETURNING id, bucket_id, key, size_bytes, etag, last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bucket_rec.id)
        .bind(key)
        .bind(body.len() as i64)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        let object = match upserted {
            Ok(object) => object,
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                return Err(err.into());
            }
        };
        debug!(
            bucket,
            key = %object.key,
            size = object.size_bytes,
            etag = %object.etag,
            "stored object"
        );
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> ProviderResult<()> {
        let bucket = self.owned_bucket(name).await?;

        let objects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM objects WHERE bucket_id = ?")
            .bind(bucket.id)
            .fetch_one(&*self.db)
            .await?;
        if objects > 0 {
            return Err(ProviderError::BucketNotEmpty(name.to_string()));
        }

        sqlx::query("DELETE FROM buckets WHERE id = ?")
            .bind(bucket.id)
            .execute(&*self.db)
            .await?;

        let bucket_path = self.bucket_root(name);
        if let Err(err) = fs::remove_dir_all(&bucket_path).await {
            if err.kind() != ErrorKind::NotFound {
                debug!(
                    "failed to remove bucket directory {} after delete: {}",
                    bucket_path.display(),
                    err
                );
            }
        }
        Ok(())
    }

    /// SQLite round trip plus a write/read/delete under `base_path`.
    async fn health_check(&self) -> ProviderResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;

        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let read_back = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        if read_back? != b"readyz" {
            return Err(std::io::Error::new(ErrorKind::InvalidData, "file content mismatch").into());
        }
        Ok(())
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
