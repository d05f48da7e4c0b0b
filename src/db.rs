use std::io::ErrorKind;
use std::path::PathBuf;

use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::SchedulerResult;

/// Durable storage of serialized blobs under well-known keys.
#[allow(async_fn_in_trait)]
pub trait BlobStore {
    async fn load(&self, key: &str) -> SchedulerResult<Option<String>>;
    async fn save(&self, key: &str, value: &str) -> SchedulerResult<()>;
    async fn delete(&self, key: &str) -> SchedulerResult<()>;
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgBlobStore {
    pool: PgPool,
}

impl PgBlobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl BlobStore for PgBlobStore {
    async fn load(&self, key: &str) -> SchedulerResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM ecs_scheduler.kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get("value")))
    }

    async fn save(&self, key: &str, value: &str) -> SchedulerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ecs_scheduler.kv_store (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        debug!(key, bytes = value.len(), "Saved blob to Postgres");
        Ok(())
    }

    async fn delete(&self, key: &str) -> SchedulerResult<()> {
        sqlx::query("DELETE FROM ecs_scheduler.kv_store WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// One `<key>.json` file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStore for FileBlobStore {
    async fn load(&self, key: &str) -> SchedulerResult<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No blob on disk");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, key: &str, value: &str) -> SchedulerResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, value).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        debug!(path = %path.display(), bytes = value.len(), "Saved blob to disk");
        Ok(())
    }

    async fn delete(&self, key: &str) -> SchedulerResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Backend picked at startup from configuration.
#[derive(Debug, Clone)]
pub enum StateBackend {
    Postgres(PgBlobStore),
    File(FileBlobStore),
}

impl BlobStore for StateBackend {
    async fn load(&self, key: &str) -> SchedulerResult<Option<String>> {
        match self {
            Self::Postgres(store) => store.load(key).await,
            Self::File(store) => store.load(key).await,
        }
    }

    async fn save(&self, key: &str, value: &str) -> SchedulerResult<()> {
        match self {
            Self::Postgres(store) => store.save(key, value).await,
            Self::File(store) => store.save(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> SchedulerResult<()> {
        match self {
            Self::Postgres(store) => store.delete(key).await,
            Self::File(store) => store.delete(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_round_trips_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("state"));

        assert_eq!(store.load("ecs_cluster_schedules").await.unwrap(), None);

        store.save("ecs_cluster_schedules", "{}").await.unwrap();
        store.save("ecs_cluster_schedules", r#"{"a":1}"#).await.unwrap();
        assert_eq!(
            store.load("ecs_cluster_schedules").await.unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert!(!dir.path().join("state/ecs_cluster_schedules.tmp").exists());

        store.delete("ecs_cluster_schedules").await.unwrap();
        store.delete("ecs_cluster_schedules").await.unwrap();
        assert_eq!(store.load("ecs_cluster_schedules").await.unwrap(), None);
    }
}
