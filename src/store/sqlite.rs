use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{migrate::MigrateDatabase, Row};
use tracing::{debug, info};

use super::traits::{BatchStore, ConditionalWrite, Mutation};
use crate::batch::{BatchRecord, BatchStatus};
use crate::error::{LifecycleError, StoreError};

/// Optimistic write attempts before a contended update gives up.
const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// SQLite-backed batch store.
///
/// Each batch is one row holding the JSON document plus the columns needed for
/// lookups. Writes are compare-and-set on the `version` column: a writer re-reads
/// and retries when another writer got there first, so a status precondition is
/// always evaluated against the row that actually gets replaced. The same statement
/// refuses a unit or label id that already names another batch.
pub struct SqliteBatchStore {
    pool: SqlitePool,
    max_attempts: u32,
}

impl SqliteBatchStore {
    /// Open (creating if needed) the database and optionally run migrations.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> Result<Self, LifecycleError> {
        if !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            info!("Database migrations completed");
        }

        Ok(Self {
            pool,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<BatchRecord, LifecycleError> {
        let document: String = row.get("document");
        let version: i64 = row.get("version");
        let mut record: BatchRecord =
            serde_json::from_str(&document).map_err(StoreError::from)?;
        record.version = version as u64;
        Ok(record)
    }

    /// The other batch already answering to `id`, as a batch, unit or label id.
    async fn claimed_by(&self, batch_id: &str, id: &str) -> Result<Option<String>, LifecycleError> {
        let owner: Option<String> = sqlx::query_scalar(
            r#"
            SELECT batch_id FROM batches
            WHERE batch_id != ?1 AND (batch_id = ?2 OR unit_id = ?2 OR label_id = ?2)
            LIMIT 1
            "#,
        )
        .bind(batch_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner)
    }

    async fn ensure_unclaimed(&self, record: &BatchRecord, ids: &[String]) -> Result<(), LifecycleError> {
        for id in ids {
            if let Some(owner) = self.claimed_by(&record.batch_id, id).await? {
                return Err(LifecycleError::conflict(format!(
                    "unit id {id} is already used by batch {owner}"
                )));
            }
        }
        Ok(())
    }

    async fn write(
        &self,
        batch_id: &str,
        expected: Option<BatchStatus>,
        mutation: Mutation<'_>,
    ) -> Result<ConditionalWrite, LifecycleError> {
        for attempt in 1..=self.max_attempts {
            let current = self.get(batch_id).await?;
            if let Some(expected) = expected {
                if current.status != expected {
                    return Ok(ConditionalWrite::StatusMismatch {
                        actual: current.status,
                    });
                }
            }

            let mut next = current.clone();
            mutation(&mut next)?;
            next.version = current.version + 1;
            let unit_id = next.packaging_record.as_ref().map(|p| p.unit_id.clone());
            let label_id = next.manufacturer_assignment.as_ref().map(|m| m.label_id.clone());
            let ids: Vec<String> = unit_id.iter().chain(label_id.iter()).cloned().collect();
            self.ensure_unclaimed(&next, &ids).await?;
            let document = serde_json::to_string(&next).map_err(StoreError::from)?;

            let result = sqlx::query(
                r#"
                UPDATE batches
                SET status = ?1, unit_id = ?2, label_id = ?3, version = ?4, document = ?5
                WHERE batch_id = ?6 AND version = ?7
                  AND NOT EXISTS (
                      SELECT 1 FROM batches AS other
                      WHERE other.batch_id != ?6
                        AND (other.batch_id IN (?2, ?3)
                             OR other.unit_id IN (?2, ?3)
                             OR other.label_id IN (?2, ?3))
                  )
                "#,
            )
            .bind(next.status.to_string())
            .bind(unit_id)
            .bind(label_id)
            .bind(next.version as i64)
            .bind(document)
            .bind(batch_id)
            .bind(current.version as i64)
            .execute(&self.pool)
            .await;
            let result = match result {
                Ok(result) => result,
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    return Err(LifecycleError::conflict(format!(
                        "unit id of batch {batch_id} is already in use"
                    )))
                }
                Err(e) => return Err(e.into()),
            };

            if result.rows_affected() == 1 {
                return Ok(ConditionalWrite::Applied(next));
            }
            debug!(batch_id = %batch_id, attempt, "Version moved underneath write, retrying");
        }

        Err(StoreError::Contention {
            id: batch_id.to_string(),
            attempts: self.max_attempts,
        }
        .into())
    }
}

#[async_trait]
impl BatchStore for SqliteBatchStore {
    async fn insert(&self, record: BatchRecord) -> Result<BatchRecord, LifecycleError> {
        let mut ids = vec![record.batch_id.clone()];
        ids.extend(record.packaging_record.iter().map(|p| p.unit_id.clone()));
        ids.extend(record.manufacturer_assignment.iter().map(|m| m.label_id.clone()));
        self.ensure_unclaimed(&record, &ids).await?;

        let document = serde_json::to_string(&record).map_err(StoreError::from)?;
        let result = sqlx::query(
            r#"
            INSERT INTO batches (batch_id, status, unit_id, label_id, version, document, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.batch_id)
        .bind(record.status.to_string())
        .bind(record.packaging_record.as_ref().map(|p| p.unit_id.clone()))
        .bind(record.manufacturer_assignment.as_ref().map(|m| m.label_id.clone()))
        .bind(record.version as i64)
        .bind(document)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                LifecycleError::conflict(format!(
                    "batch {} or one of its unit ids already exists",
                    record.batch_id
                )),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, batch_id: &str) -> Result<BatchRecord, LifecycleError> {
        let row = sqlx::query("SELECT document, version FROM batches WHERE batch_id = ?1")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::decode(&row),
            None => Err(LifecycleError::batch_not_found(batch_id)),
        }
    }

    async fn find_by_unit_id(&self, unit_id: &str) -> Result<Option<BatchRecord>, LifecycleError> {
        let row = sqlx::query(
            r#"
            SELECT document, version
            FROM batches
            WHERE unit_id = ?1 OR label_id = ?1
            ORDER BY unit_id IS NULL
            LIMIT 1
            "#,
        )
        .bind(unit_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn list(&self, status: Option<BatchStatus>) -> Result<Vec<BatchRecord>, LifecycleError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    r#"
                    SELECT document, version FROM batches
                    WHERE status = ?1
                    ORDER BY created_at ASC, batch_id ASC
                    "#,
                )
                .bind(status.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT document, version FROM batches ORDER BY created_at ASC, batch_id ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::decode).collect()
    }

    async fn update(
        &self,
        batch_id: &str,
        mutation: Mutation<'_>,
    ) -> Result<BatchRecord, LifecycleError> {
        match self.write(batch_id, None, mutation).await? {
            ConditionalWrite::Applied(record) => Ok(record),
            ConditionalWrite::StatusMismatch { actual } => Err(StoreError::Backend(format!(
                "unconditional write on {batch_id} reported a status mismatch ({actual})"
            ))
            .into()),
        }
    }

    async fn update_if(
        &self,
        batch_id: &str,
        expected: BatchStatus,
        mutation: Mutation<'_>,
    ) -> Result<ConditionalWrite, LifecycleError> {
        self.write(batch_id, Some(expected), mutation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ActorRef;
    use std::sync::Arc;

    async fn store() -> (tempfile::TempDir, SqliteBatchStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("herbtrace.db").display());
        let store = SqliteBatchStore::connect(&url, 4, true).await.unwrap();
        (dir, store)
    }

    fn record(batch_id: &str) -> BatchRecord {
        BatchRecord::new(
            batch_id.to_string(),
            "Turmeric".to_string(),
            "Erode".to_string(),
            ActorRef {
                actor_id: "C-1".to_string(),
                actor_name: "Ravi".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_document_round_trip_and_duplicate_insert() {
        let (_dir, store) = store().await;
        store.insert(record("B1")).await.unwrap();
        let fetched = store.get("B1").await.unwrap();
        assert_eq!(fetched.herb_name, "Turmeric");

        let err = store.insert(record("B1")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Conflict { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_conditional_writes_have_one_winner() {
        let (_dir, store) = store().await;
        let store = Arc::new(store);
        let mut seeded = record("B1");
        seeded.status = BatchStatus::TestingAssigned;
        store.insert(seeded).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let tester = format!("T-{i}");
                store
                    .update_if("B1", BatchStatus::TestingAssigned, &|r| {
                        r.status = BatchStatus::TestingInProgress;
                        r.lab_assignment = Some(crate::batch::LabAssignment {
                            tester_id: tester.clone(),
                            tester_name: tester.clone(),
                            accepted_at: chrono::Utc::now(),
                        });
                        Ok(())
                    })
                    .await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if let ConditionalWrite::Applied(_) = handle.await.unwrap().unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(store.get("B1").await.unwrap().version, 1);
    }

    fn package(unit_id: &str) -> impl Fn(&mut BatchRecord) -> Result<(), LifecycleError> + Send + Sync + '_ {
        move |r| {
            r.packaging_record = Some(crate::batch::PackagingRecord {
                unit_id: unit_id.to_string(),
                packaging_batch_number: "PKG-1".to_string(),
                barcode: None,
                packaged_at: chrono::Utc::now(),
            });
            r.status = BatchStatus::Packaged;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unit_id_cannot_be_reused_or_shadow_a_batch_id() {
        let (_dir, store) = store().await;
        store.insert(record("B1")).await.unwrap();
        store.insert(record("B2")).await.unwrap();
        store.update("B1", &package("UNIT-1")).await.unwrap();

        let err = store.update("B2", &package("UNIT-1")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Conflict { .. }));
        let err = store.update("B2", &package("B1")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Conflict { .. }));

        let untouched = store.get("B2").await.unwrap();
        assert!(untouched.packaging_record.is_none());
        assert_eq!(untouched.version, 0);
        assert_eq!(
            store.find_by_unit_id("UNIT-1").await.unwrap().unwrap().batch_id,
            "B1"
        );
    }
}
