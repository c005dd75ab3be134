use crate::error::TransitError;
use crate::store::EntityKind;
use crate::store::schema::SQLITE_INIT;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

/// Secondary local store: entity-indexed collections in SQLite. Authoritative
/// for passenger records, whose embedded QR payloads can exceed the primary
/// store's quota.
#[derive(Clone)]
pub struct CollectionStorage {
    pool: SqlitePool,
}

impl CollectionStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database behind `database_url`. Open
    /// failures surface as explicit errors, never as an empty store.
    pub async fn connect(database_url: &str) -> Result<Self, TransitError> {
        let connect_opts =
            SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), TransitError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Replace the whole collection in one transaction: delete-then-insert,
    /// so saving the same collection twice produces the same readable state.
    pub async fn replace_collection(
        &self,
        entity: EntityKind,
        rows: &[(String, String)],
    ) -> Result<(), TransitError> {
        let key = entity.storage_key();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM collections WHERE entity = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        for (position, (record_id, body)) in rows.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO collections (entity, record_id, body, position)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(entity, record_id) DO UPDATE SET
                    body=excluded.body,
                    position=excluded.position
                "#,
            )
            .bind(key)
            .bind(record_id)
            .bind(body)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO collection_marks (entity, written_at) VALUES (?, ?)
            ON CONFLICT(entity) DO UPDATE SET written_at=excluded.written_at
            "#,
        )
        .bind(key)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// `Ok(None)` means the entity was never written here, distinct from an
    /// empty collection, so callers do not mistake a populated mirror for
    /// "no data yet".
    pub async fn load_collection(
        &self,
        entity: EntityKind,
    ) -> Result<Option<Vec<String>>, TransitError> {
        let key = entity.storage_key();

        let mark: Option<(String,)> =
            sqlx::query_as("SELECT written_at FROM collection_marks WHERE entity = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        if mark.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT body FROM collections WHERE entity = ? ORDER BY position",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        let bodies = rows
            .into_iter()
            .map(|row| row.try_get::<String, _>("body"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(bodies))
    }

    /// Drop the collection and its written mark.
    pub async fn clear_collection(&self, entity: EntityKind) -> Result<(), TransitError> {
        let key = entity.storage_key();
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM collections WHERE entity = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collection_marks WHERE entity = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn temp_storage(dir: &std::path::Path) -> CollectionStorage {
        let url = format!("sqlite:{}", dir.join("store.sqlite").display());
        let storage = CollectionStorage::connect(&url).await.unwrap();
        storage.init_schema().await.unwrap();
        storage
    }

    fn rows(n: usize) -> Vec<(String, String)> {
        (0..n)
            .map(|i| (format!("id-{i}"), format!(r#"{{"id":"id-{i}"}}"#)))
            .collect()
    }

    #[tokio::test]
    async fn never_written_is_none_but_empty_is_some() {
        let dir = tempdir().unwrap();
        let storage = temp_storage(dir.path()).await;

        assert_eq!(
            storage.load_collection(EntityKind::Passengers).await.unwrap(),
            None
        );

        storage
            .replace_collection(EntityKind::Passengers, &[])
            .await
            .unwrap();
        assert_eq!(
            storage.load_collection(EntityKind::Passengers).await.unwrap(),
            Some(vec![])
        );
    }

    #[tokio::test]
    async fn replace_is_idempotent_and_ordered() {
        let dir = tempdir().unwrap();
        let storage = temp_storage(dir.path()).await;
        let rows = rows(3);

        storage
            .replace_collection(EntityKind::Passengers, &rows)
            .await
            .unwrap();
        storage
            .replace_collection(EntityKind::Passengers, &rows)
            .await
            .unwrap();

        let bodies = storage
            .load_collection(EntityKind::Passengers)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            bodies,
            rows.iter().map(|(_, b)| b.clone()).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn replace_overwrites_wholesale() {
        let dir = tempdir().unwrap();
        let storage = temp_storage(dir.path()).await;

        storage
            .replace_collection(EntityKind::Passengers, &rows(5))
            .await
            .unwrap();
        storage
            .replace_collection(EntityKind::Passengers, &rows(2))
            .await
            .unwrap();

        let bodies = storage
            .load_collection(EntityKind::Passengers)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bodies.len(), 2);
    }
}
