use super::schema::Database;
use super::traits::SourceStore;
use super::types::{is_unique_violation, DatabaseError, Source, SourceListing};

const SOURCE_COLUMNS: &str =
    "id, name, url, account_id, created_at, updated_at, last_fetched_at";

impl Database {
    // ========================================================================
    // Source Operations
    // ========================================================================

    /// Register a source owned by `account_id`.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Conflict` if a source with this URL already exists.
    pub async fn create_source(
        &self,
        name: &str,
        url: &str,
        account_id: i64,
    ) -> Result<Source, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query_as::<_, Source>(&format!(
            r#"
            INSERT INTO sources (name, url, account_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {SOURCE_COLUMNS}
        "#
        ))
        .bind(name)
        .bind(url)
        .bind(account_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(source) => Ok(source),
            Err(e) if is_unique_violation(&e) => {
                Err(DatabaseError::Conflict(format!("source '{}'", url)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All sources with their owner's name, ordered by source name
    pub async fn list_sources(&self) -> Result<Vec<SourceListing>, DatabaseError> {
        let rows = sqlx::query_as::<_, SourceListing>(
            r#"
            SELECT s.id, s.name, s.url, a.name AS owner, s.last_fetched_at
            FROM sources s
            JOIN accounts a ON a.id = s.account_id
            ORDER BY s.name, s.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn source_by_id(&self, source_id: i64) -> Result<Option<Source>, DatabaseError> {
        let source =
            sqlx::query_as::<_, Source>(&format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?"))
                .bind(source_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(source)
    }
}

impl SourceStore for Database {
    async fn next_source_to_fetch(&self) -> Result<Option<Source>, DatabaseError> {
        let source = sqlx::query_as::<_, Source>(&format!(
            r#"
            SELECT {SOURCE_COLUMNS}
            FROM sources
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT 1
        "#
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(source)
    }

    /// Markers are strictly increasing across all sources: if `fetched_at` is
    /// not past the newest marker (two polls in the same second), the newest
    /// marker plus one is stored instead. The source just polled always sorts
    /// last.
    async fn mark_source_fetched(&self, source_id: i64, fetched_at: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE sources
            SET last_fetched_at = MAX(?, (SELECT COALESCE(MAX(last_fetched_at), 0) FROM sources) + 1),
                updated_at = ?
            WHERE id = ?
        "#,
        )
        .bind(fetched_at)
        .bind(fetched_at)
        .bind(source_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("source {}", source_id)));
        }
        Ok(())
    }

    async fn source_by_url(&self, url: &str) -> Result<Option<Source>, DatabaseError> {
        let source =
            sqlx::query_as::<_, Source>(&format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE url = ?"))
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(source)
    }
}
