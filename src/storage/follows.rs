use super::schema::Database;
use super::types::{is_unique_violation, DatabaseError, Follow, FollowedSource};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Subscribe `account_id` to `source_id`.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Conflict` if the account already follows the source.
    pub async fn follow_source(
        &self,
        account_id: i64,
        source_id: i64,
    ) -> Result<Follow, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query_as::<_, Follow>(
            r#"
            INSERT INTO follows (account_id, source_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, account_id, source_id, created_at, updated_at
        "#,
        )
        .bind(account_id)
        .bind(source_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(follow) => Ok(follow),
            Err(e) if is_unique_violation(&e) => Err(DatabaseError::Conflict(format!(
                "account {} already follows source {}",
                account_id, source_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// `DatabaseError::NotFound` if the account was not following the source.
    pub async fn unfollow_source(&self, account_id: i64, source_id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM follows WHERE account_id = ? AND source_id = ?")
            .bind(account_id)
            .bind(source_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "follow of source {} by account {}",
                source_id, account_id
            )));
        }
        Ok(())
    }

    /// Sources `account_id` follows, ordered by source name
    pub async fn followed_sources(&self, account_id: i64) -> Result<Vec<FollowedSource>, DatabaseError> {
        let rows = sqlx::query_as::<_, FollowedSource>(
            r#"
            SELECT s.id AS source_id, s.name, s.url
            FROM follows f
            JOIN sources s ON s.id = f.source_id
            WHERE f.account_id = ?
            ORDER BY s.name, s.id
        "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
