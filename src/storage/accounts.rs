use super::schema::Database;
use super::types::{is_unique_violation, Account, DatabaseError};

impl Database {
    // ========================================================================
    // Account Operations
    // ========================================================================

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Conflict` if the name is taken.
    pub async fn create_account(&self, name: &str) -> Result<Account, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (name, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING id, name, created_at, updated_at
        "#,
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(account) => Ok(account),
            Err(e) if is_unique_violation(&e) => {
                Err(DatabaseError::Conflict(format!("account '{}'", name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn account_by_name(&self, name: &str) -> Result<Option<Account>, DatabaseError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, name, created_at, updated_at FROM accounts WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// All accounts ordered by name
    pub async fn list_accounts(&self) -> Result<Vec<Account>, DatabaseError> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT id, name, created_at, updated_at FROM accounts ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    /// Delete every account. Sources and posts go with them via cascade.
    ///
    /// Returns the number of accounts removed.
    pub async fn delete_all_accounts(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM accounts")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
