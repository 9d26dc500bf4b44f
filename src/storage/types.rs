use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("The database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A lookup by name or URL matched nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

/// Returns true when the error is a UNIQUE constraint violation.
///
/// Uses the driver's structured error kind rather than the message text.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered user. Owns sources.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A subscribed feed endpoint.
///
/// `last_fetched_at` is `None` until the scheduler first attempts the source.
/// It is updated after every attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub account_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_fetched_at: Option<i64>,
}

/// Source joined with its owner's name, for listings
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceListing {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub owner: String,
    pub last_fetched_at: Option<i64>,
}

/// An account's subscription to a source.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Follow {
    pub id: i64,
    pub account_id: i64,
    pub source_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A followed source, for listings
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FollowedSource {
    pub source_id: i64,
    pub name: String,
    pub url: String,
}

/// A post as persisted. Created once per distinct URL and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Candidate post built by the ingestion pipeline; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Outcome of a post insert that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatePost {
    Created(Post),
    /// Another post already owns this URL
    DuplicateUrl,
}
