use super::schema::Database;
use super::traits::PostStore;
use super::types::{is_unique_violation, CreatePost, DatabaseError, NewPost, Post};

impl Database {
    // ========================================================================
    // Post Queries
    // ========================================================================

    /// Posts for a source, newest first
    pub async fn get_posts_for_source(&self, source_id: i64) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, source_id, title, url, description, published_at, created_at, updated_at
            FROM posts
            WHERE source_id = ?
            ORDER BY published_at DESC, id DESC
        "#,
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn count_posts(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

impl PostStore for Database {
    async fn create_post(&self, post: &NewPost) -> Result<CreatePost, DatabaseError> {
        let result = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (source_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, source_id, title, url, description, published_at, created_at, updated_at
        "#,
        )
        .bind(post.source_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => Ok(CreatePost::Created(created)),
            Err(e) if is_unique_violation(&e) => Ok(CreatePost::DuplicateUrl),
            Err(e) => Err(e.into()),
        }
    }
}
