use crate::models::{Comment, NewComment, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::{collections::HashSet, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Storage-level failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A foreign key (author or parent comment) points at a row that does not exist.
    #[error("referenced row does not exist")]
    MissingReference,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// Abstract contract for all persistence operations, so the service layer works
/// the same against Postgres and against the in-memory store.
///
/// Every list method returns rows ordered by `created_at` ascending, then `id`.
/// Atomicity of a single write is the store's responsibility.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;

    // --- Comments ---
    async fn insert_comment(&self, new: NewComment) -> RepoResult<Comment>;
    async fn get_comment(&self, id: Uuid) -> RepoResult<Option<Comment>>;
    async fn list_comments(&self) -> RepoResult<Vec<Comment>>;
    async fn list_replies(&self, parent_id: Uuid) -> RepoResult<Vec<Comment>>;
    async fn list_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Comment>>;
    async fn list_by_content(&self, content_id: &str) -> RepoResult<Vec<Comment>>;
    /// The comment itself followed by every descendant.
    async fn list_thread(&self, root_id: Uuid) -> RepoResult<Vec<Comment>>;
    /// Replaces the body and bumps `updated_at`. `None` if the comment does not exist.
    async fn update_comment_body(&self, id: Uuid, body: String) -> RepoResult<Option<Comment>>;
    /// Deletes the comment and its whole reply subtree. `false` if it did not exist.
    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The shared handle stored in the application state.
pub type RepositoryState = Arc<dyn Repository>;

const COMMENT_COLUMNS: &str = "id, user_id, content_id, body, parent_id, created_at, updated_at";

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Reply cascades are enforced by the
/// `ON DELETE CASCADE` self-reference in the schema.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_foreign_key_violation() {
            return RepositoryError::MissingReference;
        }
    }
    RepositoryError::Database(e)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, email, roles FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// insert_comment
    ///
    /// Timestamps are generated here rather than by `NOW()` so that every store
    /// stamps comments the same way.
    async fn insert_comment(&self, new: NewComment) -> RepoResult<Comment> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO comments (id, user_id, content_id, body, parent_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(new.content_id)
            .bind(new.body)
            .bind(new.parent_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn get_comment(&self, id: Uuid) -> RepoResult<Option<Comment>> {
        let query = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn list_comments(&self) -> RepoResult<Vec<Comment>> {
        let query = format!("SELECT {COMMENT_COLUMNS} FROM comments ORDER BY created_at ASC, id ASC");
        let comments = sqlx::query_as::<_, Comment>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    async fn list_replies(&self, parent_id: Uuid) -> RepoResult<Vec<Comment>> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE parent_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    async fn list_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Comment>> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE user_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    async fn list_by_content(&self, content_id: &str) -> RepoResult<Vec<Comment>> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE content_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(content_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    /// list_thread
    ///
    /// Walks the reply tree with a recursive CTE in a single round trip.
    async fn list_thread(&self, root_id: Uuid) -> RepoResult<Vec<Comment>> {
        let query = format!(
            r#"
            WITH RECURSIVE thread AS (
                SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1
                UNION ALL
                SELECT c.id, c.user_id, c.content_id, c.body, c.parent_id, c.created_at, c.updated_at
                FROM comments c JOIN thread t ON c.parent_id = t.id
            )
            SELECT {COMMENT_COLUMNS} FROM thread ORDER BY created_at ASC, id ASC
            "#
        );
        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(root_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    async fn update_comment_body(&self, id: Uuid, body: String) -> RepoResult<Option<Comment>> {
        let query = format!(
            "UPDATE comments SET body = $2, updated_at = $3 WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        );
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .bind(body)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory, for tests and local runs without a
/// database. Mirrors the Postgres semantics: foreign keys are checked on insert,
/// rows keep insertion order, and deletes cascade through replies.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<Vec<User>>,
    comments: RwLock<Vec<Comment>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with the given users.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().collect()),
            comments: RwLock::default(),
        }
    }

    async fn filtered(&self, keep: impl Fn(&Comment) -> bool) -> Vec<Comment> {
        self.comments
            .read()
            .await
            .iter()
            .filter(|c| keep(c))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn insert_comment(&self, new: NewComment) -> RepoResult<Comment> {
        if !self.users.read().await.iter().any(|u| u.id == new.user_id) {
            return Err(RepositoryError::MissingReference);
        }

        // Hold the write lock across the parent check so the parent cannot vanish.
        let mut comments = self.comments.write().await;
        if let Some(parent_id) = new.parent_id {
            if !comments.iter().any(|c| c.id == parent_id) {
                return Err(RepositoryError::MissingReference);
            }
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            content_id: new.content_id,
            body: new.body,
            parent_id: new.parent_id,
            created_at: now,
            updated_at: now,
        };
        comments.push(comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: Uuid) -> RepoResult<Option<Comment>> {
        Ok(self.comments.read().await.iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(&self) -> RepoResult<Vec<Comment>> {
        Ok(self.comments.read().await.clone())
    }

    async fn list_replies(&self, parent_id: Uuid) -> RepoResult<Vec<Comment>> {
        Ok(self.filtered(|c| c.parent_id == Some(parent_id)).await)
    }

    async fn list_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Comment>> {
        Ok(self.filtered(|c| c.user_id == user_id).await)
    }

    async fn list_by_content(&self, content_id: &str) -> RepoResult<Vec<Comment>> {
        Ok(self.filtered(|c| c.content_id == content_id).await)
    }

    async fn list_thread(&self, root_id: Uuid) -> RepoResult<Vec<Comment>> {
        let comments = self.comments.read().await;
        let members = subtree_ids(&comments, root_id);
        Ok(comments
            .iter()
            .filter(|c| members.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn update_comment_body(&self, id: Uuid, body: String) -> RepoResult<Option<Comment>> {
        let mut comments = self.comments.write().await;
        Ok(comments.iter_mut().find(|c| c.id == id).map(|c| {
            c.body = body;
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool> {
        let mut comments = self.comments.write().await;
        let doomed = subtree_ids(&comments, id);
        if doomed.is_empty() {
            return Ok(false);
        }
        comments.retain(|c| !doomed.contains(&c.id));
        Ok(true)
    }
}

/// Ids of `root_id` and all of its descendants; empty if `root_id` is unknown.
fn subtree_ids(comments: &[Comment], root_id: Uuid) -> HashSet<Uuid> {
    let mut members = HashSet::new();
    if !comments.iter().any(|c| c.id == root_id) {
        return members;
    }
    members.insert(root_id);

    // Parents always precede their replies in insertion order, but a fixpoint
    // loop keeps this independent of that.
    loop {
        let before = members.len();
        for c in comments {
            if c.parent_id.is_some_and(|p| members.contains(&p)) {
                members.insert(c.id);
            }
        }
        if members.len() == before {
            return members;
        }
    }
}
