use crate::{
    error::StorageError,
    models::{Comment, CommentState, User},
    visibility::{CommentFilter, ListPredicate, Scope},
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository Trait
///
/// The storage collaborator of the comment engine. The engine never holds state of its
/// own between requests: it reads a record, decides, and writes the result back through
/// this trait. Single-row atomicity is whatever the backing store provides.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users & Posts (existence checks) ---
    async fn get_user(&self, username: &str) -> Result<Option<User>, StorageError>;
    async fn post_exists(&self, post_id: Uuid) -> Result<bool, StorageError>;

    // --- Comment writes ---
    async fn insert_comment(&self, comment: &Comment) -> Result<Comment, StorageError>;
    // Replaces content, state and updated_at, but only while the stored state still equals
    // `expected`. Returns None if the row is gone or its state moved on since it was read.
    async fn update_comment(
        &self,
        comment: &Comment,
        expected: CommentState,
    ) -> Result<Option<Comment>, StorageError>;
    // Removes the row if its state still equals `expected`. Returns true if a row was removed.
    async fn delete_comment(&self, id: Uuid, expected: CommentState) -> Result<bool, StorageError>;

    // --- Comment reads ---
    async fn find_comment(&self, id: Uuid, scope: Scope) -> Result<Option<Comment>, StorageError>;
    async fn list_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>, StorageError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const COMMENT_COLUMNS: &str =
    "id, content, owner_username, post_id, created_at, updated_at, state";

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations (users, posts, comments).
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn push_scope(builder: &mut QueryBuilder<'_, sqlx::Postgres>, scope: Scope) {
    if scope == Scope::ActiveOnly {
        builder.push(" AND state <> 'soft_deleted'");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, username: &str) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>("SELECT username, role FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("get_user error: {:?}", e))?;
        Ok(user)
    }

    async fn post_exists(&self, post_id: Uuid) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("post_exists error: {:?}", e))?;
        Ok(exists)
    }

    /// insert_comment
    ///
    /// Inserts the fully built comment and returns the stored row.
    async fn insert_comment(&self, comment: &Comment) -> Result<Comment, StorageError> {
        let query = format!(
            "INSERT INTO comments ({COMMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {COMMENT_COLUMNS}"
        );
        let stored = sqlx::query_as::<_, Comment>(&query)
            .bind(comment.id)
            .bind(&comment.content)
            .bind(&comment.owner_username)
            .bind(comment.post_id)
            .bind(comment.created_at)
            .bind(comment.updated_at)
            .bind(comment.state)
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("insert_comment error: {:?}", e))?;
        Ok(stored)
    }

    /// update_comment
    ///
    /// Compare-and-swap overwrite of the mutable columns, guarded by the state the caller
    /// read. Owner, post and creation time are never written after insert.
    async fn update_comment(
        &self,
        comment: &Comment,
        expected: CommentState,
    ) -> Result<Option<Comment>, StorageError> {
        let query = format!(
            "UPDATE comments SET content = $2, state = $3, updated_at = $4 WHERE id = $1 AND state = $5 RETURNING {COMMENT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Comment>(&query)
            .bind(comment.id)
            .bind(&comment.content)
            .bind(comment.state)
            .bind(comment.updated_at)
            .bind(expected)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("update_comment error: {:?}", e))?;
        Ok(updated)
    }

    async fn delete_comment(&self, id: Uuid, expected: CommentState) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND state = $2")
            .bind(id)
            .bind(expected)
            .execute(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("delete_comment error: {:?}", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_comment(&self, id: Uuid, scope: Scope) -> Result<Option<Comment>, StorageError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = "));
        builder.push_bind(id);
        push_scope(&mut builder, scope);

        let comment = builder
            .build_query_as::<Comment>()
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("find_comment error: {:?}", e))?;
        Ok(comment)
    }

    /// list_comments
    ///
    /// Builds the listing with bound parameters only. Ordering matches the public
    /// contract: post ascending, then newest first.
    async fn list_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>, StorageError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE TRUE"));

        match &filter.predicate {
            ListPredicate::Owner(owner) => {
                builder.push(" AND owner_username = ");
                builder.push_bind(owner.clone());
            }
            ListPredicate::Post(post_id) => {
                builder.push(" AND post_id = ");
                builder.push_bind(*post_id);
            }
            ListPredicate::CreatedBetween { start, end } => {
                builder.push(" AND created_at >= ");
                builder.push_bind(*start);
                builder.push(" AND created_at < ");
                builder.push_bind(*end);
            }
            ListPredicate::All => {}
        }
        push_scope(&mut builder, filter.scope);

        builder.push(" ORDER BY post_id ASC, created_at DESC LIMIT ");
        builder.push_bind(filter.page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(filter.page.offset());

        let comments = builder
            .build_query_as::<Comment>()
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("list_comments error: {:?}", e))?;
        Ok(comments)
    }
}

/// MemoryRepository
///
/// In-process `Repository` with the same semantics as the Postgres one. Used to run the
/// engine and the HTTP handlers without a database.
#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<HashMap<String, User>>,
    posts: RwLock<HashSet<Uuid>>,
    comments: RwLock<HashMap<Uuid, Comment>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.users.write().await.insert(user.username.clone(), user);
    }

    pub async fn add_post(&self, post_id: Uuid) {
        self.posts.write().await.insert(post_id);
    }

    /// Stores a comment as-is, bypassing every check. Test seeding only.
    pub async fn put_comment(&self, comment: Comment) {
        self.comments.write().await.insert(comment.id, comment);
    }

    /// Reads a comment regardless of its state.
    pub async fn raw_comment(&self, id: Uuid) -> Option<Comment> {
        self.comments.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn post_exists(&self, post_id: Uuid) -> Result<bool, StorageError> {
        Ok(self.posts.read().await.contains(&post_id))
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<Comment, StorageError> {
        self.comments
            .write()
            .await
            .insert(comment.id, comment.clone());
        Ok(comment.clone())
    }

    async fn update_comment(
        &self,
        comment: &Comment,
        expected: CommentState,
    ) -> Result<Option<Comment>, StorageError> {
        let mut comments = self.comments.write().await;
        Ok(comments
            .get_mut(&comment.id)
            .filter(|stored| stored.state == expected)
            .map(|stored| {
                stored.content = comment.content.clone();
                stored.state = comment.state;
                stored.updated_at = comment.updated_at;
                stored.clone()
            }))
    }

    async fn delete_comment(&self, id: Uuid, expected: CommentState) -> Result<bool, StorageError> {
        let mut comments = self.comments.write().await;
        if comments.get(&id).is_some_and(|stored| stored.state == expected) {
            comments.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn find_comment(&self, id: Uuid, scope: Scope) -> Result<Option<Comment>, StorageError> {
        Ok(self
            .comments
            .read()
            .await
            .get(&id)
            .filter(|c| scope.admits(c))
            .cloned())
    }

    async fn list_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>, StorageError> {
        let mut matching: Vec<Comment> = self
            .comments
            .read()
            .await
            .values()
            .filter(|c| filter.admits(c))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            a.post_id
                .cmp(&b.post_id)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        Ok(matching
            .into_iter()
            .skip(usize::try_from(filter.page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(filter.page.limit()).unwrap_or(usize::MAX))
            .collect())
    }
}
