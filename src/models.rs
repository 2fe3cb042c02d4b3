use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::CommentError;

/// Content written into a comment when an administrator redacts it.
pub const REDACTED_CONTENT: &str = "Deleted by admin";

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The closed set of roles a user can hold. Stored in the `user_role` Postgres enum
/// and resolved once per request by the identity resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// User
///
/// Mirror of an account known to the authentication provider. Only the username
/// (the JWT subject) and the role are needed by the comment engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub username: String,
    pub role: Role,
}

/// CommentState
///
/// Moderation state of a stored comment. A removed comment has no state: its row is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[sqlx(type_name = "comment_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum CommentState {
    #[default]
    Active,
    /// Hidden from everyone but administrators.
    SoftDeleted,
    /// Content replaced by an administrator; still visible to everyone.
    AdminRedacted,
}

/// Comment
///
/// A comment row from the `comments` table. Owner and post are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub owner_username: String,
    pub post_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    pub state: CommentState,
}

impl Comment {
    /// Builds a fresh, active comment owned by `owner_username` under `post_id`.
    pub fn new(owner_username: String, post_id: Uuid, content: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            owner_username,
            post_id,
            created_at: now,
            updated_at: now,
            state: CommentState::Active,
        }
    }

    /// The soft-delete flag: true only once the comment is hidden from ordinary callers.
    pub fn is_deleted(&self) -> bool {
        self.state == CommentState::SoftDeleted
    }
}

// --- Response Payloads (Output Schemas) ---

/// CommentResponse
///
/// Outgoing view of a comment: every stored column plus the derived `deleted` flag,
/// which only administrators can ever observe as `true`.
#[derive(Debug, Clone, PartialEq, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentResponse {
    #[serde(flatten)]
    pub comment: Comment,
    pub deleted: bool,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            deleted: comment.is_deleted(),
            comment,
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// CreateCommentRequest
///
/// Input payload for posting a new comment (POST /comments?post={id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
}

/// EditCommentRequest
///
/// Input payload for replacing the content of an existing comment (PUT /comments).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EditCommentRequest {
    pub id: Uuid,
    pub content: String,
}

/// Rejects blank comment bodies.
pub fn validate_content(content: &str) -> Result<(), CommentError> {
    if content.trim().is_empty() {
        return Err(CommentError::Invalid("content must not be blank".to_string()));
    }
    Ok(())
}
