use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::CallerIdentity,
    error::CommentError,
    models::{
        Comment, CommentResponse, CommentState, CreateCommentRequest, EditCommentRequest,
        validate_content,
    },
    moderation::{self, Outcome},
    repository::RepositoryState,
    visibility::{self, CommentQuery, PageRequest, Scope, StorageCall},
};

/// Result of a read: one comment for a by-id lookup, a page of comments otherwise.
/// Serialized without a tag, as a single object or an array.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum Lookup {
    One(CommentResponse),
    Many(Vec<CommentResponse>),
}

/// CommentService
///
/// Create, edit, delete and read comments on behalf of an explicitly passed caller.
#[derive(Clone)]
pub struct CommentService {
    repo: RepositoryState,
}

impl CommentService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// create
    ///
    /// Binds a new active comment to the caller and an existing post.
    pub async fn create(
        &self,
        identity: &CallerIdentity,
        post_id: Uuid,
        req: CreateCommentRequest,
    ) -> Result<Comment, CommentError> {
        let username = identity.require_authenticated()?;
        validate_content(&req.content)?;

        if !self.repo.post_exists(post_id).await? {
            return Err(CommentError::Invalid(format!("post {post_id} does not exist")));
        }
        let owner = self
            .repo
            .get_user(username)
            .await?
            .ok_or_else(|| CommentError::Invalid(format!("user {username} does not exist")))?;

        let comment = Comment::new(owner.username, post_id, req.content, Utc::now());
        let stored = self.repo.insert_comment(&comment).await?;

        tracing::info!(comment_id = %stored.id, %post_id, owner = %stored.owner_username, "comment created");
        Ok(stored)
    }

    /// edit
    ///
    /// Owner-only content replacement. The comment must be visible under the active-only
    /// rule regardless of the caller's role. Editing a redacted comment restores it to an
    /// ordinary active comment, since the redaction text is gone.
    pub async fn edit(
        &self,
        identity: &CallerIdentity,
        req: EditCommentRequest,
    ) -> Result<Comment, CommentError> {
        let username = identity.require_authenticated()?;
        validate_content(&req.content)?;

        let found = self.repo.find_comment(req.id, Scope::ActiveOnly).await?;
        let mut comment = visibility::admit(found, Scope::ActiveOnly)?;

        if comment.owner_username != username {
            return Err(CommentError::Forbidden("only the owner can edit a comment"));
        }

        let read_state = comment.state;
        comment.content = req.content;
        if comment.state == CommentState::AdminRedacted {
            comment.state = CommentState::Active;
        }
        comment.updated_at = Utc::now();

        // A concurrent moderation step since the read leaves no row in `read_state`.
        let updated = self
            .repo
            .update_comment(&comment, read_state)
            .await?
            .ok_or(CommentError::NotFound("comment"))?;

        tracing::info!(comment_id = %updated.id, "comment edited");
        Ok(updated)
    }

    /// delete
    ///
    /// Looks the comment up (own soft-deleted comments included), runs the moderation
    /// table and persists the transition, provided the stored state has not changed
    /// since the lookup. Returns the comment as it stood right after the
    /// transition (the pre-removal comment for a hard delete).
    pub async fn delete(&self, identity: &CallerIdentity, id: Uuid) -> Result<Comment, CommentError> {
        identity.require_authenticated()?;

        let found = self.repo.find_comment(id, Scope::Unfiltered).await?;
        let comment = visibility::admit_for_moderation(found, identity)?;
        let previous = comment.state;

        match moderation::moderate(identity, comment, Utc::now())? {
            Outcome::Updated(comment) => {
                let updated = self
                    .repo
                    .update_comment(&comment, previous)
                    .await?
                    .ok_or(CommentError::NotFound("comment"))?;
                tracing::info!(
                    comment_id = %id,
                    from = ?previous,
                    to = ?updated.state,
                    "comment moderated"
                );
                Ok(updated)
            }
            Outcome::Removed(comment) => {
                if !self.repo.delete_comment(id, previous).await? {
                    return Err(CommentError::NotFound("comment"));
                }
                tracing::info!(comment_id = %id, from = ?previous, "comment permanently removed");
                Ok(comment)
            }
        }
    }

    /// find
    ///
    /// Runs a read through the visibility filter. By-owner and by-post reads first
    /// confirm the referenced user or post exists.
    pub async fn find(
        &self,
        identity: &CallerIdentity,
        query: CommentQuery,
        page: PageRequest,
    ) -> Result<Lookup, CommentError> {
        match &query {
            CommentQuery::ByOwner(owner) => {
                if self.repo.get_user(owner).await?.is_none() {
                    return Err(CommentError::NotFound("user"));
                }
            }
            CommentQuery::ByPost(post_id) => {
                if !self.repo.post_exists(*post_id).await? {
                    return Err(CommentError::NotFound("post"));
                }
            }
            _ => {}
        }

        match visibility::route(&query, identity, page) {
            StorageCall::FindOne { id, scope } => {
                let found = self.repo.find_comment(id, scope).await?;
                Ok(Lookup::One(visibility::admit(found, scope)?.into()))
            }
            StorageCall::List(filter) => {
                let comments = self.repo.list_comments(&filter).await?;
                // Storage already applied the scope; re-check so nothing hidden leaks through.
                Ok(Lookup::Many(
                    comments
                        .into_iter()
                        .filter(|c| filter.scope.admits(c))
                        .map(CommentResponse::from)
                        .collect(),
                ))
            }
        }
    }
}
