//! Moderation state machine for comment deletion.
//!
//! | state          | owner          | admin (not owner) | neither   |
//! |----------------|----------------|-------------------|-----------|
//! | active         | soft delete    | redact            | forbidden |
//! | soft_deleted   | hard delete    | hard delete       | forbidden |
//! | admin_redacted | soft delete    | hard delete       | forbidden |
//!
//! Redaction is tracked by the state tag alone; the replacement text written into
//! `content` is only what readers see.

use chrono::{DateTime, Utc};

use crate::{
    auth::CallerIdentity,
    error::CommentError,
    models::{Comment, CommentState, REDACTED_CONTENT},
};

/// How the caller stands with respect to one comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Owner,
    /// An administrator who does not own the comment.
    Admin,
    Neither,
}

/// Ownership wins over the admin role: an admin deleting their own comment follows
/// the owner column.
pub fn relation_of(identity: &CallerIdentity, comment: &Comment) -> Relation {
    match identity {
        CallerIdentity::Anonymous => Relation::Neither,
        _ if identity.username() == Some(comment.owner_username.as_str()) => Relation::Owner,
        CallerIdentity::Admin { .. } => Relation::Admin,
        CallerIdentity::User { .. } => Relation::Neither,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Hide from ordinary callers; content untouched.
    SoftDelete,
    /// Replace the content with [`REDACTED_CONTENT`]; still visible.
    Redact,
    /// Remove the row.
    HardDelete,
}

/// The result of applying a transition, carrying the comment as it stood right after it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Updated(Comment),
    /// The row must be deleted; the payload is the pre-removal comment.
    Removed(Comment),
}

pub fn decide(state: CommentState, relation: Relation) -> Result<Transition, CommentError> {
    use CommentState::*;

    match (state, relation) {
        (_, Relation::Neither) => Err(CommentError::Forbidden(
            "only the owner or an admin can delete a comment",
        )),
        (Active, Relation::Owner) | (AdminRedacted, Relation::Owner) => Ok(Transition::SoftDelete),
        (Active, Relation::Admin) => Ok(Transition::Redact),
        (SoftDeleted, _) | (AdminRedacted, Relation::Admin) => Ok(Transition::HardDelete),
    }
}

pub fn apply(mut comment: Comment, transition: Transition, now: DateTime<Utc>) -> Outcome {
    match transition {
        Transition::SoftDelete => {
            comment.state = CommentState::SoftDeleted;
            comment.updated_at = now;
            Outcome::Updated(comment)
        }
        Transition::Redact => {
            comment.state = CommentState::AdminRedacted;
            comment.content = REDACTED_CONTENT.to_string();
            comment.updated_at = now;
            Outcome::Updated(comment)
        }
        Transition::HardDelete => Outcome::Removed(comment),
    }
}

/// Runs the whole gate for one delete request: relation, table lookup, transition.
pub fn moderate(
    identity: &CallerIdentity,
    comment: Comment,
    now: DateTime<Utc>,
) -> Result<Outcome, CommentError> {
    let relation = relation_of(identity, &comment);
    let transition = decide(comment.state, relation)?;
    Ok(apply(comment, transition, now))
}
