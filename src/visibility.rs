//! Visibility filter: decides which storage call a read issues for a given caller.
//!
//! Anonymous callers and plain users only ever see the active-only variant of a query.
//! Administrators see everything, soft-deleted comments included. Routing is a pure
//! function of `(query, identity, page)`; nothing here touches storage.

use chrono::{DateTime, Days, NaiveDate, Utc};
use uuid::Uuid;

use crate::{auth::CallerIdentity, error::CommentError, models::Comment};

pub const DEFAULT_PAGE: u32 = 0;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Scope
///
/// Which records a query may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only comments that are not soft-deleted.
    ActiveOnly,
    /// Every stored comment.
    Unfiltered,
}

impl Scope {
    pub fn admits(self, comment: &Comment) -> bool {
        match self {
            Scope::ActiveOnly => !comment.is_deleted(),
            Scope::Unfiltered => true,
        }
    }
}

/// PageRequest
///
/// Pagination parameters, threaded through to storage unchanged. Storage orders by
/// post ascending, then newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Rejects an empty page, and any page whose row offset does not fit a
    /// signed 64-bit `OFFSET`.
    pub fn new(page: u32, size: u32) -> Result<Self, CommentError> {
        if size == 0 {
            return Err(CommentError::Invalid("page size must be at least 1".to_string()));
        }
        if i64::try_from(u64::from(page) * u64::from(size)).is_err() {
            return Err(CommentError::Invalid(format!(
                "page {page} of size {size} is out of range"
            )));
        }
        Ok(Self { page, size })
    }

    pub fn offset(&self) -> i64 {
        i64::try_from(u64::from(self.page) * u64::from(self.size)).unwrap_or(i64::MAX)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

/// CommentQuery
///
/// The logical read shapes a caller can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentQuery {
    ById(Uuid),
    ByOwner(String),
    ByPost(Uuid),
    /// Every comment created during the given UTC day.
    CreatedOn(NaiveDate),
    All,
}

/// ListPredicate
///
/// The row predicate of a listing call, independent of its scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListPredicate {
    Owner(String),
    Post(Uuid),
    /// Half-open range `[start, end)`.
    CreatedBetween {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    All,
}

impl ListPredicate {
    pub fn matches(&self, comment: &Comment) -> bool {
        match self {
            ListPredicate::Owner(owner) => comment.owner_username == *owner,
            ListPredicate::Post(post_id) => comment.post_id == *post_id,
            ListPredicate::CreatedBetween { start, end } => {
                comment.created_at >= *start && comment.created_at < *end
            }
            ListPredicate::All => true,
        }
    }
}

/// CommentFilter
///
/// A complete listing call: predicate, scope and page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentFilter {
    pub predicate: ListPredicate,
    pub scope: Scope,
    pub page: PageRequest,
}

impl CommentFilter {
    pub fn admits(&self, comment: &Comment) -> bool {
        self.scope.admits(comment) && self.predicate.matches(comment)
    }
}

/// StorageCall
///
/// The concrete data-access call a read resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    FindOne { id: Uuid, scope: Scope },
    List(CommentFilter),
}

/// Administrators read unfiltered; everybody else reads active-only.
pub fn scope_for(identity: &CallerIdentity) -> Scope {
    match identity {
        CallerIdentity::Admin { .. } => Scope::Unfiltered,
        CallerIdentity::User { .. } | CallerIdentity::Anonymous => Scope::ActiveOnly,
    }
}

/// Bounds of a whole UTC day as a half-open range.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = start
        .checked_add_days(Days::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}

/// route
///
/// Rewrites a logical query into the storage call the caller is entitled to.
pub fn route(query: &CommentQuery, identity: &CallerIdentity, page: PageRequest) -> StorageCall {
    let scope = scope_for(identity);
    let predicate = match query {
        CommentQuery::ById(id) => return StorageCall::FindOne { id: *id, scope },
        CommentQuery::ByOwner(owner) => ListPredicate::Owner(owner.clone()),
        CommentQuery::ByPost(post_id) => ListPredicate::Post(*post_id),
        CommentQuery::CreatedOn(date) => {
            let (start, end) = day_bounds(*date);
            ListPredicate::CreatedBetween { start, end }
        }
        CommentQuery::All => ListPredicate::All,
    };
    StorageCall::List(CommentFilter {
        predicate,
        scope,
        page,
    })
}

/// admit
///
/// Final single-item check: a record outside the scope is reported exactly like a
/// missing one.
pub fn admit(comment: Option<Comment>, scope: Scope) -> Result<Comment, CommentError> {
    comment
        .filter(|c| scope.admits(c))
        .ok_or(CommentError::NotFound("comment"))
}

/// admit_for_moderation
///
/// Lookup rule for delete requests: the caller's normal scope, widened to include the
/// caller's own soft-deleted comments so an owner can finish removing what they hid.
/// Other people's hidden comments stay indistinguishable from missing ones.
pub fn admit_for_moderation(
    comment: Option<Comment>,
    identity: &CallerIdentity,
) -> Result<Comment, CommentError> {
    let scope = scope_for(identity);
    comment
        .filter(|c| scope.admits(c) || identity.username() == Some(c.owner_username.as_str()))
        .ok_or(CommentError::NotFound("comment"))
}
