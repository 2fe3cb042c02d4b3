use crate::{
    auth::CallerIdentity,
    error::CommentError,
    models::{CommentResponse, CreateCommentRequest, EditCommentRequest},
    service::{CommentService, Lookup},
    visibility::{CommentQuery, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, PageRequest},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

// --- Query Parameter Structs ---

/// CommentSearch
///
/// Query parameters of GET /comments. At most one selector is honoured, in the order
/// `id`, `owner`, `post`, `createDate`; with none, every visible comment is listed.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CommentSearch {
    /// Single comment lookup.
    pub id: Option<Uuid>,
    /// Comments written by this username.
    pub owner: Option<String>,
    /// Comments under this post.
    pub post: Option<Uuid>,
    /// Comments created on this UTC day (YYYY-MM-DD).
    pub create_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl CommentSearch {
    pub fn into_query(self) -> Result<(CommentQuery, PageRequest), CommentError> {
        let page = PageRequest::new(
            self.page.unwrap_or(DEFAULT_PAGE),
            self.size.unwrap_or(DEFAULT_PAGE_SIZE),
        )?;

        let query = if let Some(id) = self.id {
            CommentQuery::ById(id)
        } else if let Some(owner) = self.owner {
            CommentQuery::ByOwner(owner)
        } else if let Some(post) = self.post {
            CommentQuery::ByPost(post)
        } else if let Some(date) = self.create_date {
            CommentQuery::CreatedOn(date)
        } else {
            CommentQuery::All
        };

        Ok((query, page))
    }
}

/// PostTarget
///
/// Query parameter of POST /comments naming the post being commented on.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PostTarget {
    pub post: Uuid,
}

// --- Handlers ---

/// find_comments
///
/// [Public Route] Reads comments through the visibility filter. Anonymous callers and
/// plain users never see soft-deleted comments; a hidden comment looked up by id is a 404,
/// exactly like a missing one. Administrators see everything.
#[utoipa::path(
    get,
    path = "/comments",
    params(CommentSearch),
    responses(
        (status = 200, description = "One comment object (by id) or an array of comments", body = Lookup),
        (status = 400, description = "Malformed query parameters or bad pagination"),
        (status = 404, description = "Comment, owner or post not found")
    )
)]
pub async fn find_comments(
    identity: CallerIdentity,
    State(service): State<CommentService>,
    search: Result<Query<CommentSearch>, QueryRejection>,
) -> Result<Json<Lookup>, CommentError> {
    let Query(search) = search?;
    let (query, page) = search.into_query()?;
    let found = service.find(&identity, query, page).await?;
    Ok(Json(found))
}

/// create_comment
///
/// [Authenticated Route] Posts a new comment owned by the caller.
#[utoipa::path(
    post,
    path = "/comments",
    params(PostTarget),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Blank content, malformed input or unknown post"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn create_comment(
    identity: CallerIdentity,
    State(service): State<CommentService>,
    target: Result<Query<PostTarget>, QueryRejection>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentResponse>), CommentError> {
    let Query(target) = target?;
    let Json(payload) = payload?;
    let comment = service.create(&identity, target.post, payload).await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// edit_comment
///
/// [Authenticated Route] Replaces the content of the caller's own comment.
#[utoipa::path(
    put,
    path = "/comments",
    request_body = EditCommentRequest,
    responses(
        (status = 200, description = "Comment edited", body = CommentResponse),
        (status = 400, description = "Blank content or malformed input"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_comment(
    identity: CallerIdentity,
    State(service): State<CommentService>,
    payload: Result<Json<EditCommentRequest>, JsonRejection>,
) -> Result<Json<CommentResponse>, CommentError> {
    let Json(payload) = payload?;
    let comment = service.edit(&identity, payload).await?;
    Ok(Json(comment.into()))
}

/// delete_comment
///
/// [Authenticated Route] Runs one step of the moderation state machine: soft delete,
/// admin redaction, or permanent removal depending on the comment's state and the
/// caller's relation to it. The body is the comment right after the step.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Transition applied", body = CommentResponse),
        (status = 400, description = "Malformed comment id"),
        (status = 403, description = "Neither owner nor admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    identity: CallerIdentity,
    State(service): State<CommentService>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CommentResponse>, CommentError> {
    let Path(id) = id?;
    let comment = service.delete(&identity, id).await?;
    Ok(Json(comment.into()))
}
