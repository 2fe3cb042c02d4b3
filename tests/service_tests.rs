use blog_comments::{
    CommentService, MemoryRepository,
    auth::CallerIdentity,
    error::CommentError,
    models::{
        Comment, CommentState, CreateCommentRequest, EditCommentRequest, REDACTED_CONTENT, Role,
        User,
    },
    repository::Repository,
    service::Lookup,
    visibility::{CommentQuery, PageRequest, Scope},
};
use chrono::{TimeZone, Utc};
use std::{collections::HashSet, sync::Arc};
use uuid::Uuid;

// --- Test Context ---

const POST_ID: Uuid = Uuid::from_u128(0xb1);
const OTHER_POST_ID: Uuid = Uuid::from_u128(0xb2);
const C1: Uuid = Uuid::from_u128(0xc1);
const C2: Uuid = Uuid::from_u128(0xc2);

struct TestContext {
    repo: Arc<MemoryRepository>,
    service: CommentService,
}

impl TestContext {
    async fn setup() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        for (username, role) in [("alice", Role::User), ("bob", Role::User), ("root", Role::Admin)] {
            repo.add_user(User {
                username: username.to_string(),
                role,
            })
            .await;
        }
        repo.add_post(POST_ID).await;
        repo.add_post(OTHER_POST_ID).await;

        let service = CommentService::new(repo.clone());
        TestContext { repo, service }
    }

    async fn seed(&self, id: Uuid, owner: &str, content: &str, state: CommentState) -> Comment {
        let comment = Comment {
            id,
            content: content.to_string(),
            owner_username: owner.to_string(),
            post_id: POST_ID,
            created_at: Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap(),
            state,
        };
        self.repo.put_comment(comment.clone()).await;
        comment
    }

    async fn by_id(&self, identity: &CallerIdentity, id: Uuid) -> Result<Comment, CommentError> {
        match self
            .service
            .find(identity, CommentQuery::ById(id), PageRequest::default())
            .await?
        {
            Lookup::One(found) => Ok(found.comment),
            Lookup::Many(_) => panic!("by id must return a single comment"),
        }
    }

    async fn list(&self, identity: &CallerIdentity, query: CommentQuery) -> Vec<Comment> {
        match self
            .service
            .find(identity, query, PageRequest::default())
            .await
            .unwrap()
        {
            Lookup::Many(comments) => comments.into_iter().map(|c| c.comment).collect(),
            Lookup::One(_) => panic!("listing must return many comments"),
        }
    }
}

fn alice() -> CallerIdentity {
    CallerIdentity::User {
        username: "alice".to_string(),
    }
}
fn bob() -> CallerIdentity {
    CallerIdentity::User {
        username: "bob".to_string(),
    }
}
fn root() -> CallerIdentity {
    CallerIdentity::Admin {
        username: "root".to_string(),
    }
}

// --- Scenarios ---

#[tokio::test]
async fn test_owner_soft_deletes_then_hard_deletes() {
    let ctx = TestContext::setup().await;
    ctx.seed(C1, "alice", "hi", CommentState::Active).await;

    let first = ctx.service.delete(&alice(), C1).await.unwrap();
    assert_eq!(first.state, CommentState::SoftDeleted);
    assert_eq!(first.content, "hi");

    // Hidden from readers, but the owner can still finish removing it.
    assert!(matches!(
        ctx.by_id(&alice(), C1).await,
        Err(CommentError::NotFound(_))
    ));

    let second = ctx.service.delete(&alice(), C1).await.unwrap();
    assert_eq!(second.content, "hi");
    assert!(ctx.repo.raw_comment(C1).await.is_none());
    assert!(matches!(
        ctx.by_id(&root(), C1).await,
        Err(CommentError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_stranger_cannot_probe_soft_deleted_comment() {
    let ctx = TestContext::setup().await;
    ctx.seed(C1, "alice", "hi", CommentState::SoftDeleted).await;

    // Hidden comments of other users look exactly like missing ones, even on delete.
    let result = ctx.service.delete(&bob(), C1).await;

    assert!(matches!(result, Err(CommentError::NotFound(_))));
    assert!(ctx.repo.raw_comment(C1).await.is_some());
}

#[tokio::test]
async fn test_admin_hard_deletes_soft_deleted_comment() {
    let ctx = TestContext::setup().await;
    ctx.seed(C1, "alice", "hi", CommentState::SoftDeleted).await;

    let removed = ctx.service.delete(&root(), C1).await.unwrap();

    assert_eq!(removed.content, "hi");
    assert!(ctx.repo.raw_comment(C1).await.is_none());
}

#[tokio::test]
async fn test_admin_owner_soft_deletes_then_hard_deletes() {
    let ctx = TestContext::setup().await;
    ctx.seed(C1, "root", "hi", CommentState::Active).await;

    let first = ctx.service.delete(&root(), C1).await.unwrap();
    assert_eq!(first.state, CommentState::SoftDeleted);
    assert_eq!(first.content, "hi");

    let second = ctx.service.delete(&root(), C1).await.unwrap();
    assert_eq!(second.content, "hi");
    assert!(ctx.repo.raw_comment(C1).await.is_none());

    for identity in [CallerIdentity::Anonymous, alice(), root()] {
        assert!(matches!(
            ctx.by_id(&identity, C1).await,
            Err(CommentError::NotFound(_))
        ));
    }
}

#[tokio::test]
async fn test_admin_redacts_then_hard_deletes() {
    let ctx = TestContext::setup().await;
    ctx.seed(C2, "alice", "rude words", CommentState::Active).await;

    let redacted = ctx.service.delete(&root(), C2).await.unwrap();
    assert_eq!(redacted.content, REDACTED_CONTENT);
    assert_eq!(redacted.state, CommentState::AdminRedacted);
    assert!(!redacted.is_deleted());

    // Redacted comments remain visible to everyone.
    let seen = ctx.by_id(&CallerIdentity::Anonymous, C2).await.unwrap();
    assert_eq!(seen.content, REDACTED_CONTENT);

    let removed = ctx.service.delete(&root(), C2).await.unwrap();
    assert_eq!(removed.content, REDACTED_CONTENT);
    assert!(ctx.repo.raw_comment(C2).await.is_none());
}

#[tokio::test]
async fn test_owner_deleting_redacted_comment_soft_deletes_it() {
    let ctx = TestContext::setup().await;
    ctx.seed(C2, "alice", REDACTED_CONTENT, CommentState::AdminRedacted)
        .await;

    let result = ctx.service.delete(&alice(), C2).await.unwrap();

    assert_eq!(result.state, CommentState::SoftDeleted);
    assert!(ctx.repo.raw_comment(C2).await.is_some());
}

#[tokio::test]
async fn test_stranger_delete_is_forbidden_without_state_change() {
    let ctx = TestContext::setup().await;
    let original = ctx.seed(C1, "alice", "hi", CommentState::Active).await;

    let result = ctx.service.delete(&bob(), C1).await;

    assert!(matches!(result, Err(CommentError::Forbidden(_))));
    assert_eq!(ctx.repo.raw_comment(C1).await.unwrap(), original);
}

#[tokio::test]
async fn test_anonymous_delete_requires_authentication() {
    let ctx = TestContext::setup().await;
    ctx.seed(C1, "alice", "hi", CommentState::Active).await;

    let result = ctx.service.delete(&CallerIdentity::Anonymous, C1).await;

    assert!(matches!(result, Err(CommentError::Unauthenticated)));
}

#[tokio::test]
async fn test_delete_missing_comment_is_not_found() {
    let ctx = TestContext::setup().await;

    let result = ctx.service.delete(&root(), Uuid::from_u128(404)).await;

    assert!(matches!(result, Err(CommentError::NotFound(_))));
}

// --- Reads ---

#[tokio::test]
async fn test_soft_deleted_by_id_visibility() {
    let ctx = TestContext::setup().await;
    ctx.seed(C1, "alice", "hi", CommentState::SoftDeleted).await;

    for identity in [CallerIdentity::Anonymous, alice(), bob()] {
        assert!(matches!(
            ctx.by_id(&identity, C1).await,
            Err(CommentError::NotFound("comment"))
        ));
    }

    let seen = ctx.by_id(&root(), C1).await.unwrap();
    assert!(seen.is_deleted());
}

#[tokio::test]
async fn test_listings_hide_soft_deleted_except_for_admin() {
    let ctx = TestContext::setup().await;
    ctx.seed(C1, "alice", "visible", CommentState::Active).await;
    ctx.seed(C2, "alice", "hidden", CommentState::SoftDeleted).await;

    let queries = [
        CommentQuery::All,
        CommentQuery::ByOwner("alice".to_string()),
        CommentQuery::ByPost(POST_ID),
        CommentQuery::CreatedOn(chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
    ];

    for query in queries {
        let public = ctx.list(&CallerIdentity::Anonymous, query.clone()).await;
        assert_eq!(public.len(), 1, "{:?}", query);
        assert_eq!(public[0].id, C1);

        let as_user = ctx.list(&bob(), query.clone()).await;
        assert_eq!(as_user.len(), 1, "{:?}", query);

        let as_admin = ctx.list(&root(), query.clone()).await;
        assert_eq!(as_admin.len(), 2, "{:?}", query);
    }
}

#[tokio::test]
async fn test_listing_orders_by_post_then_newest_and_paginates() {
    let ctx = TestContext::setup().await;
    let base = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();

    for (i, post_id) in [(1u128, OTHER_POST_ID), (2, POST_ID), (3, POST_ID), (4, OTHER_POST_ID)] {
        ctx.repo
            .put_comment(Comment {
                id: Uuid::from_u128(i),
                content: format!("comment {i}"),
                owner_username: "alice".to_string(),
                post_id,
                created_at: base + chrono::Duration::hours(i as i64),
                updated_at: base,
                state: CommentState::Active,
            })
            .await;
    }

    let first_page = match ctx
        .service
        .find(&alice(), CommentQuery::All, PageRequest::new(0, 3).unwrap())
        .await
        .unwrap()
    {
        Lookup::Many(comments) => comments,
        Lookup::One(_) => unreachable!(),
    };
    let ids: Vec<u128> = first_page.iter().map(|c| c.comment.id.as_u128()).collect();
    assert_eq!(ids, vec![3, 2, 4]);

    let second_page = match ctx
        .service
        .find(&alice(), CommentQuery::All, PageRequest::new(1, 3).unwrap())
        .await
        .unwrap()
    {
        Lookup::Many(comments) => comments,
        Lookup::One(_) => unreachable!(),
    };
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].comment.id.as_u128(), 1);
}

#[tokio::test]
async fn test_reads_by_unknown_owner_or_post_are_not_found() {
    let ctx = TestContext::setup().await;

    let by_owner = ctx
        .service
        .find(
            &root(),
            CommentQuery::ByOwner("ghost".to_string()),
            PageRequest::default(),
        )
        .await;
    assert!(matches!(by_owner, Err(CommentError::NotFound("user"))));

    let by_post = ctx
        .service
        .find(
            &root(),
            CommentQuery::ByPost(Uuid::from_u128(999)),
            PageRequest::default(),
        )
        .await;
    assert!(matches!(by_post, Err(CommentError::NotFound("post"))));
}

// --- Edit ---

#[tokio::test]
async fn test_only_owner_can_edit() {
    let ctx = TestContext::setup().await;
    ctx.seed(C1, "alice", "hi", CommentState::Active).await;

    for intruder in [bob(), root()] {
        let result = ctx
            .service
            .edit(
                &intruder,
                EditCommentRequest {
                    id: C1,
                    content: "hijacked".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(CommentError::Forbidden(_))));
    }

    let edited = ctx
        .service
        .edit(
            &alice(),
            EditCommentRequest {
                id: C1,
                content: "hello".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.content, "hello");
    assert_eq!(edited.state, CommentState::Active);
    assert_eq!(edited.owner_username, "alice");
    assert_eq!(edited.post_id, POST_ID);
    assert!(edited.updated_at > edited.created_at);
}

#[tokio::test]
async fn test_edit_of_soft_deleted_comment_is_not_found() {
    let ctx = TestContext::setup().await;
    ctx.seed(C1, "alice", "hi", CommentState::SoftDeleted).await;

    let result = ctx
        .service
        .edit(
            &alice(),
            EditCommentRequest {
                id: C1,
                content: "back again".to_string(),
            },
        )
        .await;

    assert!(matches!(result, Err(CommentError::NotFound(_))));
    assert!(ctx.repo.raw_comment(C1).await.unwrap().is_deleted());
}

#[tokio::test]
async fn test_owner_edit_clears_redaction() {
    let ctx = TestContext::setup().await;
    ctx.seed(C2, "alice", REDACTED_CONTENT, CommentState::AdminRedacted)
        .await;

    let edited = ctx
        .service
        .edit(
            &alice(),
            EditCommentRequest {
                id: C2,
                content: "a politer version".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.state, CommentState::Active);
    assert_eq!(edited.content, "a politer version");
}

#[tokio::test]
async fn test_blank_edit_is_invalid() {
    let ctx = TestContext::setup().await;
    ctx.seed(C1, "alice", "hi", CommentState::Active).await;

    let result = ctx
        .service
        .edit(
            &alice(),
            EditCommentRequest {
                id: C1,
                content: "   ".to_string(),
            },
        )
        .await;

    assert!(matches!(result, Err(CommentError::Invalid(_))));
}

// --- Create ---

#[tokio::test]
async fn test_create_assigns_fresh_ids_and_active_state() {
    let ctx = TestContext::setup().await;
    let existing = ctx.seed(C1, "bob", "first", CommentState::Active).await;

    let mut seen = HashSet::from([existing.id]);
    for n in 0..20 {
        let created = ctx
            .service
            .create(
                &alice(),
                POST_ID,
                CreateCommentRequest {
                    content: format!("comment {n}"),
                },
            )
            .await
            .unwrap();

        assert!(seen.insert(created.id), "id {} reused", created.id);
        assert_eq!(created.state, CommentState::Active);
        assert!(!created.is_deleted());
        assert_eq!(created.owner_username, "alice");
        assert_eq!(created.post_id, POST_ID);
    }
}

#[tokio::test]
async fn test_create_on_unknown_post_is_invalid() {
    let ctx = TestContext::setup().await;

    let result = ctx
        .service
        .create(
            &alice(),
            Uuid::from_u128(999),
            CreateCommentRequest {
                content: "hello".to_string(),
            },
        )
        .await;

    assert!(matches!(result, Err(CommentError::Invalid(_))));
}

#[tokio::test]
async fn test_create_by_unknown_owner_is_invalid() {
    let ctx = TestContext::setup().await;
    let ghost = CallerIdentity::User {
        username: "ghost".to_string(),
    };

    let result = ctx
        .service
        .create(
            &ghost,
            POST_ID,
            CreateCommentRequest {
                content: "hello".to_string(),
            },
        )
        .await;

    assert!(matches!(result, Err(CommentError::Invalid(_))));
}

#[tokio::test]
async fn test_anonymous_cannot_create() {
    let ctx = TestContext::setup().await;

    let result = ctx
        .service
        .create(
            &CallerIdentity::Anonymous,
            POST_ID,
            CreateCommentRequest {
                content: "hello".to_string(),
            },
        )
        .await;

    assert!(matches!(result, Err(CommentError::Unauthenticated)));
}

// --- Writes racing a moderation step ---

#[tokio::test]
async fn test_edit_cannot_resurrect_concurrently_soft_deleted_comment() {
    let ctx = TestContext::setup().await;
    let read = ctx.seed(C1, "alice", "hi", CommentState::Active).await;

    // The owner's delete commits between the edit's read and its write.
    ctx.service.delete(&alice(), C1).await.unwrap();

    let mut edit = read.clone();
    edit.content = "edited".to_string();
    let written = ctx.repo.update_comment(&edit, read.state).await.unwrap();

    assert!(written.is_none());
    let stored = ctx.repo.raw_comment(C1).await.unwrap();
    assert_eq!(stored.state, CommentState::SoftDeleted);
    assert_eq!(stored.content, "hi");
}

#[tokio::test]
async fn test_hard_delete_refused_after_state_changed() {
    let ctx = TestContext::setup().await;
    let read = ctx
        .seed(C1, "alice", REDACTED_CONTENT, CommentState::AdminRedacted)
        .await;

    // The owner edits the redacted comment back to active before the admin's removal lands.
    ctx.service
        .edit(
            &alice(),
            EditCommentRequest {
                id: C1,
                content: "reworded".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(!ctx.repo.delete_comment(C1, read.state).await.unwrap());
    let stored = ctx.repo.find_comment(C1, Scope::Unfiltered).await.unwrap();
    assert_eq!(stored.map(|c| c.state), Some(CommentState::Active));
}
