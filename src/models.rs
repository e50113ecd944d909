use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The identity record in the `users` table. Users are provisioned externally;
/// this service only reads them to resolve the role set of a request subject.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    // Role labels, e.g. ["user"] or ["user", "admin"]. Stored as TEXT[].
    pub roles: Vec<String>,
}

/// Comment
///
/// A row of the `comments` table. `parent_id` points at the comment this one replies
/// to; roots have none. Parent references never change after creation, so the
/// comments for a content item always form a forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    // Author (FK to users.id).
    pub user_id: Uuid,
    // Opaque identifier of the content item being discussed.
    pub content_id: String,
    pub body: String,
    pub parent_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CommentNode
///
/// One comment of a thread together with its direct replies, recursively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommentNode {
    pub comment: Comment,
    #[schema(no_recursion)]
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this subtree, the node itself included.
    pub fn size(&self) -> usize {
        1 + self.replies.iter().map(CommentNode::size).sum::<usize>()
    }
}

/// NewComment
///
/// Validated insert payload handed from the service to the repository.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub user_id: Uuid,
    pub content_id: String,
    pub body: String,
    pub parent_id: Option<Uuid>,
}

// --- Request Payloads (Input Schemas) ---

/// CreateCommentRequest
///
/// Body of `POST /api/v1/comments` and `POST /api/v1/comments/reply/{id}`.
///
/// Every field defaults so that a missing field reaches the service and is reported
/// as an invalid request instead of a deserialization rejection. `userId` is optional:
/// it defaults to the authenticated subject. On a reply, an empty `contentId` means
/// "same content as the parent".
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCommentRequest {
    #[serde(default)]
    #[schema(example = "Great article!")]
    pub body: String,
    #[serde(default)]
    #[schema(example = "article-42")]
    pub content_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// UpdateCommentRequest
///
/// Partial update for `PATCH /api/v1/comments/{id}`. Only the body is editable.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateCommentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}
