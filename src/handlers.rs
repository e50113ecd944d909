use crate::{
    CommentService,
    auth::{AuthUser, ValidRole},
    error::{AppError, ErrorBody},
    models::{Comment, CommentNode, CreateCommentRequest, UpdateCommentRequest},
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use uuid::Uuid;

/// Parses an id from a path segment or body field, reporting malformed input as an
/// invalid request.
fn parse_id(raw: &str, field: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::InvalidRequest(format!("{field} must be a valid UUID, got '{raw}'")))
}

/// Author of a new comment: the explicit `userId` if given, else the subject.
/// Posting on behalf of someone else is an admin privilege.
fn resolve_author(subject: &AuthUser, user_id: Option<&str>) -> Result<Uuid, AppError> {
    let Some(raw) = user_id else {
        return Ok(subject.id);
    };
    let author = parse_id(raw, "userId")?;
    if author != subject.id && !subject.has_role(ValidRole::Admin) {
        return Err(AppError::Forbidden {
            required: vec![ValidRole::Admin],
        });
    }
    Ok(author)
}

// --- Handlers ---

/// create_comment
///
/// [user, admin] Posts a new root comment on a content item.
#[utoipa::path(
    post,
    path = "/api/v1/comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Created", body = Comment),
        (status = 400, description = "Invalid input or no subject", body = ErrorBody),
        (status = 403, description = "Missing role", body = ErrorBody)
    )
)]
pub async fn create_comment(
    subject: AuthUser,
    State(comments): State<CommentService>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let Json(payload) = payload?;
    let author = resolve_author(&subject, payload.user_id.as_deref())?;
    let comment = comments
        .create(payload.body, author, payload.content_id)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// find_all_comments
///
/// [Public] Every comment, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/comments",
    responses((status = 200, description = "All comments", body = [Comment]))
)]
pub async fn find_all_comments(
    State(comments): State<CommentService>,
) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(comments.find_all().await?))
}

/// find_comment
///
/// [Public] A single comment.
#[utoipa::path(
    get,
    path = "/api/v1/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Found", body = Comment),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn find_comment(
    State(comments): State<CommentService>,
    Path(id): Path<String>,
) -> Result<Json<Comment>, AppError> {
    let id = parse_id(&id, "id")?;
    Ok(Json(comments.find_one(id).await?))
}

/// reply_to_comment
///
/// [user, admin] Replies to an existing comment. Never falls back to creating a root
/// comment: an unknown parent is a 404.
#[utoipa::path(
    post,
    path = "/api/v1/comments/reply/{id}",
    params(("id" = Uuid, Path, description = "Parent comment ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Reply created", body = Comment),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 404, description = "Parent not found", body = ErrorBody)
    )
)]
pub async fn reply_to_comment(
    subject: AuthUser,
    State(comments): State<CommentService>,
    Path(parent_id): Path<String>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let parent_id = parse_id(&parent_id, "id")?;
    let Json(payload) = payload?;
    let author = resolve_author(&subject, payload.user_id.as_deref())?;
    let reply = comments
        .reply_to_comment(parent_id, payload.body, author, payload.content_id)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// find_replies
///
/// [Public] Direct replies to a comment; empty when there are none.
#[utoipa::path(
    get,
    path = "/api/v1/comments/parent/{id}",
    params(("id" = Uuid, Path, description = "Parent comment ID")),
    responses((status = 200, description = "Replies", body = [Comment]))
)]
pub async fn find_replies(
    State(comments): State<CommentService>,
    Path(parent_id): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let parent_id = parse_id(&parent_id, "id")?;
    Ok(Json(comments.find_replies(parent_id).await?))
}

/// find_thread
///
/// [Public] A comment and all of its nested replies as a tree.
#[utoipa::path(
    get,
    path = "/api/v1/comments/thread/{id}",
    params(("id" = Uuid, Path, description = "Root comment ID")),
    responses(
        (status = 200, description = "Thread", body = CommentNode),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn find_thread(
    State(comments): State<CommentService>,
    Path(root_id): Path<String>,
) -> Result<Json<CommentNode>, AppError> {
    let root_id = parse_id(&root_id, "id")?;
    Ok(Json(comments.find_thread(root_id).await?))
}

/// update_comment
///
/// [user, admin] Edits the body of a comment.
#[utoipa::path(
    patch,
    path = "/api/v1/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_comment(
    State(comments): State<CommentService>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateCommentRequest>, JsonRejection>,
) -> Result<Json<Comment>, AppError> {
    let id = parse_id(&id, "id")?;
    let Json(payload) = payload?;
    Ok(Json(comments.update(id, payload).await?))
}

/// remove_comment
///
/// [admin] Deletes a comment together with its replies.
#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn remove_comment(
    State(comments): State<CommentService>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "id")?;
    comments.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// find_my_comments
///
/// [user, admin] Comments written by the caller.
#[utoipa::path(
    get,
    path = "/api/v1/comments/user",
    responses((status = 200, description = "My comments", body = [Comment]))
)]
pub async fn find_my_comments(
    AuthUser { id, .. }: AuthUser,
    State(comments): State<CommentService>,
) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(comments.find_by_user(id).await?))
}

/// find_comments_by_user
///
/// [user, admin] Comments written by the given user.
#[utoipa::path(
    get,
    path = "/api/v1/comments/user/{userId}",
    params(("userId" = Uuid, Path, description = "Author ID")),
    responses((status = 200, description = "User comments", body = [Comment]))
)]
pub async fn find_comments_by_user(
    State(comments): State<CommentService>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let user_id = parse_id(&user_id, "userId")?;
    Ok(Json(comments.find_by_user(user_id).await?))
}

/// find_comments_by_content
///
/// [Public] Every comment on a content item, replies included, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/comments/content/{id}",
    params(("id" = String, Path, description = "Content ID")),
    responses((status = 200, description = "Content comments", body = [Comment]))
)]
pub async fn find_comments_by_content(
    State(comments): State<CommentService>,
    Path(content_id): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(comments.find_comments_by_content(&content_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(roles: &[&str]) -> AuthUser {
        AuthUser {
            id: Uuid::from_u128(7),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn author_defaults_to_subject() {
        assert_eq!(resolve_author(&subject(&["user"]), None).unwrap(), Uuid::from_u128(7));
    }

    #[test]
    fn posting_for_someone_else_needs_admin() {
        let other = Uuid::from_u128(8).to_string();

        let denied = resolve_author(&subject(&["user"]), Some(&other));
        assert!(matches!(denied, Err(AppError::Forbidden { .. })));

        let allowed = resolve_author(&subject(&["admin"]), Some(&other)).unwrap();
        assert_eq!(allowed, Uuid::from_u128(8));
    }

    #[test]
    fn malformed_author_is_invalid_request() {
        let result = resolve_author(&subject(&["user"]), Some("not-a-uuid"));
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }
}
