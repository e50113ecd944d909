use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Comment, CommentNode, NewComment, UpdateCommentRequest},
    repository::RepositoryState,
};

/// CommentService
///
/// Business rules for comments and their reply threads. Handlers call this; it calls
/// the repository. Cheap to clone: it only holds the shared repository handle.
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
    /// Posts a new root comment on `content_id`.
    pub async fn create(
        &self,
        body: String,
        author_id: Uuid,
        content_id: String,
    ) -> Result<Comment, AppError> {
        let body = validate_body(body)?;
        let content_id = validate_content_id(content_id)?;
        self.ensure_author(author_id).await?;

        let comment = self
            .repo
            .insert_comment(NewComment {
                user_id: author_id,
                content_id,
                body,
                parent_id: None,
            })
            .await?;

        tracing::info!(comment_id = %comment.id, content_id = %comment.content_id, "comment created");
        Ok(comment)
    }

    /// reply_to_comment
    ///
    /// Posts a reply under `parent_id`. An unknown parent is reported before anything
    /// about the payload. The reply always belongs to the parent's content: an empty
    /// `content_id` inherits it, a different one is rejected.
    pub async fn reply_to_comment(
        &self,
        parent_id: Uuid,
        body: String,
        author_id: Uuid,
        content_id: String,
    ) -> Result<Comment, AppError> {
        let parent = self.find_one(parent_id).await?;
        let body = validate_body(body)?;

        let content_id = content_id.trim();
        if !content_id.is_empty() && content_id != parent.content_id {
            return Err(AppError::InvalidRequest(format!(
                "Reply content {content_id} does not match parent content {}",
                parent.content_id
            )));
        }
        self.ensure_author(author_id).await?;

        let reply = self
            .repo
            .insert_comment(NewComment {
                user_id: author_id,
                content_id: parent.content_id,
                body,
                parent_id: Some(parent.id),
            })
            .await?;

        tracing::info!(comment_id = %reply.id, parent_id = %parent.id, "reply created");
        Ok(reply)
    }

    pub async fn find_all(&self) -> Result<Vec<Comment>, AppError> {
        Ok(self.repo.list_comments().await?)
    }

    pub async fn find_one(&self, id: Uuid) -> Result<Comment, AppError> {
        self.repo
            .get_comment(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Direct replies only. An unknown parent simply has no replies.
    pub async fn find_replies(&self, parent_id: Uuid) -> Result<Vec<Comment>, AppError> {
        Ok(self.repo.list_replies(parent_id).await?)
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Comment>, AppError> {
        Ok(self.repo.list_by_user(user_id).await?)
    }

    /// Flat list of every comment on the content, roots and nested replies alike.
    pub async fn find_comments_by_content(&self, content_id: &str) -> Result<Vec<Comment>, AppError> {
        Ok(self.repo.list_by_content(content_id).await?)
    }

    /// find_thread
    ///
    /// The comment `root_id` with all of its replies assembled into a tree. Siblings
    /// keep creation order.
    pub async fn find_thread(&self, root_id: Uuid) -> Result<CommentNode, AppError> {
        let members = self.repo.list_thread(root_id).await?;
        let tree = build_tree(root_id, members).ok_or_else(|| not_found(root_id))?;
        tracing::debug!(root_id = %root_id, comments = tree.size(), "thread assembled");
        Ok(tree)
    }

    /// update
    ///
    /// Applies a partial update. An unknown id is `NotFound` whatever the patch says;
    /// an empty patch returns the comment unchanged.
    pub async fn update(&self, id: Uuid, patch: UpdateCommentRequest) -> Result<Comment, AppError> {
        let current = self.find_one(id).await?;
        let Some(body) = patch.body else {
            return Ok(current);
        };
        let body = validate_body(body)?;

        let comment = self
            .repo
            .update_comment_body(id, body)
            .await?
            .ok_or_else(|| not_found(id))?;

        tracing::info!(comment_id = %comment.id, "comment updated");
        Ok(comment)
    }

    /// remove
    ///
    /// Hard delete. Replies go with their parent, so no thread is ever left dangling.
    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        if !self.repo.delete_comment(id).await? {
            return Err(not_found(id));
        }
        tracing::info!(comment_id = %id, "comment and replies removed");
        Ok(())
    }

    async fn ensure_author(&self, author_id: Uuid) -> Result<(), AppError> {
        if author_id.is_nil() {
            return Err(AppError::InvalidRequest("userId must be a valid user id".to_string()));
        }
        match self.repo.get_user(author_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("User with id {author_id} not found"))),
        }
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Comment with id {id} not found"))
}

fn validate_body(body: String) -> Result<String, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::InvalidRequest("body must not be empty".to_string()));
    }
    Ok(body)
}

fn validate_content_id(content_id: String) -> Result<String, AppError> {
    let trimmed = content_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest("contentId must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Assembles `members` (the root and its descendants, in creation order) into a tree.
/// `None` if the root is not among them.
fn build_tree(root_id: Uuid, members: Vec<Comment>) -> Option<CommentNode> {
    let mut root = None;
    let mut children: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    for comment in members {
        if comment.id == root_id {
            root = Some(comment);
        } else if let Some(parent_id) = comment.parent_id {
            children.entry(parent_id).or_default().push(comment);
        }
    }

    root.map(|comment| attach(comment, &mut children))
}

fn attach(comment: Comment, children: &mut HashMap<Uuid, Vec<Comment>>) -> CommentNode {
    let replies = children
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|reply| attach(reply, children))
        .collect();
    CommentNode { comment, replies }
}
