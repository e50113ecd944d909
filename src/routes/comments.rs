use crate::{
    AppState,
    auth::ValidRole::{Admin, User},
    guard::RouteRoles,
    handlers,
};
use axum::{
    Router,
    http::Method,
    routing::{get, post},
};

// Route templates are shared by the router and the role table so the two cannot drift.
pub const COMMENTS: &str = "/api/v1/comments";
pub const COMMENT: &str = "/api/v1/comments/{id}";
pub const REPLY: &str = "/api/v1/comments/reply/{id}";
pub const REPLIES: &str = "/api/v1/comments/parent/{id}";
pub const THREAD: &str = "/api/v1/comments/thread/{id}";
pub const MY_COMMENTS: &str = "/api/v1/comments/user";
pub const USER_COMMENTS: &str = "/api/v1/comments/user/{userId}";
pub const CONTENT_COMMENTS: &str = "/api/v1/comments/content/{id}";

/// Comments Router
///
/// Every comment endpoint. Access control is not wired here: the role guard layered
/// on top of this router reads [`comment_route_roles`] at dispatch time.
pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route(
            COMMENTS,
            get(handlers::find_all_comments).post(handlers::create_comment),
        )
        // Static segments (`user`) win over `{id}` in the matcher.
        .route(MY_COMMENTS, get(handlers::find_my_comments))
        .route(
            COMMENT,
            get(handlers::find_comment)
                .patch(handlers::update_comment)
                .delete(handlers::remove_comment),
        )
        .route(REPLY, post(handlers::reply_to_comment))
        .route(REPLIES, get(handlers::find_replies))
        .route(THREAD, get(handlers::find_thread))
        .route(USER_COMMENTS, get(handlers::find_comments_by_user))
        .route(CONTENT_COMMENTS, get(handlers::find_comments_by_content))
}

/// Role requirements for the comment endpoints. Anything not listed is open to
/// anonymous callers.
pub fn comment_route_roles() -> RouteRoles {
    RouteRoles::new()
        .require(Method::POST, COMMENTS, &[User, Admin])
        .require(Method::POST, REPLY, &[User, Admin])
        .require(Method::PATCH, COMMENT, &[User, Admin])
        .require(Method::DELETE, COMMENT, &[Admin])
        .require(Method::GET, MY_COMMENTS, &[User, Admin])
        .require(Method::GET, USER_COMMENTS, &[User, Admin])
}
