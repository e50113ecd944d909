//! Role-based route protection.
//!
//! Routes declare their acceptable roles in a [`RouteRoles`] table keyed by HTTP
//! method and route template. The [`role_guard`] middleware consults that table for
//! the matched route and runs [`authorize`] before the handler executes.

use std::collections::HashMap;

use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    auth::{AuthUser, ValidRole},
    error::AppError,
};

/// RouteRoles
///
/// Explicit mapping from route to the ordered list of roles that may invoke it.
/// Roles are OR-combined. A route without an entry is unrestricted.
#[derive(Debug, Clone, Default)]
pub struct RouteRoles {
    rules: HashMap<(Method, String), Vec<ValidRole>>,
}

impl RouteRoles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the roles accepted on `method path`. `path` is the route template
    /// exactly as registered on the router, e.g. `/api/v1/comments/{id}`.
    pub fn require(mut self, method: Method, path: &str, roles: &[ValidRole]) -> Self {
        self.rules.insert((method, path.to_string()), roles.to_vec());
        self
    }

    pub fn required_for(&self, method: &Method, path: &str) -> Option<&[ValidRole]> {
        self.rules
            .get(&(method.clone(), path.to_string()))
            .map(Vec::as_slice)
    }
}

/// authorize
///
/// - no declared roles: allowed, with or without a subject
/// - declared roles but no subject: `InvalidRequest`
/// - otherwise allowed iff the subject holds at least one declared role, else
///   `Forbidden` listing the declared roles
pub fn authorize(required: Option<&[ValidRole]>, subject: Option<&AuthUser>) -> Result<(), AppError> {
    let Some(required) = required else {
        return Ok(());
    };

    let Some(subject) = subject else {
        return Err(AppError::InvalidRequest("User not found".to_string()));
    };

    if subject
        .roles
        .iter()
        .any(|role| required.iter().any(|r| r.as_str() == role))
    {
        return Ok(());
    }

    Err(AppError::Forbidden {
        required: required.to_vec(),
    })
}

/// role_guard
///
/// Dispatch-time interceptor. Must run after [`crate::auth::authenticate`] so the
/// subject, if any, is already in the request extensions.
pub async fn role_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let required = request
        .extensions()
        .get::<MatchedPath>()
        .and_then(|path| state.route_roles.required_for(request.method(), path.as_str()));
    let subject = request.extensions().get::<AuthUser>();

    if let Err(denied) = authorize(required, subject) {
        tracing::warn!(
            method = %request.method(),
            uri = %request.uri(),
            user_id = ?subject.map(|s| s.id),
            reason = %denied,
            "request denied by role guard"
        );
        return Err(denied);
    }

    Ok(next.run(request).await)
}
