use std::{fmt, str::FromStr};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    AppState,
    config::{AppConfig, Env},
    error::AppError,
    repository::Repository,
};

/// Header accepted as a stand-in for a bearer token when running in `Env::Local`.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// ValidRole
///
/// The role labels a route can require. Stored and sent in lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ValidRole {
    User,
    Admin,
}

impl ValidRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for ValidRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Claims
///
/// Payload expected inside an HS256 bearer token. Roles are deliberately not carried
/// in the token: they are looked up on every request so revocations apply at once.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user id.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// The resolved subject of a request: who is calling and which roles they hold.
/// Resolution happens once in [`authenticate`]; afterwards the subject travels in the
/// request extensions and is handed explicitly to the guard and the handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    /// Never empty for a resolved subject.
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: ValidRole) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }
}

/// resolve_subject
///
/// Turns request credentials into a subject:
/// 1. `Env::Local` only: an `x-user-id` header naming an existing user.
/// 2. `Authorization: Bearer <jwt>`, then a user lookup for the current roles.
///
/// `Ok(None)` means the caller is anonymous. Credentials that are present but do not
/// check out are rejected with `Unauthorized` instead of being downgraded to anonymous.
pub async fn resolve_subject(
    headers: &HeaderMap,
    repo: &dyn Repository,
    config: &AppConfig,
) -> Result<Option<AuthUser>, AppError> {
    if config.env == Env::Local {
        let bypass = headers
            .get(LOCAL_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok());
        if let Some(user_id) = bypass {
            // Fall through to the bearer flow when the header names nobody.
            if let Ok(subject) = load_subject(repo, user_id).await {
                return Ok(Some(subject));
            }
        }
    }

    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header".to_string()))?;

    let mut validation = Validation::default();
    validation.validate_exp = true;
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

    let claims = decode::<Claims>(token, &key, &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".to_string()),
            _ => AppError::Unauthorized("Invalid token".to_string()),
        })?
        .claims;

    load_subject(repo, claims.sub).await.map(Some)
}

async fn load_subject(repo: &dyn Repository, user_id: Uuid) -> Result<AuthUser, AppError> {
    let user = repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))?;

    if user.roles.is_empty() {
        return Err(AppError::Unauthorized("User has no roles assigned".to_string()));
    }

    Ok(AuthUser {
        id: user.id,
        roles: user.roles,
    })
}

/// authenticate
///
/// Middleware that resolves the subject and stores it in the request extensions.
/// Anonymous requests pass through untouched; deciding whether a subject is needed
/// is the role guard's job.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let subject = resolve_subject(request.headers(), state.repo.as_ref(), &state.config).await?;

    if let Some(subject) = subject {
        tracing::debug!(user_id = %subject.id, roles = ?subject.roles, "subject resolved");
        request.extensions_mut().insert(subject);
    }

    Ok(next.run(request).await)
}

/// Handlers that need the caller take `AuthUser` as an argument; a missing subject
/// is the same "invalid request" the role guard reports.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::InvalidRequest("User not found".to_string()))
    }
}
