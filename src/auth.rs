use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::CommentError,
    models::Role,
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` to act as an existing user without a token.
pub const LOCAL_BYPASS_HEADER: &str = "x-username";

/// Claims
///
/// Payload expected inside the bearer JWT. The subject is the username; the role is
/// deliberately not trusted from the token and is re-read from the users table.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// CallerIdentity
///
/// The resolved identity of one request. Built once by [`resolve_identity`] and then
/// passed by reference into every comment operation; it is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    Anonymous,
    User { username: String },
    Admin { username: String },
}

impl CallerIdentity {
    pub fn from_role(username: String, role: Role) -> Self {
        match role {
            Role::User => CallerIdentity::User { username },
            Role::Admin => CallerIdentity::Admin { username },
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            CallerIdentity::Anonymous => None,
            CallerIdentity::User { username } | CallerIdentity::Admin { username } => Some(username),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, CallerIdentity::Admin { .. })
    }

    /// Returns the caller's username, or `Unauthenticated` for anonymous callers.
    pub fn require_authenticated(&self) -> Result<&str, CommentError> {
        self.username().ok_or(CommentError::Unauthenticated)
    }
}

/// resolve_identity
///
/// Maps request headers to a [`CallerIdentity`].
///
/// 1. Local bypass: in `Env::Local`, an `x-username` header naming an existing user wins.
/// 2. No `Authorization` header at all: the caller is `Anonymous`.
/// 3. Otherwise the bearer token must decode and validate (signature and `exp`), and its
///    subject must still exist in the users table. Any failure is `Unauthenticated`;
///    a bad token is never downgraded to anonymous access.
pub async fn resolve_identity(
    headers: &HeaderMap,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<CallerIdentity, CommentError> {
    if config.env == Env::Local {
        if let Some(username) = headers
            .get(LOCAL_BYPASS_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            if let Some(user) = repo.get_user(username).await? {
                return Ok(CallerIdentity::from_role(user.username, user.role));
            }
        }
    }

    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(CallerIdentity::Anonymous);
    };

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(CommentError::Unauthenticated)?;

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!("rejected bearer token: {:?}", e.kind());
        CommentError::Unauthenticated
    })?;

    // The user may have been removed or re-roled since the token was issued.
    let user = repo
        .get_user(&token_data.claims.sub)
        .await?
        .ok_or(CommentError::Unauthenticated)?;

    Ok(CallerIdentity::from_role(user.username, user.role))
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = CommentError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        resolve_identity(&parts.headers, &repo, &config).await
    }
}
