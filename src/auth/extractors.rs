use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Path},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::jwt::{extract_token, JwtKeys},
    error::{AppError, AuthFailure},
};

/// Identity of an authenticated caller, derived only from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    user_id: Uuid,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

/// Authenticated caller whose id matches the `:id` segment of the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerContext(pub AuthContext);

/// Checks, in order: credential present, token valid, subject owns `target` (when given).
pub fn authorize(
    keys: &JwtKeys,
    header: Option<&str>,
    target: Option<&str>,
) -> Result<AuthContext, AppError> {
    let token = extract_token(header)?;
    let claims = keys.verify(token)?;

    if let Some(target) = target {
        if Uuid::parse_str(target).ok() != Some(claims.sub) {
            warn!(user_id = %claims.sub, target, "user is not the owner of the resource");
            return Err(AppError::Forbidden);
        }
    }

    Ok(AuthContext {
        user_id: claims.sub,
    })
}

fn authorization_header(parts: &Parts) -> Result<Option<&str>, AppError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .map(|v| {
            v.to_str()
                .map_err(|_| AppError::Authentication(AuthFailure::InvalidToken))
        })
        .transpose()
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        authorize(&keys, authorization_header(parts)?, None)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OwnerContext
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let target = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .ok()
            .and_then(|Path(mut params)| params.remove("id"))
            .unwrap_or_default();

        authorize(&keys, authorization_header(parts)?, Some(&target)).map(OwnerContext)
    }
}
