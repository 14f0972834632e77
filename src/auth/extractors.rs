use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Query, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::{error, warn};

use super::{claims::TokenClaims, jwt::JwtKeys, password::verify_password};
use crate::{
    db::User, error::ApiError, state::AppState, validation::schema::normalize_email,
};

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// `Authorization: Bearer <jwt>`, falling back to a `?token=` query parameter.
fn token_from(req: &Request) -> Option<String> {
    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

/// Rejects every request without a valid admin token before any handler
/// runs; accepted claims travel on as a request extension.
pub async fn require_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = token_from(&req) else {
        warn!(uri = %req.uri(), "request without token");
        return Err(ApiError::Forbidden);
    };

    let claims = JwtKeys::from_ref(&state).decode_token(&token).map_err(|e| {
        warn!(error = %e, uri = %req.uri(), "token rejected");
        ApiError::Forbidden
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// User identified by the email/password pair embedded in the bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<TokenClaims>()
            .ok_or(ApiError::Forbidden)?;
        let (Some(email), Some(password)) = (claims.email.as_deref(), claims.password.as_deref())
        else {
            return Err(ApiError::MissingUserData);
        };

        let user = state
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or(ApiError::MissingUserData)?;

        match verify_password(password, &user.password_hash) {
            Ok(true) => Ok(CurrentUser(user)),
            Ok(false) => {
                warn!(user_id = user.id, "token password does not match");
                Err(ApiError::MissingUserData)
            }
            Err(e) => {
                error!(error = %e, user_id = user.id, "stored password hash unreadable");
                Err(ApiError::MissingUserData)
            }
        }
    }
}
