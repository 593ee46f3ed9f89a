use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::identity::IdentityService;
use crate::http::AppError;
use crate::AppState;

/// The resolved caller. Handlers that take this reject anonymous requests
/// with 401; `Option<AuthUser>` makes authentication optional.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub account_created_at: OffsetDateTime,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

        let service = IdentityService::new(state.db.clone(), state.paseto_access_key);
        let user = service
            .authenticate(token)
            .await
            .map_err(|err| AppError::from_core(err, "failed to authenticate"))?;

        Ok(AuthUser {
            user_id: user.user_id,
            account_created_at: user.account_created_at,
        })
    }
}
