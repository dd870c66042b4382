//! Explicit request contexts
//!
//! Guard extractors build [`AuthContext`] (staff JWT) and
//! [`SessionContext`] (customer token) once per request; everything past
//! the handler boundary receives them as plain parameters.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::{tokens, JwtService};
use crate::core::error::AppError;
use crate::core::ServerState;
use crate::db::models::Session;
use crate::db::repository::session as session_repo;

/// Authenticated staff identity extracted from the JWT
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub staff_id: String,
    pub role: String,
    pub restaurant_id: String,
}

impl AuthContext {
    pub const ROLE_MANAGER: &'static str = "MANAGER";

    /// Manager-only operations (suspicious order approval)
    pub fn require_manager(&self) -> Result<(), AppError> {
        if self.role == Self::ROLE_MANAGER {
            Ok(())
        } else {
            Err(AppError::Forbidden("Manager role required".into()))
        }
    }
}

impl FromRequestParts<ServerState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        // Check if already extracted earlier in the request
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(ctx.clone());
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = JwtService::extract_from_header(auth_header)
            .ok_or(AppError::InvalidToken)?;

        let claims = state.jwt_service.validate_token(token).map_err(|e| {
            tracing::warn!(target: "security", error = %e, uri = %parts.uri, "Staff auth failed");
            match e {
                crate::auth::JwtError::ExpiredToken => AppError::TokenExpired,
                _ => AppError::InvalidToken,
            }
        })?;

        let ctx = AuthContext {
            staff_id: claims.sub,
            role: claims.role,
            restaurant_id: claims.restaurant_id,
        };
        parts.extensions.insert(ctx.clone());
        Ok(ctx)
    }
}

/// Verified customer session context
///
/// Built from `X-Session-Id` / `X-Device-Id` headers plus the bearer
/// customer token minted at PIN verification.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session: Session,
    pub device_id: Option<String>,
}

impl SessionContext {
    /// Device scope for cart operations: INDIVIDUAL mode isolates by
    /// device, FAMILY mode shares one cart.
    pub fn cart_scope(&self) -> String {
        match self.session.mode {
            crate::db::models::SessionMode::Individual => {
                self.device_id.clone().unwrap_or_default()
            }
            crate::db::models::SessionMode::Family => String::new(),
        }
    }
}

impl FromRequestParts<ServerState> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let session_id = parts
            .headers
            .get("x-session-id")
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthorized)?
            .to_string();

        let device_id = parts
            .headers
            .get("x-device-id")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        let raw_token =
            JwtService::extract_from_header(auth_header).ok_or(AppError::InvalidToken)?;

        let mut conn = state.db.pool.acquire().await.map_err(AppError::from)?;

        let session = session_repo::find_by_id(&mut conn, &session_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;

        let token_hash = tokens::hash_token(raw_token);
        let token = session_repo::find_customer_token(&mut conn, &session_id, &token_hash)
            .await
            .map_err(AppError::from)?;
        if token.is_none() {
            tracing::warn!(target: "security", session_id = %session_id, "Customer token rejected");
            return Err(AppError::InvalidToken);
        }

        Ok(SessionContext { session, device_id })
    }
}
