use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::predict::{
    CatalogStore, PredictionCoordinator, RoundSnapshot, SelectionState, StationState,
};

use super::api::error::ErrorResponse;
use super::config::{Config, Permission};

#[derive(Clone)]
pub struct AuthenticatedUser {
    pub name: String,
    pub permissions: HashSet<Permission>,
}

impl AuthenticatedUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coordinator: Arc<Mutex<PredictionCoordinator>>,
    /// Reads the live round without waiting on the coordinator lock.
    pub passes: watch::Receiver<RoundSnapshot>,
    pub catalog: Arc<dyn CatalogStore>,
    pub station: Arc<StationState>,
    pub selection: Arc<SelectionState>,
}

#[derive(Debug, PartialEq)]
pub enum AuthError {
    MissingAuth,
    InvalidFormat,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let error = match self {
            AuthError::MissingAuth => "missing_authorization",
            AuthError::InvalidFormat => "invalid_authorization_format",
            AuthError::InvalidKey => "invalid_api_key",
        };
        (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(error))).into_response()
    }
}

#[derive(Debug)]
pub struct PermissionError(pub Permission);

impl IntoResponse for PermissionError {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::with_message(
                "insufficient_permissions",
                &format!("requires {:?}", self.0),
            )),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuth)?
            .to_str()
            .map_err(|_| AuthError::InvalidFormat)?;

        let key = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidFormat)?;

        let api_key = state
            .config
            .find_api_key(key)
            .ok_or(AuthError::InvalidKey)?;

        Ok(AuthenticatedUser {
            name: api_key.name.clone(),
            permissions: api_key.permissions.clone(),
        })
    }
}

pub fn require_permission(
    user: &AuthenticatedUser,
    permission: Permission,
) -> Result<(), PermissionError> {
    if user.has_permission(permission) {
        Ok(())
    } else {
        log::warn!("{} lacks permission {:?}", user.name, permission);
        Err(PermissionError(permission))
    }
}
