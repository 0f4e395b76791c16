use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::repo_types::Role;
use crate::error::ApiError;
use crate::state::AppState;

pub const NO_TOKEN: &str = "Not authorized, no token";
pub const TOKEN_FAILED: &str = "Not authorized, token failed";
pub const NO_USER: &str = "Not authorized, no user found";

/// Pulls the credential out of an `Authorization` value.
///
/// A header that is absent or does not start with `Bearer` counts as no token.
/// `Bearer` with nothing after it is a failed token, not a missing one.
pub fn bearer_credential(header: Option<&str>) -> Result<&str, ApiError> {
    let header = header
        .filter(|h| h.starts_with("Bearer"))
        .ok_or_else(|| ApiError::unauthorized(NO_TOKEN))?;
    header
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ApiError::unauthorized(TOKEN_FAILED))
}

/// Identity of the caller, resolved from a verified token and a live user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        let token = bearer_credential(header)?;

        let claims = state.keys.verify(token).map_err(|e| {
            debug!(error = %e, "token verification failed");
            ApiError::unauthorized(TOKEN_FAILED)
        })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token subject no longer exists");
                ApiError::unauthorized(NO_USER)
            })?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}

/// Fails with 403 unless the authenticated caller holds `role`.
pub fn require_role(user: &AuthUser, role: Role) -> Result<(), ApiError> {
    if user.role == role {
        Ok(())
    } else {
        warn!(user_id = %user.id, have = %user.role, need = %role, "role check failed");
        Err(ApiError::forbidden(format!("Not authorized as a {role}")))
    }
}

/// Authenticated caller with the supplier role.
#[derive(Debug, Clone, Copy)]
pub struct SupplierUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for SupplierUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        require_role(&user, Role::Supplier)?;
        Ok(SupplierUser(user))
    }
}

/// Authenticated caller with the buyer role.
#[derive(Debug, Clone, Copy)]
pub struct BuyerUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for BuyerUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        require_role(&user, Role::Buyer)?;
        Ok(BuyerUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::NewUser;
    use axum::http::{Request, StatusCode};

    fn message(err: ApiError) -> (StatusCode, String) {
        let status = err.status();
        match err {
            ApiError::Unauthorized(m) | ApiError::Forbidden(m) => (status, m),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn bearer_missing_or_other_scheme_is_no_token() {
        for header in [None, Some(""), Some("Basic abc"), Some("bearer abc"), Some("Token x")] {
            let err = bearer_credential(header).unwrap_err();
            assert_eq!(message(err), (StatusCode::UNAUTHORIZED, NO_TOKEN.into()));
        }
    }

    #[test]
    fn bearer_without_credential_is_token_failure() {
        for header in ["Bearer", "Bearer ", "Bearer    "] {
            let err = bearer_credential(Some(header)).unwrap_err();
            assert_eq!(message(err), (StatusCode::UNAUTHORIZED, TOKEN_FAILED.into()));
        }
    }

    #[test]
    fn bearer_takes_second_piece() {
        assert_eq!(bearer_credential(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_credential(Some("Bearer  abc extra")).unwrap(), "abc");
    }

    #[test]
    fn require_role_is_forbidden_not_unauthorized() {
        let buyer = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Buyer,
        };
        assert!(require_role(&buyer, Role::Buyer).is_ok());
        let err = require_role(&buyer, Role::Supplier).unwrap_err();
        assert_eq!(
            message(err),
            (StatusCode::FORBIDDEN, "Not authorized as a supplier".into())
        );
    }

    async fn extract(state: &AppState, auth: Option<&str>) -> Result<AuthUser, ApiError> {
        let mut req = Request::builder().uri("/");
        if let Some(v) = auth {
            req = req.header(AUTHORIZATION, v);
        }
        let (mut parts, _) = req.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, state).await
    }

    async fn seed(state: &AppState, role: Role) -> Uuid {
        state
            .users
            .insert(NewUser {
                name: "Seed".into(),
                email: format!("{}@example.com", Uuid::new_v4()),
                phone: None,
                password_hash: "x".into(),
                role,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn valid_token_resolves_identity_and_role() {
        let state = AppState::fake();
        let id = seed(&state, Role::Supplier).await;
        let token = state.keys.sign(id).unwrap();
        let user = extract(&state, Some(&format!("Bearer {token}"))).await.unwrap();
        assert_eq!(
            user,
            AuthUser {
                id,
                role: Role::Supplier
            }
        );
    }

    #[tokio::test]
    async fn bad_token_does_not_say_why() {
        let state = AppState::fake();
        let other = crate::auth::jwt::JwtKeys::from_config(&crate::config::JwtConfig {
            secret: "other".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 60,
        });
        let id = seed(&state, Role::Buyer).await;
        let forged = other.sign(id).unwrap();
        for header in [format!("Bearer {forged}"), "Bearer garbage".to_string()] {
            let err = extract(&state, Some(&header)).await.unwrap_err();
            assert_eq!(message(err), (StatusCode::UNAUTHORIZED, TOKEN_FAILED.into()));
        }
    }

    #[tokio::test]
    async fn deleted_user_is_rejected() {
        let (state, stores) = AppState::fake_with_stores();
        let id = seed(&state, Role::Buyer).await;
        let token = state.keys.sign(id).unwrap();
        stores.users.remove(id);
        let err = extract(&state, Some(&format!("Bearer {token}"))).await.unwrap_err();
        assert_eq!(message(err), (StatusCode::UNAUTHORIZED, NO_USER.into()));
    }
}
