use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::dto::{AuthResponse, LoginRequest, SignupRequest};
use super::repo::InsertUserError;
use super::repo_types::{NewUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const MISSING_FIELDS: &str = "Please enter all fields";
pub const USER_EXISTS: &str = "User already exists";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed, non-empty value or `None`.
fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Roles a caller may pick for themselves. Admins are provisioned out of band.
fn parse_signup_role(role: Option<String>) -> ApiResult<Role> {
    match present(role).as_deref() {
        None | Some("buyer") => Ok(Role::Buyer),
        Some("supplier") => Ok(Role::Supplier),
        Some(other) => {
            warn!(role = other, "signup with disallowed role");
            Err(ApiError::validation("Invalid role"))
        }
    }
}

pub async fn signup(state: &AppState, req: SignupRequest) -> ApiResult<AuthResponse> {
    let (Some(name), Some(email), Some(password)) =
        (present(req.name), present(req.email), req.password.filter(|p| !p.is_empty()))
    else {
        warn!("signup with missing fields");
        return Err(ApiError::validation(MISSING_FIELDS));
    };
    let email = email.to_lowercase();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::validation("Password too short"));
    }
    let role = parse_signup_role(req.role)?;
    let phone = present(req.phone);

    // Cheap rejection before paying for the hash; the unique index is the real guard.
    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict(USER_EXISTS.into()));
    }
    if let Some(phone) = phone.as_deref() {
        if state.users.find_by_phone(phone).await?.is_some() {
            warn!("phone already registered");
            return Err(ApiError::Conflict(USER_EXISTS.into()));
        }
    }

    let password_hash = state.hasher.hash(&password)?;
    let user = state
        .users
        .insert(NewUser {
            name,
            email,
            phone,
            password_hash,
            role,
        })
        .await
        .map_err(|e| match e {
            InsertUserError::Duplicate => {
                warn!("lost signup race on unique index");
                ApiError::Conflict(USER_EXISTS.into())
            }
            InsertUserError::Other(e) => ApiError::Internal(e),
        })?;

    let token = state.keys.sign(user.id)?;
    info!(user_id = %user.id, role = %user.role, "user registered");
    Ok(AuthResponse::new(user, token))
}

pub async fn login(state: &AppState, req: LoginRequest) -> ApiResult<AuthResponse> {
    let (Some(email), Some(password)) =
        (present(req.email), req.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::validation(MISSING_FIELDS));
    };
    let email = email.to_lowercase();

    let Some(user) = state.users.find_by_email(&email).await? else {
        state.hasher.verify_dummy(&password);
        warn!(email = %email, "login unknown email");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    if !state.hasher.verify(&password, &user.password_hash) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let token = state.keys.sign(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse::new(user, token))
}
