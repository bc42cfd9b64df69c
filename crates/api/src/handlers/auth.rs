//! Handlers for the `/auth` resource (register, login, refresh, logout, me).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use immersion_core::error::CoreError;
use immersion_core::types::DbId;
use immersion_core::validation::{validate_email, validate_required_text, MAX_NAME_LENGTH};
use immersion_db::models::agency_right::UserAgencyRight;
use immersion_db::models::user::{CreateUser, User, UserResponse};
use immersion_db::repositories::{AgencyRightRepo, SessionRepo, UserRepo};
use serde::{Deserialize, Serialize};

use crate::auth::password::{
    check_new_password, hash_password, verify_against_decoy, verify_password,
};
use crate::auth::session::{issue_access_token, AccessRole, RefreshToken};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Maximum consecutive failed login attempts before locking the account.
const MAX_FAILED_ATTEMPTS: i32 = 5;

/// Duration in minutes to lock an account after exceeding failed attempts.
const LOCK_DURATION_MINS: i64 = 15;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Successful authentication response returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserInfo,
}

/// Public user info embedded in [`AuthResponse`].
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: DbId,
    pub email: String,
    pub role: AccessRole,
}

/// Response of `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub agency_rights: Vec<UserAgencyRight>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an agency-staff account. Rights on agencies are requested
/// separately and granted by back-office.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    let email = input.email.trim().to_lowercase();
    validate_email("email", &email)?;
    validate_required_text("first_name", &input.first_name, MAX_NAME_LENGTH)?;
    validate_required_text("last_name", &input.last_name, MAX_NAME_LENGTH)?;
    check_new_password(&input.password, &email)?;

    if UserRepo::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict(
            "An account already exists for this email".into(),
        )));
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            email,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            password_hash,
            is_back_office: false,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UserResponse::from(&user),
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Returns access and refresh tokens.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    // 1. Find user by email.
    let email = input.email.trim().to_lowercase();
    let Some(user) = UserRepo::find_by_email(&state.pool, &email).await? else {
        verify_against_decoy(&input.password);
        return Err(invalid_credentials());
    };

    // 2. Check if the account is active.
    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    // 3. Check if the account is temporarily locked.
    if let Some(locked_until) = user.locked_until {
        if locked_until > Utc::now() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Account is temporarily locked. Try again later.".into(),
            )));
        }
    }

    // 4. Verify password.
    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        // 5. On failure: increment counter, lock if threshold exceeded.
        let failed_count = UserRepo::increment_failed_login(&state.pool, user.id).await?;
        if failed_count >= MAX_FAILED_ATTEMPTS {
            let lock_until = Utc::now() + chrono::Duration::minutes(LOCK_DURATION_MINS);
            UserRepo::lock_account(&state.pool, user.id, lock_until).await?;
            tracing::warn!(user_id = user.id, "Account locked after repeated failed logins");
        }

        return Err(invalid_credentials());
    }

    // 6. On success: reset failed count, set last_login_at.
    UserRepo::record_successful_login(&state.pool, user.id).await?;

    // 7. Generate tokens and create session.
    let response = create_auth_response(&state, &user).await?;

    Ok(Json(response))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a valid refresh token for new access + refresh tokens.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let token_hash = RefreshToken::hash_of(&input.refresh_token);

    let session = SessionRepo::consume(&state.pool, &token_hash)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid or expired refresh token".into(),
            ))
        })?;

    let user = UserRepo::find_by_id(&state.pool, session.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    let response = create_auth_response(&state, &user).await?;

    Ok(Json(response))
}

/// POST /api/v1/auth/logout
///
/// Revoke all sessions for the authenticated user. Returns 204 No Content.
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<StatusCode> {
    SessionRepo::revoke_all_for_user(&state.pool, auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<MeResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: auth_user.user_id,
        }))?;
    let agency_rights = AgencyRightRepo::list_for_user(&state.pool, user.id).await?;

    Ok(Json(DataResponse {
        data: MeResponse {
            user: UserResponse::from(&user),
            agency_rights,
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Same answer for an unknown email and a wrong password.
fn invalid_credentials() -> AppError {
    AppError::Core(CoreError::Unauthorized("Invalid email or password".into()))
}

/// Issue an access token and a refresh token, persist the session, and build
/// the response.
async fn create_auth_response(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let session = &state.config.session;
    let role = AccessRole::for_user(user.is_back_office);

    let access_token = issue_access_token(user.id, role, session)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    let refresh = RefreshToken::issue();
    let expires_at = Utc::now() + session.refresh_lifetime();
    SessionRepo::create(&state.pool, user.id, &refresh.hash, expires_at).await?;

    Ok(AuthResponse {
        access_token,
        refresh_token: refresh.plaintext,
        expires_in: session.access_lifetime().num_seconds(),
        user: UserInfo {
            id: user.id,
            email: user.email.clone(),
            role,
        },
    })
}
