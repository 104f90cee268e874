//! Authentication REST endpoints: OTP request/verify, registration,
//! profile and logout.

use axum::{extract::State, routing::get, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use cybermitra_auth::{Identifier, NewProfile, VerifyOutcome};

use crate::error::GatewayResult;
use crate::middleware::CurrentUser;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub created_at: String,
}

impl From<cybermitra_database::User> for UserResponse {
    fn from(user: cybermitra_database::User) -> Self {
        Self {
            id: user.public_id,
            name: user.name,
            phone: user.phone,
            email: user.email,
            address: user.address,
            city: user.city,
            state: user.state,
            pincode: user.pincode,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestOtpBody {
    /// Phone number or email address.
    pub identifier: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestOtpResponse {
    pub cooldown_seconds: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpBody {
    pub identifier: String,
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyOtpResponse {
    Registered {
        token: String,
        user: UserResponse,
    },
    NeedsRegistration {
        registration_token: String,
    },
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterBody {
    pub registration_token: String,
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserResponse,
}

pub fn public_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/auth/otp/request", post(request_otp))
        .route("/auth/otp/verify", post(verify_otp))
        .route("/auth/register", post(register))
}

pub fn protected_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
}

#[utoipa::path(
    post,
    path = "/api/auth/otp/request",
    tag = "auth",
    request_body = RequestOtpBody,
    responses(
        (status = 200, description = "Code issued", body = RequestOtpResponse),
        (status = 400, description = "Invalid identifier"),
        (status = 429, description = "Resend cooldown active")
    )
)]
pub async fn request_otp(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<RequestOtpBody>,
) -> GatewayResult<Json<RequestOtpResponse>> {
    let identifier = Identifier::parse(&body.identifier)?;
    let issue = state.authenticator.request_otp(&identifier).await?;
    Ok(Json(RequestOtpResponse {
        cooldown_seconds: issue.cooldown_seconds,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/otp/verify",
    tag = "auth",
    request_body = VerifyOtpBody,
    responses(
        (status = 200, description = "Code accepted", body = VerifyOtpResponse),
        (status = 400, description = "Invalid or expired code"),
        (status = 429, description = "Attempt limit reached")
    )
)]
pub async fn verify_otp(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<VerifyOtpBody>,
) -> GatewayResult<Json<VerifyOtpResponse>> {
    let identifier = Identifier::parse(&body.identifier)?;
    let outcome = state
        .authenticator
        .verify_otp(&identifier, &body.code)
        .await?;

    Ok(Json(match outcome {
        VerifyOutcome::Registered { user, session } => VerifyOtpResponse::Registered {
            token: session.token,
            user: user.into(),
        },
        VerifyOutcome::NeedsRegistration { registration_token } => {
            VerifyOtpResponse::NeedsRegistration { registration_token }
        }
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterBody,
    responses(
        (status = 200, description = "Account created", body = SessionResponse),
        (status = 400, description = "Invalid token or profile")
    )
)]
pub async fn register(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<RegisterBody>,
) -> GatewayResult<Json<SessionResponse>> {
    let profile = NewProfile {
        name: body.name,
        email: body.email,
        address: body.address,
        city: body.city,
        state: body.state,
        pincode: body.pincode,
    };
    let (user, session) = state
        .authenticator
        .complete_registration(&body.registration_token, &profile)
        .await?;
    Ok(Json(SessionResponse {
        token: session.token,
        user: user.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
) -> GatewayResult<Json<UserResponse>> {
    let profile = state.authenticator.user_profile(user.0).await?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Session terminated"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(
    State(state): State<Arc<GatewayState>>,
    request: axum::extract::Request,
) -> GatewayResult<axum::http::StatusCode> {
    if let Some(token) = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        state.authenticator.logout(token).await?;
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}
