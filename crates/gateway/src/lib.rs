//! # Cybermitra Gateway
//!
//! The HTTP layer of the Cybermitra backend: REST endpoints for
//! authentication, complaints, evidence, directories and the risk audit,
//! plus the newline-delimited JSON streaming endpoint that carries chat
//! turns.
//!
//! Routes live under `/api`. Protected routes authenticate a bearer
//! session token before the handler runs; the streaming endpoint
//! authenticates before the first byte of the response is written.

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;

pub use error::{GatewayError, GatewayResult};
pub use middleware::{auth_middleware, CurrentUser};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{http::Method, middleware as axum_middleware, Router};
use tower_http::cors::{Any, CorsLayer};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);
    let mut router = Router::new()
        .merge(rest::create_rest_routes(arc_state.clone()).with_state(arc_state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers(Any),
        )
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    #[cfg(debug_assertions)]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            paths(
                rest::auth::request_otp,
                rest::auth::verify_otp,
                rest::auth::register,
                rest::auth::me,
                rest::auth::logout,
                rest::chat::list_chats,
                rest::chat::create_chat,
                rest::chat::get_chat,
                rest::chat::delete_chat,
                rest::chat::send_message,
                rest::complaint::list_complaints,
                rest::complaint::create_complaint,
                rest::complaint::get_complaint,
                rest::complaint::update_complaint,
                rest::complaint::delete_complaint,
                rest::evidence::upload_evidence,
                rest::evidence::list_evidence,
                rest::evidence::download_evidence,
                rest::evidence::delete_evidence,
                rest::directory::search_stations,
                rest::directory::emergency_panel,
                rest::audit::list_questions,
                rest::audit::run_audit,
            ),
            components(
                schemas(
                    rest::auth::UserResponse,
                    rest::auth::RequestOtpBody,
                    rest::auth::RequestOtpResponse,
                    rest::auth::VerifyOtpBody,
                    rest::auth::VerifyOtpResponse,
                    rest::auth::RegisterBody,
                    rest::auth::SessionResponse,
                    rest::chat::ChatResponse,
                    rest::chat::MessageResponse,
                    rest::chat::ChatDetailResponse,
                    rest::chat::CreateChatRequest,
                    rest::chat::SendMessageRequest,
                    rest::complaint::ComplaintResponse,
                    rest::complaint::CreateComplaintRequest,
                    rest::complaint::UpdateComplaintRequest,
                    rest::evidence::EvidenceResponse,
                    rest::directory::StationResponse,
                    rest::directory::EmergencyContactResponse,
                    rest::audit::AuditQuestionResponse,
                    rest::audit::RunAuditRequest,
                    rest::audit::AuditReportResponse,
                )
            ),
            tags(
                (name = "auth", description = "OTP authentication"),
                (name = "chats", description = "Assistant chats and streaming turns"),
                (name = "complaints", description = "Complaint drafting and tracking"),
                (name = "evidence", description = "Evidence uploads"),
                (name = "directory", description = "Police stations and helplines"),
                (name = "audit", description = "Personal risk audit"),
            )
        )]
        struct ApiDoc;

        router = router.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
    }

    router
}
