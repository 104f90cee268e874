//! REST API modules

pub mod audit;
pub mod auth;
pub mod chat;
pub mod complaint;
pub mod directory;
pub mod evidence;
pub mod health;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};

use crate::middleware::auth_middleware;
use crate::state::GatewayState;

/// Assemble all REST routes under `/api`, applying bearer authentication
/// to the protected subset.
pub fn create_rest_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let public = Router::new()
        .merge(auth::public_routes())
        .merge(directory::public_routes())
        .merge(audit::public_routes())
        .merge(health::routes());

    let protected = Router::new()
        .merge(auth::protected_routes())
        .merge(chat::protected_routes())
        .merge(complaint::protected_routes())
        .merge(evidence::protected_routes(state.max_upload_bytes))
        .merge(audit::protected_routes())
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware));

    Router::new().nest("/api", public.merge(protected))
}
