//! # API REST
//!
//! REST API for the clinic backend.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - Bearer-token authentication of every non-public route
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (status mapping, JSON serialization, CORS)
//!
//! Uses `api-shared` for wire types and tokens, and `clinic-core` for all business rules.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

#[cfg(test)]
mod tests;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{
    CreateGroupReq, CreateSessionReq, CreateUserReq, ErrorRes, GrantReq, GrantRes, GroupRes,
    HealthRes, LoginReq, LoginRes, MessageRes, NotificationRes, ProfileRes, SendMessageReq,
    SessionRes, UpdateProfileReq, UpdateSessionStatusReq, UserRes,
};

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use handlers::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        login,
        me,
        create_user,
        get_profile,
        update_profile,
        list_grants,
        grant_access,
        revoke_access,
        list_sessions,
        create_session,
        update_session_status,
        list_patient_messages,
        send_patient_message,
        create_group,
        list_group_messages,
        send_group_message,
        list_notifications,
        mark_notification_read,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        LoginReq,
        LoginRes,
        UserRes,
        CreateUserReq,
        ProfileRes,
        UpdateProfileReq,
        GrantReq,
        GrantRes,
        SessionRes,
        CreateSessionReq,
        UpdateSessionStatusReq,
        SendMessageReq,
        MessageRes,
        CreateGroupReq,
        GroupRes,
        NotificationRes,
    )),
    modifiers(&BearerSecurity)
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Builds the REST router, including Swagger UI at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/users", post(create_user))
        .route("/users/me", get(me))
        .route("/patients/:id/profile", get(get_profile).put(update_profile))
        .route("/patients/:id/access", get(list_grants).post(grant_access))
        .route("/patients/:id/access/:operator_id", delete(revoke_access))
        .route("/patients/:id/sessions", get(list_sessions).post(create_session))
        .route(
            "/patients/:id/sessions/:session_id/status",
            put(update_session_status),
        )
        .route(
            "/patients/:id/messages",
            get(list_patient_messages).post(send_patient_message),
        )
        .route("/groups", post(create_group))
        .route(
            "/groups/:id/messages",
            get(list_group_messages).post(send_group_message),
        )
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", post(mark_notification_read))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
