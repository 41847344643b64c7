//! REST handlers.
//!
//! Each handler authenticates through [`AuthActor`], parses path ids, and delegates to the
//! services on [`clinic_core::ClinicContext`]. Authorization decisions live in the core so the
//! real-time channel enforces the same rules.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use api_shared::{
    CreateGroupReq, CreateSessionReq, CreateUserReq, ErrorRes, GrantReq, GrantRes, GroupRes,
    HealthRes, HealthService, LoginReq, LoginRes, MessageRes, NotificationRes, NotificationsQuery,
    ProfileRes, SendMessageReq, SessionRes, UpdateProfileReq, UpdateSessionStatusReq, UserRes,
};
use clinic_core::model::MessageScope;
use clinic_core::repositories::patients::NewSession;
use clinic_core::repositories::users::NewUser;
use clinic_core::Actor;

use crate::error::ApiResult;
use crate::extract::{parse_id, AuthActor};
use crate::state::AppState;

// ============================================================================
// HEALTH & AUTH
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint, used for monitoring and load balancer probes.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Signed bearer token", body = LoginRes),
        (status = 401, description = "Unknown email or wrong password", body = ErrorRes)
    )
)]
/// Exchange an email and password for a bearer token
///
/// # Errors
/// Returns `401 Unauthorized` for an unknown email or a wrong password. The two cases are
/// indistinguishable to the caller.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> ApiResult<Json<LoginRes>> {
    let user = state.ctx.users.authenticate(&req.email, &req.password).await?;
    let issued = state.tokens.mint(&Actor::from(&user))?;
    tracing::info!(user_id = %user.id, "issued token");

    Ok(Json(LoginRes {
        token: issued.token,
        token_type: "Bearer".into(),
        expires_at: issued.expires_at,
        user: UserRes::from(&user),
    }))
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The authenticated user", body = UserRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Json<UserRes>> {
    let user = state.ctx.users.get(&actor.user_id).await?;
    Ok(Json(UserRes::from(&user)))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = UserRes),
        (status = 400, description = "Invalid email, name, password, role or type", body = ErrorRes),
        (status = 403, description = "Caller is not an administrator", body = ErrorRes),
        (status = 409, description = "Email already registered", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Create an operator or patient account
///
/// Patients are created with an empty medical profile.
///
/// # Errors
/// Returns `403 Forbidden` unless the caller is an administrator.
#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<CreateUserReq>,
) -> ApiResult<(StatusCode, Json<UserRes>)> {
    let new_user = NewUser::try_from(req)?;
    let user = state.ctx.users.create_user(&actor, new_user).await?;
    Ok((StatusCode::CREATED, Json(UserRes::from(&user))))
}

// ============================================================================
// PATIENT PROFILE & ACCESS
// ============================================================================

#[utoipa::path(
    get,
    path = "/patients/{id}/profile",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Medical profile", body = ProfileRes),
        (status = 403, description = "No view access to this patient", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<ProfileRes>> {
    let patient_id = parse_id(&id)?;
    let profile = state.ctx.patients.get_profile(&actor, &patient_id).await?;
    Ok(Json(ProfileRes::from(profile)))
}

#[utoipa::path(
    put,
    path = "/patients/{id}/profile",
    params(("id" = String, Path, description = "Patient id")),
    request_body = UpdateProfileReq,
    responses(
        (status = 200, description = "Updated medical profile", body = ProfileRes),
        (status = 403, description = "No edit access to this patient", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Update a patient's medical profile
///
/// The body replaces the whole profile. Administrators may view but never edit clinical
/// data, so they receive `403` here.
#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(req): Json<UpdateProfileReq>,
) -> ApiResult<Json<ProfileRes>> {
    let patient_id = parse_id(&id)?;
    let profile = state
        .ctx
        .patients
        .update_profile(&actor, &patient_id, req.into())
        .await?;
    Ok(Json(ProfileRes::from(profile)))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/access",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Grants on this patient", body = [GrantRes]),
        (status = 403, description = "Caller is neither an administrator nor the patient", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_grants(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<GrantRes>>> {
    let patient_id = parse_id(&id)?;
    let grants = state.ctx.grants.list(&actor, &patient_id).await?;
    Ok(Json(grants.iter().map(GrantRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/access",
    params(("id" = String, Path, description = "Patient id")),
    request_body = GrantReq,
    responses(
        (status = 200, description = "Grant created or replaced", body = GrantRes),
        (status = 400, description = "Grantee is not an operator", body = ErrorRes),
        (status = 403, description = "Caller is neither an administrator nor the patient", body = ErrorRes),
        (status = 404, description = "Patient or operator not found", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Grant an operator access to a patient
///
/// An existing grant for the same operator is replaced. Edit access implies view access.
/// The operator is notified.
#[axum::debug_handler]
pub async fn grant_access(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(req): Json<GrantReq>,
) -> ApiResult<Json<GrantRes>> {
    let patient_id = parse_id(&id)?;
    let operator_id = parse_id(&req.operator_id)?;
    let grant = state
        .ctx
        .grants
        .grant(&actor, &patient_id, &operator_id, req.can_view, req.can_edit)
        .await?;
    Ok(Json(GrantRes::from(&grant)))
}

#[utoipa::path(
    delete,
    path = "/patients/{id}/access/{operator_id}",
    params(
        ("id" = String, Path, description = "Patient id"),
        ("operator_id" = String, Path, description = "Operator whose grant is revoked")
    ),
    responses(
        (status = 204, description = "Grant revoked"),
        (status = 403, description = "Caller is neither an administrator nor the patient", body = ErrorRes),
        (status = 404, description = "No such grant", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn revoke_access(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path((id, operator_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let patient_id = parse_id(&id)?;
    let operator_id = parse_id(&operator_id)?;
    state
        .ctx
        .grants
        .revoke(&actor, &patient_id, &operator_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// TREATMENT SESSIONS
// ============================================================================

#[utoipa::path(
    get,
    path = "/patients/{id}/sessions",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Sessions ordered by scheduled time", body = [SessionRes]),
        (status = 403, description = "No view access to this patient", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<SessionRes>>> {
    let patient_id = parse_id(&id)?;
    let sessions = state.ctx.patients.list_sessions(&actor, &patient_id).await?;
    Ok(Json(sessions.iter().map(SessionRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/sessions",
    params(("id" = String, Path, description = "Patient id")),
    request_body = CreateSessionReq,
    responses(
        (status = 201, description = "Session scheduled", body = SessionRes),
        (status = 400, description = "Malformed body or assignee is not an operator", body = ErrorRes),
        (status = 403, description = "No edit access to this patient", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(req): Json<CreateSessionReq>,
) -> ApiResult<(StatusCode, Json<SessionRes>)> {
    let patient_id = parse_id(&id)?;
    let new_session = NewSession::try_from(req)?;
    let session = state
        .ctx
        .patients
        .schedule_session(&actor, &patient_id, new_session)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionRes::from(&session))))
}

#[utoipa::path(
    put,
    path = "/patients/{id}/sessions/{session_id}/status",
    params(
        ("id" = String, Path, description = "Patient id"),
        ("session_id" = String, Path, description = "Session id")
    ),
    request_body = UpdateSessionStatusReq,
    responses(
        (status = 200, description = "Session after the transition", body = SessionRes),
        (status = 403, description = "No edit access to this patient", body = ErrorRes),
        (status = 404, description = "Session not found for this patient", body = ErrorRes),
        (status = 409, description = "Session is already completed or cancelled", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Move a treatment session to a new status
///
/// The patient and the assigned operator are notified of the change, live if connected and
/// through a stored notification either way.
///
/// # Errors
/// Returns `409 Conflict` when the session is already in a terminal status.
#[axum::debug_handler]
pub async fn update_session_status(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path((id, session_id)): Path<(String, String)>,
    Json(req): Json<UpdateSessionStatusReq>,
) -> ApiResult<Json<SessionRes>> {
    let patient_id = parse_id(&id)?;
    let session_id = parse_id(&session_id)?;
    let status = req.status()?;
    let session = state
        .ctx
        .patients
        .update_session_status(&actor, &patient_id, &session_id, status)
        .await?;
    Ok(Json(SessionRes::from(&session)))
}

// ============================================================================
// MESSAGING
// ============================================================================

#[utoipa::path(
    get,
    path = "/patients/{id}/messages",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Recent messages, oldest first", body = [MessageRes]),
        (status = 403, description = "No view access to this patient", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_patient_messages(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<MessageRes>>> {
    let scope = MessageScope::Patient(parse_id(&id)?);
    let messages = state.ctx.messaging.history(&actor, &scope).await?;
    Ok(Json(messages.iter().map(MessageRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/messages",
    params(("id" = String, Path, description = "Patient id")),
    request_body = SendMessageReq,
    responses(
        (status = 201, description = "Message stored and delivered", body = MessageRes),
        (status = 400, description = "Empty or oversized content", body = ErrorRes),
        (status = 403, description = "No view access to this patient", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn send_patient_message(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(req): Json<SendMessageReq>,
) -> ApiResult<(StatusCode, Json<MessageRes>)> {
    let scope = MessageScope::Patient(parse_id(&id)?);
    let message = state
        .ctx
        .messaging
        .send_message(&actor, scope, &req.content, None)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageRes::from(&message))))
}

#[utoipa::path(
    post,
    path = "/groups",
    request_body = CreateGroupReq,
    responses(
        (status = 201, description = "Group created; the caller is always a member", body = GroupRes),
        (status = 400, description = "Invalid name or member id", body = ErrorRes),
        (status = 404, description = "A member does not exist", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<CreateGroupReq>,
) -> ApiResult<(StatusCode, Json<GroupRes>)> {
    let member_ids = req.member_ids()?;
    let group = state
        .ctx
        .messaging
        .create_group(&actor, &req.name, member_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(GroupRes::from(&group))))
}

#[utoipa::path(
    get,
    path = "/groups/{id}/messages",
    params(("id" = String, Path, description = "Group id")),
    responses(
        (status = 200, description = "Recent messages, oldest first", body = [MessageRes]),
        (status = 403, description = "Caller is not a member", body = ErrorRes),
        (status = 404, description = "Group not found", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_group_messages(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<MessageRes>>> {
    let scope = MessageScope::Group(parse_id(&id)?);
    let messages = state.ctx.messaging.history(&actor, &scope).await?;
    Ok(Json(messages.iter().map(MessageRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/groups/{id}/messages",
    params(("id" = String, Path, description = "Group id")),
    request_body = SendMessageReq,
    responses(
        (status = 201, description = "Message stored and delivered", body = MessageRes),
        (status = 403, description = "Caller is not a member", body = ErrorRes),
        (status = 404, description = "Group not found", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Post a message to a group
///
/// Members subscribed to the group room receive it live. Every member other than the sender
/// also gets a stored notification.
#[axum::debug_handler]
pub async fn send_group_message(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(req): Json<SendMessageReq>,
) -> ApiResult<(StatusCode, Json<MessageRes>)> {
    let scope = MessageScope::Group(parse_id(&id)?);
    let message = state
        .ctx
        .messaging
        .send_message(&actor, scope, &req.content, None)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageRes::from(&message))))
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[utoipa::path(
    get,
    path = "/notifications",
    params(NotificationsQuery),
    responses(
        (status = 200, description = "The caller's notifications, newest first", body = [NotificationRes])
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<NotificationsQuery>,
) -> ApiResult<Json<Vec<NotificationRes>>> {
    let notifications = state
        .ctx
        .notifications
        .list(&actor, query.unread_only)
        .await?;
    Ok(Json(notifications.iter().map(NotificationRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    params(("id" = String, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationRes),
        (status = 404, description = "No such notification for this caller", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Mark one of the caller's notifications as read
///
/// Another user's notification answers `404`, the same as a missing one.
#[axum::debug_handler]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<NotificationRes>> {
    let notification_id = parse_id(&id)?;
    let notification = state
        .ctx
        .notifications
        .mark_read(&actor, &notification_id)
        .await?;
    Ok(Json(NotificationRes::from(&notification)))
}
