use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use utoipa::OpenApi;

use api_shared::{TokenConfig, TokenService};
use clinic_core::model::User;
use clinic_core::repositories::users::NewUser;
use clinic_core::{Actor, ClinicContext, ClinicUuid, CoreConfig, Role, UserType};

use crate::{router, ApiDoc, AppState};

const SECRET: &str = "rest-test-secret-of-at-least-32-bytes";
const PASSWORD: &str = "correct horse battery";

struct Harness {
    app: Router,
    ctx: ClinicContext,
    tokens: Arc<TokenService>,
}

fn harness() -> Harness {
    let ctx = ClinicContext::in_memory(CoreConfig::default());
    let config = TokenConfig::new(SECRET, Duration::from_secs(3600))
        .expect("token config should succeed");
    let tokens = Arc::new(TokenService::new(&config));
    Harness {
        app: router(AppState::new(ctx.clone(), tokens.clone())),
        ctx,
        tokens,
    }
}

impl Harness {
    async fn user(&self, email: &str, role: Role, user_type: UserType) -> User {
        let root = Actor::new(ClinicUuid::new(), Role::Admin, UserType::Operator);
        self.ctx
            .users
            .create_user(
                &root,
                NewUser {
                    email: email.into(),
                    display_name: "Test User".into(),
                    password: PASSWORD.into(),
                    role,
                    user_type,
                },
            )
            .await
            .expect("create_user should succeed")
    }

    fn bearer(&self, user: &User) -> String {
        let issued = self
            .tokens
            .mint(&Actor::from(user))
            .expect("mint should succeed");
        format!("Bearer {}", issued.token)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, json)
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let h = harness();
    let (status, body) = h.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let h = harness();

    let (status, body) = h.call(Method::GET, "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("unauthenticated"));

    let (status, _) = h
        .call(Method::GET, "/users/me", Some("Bearer not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_issues_token_for_valid_credentials() {
    let h = harness();
    let user = h
        .user("nurse@clinic.test", Role::Basic, UserType::Operator)
        .await;

    let (status, body) = h
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "nurse@clinic.test", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], json!("Bearer"));
    let token = body["token"].as_str().expect("token should be a string");
    let actor = h.tokens.verify(token).expect("verify should succeed");
    assert_eq!(actor.user_id, user.id);

    let (status, me) = h
        .call(Method::GET, "/users/me", Some(&format!("Bearer {token}")), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], json!("nurse@clinic.test"));

    let (status, body) = h
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "nurse@clinic.test", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("unauthenticated"));
}

#[tokio::test]
async fn test_only_admins_create_users() {
    let h = harness();
    let admin = h.user("admin@clinic.test", Role::Admin, UserType::Operator).await;
    let basic = h.user("basic@clinic.test", Role::Basic, UserType::Operator).await;
    let body = json!({
        "email": "new.patient@clinic.test",
        "display_name": "New Patient",
        "password": PASSWORD,
        "role": "basic",
        "user_type": "patient",
    });

    let (status, _) = h
        .call(Method::POST, "/users", Some(&h.bearer(&basic)), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = h
        .call(Method::POST, "/users", Some(&h.bearer(&admin)), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user_type"], json!("patient"));

    let (status, _) = h
        .call(Method::POST, "/users", Some(&h.bearer(&admin)), Some(body))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_profile_access_follows_grants() {
    let h = harness();
    let admin = h.user("admin@clinic.test", Role::Admin, UserType::Operator).await;
    let operator = h.user("op@clinic.test", Role::Basic, UserType::Operator).await;
    let patient = h.user("pat@clinic.test", Role::Basic, UserType::Patient).await;
    let profile_uri = format!("/patients/{}/profile", patient.id);

    let (status, body) = h
        .call(Method::GET, &profile_uri, Some(&h.bearer(&operator)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], json!("forbidden"));

    let (status, _) = h
        .call(Method::GET, &profile_uri, Some(&h.bearer(&patient)), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // Admin may view any record but never edit it.
    let (status, _) = h
        .call(Method::GET, &profile_uri, Some(&h.bearer(&admin)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h
        .call(
            Method::PUT,
            &profile_uri,
            Some(&h.bearer(&admin)),
            Some(json!({ "blood_type": "A+" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, grant) = h
        .call(
            Method::POST,
            &format!("/patients/{}/access", patient.id),
            Some(&h.bearer(&patient)),
            Some(json!({ "operator_id": operator.id.to_string(), "can_view": true, "can_edit": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grant["can_view"], json!(true));

    let (status, profile) = h
        .call(
            Method::PUT,
            &profile_uri,
            Some(&h.bearer(&operator)),
            Some(json!({ "blood_type": "O-", "allergies": ["penicillin"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["blood_type"], json!("O-"));
    assert_eq!(profile["allergies"], json!(["penicillin"]));

    let revoke_uri = format!("/patients/{}/access/{}", patient.id, operator.id);
    let (status, _) = h
        .call(Method::DELETE, &revoke_uri, Some(&h.bearer(&patient)), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = h
        .call(Method::DELETE, &revoke_uri, Some(&h.bearer(&patient)), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .call(Method::GET, &profile_uri, Some(&h.bearer(&operator)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_path_id_is_bad_request() {
    let h = harness();
    let patient = h.user("pat@clinic.test", Role::Basic, UserType::Patient).await;

    let (status, body) = h
        .call(
            Method::GET,
            "/patients/not-an-id/profile",
            Some(&h.bearer(&patient)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("bad_request"));
}

#[tokio::test]
async fn test_session_status_flow_notifies_patient() {
    let h = harness();
    let operator = h.user("op@clinic.test", Role::Basic, UserType::Operator).await;
    let patient = h.user("pat@clinic.test", Role::Basic, UserType::Patient).await;
    h.ctx
        .grants
        .grant(&Actor::from(&patient), &patient.id, &operator.id, true, true)
        .await
        .expect("grant should succeed");

    let (status, session) = h
        .call(
            Method::POST,
            &format!("/patients/{}/sessions", patient.id),
            Some(&h.bearer(&operator)),
            Some(json!({
                "operator_id": operator.id.to_string(),
                "scheduled_for": "2030-01-02T09:30:00Z",
                "notes": "first visit",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["status"], json!("scheduled"));
    let session_id = session["id"].as_str().expect("session id should be a string");
    let status_uri = format!("/patients/{}/sessions/{}/status", patient.id, session_id);

    let (status, updated) = h
        .call(
            Method::PUT,
            &status_uri,
            Some(&h.bearer(&operator)),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], json!("completed"));

    let (status, body) = h
        .call(
            Method::PUT,
            &status_uri,
            Some(&h.bearer(&operator)),
            Some(json!({ "status": "in_progress" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("conflict"));

    let (status, notifications) = h
        .call(
            Method::GET,
            "/notifications?unread_only=true",
            Some(&h.bearer(&patient)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = notifications
        .as_array()
        .expect("notifications should be an array")
        .iter()
        .filter_map(|n| n["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"session_status"));
}

#[tokio::test]
async fn test_group_messages_and_notification_ownership() {
    let h = harness();
    let alice = h.user("alice@clinic.test", Role::Basic, UserType::Operator).await;
    let bob = h.user("bob@clinic.test", Role::Basic, UserType::Operator).await;
    let carol = h.user("carol@clinic.test", Role::Basic, UserType::Operator).await;

    let (status, group) = h
        .call(
            Method::POST,
            "/groups",
            Some(&h.bearer(&alice)),
            Some(json!({ "name": "Ward 3", "member_ids": [bob.id.to_string()] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let messages_uri = format!(
        "/groups/{}/messages",
        group["id"].as_str().expect("group id should be a string")
    );

    let (status, _) = h
        .call(
            Method::POST,
            &messages_uri,
            Some(&h.bearer(&alice)),
            Some(json!({ "content": "handover at 6" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = h
        .call(Method::GET, &messages_uri, Some(&h.bearer(&carol)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, history) = h
        .call(Method::GET, &messages_uri, Some(&h.bearer(&bob)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history[0]["content"], json!("handover at 6"));

    // Every member but the sender gets a stored notification.
    let (_, notifications) = h
        .call(Method::GET, "/notifications", Some(&h.bearer(&bob)), None)
        .await;
    let id = notifications[0]["id"]
        .as_str()
        .expect("notification id should be a string")
        .to_string();

    let read_uri = format!("/notifications/{id}/read");
    let (status, _) = h
        .call(Method::POST, &read_uri, Some(&h.bearer(&carol)), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, read) = h
        .call(Method::POST, &read_uri, Some(&h.bearer(&bob)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["read"], json!(true));
}

#[test]
fn test_openapi_documents_every_route() {
    let doc = ApiDoc::openapi();
    for path in [
        "/health",
        "/auth/login",
        "/users/me",
        "/patients/{id}/profile",
        "/patients/{id}/access/{operator_id}",
        "/patients/{id}/sessions/{session_id}/status",
        "/groups/{id}/messages",
        "/notifications/{id}/read",
    ] {
        assert!(doc.paths.paths.contains_key(path), "missing {path}");
    }
    let components = doc.components.expect("components should be present");
    assert!(components.security_schemes.contains_key("bearer"));
}
