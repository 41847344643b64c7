//! Patient-access authorization.
//!
//! Decides whether an [`Actor`] may view or edit a patient's records. The rules are:
//!
//! | Actor                         | View                 | Edit                  |
//! |-------------------------------|----------------------|-----------------------|
//! | the patient themself          | allowed              | allowed               |
//! | any other patient-type user   | denied               | denied                |
//! | `Admin` role                  | allowed              | **denied**            |
//! | any other operator            | grant with can_view  | grant with can_edit   |
//!
//! Administrators may read every record but never change clinical data. This carve-out
//! is intentional and must not be collapsed into a plain flag check.
//!
//! [`evaluate`] is a pure function of (actor, patient, permission, grant). [`AccessControl`]
//! wraps it with input validation and the injected [`GrantLookup`] capability, which is
//! only consulted when the outcome actually depends on a grant.

use async_trait::async_trait;
use clinic_uuid::ClinicUuid;
use std::sync::Arc;

use crate::error::{ClinicError, ClinicResult, StoreResult};
use crate::model::{Actor, PatientAccess, PatientId, UserId, UserType};

/// The operation being gated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    View,
    Edit,
}

impl Permission {
    fn verb(&self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Edit => "edit",
        }
    }
}

/// How an access check was satisfied.
///
/// Returned to the caller so the resolved grant is available for auditing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    /// The actor is the patient.
    OwnRecord,
    /// The actor holds the top administrative role (view only).
    Administrator,
    /// The actor holds a matching grant.
    Granted(PatientAccess),
}

impl AccessDecision {
    pub fn grant(&self) -> Option<&PatientAccess> {
        match self {
            AccessDecision::Granted(grant) => Some(grant),
            _ => None,
        }
    }
}

/// Read-side capability used to resolve grants.
#[async_trait]
pub trait GrantLookup: Send + Sync {
    /// Returns the grant for (`patient_id`, `operator_id`), if any.
    async fn find_grant(
        &self,
        patient_id: &PatientId,
        operator_id: &UserId,
    ) -> StoreResult<Option<PatientAccess>>;
}

/// Whether the outcome for this actor depends on a stored grant.
///
/// Self access, cross-patient access and administrator access are all decided by the
/// actor alone.
pub fn needs_grant(actor: &Actor) -> bool {
    actor.user_type == UserType::Operator && !actor.is_admin()
}

/// Pure access decision.
///
/// `grant` is the stored grant for (`patient_id`, `actor.user_id`), or `None` when absent or
/// not looked up.
///
/// # Errors
///
/// Returns [`ClinicError::Forbidden`] when no rule allows the operation.
pub fn evaluate(
    actor: &Actor,
    patient_id: &PatientId,
    permission: Permission,
    grant: Option<&PatientAccess>,
) -> ClinicResult<AccessDecision> {
    if actor.is_patient(patient_id) {
        return Ok(AccessDecision::OwnRecord);
    }

    if actor.user_type == UserType::Patient {
        return Err(ClinicError::forbidden(format!(
            "patients cannot {} another patient's records",
            permission.verb()
        )));
    }

    if actor.is_admin() {
        return match permission {
            Permission::View => Ok(AccessDecision::Administrator),
            Permission::Edit => Err(ClinicError::forbidden(
                "administrators may view but not edit clinical data",
            )),
        };
    }

    let grant = grant.filter(|g| g.patient_id == *patient_id && g.operator_id == actor.user_id);
    let allowed = match (permission, grant) {
        (Permission::View, Some(g)) => g.can_view,
        (Permission::Edit, Some(g)) => g.can_edit,
        (_, None) => false,
    };

    match grant {
        Some(g) if allowed => Ok(AccessDecision::Granted(g.clone())),
        _ => Err(ClinicError::forbidden(format!(
            "no {} access to this patient",
            permission.verb()
        ))),
    }
}

/// Access-control gate used by every patient-scoped operation.
#[derive(Clone)]
pub struct AccessControl {
    lookup: Arc<dyn GrantLookup>,
}

impl AccessControl {
    pub fn new(lookup: Arc<dyn GrantLookup>) -> Self {
        Self { lookup }
    }

    /// Authorizes `permission` for `actor` on the patient named by `patient_id`.
    ///
    /// # Arguments
    ///
    /// * `actor` - The authenticated actor, `None` if the request carried no credential.
    /// * `patient_id` - The raw patient identifier from the path or payload.
    /// * `permission` - View or edit.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::BadRequest`] if `patient_id` is missing or not a canonical id.
    /// - [`ClinicError::Unauthenticated`] if `actor` is `None`.
    /// - [`ClinicError::Forbidden`] if no rule allows the operation.
    /// - [`ClinicError::Internal`] if the grant lookup fails. A failed lookup never allows.
    pub async fn authorize(
        &self,
        actor: Option<&Actor>,
        patient_id: Option<&str>,
        permission: Permission,
    ) -> ClinicResult<AccessDecision> {
        let raw_id = patient_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ClinicError::bad_request("patient identifier is required"))?;
        let actor =
            actor.ok_or_else(|| ClinicError::Unauthenticated("authentication required".into()))?;
        let patient_id = ClinicUuid::parse(raw_id)?;

        self.authorize_id(actor, &patient_id, permission).await
    }

    /// As [`authorize`](Self::authorize) for an already-parsed patient id.
    pub async fn authorize_id(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
        permission: Permission,
    ) -> ClinicResult<AccessDecision> {
        let grant = if needs_grant(actor) {
            self.lookup
                .find_grant(patient_id, &actor.user_id)
                .await
                .map_err(|e| {
                    tracing::error!(
                        patient_id = %patient_id,
                        operator_id = %actor.user_id,
                        "grant lookup failed: {}",
                        e
                    );
                    ClinicError::Internal("failed to resolve patient access".into())
                })?
        } else {
            None
        };

        let decision = evaluate(actor, patient_id, permission, grant.as_ref())?;
        tracing::debug!(
            actor = %actor.user_id,
            patient_id = %patient_id,
            ?permission,
            ?decision,
            "patient access allowed"
        );
        Ok(decision)
    }

    /// `true` if `actor` may view the patient's records.
    ///
    /// Rule failures yield `Ok(false)`; malformed input and lookup failures are errors.
    pub async fn can_view(&self, actor: &Actor, patient_id: &PatientId) -> ClinicResult<bool> {
        self.predicate(actor, patient_id, Permission::View).await
    }

    /// `true` if `actor` may edit the patient's records.
    pub async fn can_edit(&self, actor: &Actor, patient_id: &PatientId) -> ClinicResult<bool> {
        self.predicate(actor, patient_id, Permission::Edit).await
    }

    async fn predicate(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
        permission: Permission,
    ) -> ClinicResult<bool> {
        match self.authorize_id(actor, patient_id, permission).await {
            Ok(_) => Ok(true),
            Err(ClinicError::Forbidden(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::Role;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubGrants {
        grants: Mutex<HashMap<(PatientId, UserId), PatientAccess>>,
        lookups: AtomicUsize,
        fail: bool,
    }

    impl StubGrants {
        fn with(grants: Vec<PatientAccess>) -> Self {
            let map = grants
                .into_iter()
                .map(|g| ((g.patient_id, g.operator_id), g))
                .collect();
            Self {
                grants: Mutex::new(map),
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl GrantLookup for StubGrants {
        async fn find_grant(
            &self,
            patient_id: &PatientId,
            operator_id: &UserId,
        ) -> StoreResult<Option<PatientAccess>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::Unavailable("database offline".into()));
            }
            Ok(self
                .grants
                .lock()
                .unwrap()
                .get(&(*patient_id, *operator_id))
                .cloned())
        }
    }

    fn operator(role: Role) -> Actor {
        Actor::new(ClinicUuid::new(), role, UserType::Operator)
    }

    fn patient() -> Actor {
        Actor::new(ClinicUuid::new(), Role::Basic, UserType::Patient)
    }

    fn grant(patient_id: PatientId, operator_id: UserId, view: bool, edit: bool) -> PatientAccess {
        PatientAccess {
            patient_id,
            operator_id,
            can_view: view,
            can_edit: edit,
            granted_by: ClinicUuid::new(),
            granted_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_no_grant_denies_operators() {
        let patient_id = ClinicUuid::new();
        for role in [Role::Basic, Role::Support] {
            let actor = operator(role);
            for permission in [Permission::View, Permission::Edit] {
                let result = evaluate(&actor, &patient_id, permission, None);
                assert!(matches!(result, Err(ClinicError::Forbidden(_))));
            }
        }
    }

    #[test]
    fn test_admin_views_but_never_edits() {
        let admin = operator(Role::Admin);
        let patient_id = ClinicUuid::new();
        let full_grant = grant(patient_id, admin.user_id, true, true);

        assert_eq!(
            evaluate(&admin, &patient_id, Permission::View, None).unwrap(),
            AccessDecision::Administrator
        );
        assert!(matches!(
            evaluate(&admin, &patient_id, Permission::Edit, None),
            Err(ClinicError::Forbidden(_))
        ));
        assert!(
            matches!(
                evaluate(&admin, &patient_id, Permission::Edit, Some(&full_grant)),
                Err(ClinicError::Forbidden(_))
            ),
            "an edit grant must not override the administrator carve-out"
        );
    }

    #[test]
    fn test_patient_self_access_only() {
        let me = patient();
        let other = ClinicUuid::new();

        for permission in [Permission::View, Permission::Edit] {
            assert_eq!(
                evaluate(&me, &me.user_id, permission, None).unwrap(),
                AccessDecision::OwnRecord
            );
            let stray_grant = grant(other, me.user_id, true, true);
            assert!(matches!(
                evaluate(&me, &other, permission, Some(&stray_grant)),
                Err(ClinicError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn test_grant_flags_are_respected() {
        let actor = operator(Role::Basic);
        let patient_id = ClinicUuid::new();

        let view_only = grant(patient_id, actor.user_id, true, false);
        assert!(evaluate(&actor, &patient_id, Permission::View, Some(&view_only)).is_ok());
        assert!(evaluate(&actor, &patient_id, Permission::Edit, Some(&view_only)).is_err());

        let none = grant(patient_id, actor.user_id, false, false);
        assert!(evaluate(&actor, &patient_id, Permission::View, Some(&none)).is_err());

        let edit = grant(patient_id, actor.user_id, true, true);
        let decision = evaluate(&actor, &patient_id, Permission::Edit, Some(&edit))
            .expect("edit grant should allow edit");
        assert_eq!(decision.grant(), Some(&edit));
        assert_eq!(AccessDecision::OwnRecord.grant(), None);
    }

    #[test]
    fn test_grant_for_another_pair_is_ignored() {
        let actor = operator(Role::Basic);
        let patient_id = ClinicUuid::new();
        let elsewhere = grant(ClinicUuid::new(), actor.user_id, true, true);

        assert!(evaluate(&actor, &patient_id, Permission::View, Some(&elsewhere)).is_err());
    }

    #[tokio::test]
    async fn test_authorize_requires_patient_id_and_actor() {
        let access = AccessControl::new(Arc::new(StubGrants::default()));
        let actor = operator(Role::Basic);

        let missing_id = access
            .authorize(Some(&actor), None, Permission::View)
            .await;
        assert!(matches!(missing_id, Err(ClinicError::BadRequest(_))));

        let blank_id = access
            .authorize(Some(&actor), Some("   "), Permission::View)
            .await;
        assert!(matches!(blank_id, Err(ClinicError::BadRequest(_))));

        let patient_id = ClinicUuid::new().to_string();
        let anonymous = access
            .authorize(None, Some(&patient_id), Permission::View)
            .await;
        assert!(matches!(anonymous, Err(ClinicError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_internal_not_allowed() {
        let access = AccessControl::new(Arc::new(StubGrants::failing()));
        let actor = operator(Role::Basic);
        let patient_id = ClinicUuid::new();

        let result = access
            .authorize_id(&actor, &patient_id, Permission::View)
            .await;
        assert!(matches!(result, Err(ClinicError::Internal(_))));

        let predicate = access.can_view(&actor, &patient_id).await;
        assert!(predicate.is_err(), "predicates must not mask lookup failures");
    }

    #[tokio::test]
    async fn test_lookup_skipped_for_self_admin_and_other_patients() {
        let stub = Arc::new(StubGrants::default());
        let access = AccessControl::new(stub.clone());
        let me = patient();
        let admin = operator(Role::Admin);

        assert!(access.can_edit(&me, &me.user_id).await.unwrap());
        assert!(access.can_view(&admin, &me.user_id).await.unwrap());
        assert!(!access.can_edit(&admin, &me.user_id).await.unwrap());
        assert!(!access.can_view(&patient(), &me.user_id).await.unwrap());

        assert_eq!(stub.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_predicates_follow_grants() {
        let actor = operator(Role::Support);
        let patient_id = ClinicUuid::new();
        let stub = StubGrants::with(vec![grant(patient_id, actor.user_id, true, false)]);
        let access = AccessControl::new(Arc::new(stub));

        assert!(access.can_view(&actor, &patient_id).await.unwrap());
        assert!(!access.can_edit(&actor, &patient_id).await.unwrap());
        assert!(!access.can_view(&actor, &ClinicUuid::new()).await.unwrap());
    }
}
