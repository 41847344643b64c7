//! Issuing and revoking patient-access grants.
//!
//! Only an administrator or the patient themself may manage a patient's grants, and only
//! operator-type users can be grantees. Revoking also removes the operator's live
//! connections from the patient's room, so no further clinical events reach them.

use std::sync::Arc;

use crate::events::{DomainEvent, RoomKey};
use crate::fanout::NotificationFanout;
use crate::model::{Actor, PatientAccess, PatientId, UserId, UserType};
use crate::repositories::users::UserService;
use crate::rooms::RoomHub;
use crate::store::GrantStore;
use crate::{ClinicError, ClinicResult};

#[derive(Clone)]
pub struct GrantService {
    users: UserService,
    grants: Arc<dyn GrantStore>,
    hub: Arc<RoomHub>,
    fanout: NotificationFanout,
}

impl GrantService {
    pub fn new(
        users: UserService,
        grants: Arc<dyn GrantStore>,
        hub: Arc<RoomHub>,
        fanout: NotificationFanout,
    ) -> Self {
        Self {
            users,
            grants,
            hub,
            fanout,
        }
    }

    /// Grants (or replaces) an operator's access to a patient.
    ///
    /// `can_edit` implies `can_view`. A grant with neither flag is rejected.
    ///
    /// # Errors
    ///
    /// * `Forbidden` - the actor is neither an administrator nor the patient.
    /// * `NotFound` - the patient or operator does not exist.
    /// * `BadRequest` - the ids refer to the wrong user types, or no permission was requested.
    pub async fn grant(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
        operator_id: &UserId,
        can_view: bool,
        can_edit: bool,
    ) -> ClinicResult<PatientAccess> {
        ensure_manager(actor, patient_id)?;
        if !can_view && !can_edit {
            return Err(ClinicError::bad_request(
                "a grant needs can_view or can_edit; revoke to remove access",
            ));
        }
        self.users.get_of_type(patient_id, UserType::Patient).await?;
        self.users.get_of_type(operator_id, UserType::Operator).await?;

        let grant = self
            .grants
            .upsert_grant(PatientAccess::new(
                *patient_id,
                *operator_id,
                can_view,
                can_edit,
                actor.user_id,
            ))
            .await?;

        tracing::info!(
            patient_id = %patient_id,
            operator_id = %operator_id,
            can_view = grant.can_view,
            can_edit = grant.can_edit,
            granted_by = %actor.user_id,
            "patient access granted"
        );
        self.fanout
            .dispatch(DomainEvent::AccessGranted(grant.clone()), None)
            .await;
        Ok(grant)
    }

    /// Removes an operator's access to a patient.
    ///
    /// # Errors
    ///
    /// `Forbidden` as for [`GrantService::grant`]; `NotFound` if no grant existed.
    pub async fn revoke(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
        operator_id: &UserId,
    ) -> ClinicResult<()> {
        ensure_manager(actor, patient_id)?;
        if !self.grants.revoke_grant(patient_id, operator_id).await? {
            return Err(ClinicError::not_found(format!(
                "no grant for operator {operator_id} on patient {patient_id}"
            )));
        }

        // The row is gone first, so a join racing this call fails its re-check.
        let evicted = self
            .hub
            .unsubscribe_user(operator_id, &RoomKey::Patient(*patient_id))
            .await;

        tracing::info!(
            patient_id = %patient_id,
            operator_id = %operator_id,
            revoked_by = %actor.user_id,
            evicted,
            "patient access revoked"
        );
        self.fanout
            .dispatch(
                DomainEvent::AccessRevoked {
                    patient_id: *patient_id,
                    operator_id: *operator_id,
                    revoked_by: actor.user_id,
                },
                None,
            )
            .await;
        Ok(())
    }

    pub async fn list(&self, actor: &Actor, patient_id: &PatientId) -> ClinicResult<Vec<PatientAccess>> {
        ensure_manager(actor, patient_id)?;
        Ok(self.grants.grants_for_patient(patient_id).await?)
    }
}

fn ensure_manager(actor: &Actor, patient_id: &PatientId) -> ClinicResult<()> {
    if actor.is_admin() || actor.is_patient(patient_id) {
        Ok(())
    } else {
        Err(ClinicError::forbidden(
            "only an administrator or the patient can manage access",
        ))
    }
}
