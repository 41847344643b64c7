//! Patient records: medical profile and treatment sessions.
//!
//! Every operation is gated by [`AccessControl`]: reads need view permission, writes need
//! edit permission.

use chrono::{DateTime, NaiveDate, Utc};
use clinic_uuid::ClinicUuid;
use std::sync::Arc;

use crate::access::{AccessControl, Permission};
use crate::events::DomainEvent;
use crate::fanout::NotificationFanout;
use crate::model::{
    Actor, MedicalProfile, PatientId, SessionId, SessionStatus, TreatmentSession, UserType,
};
use crate::repositories::users::UserService;
use crate::store::{ProfileStore, SessionStore};
use crate::{ClinicError, ClinicResult};

/// Replacement values for a medical profile.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub date_of_birth: Option<NaiveDate>,
    pub blood_type: Option<String>,
    pub allergies: Vec<String>,
    pub conditions: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewSession {
    pub operator_id: crate::model::UserId,
    pub scheduled_for: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct PatientService {
    users: UserService,
    profiles: Arc<dyn ProfileStore>,
    sessions: Arc<dyn SessionStore>,
    access: AccessControl,
    fanout: NotificationFanout,
}

impl PatientService {
    pub fn new(
        users: UserService,
        profiles: Arc<dyn ProfileStore>,
        sessions: Arc<dyn SessionStore>,
        access: AccessControl,
        fanout: NotificationFanout,
    ) -> Self {
        Self {
            users,
            profiles,
            sessions,
            access,
            fanout,
        }
    }

    // ========================================================================
    // PROFILE
    // ========================================================================

    pub async fn get_profile(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
    ) -> ClinicResult<MedicalProfile> {
        self.access
            .authorize_id(actor, patient_id, Permission::View)
            .await?;
        self.profiles
            .get_profile(patient_id)
            .await?
            .ok_or_else(|| ClinicError::not_found(format!("profile for patient {patient_id}")))
    }

    /// Replaces the patient's medical profile.
    ///
    /// # Errors
    ///
    /// * `Forbidden` - the actor lacks edit permission (administrators always do).
    /// * `NotFound` - no such user.
    /// * `BadRequest` - the user is not a patient, or a field is blank.
    pub async fn update_profile(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
        update: ProfileUpdate,
    ) -> ClinicResult<MedicalProfile> {
        let decision = self
            .access
            .authorize_id(actor, patient_id, Permission::Edit)
            .await?;
        self.users.get_of_type(patient_id, UserType::Patient).await?;

        let profile = MedicalProfile {
            patient_id: *patient_id,
            date_of_birth: update.date_of_birth,
            blood_type: optional_text(update.blood_type),
            allergies: clean_list(update.allergies),
            conditions: clean_list(update.conditions),
            notes: optional_text(update.notes),
            updated_at: Some(Utc::now()),
        };
        if profile.date_of_birth.is_some_and(|dob| dob > Utc::now().date_naive()) {
            return Err(ClinicError::bad_request("date of birth is in the future"));
        }

        let profile = self.profiles.put_profile(profile).await?;
        tracing::info!(
            patient_id = %patient_id,
            updated_by = %actor.user_id,
            grant_issuer = ?decision.grant().map(|g| g.granted_by),
            "profile updated"
        );
        Ok(profile)
    }

    // ========================================================================
    // SESSIONS
    // ========================================================================

    pub async fn list_sessions(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
    ) -> ClinicResult<Vec<TreatmentSession>> {
        self.access
            .authorize_id(actor, patient_id, Permission::View)
            .await?;
        Ok(self.sessions.sessions_for_patient(patient_id).await?)
    }

    /// Schedules a session for the patient with an operator.
    pub async fn schedule_session(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
        new_session: NewSession,
    ) -> ClinicResult<TreatmentSession> {
        let decision = self
            .access
            .authorize_id(actor, patient_id, Permission::Edit)
            .await?;
        self.users.get_of_type(patient_id, UserType::Patient).await?;
        self.users
            .get_of_type(&new_session.operator_id, UserType::Operator)
            .await?;

        let now = Utc::now();
        let session = TreatmentSession {
            id: ClinicUuid::new(),
            patient_id: *patient_id,
            operator_id: new_session.operator_id,
            scheduled_for: new_session.scheduled_for,
            status: SessionStatus::Scheduled,
            notes: optional_text(new_session.notes),
            created_at: now,
            updated_at: now,
        };
        let session = self.sessions.insert_session(session).await?;
        tracing::info!(
            session_id = %session.id,
            patient_id = %patient_id,
            operator_id = %session.operator_id,
            grant_issuer = ?decision.grant().map(|g| g.granted_by),
            "session scheduled"
        );
        Ok(session)
    }

    /// Moves a session to a new status and fans the change out.
    ///
    /// Setting the current status again is a no-op and notifies nobody.
    ///
    /// # Errors
    ///
    /// * `NotFound` - the session does not exist or belongs to another patient.
    /// * `Conflict` - the session is already completed or cancelled, or the move goes backwards.
    pub async fn update_session_status(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
        session_id: &SessionId,
        status: SessionStatus,
    ) -> ClinicResult<TreatmentSession> {
        let decision = self
            .access
            .authorize_id(actor, patient_id, Permission::Edit)
            .await?;

        let mut session = self
            .sessions
            .get_session(session_id)
            .await?
            .filter(|s| &s.patient_id == patient_id)
            .ok_or_else(|| ClinicError::not_found(format!("session {session_id}")))?;

        if session.status == status {
            return Ok(session);
        }
        if !transition_allowed(session.status, status) {
            return Err(ClinicError::Conflict(format!(
                "session cannot move from {} to {}",
                session.status.as_str(),
                status.as_str()
            )));
        }

        let expected = session.status;
        session.status = status;
        session.updated_at = Utc::now();
        // A concurrent change since the read surfaces as Conflict and notifies nobody.
        let session = self.sessions.update_session_if(session, expected).await?;

        tracing::info!(
            session_id = %session.id,
            status = session.status.as_str(),
            changed_by = %actor.user_id,
            grant_issuer = ?decision.grant().map(|g| g.granted_by),
            "session status changed"
        );
        self.fanout
            .dispatch(
                DomainEvent::SessionStatusChanged {
                    session: session.clone(),
                    changed_by: actor.user_id,
                },
                None,
            )
            .await;
        Ok(session)
    }
}

fn transition_allowed(from: SessionStatus, to: SessionStatus) -> bool {
    match from {
        SessionStatus::Scheduled => to != SessionStatus::Scheduled,
        SessionStatus::InProgress => to.is_terminal(),
        SessionStatus::Completed | SessionStatus::Cancelled => false,
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values.into_iter().filter_map(|v| optional_text(Some(v))) {
        if !cleaned.iter().any(|c| c.eq_ignore_ascii_case(&value)) {
            cleaned.push(value);
        }
    }
    cleaned
}
