//! User accounts and credential checks.

use chrono::Utc;
use clinic_types::{EmailAddress, NonEmptyText};
use clinic_uuid::ClinicUuid;
use std::sync::Arc;

use crate::config::BootstrapAdmin;
use crate::constants::{MAX_DISPLAY_NAME_CHARS, MIN_PASSWORD_LEN};
use crate::model::{Actor, MedicalProfile, Role, User, UserId, UserType};
use crate::password::{hash_password, verify_password};
use crate::store::{ProfileStore, UserStore};
use crate::{ClinicError, ClinicResult};

/// Input for creating a user account.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub role: Role,
    pub user_type: UserType,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { users, profiles }
    }

    /// Creates a user on behalf of an administrator.
    ///
    /// Patient-type users get an empty medical profile sharing their id.
    ///
    /// # Errors
    ///
    /// * `Forbidden` - the actor is not an administrator.
    /// * `BadRequest` - invalid email, display name or password, or a patient with the admin role.
    /// * `Conflict` - the email is already registered.
    pub async fn create_user(&self, actor: &Actor, new_user: NewUser) -> ClinicResult<User> {
        if !actor.is_admin() {
            return Err(ClinicError::forbidden("only administrators can create users"));
        }
        let user = self.insert(new_user).await?;
        tracing::info!(
            user_id = %user.id,
            created_by = %actor.user_id,
            user_type = %user.user_type,
            "user created"
        );
        Ok(user)
    }

    /// Checks an email and password pair.
    ///
    /// Unknown emails and wrong passwords produce the same `Unauthenticated` error.
    pub async fn authenticate(&self, email: &str, password: &str) -> ClinicResult<User> {
        let invalid = || ClinicError::Unauthenticated("invalid email or password".into());

        let email = EmailAddress::parse(email).map_err(|_| invalid())?;
        let user = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or_else(invalid)?;

        if verify_password(password, &user.password_hash) {
            Ok(user)
        } else {
            Err(invalid())
        }
    }

    pub async fn get(&self, id: &UserId) -> ClinicResult<User> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| ClinicError::not_found(format!("user {id}")))
    }

    /// Resolves a user that must exist and be of `user_type`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user is missing, `BadRequest` if the type does not match.
    pub async fn get_of_type(&self, id: &UserId, user_type: UserType) -> ClinicResult<User> {
        let user = self.get(id).await?;
        if user.user_type != user_type {
            return Err(ClinicError::bad_request(format!(
                "user {id} is not a {user_type}"
            )));
        }
        Ok(user)
    }

    /// Creates the configured administrator unless a user with that email already exists.
    ///
    /// Returns the created user, or `None` if nothing was done.
    pub async fn ensure_bootstrap_admin(
        &self,
        admin: &BootstrapAdmin,
    ) -> ClinicResult<Option<User>> {
        if self.users.find_user_by_email(&admin.email).await?.is_some() {
            tracing::debug!(email = %admin.email, "bootstrap admin already present");
            return Ok(None);
        }

        let user = self
            .insert(NewUser {
                email: admin.email.to_string(),
                display_name: "Administrator".into(),
                password: admin.password.clone(),
                role: Role::Admin,
                user_type: UserType::Operator,
            })
            .await?;
        tracing::info!(user_id = %user.id, email = %user.email, "bootstrap admin created");
        Ok(Some(user))
    }

    async fn insert(&self, new_user: NewUser) -> ClinicResult<User> {
        let email = EmailAddress::parse(&new_user.email)?;
        let display_name = NonEmptyText::bounded(&new_user.display_name, MAX_DISPLAY_NAME_CHARS)?;
        if new_user.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClinicError::bad_request(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if new_user.user_type == UserType::Patient && new_user.role == Role::Admin {
            return Err(ClinicError::bad_request("patients cannot hold the admin role"));
        }

        let user = User {
            id: ClinicUuid::new(),
            email,
            display_name,
            role: new_user.role,
            user_type: new_user.user_type,
            password_hash: hash_password(&new_user.password)?,
            is_online: false,
            last_seen: None,
            created_at: Utc::now(),
        };
        let user = self.users.insert_user(user).await?;

        if user.user_type == UserType::Patient {
            self.profiles
                .put_profile(MedicalProfile {
                    patient_id: user.id,
                    ..MedicalProfile::default()
                })
                .await?;
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn service() -> (UserService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (UserService::new(store.clone(), store.clone()), store)
    }

    fn admin() -> Actor {
        Actor::new(ClinicUuid::new(), Role::Admin, UserType::Operator)
    }

    fn new_user(email: &str, user_type: UserType) -> NewUser {
        NewUser {
            email: email.into(),
            display_name: "Jo Bloggs".into(),
            password: "a-good-password".into(),
            role: Role::Basic,
            user_type,
        }
    }

    #[tokio::test]
    async fn test_create_patient_creates_empty_profile() {
        let (service, store) = service();
        let patient = service
            .create_user(&admin(), new_user("jo@clinic.test", UserType::Patient))
            .await
            .expect("create_user should succeed");

        let profile = store
            .get_profile(&patient.id)
            .await
            .unwrap()
            .expect("profile should exist");
        assert_eq!(profile.patient_id, patient.id);
        assert!(profile.allergies.is_empty());
    }

    #[tokio::test]
    async fn test_only_admin_creates_users() {
        let (service, _) = service();
        let support = Actor::new(ClinicUuid::new(), Role::Support, UserType::Operator);
        let err = service
            .create_user(&support, new_user("x@clinic.test", UserType::Operator))
            .await
            .unwrap_err();
        assert!(matches!(err, ClinicError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let (service, _) = service();
        let mut short = new_user("a@clinic.test", UserType::Operator);
        short.password = "short".into();
        assert!(matches!(
            service.create_user(&admin(), short).await,
            Err(ClinicError::BadRequest(_))
        ));

        let mut admin_patient = new_user("b@clinic.test", UserType::Patient);
        admin_patient.role = Role::Admin;
        assert!(matches!(
            service.create_user(&admin(), admin_patient).await,
            Err(ClinicError::BadRequest(_))
        ));

        assert_eq!(
            service
                .create_user(&admin(), new_user("bad-email", UserType::Operator))
                .await
                .unwrap_err()
                .code(),
            "bad_request"
        );
    }

    #[tokio::test]
    async fn test_authenticate() {
        let (service, _) = service();
        service
            .create_user(&admin(), new_user("nurse@clinic.test", UserType::Operator))
            .await
            .unwrap();

        let user = service
            .authenticate("Nurse@Clinic.test", "a-good-password")
            .await
            .expect("authenticate should succeed");
        assert_eq!(user.email.as_str(), "nurse@clinic.test");

        for (email, password) in [
            ("nurse@clinic.test", "wrong-password"),
            ("nobody@clinic.test", "a-good-password"),
            ("", "a-good-password"),
        ] {
            assert!(matches!(
                service.authenticate(email, password).await,
                Err(ClinicError::Unauthenticated(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let (service, _) = service();
        let admin = BootstrapAdmin {
            email: EmailAddress::parse("root@clinic.test").unwrap(),
            password: "bootstrap-password".into(),
        };

        let created = service.ensure_bootstrap_admin(&admin).await.unwrap();
        assert_eq!(created.map(|u| u.role), Some(Role::Admin));
        assert!(service.ensure_bootstrap_admin(&admin).await.unwrap().is_none());
    }
}
