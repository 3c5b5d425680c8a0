use crate::auth::{self, AuthError, CurrentUser, GoogleProfile};
use crate::entities::*;
use chrono::Utc;
use sea_orm::*;
use taskboard_core::{Registration, User};
use uuid::Uuid;

pub mod api;

const MIN_PASSWORD_LENGTH: usize = 6;

/// Error type for UserService operations.
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("An account with email '{0}' already exists")]
    DuplicateEmail(String),
    #[error("User with ID {0} not found")]
    UserNotFound(Uuid),
    #[error("Invalid email or password")]
    InvalidCredentials,
    /// Profile or registration data failed validation.
    #[error("{0}")]
    InvalidProfile(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        User {
            id: model.id.to_string(),
            name: model.name,
            email: model.email,
            picture: model.picture,
        }
    }
}

impl From<&user::Model> for CurrentUser {
    fn from(model: &user::Model) -> Self {
        CurrentUser::new(model.id, model.email.clone())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_name(name: &str) -> Result<String, UserServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(UserServiceError::InvalidProfile(
            "Name is required".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_registration(registration: &Registration) -> Result<(), UserServiceError> {
    validate_name(&registration.name)?;
    if !registration.email.contains('@') {
        return Err(UserServiceError::InvalidProfile(
            "A valid email address is required".to_string(),
        ));
    }
    if registration.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(UserServiceError::InvalidProfile(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

pub struct UserService<'a> {
    db: &'a DatabaseConnection,
}

impl UserService<'_> {
    pub fn new(db: &DatabaseConnection) -> UserService<'_> {
        UserService { db }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, UserServiceError> {
        let found = user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(self.db)
            .await?;
        Ok(found)
    }

    /// Creates an email/password account.
    ///
    /// # Returns
    ///
    /// The stored account model, or `DuplicateEmail` when the address is taken.
    #[tracing::instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(
        &self,
        registration: Registration,
    ) -> Result<user::Model, UserServiceError> {
        validate_registration(&registration)?;
        let email = normalize_email(&registration.email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(UserServiceError::DuplicateEmail(email));
        }

        let password_hash = auth::hash_password(&registration.password)?;
        let now = Utc::now();
        let active_model = user::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            name: ActiveValue::Set(validate_name(&registration.name)?),
            email: ActiveValue::Set(email),
            password_hash: ActiveValue::Set(Some(password_hash)),
            google_id: ActiveValue::Set(None),
            picture: ActiveValue::Set(String::new()),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };
        let created = active_model.insert(self.db).await?;
        tracing::info!("Registered user {}", created.id);
        Ok(created)
    }

    /// Checks an email/password pair. Unknown emails and Google-only accounts
    /// fail the same way as a wrong password.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<user::Model, UserServiceError> {
        let account = self
            .find_by_email(email)
            .await?
            .ok_or(UserServiceError::InvalidCredentials)?;

        match &account.password_hash {
            Some(hash) if auth::verify_password(password, hash) => Ok(account),
            _ => Err(UserServiceError::InvalidCredentials),
        }
    }

    /// Returns the account linked to a Google identity, linking or creating one as needed.
    ///
    /// An existing account with the same email is linked to the Google subject, and its
    /// picture is refreshed from the profile.
    #[tracing::instrument(skip(self, profile), fields(email = %profile.email))]
    pub async fn find_or_create_google_user(
        &self,
        profile: GoogleProfile,
    ) -> Result<user::Model, UserServiceError> {
        let linked = user::Entity::find()
            .filter(user::Column::GoogleId.eq(profile.subject.clone()))
            .one(self.db)
            .await?;
        let existing = match linked {
            Some(account) => Some(account),
            None => self.find_by_email(&profile.email).await?,
        };

        if let Some(account) = existing {
            let mut active_model: user::ActiveModel = account.into();
            active_model.google_id = ActiveValue::Set(Some(profile.subject));
            if !profile.picture.is_empty() {
                active_model.picture = ActiveValue::Set(profile.picture);
            }
            active_model.updated_at = ActiveValue::Set(Utc::now());
            return Ok(active_model.update(self.db).await?);
        }

        let now = Utc::now();
        let active_model = user::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            name: ActiveValue::Set(profile.name),
            email: ActiveValue::Set(normalize_email(&profile.email)),
            password_hash: ActiveValue::Set(None),
            google_id: ActiveValue::Set(Some(profile.subject)),
            picture: ActiveValue::Set(profile.picture),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };
        let created = active_model.insert(self.db).await?;
        tracing::info!("Created user {} from Google login", created.id);
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_user_by_id(&self, id: Uuid) -> Result<user::Model, UserServiceError> {
        user::Entity::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or(UserServiceError::UserNotFound(id))
    }

    /// Renames a user. Only the display name is editable.
    #[tracing::instrument(skip(self))]
    pub async fn update_name(&self, id: Uuid, name: &str) -> Result<user::Model, UserServiceError> {
        let name = validate_name(name)?;
        let account = self.get_user_by_id(id).await?;

        let mut active_model: user::ActiveModel = account.into();
        active_model.name = ActiveValue::Set(name);
        active_model.updated_at = ActiveValue::Set(Utc::now());
        Ok(active_model.update(self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(name: &str, email: &str, password: &str) -> Registration {
        Registration {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn accepts_valid_registration() {
        assert!(validate_registration(&registration("Ada", "ada@example.com", "secret1")).is_ok());
    }

    #[test]
    fn rejects_incomplete_registration() {
        let cases = [
            registration("  ", "ada@example.com", "secret1"),
            registration("Ada", "not-an-email", "secret1"),
            registration("Ada", "ada@example.com", "short"),
        ];
        for case in cases {
            assert!(matches!(
                validate_registration(&case),
                Err(UserServiceError::InvalidProfile(_))
            ));
        }
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
