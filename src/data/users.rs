//! User accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::password::Password;
use crate::config::StorageConfig;
use crate::error::Result;
use crate::store::{OptimisticConcurrencyController, SharedStore, UniqueKey, VersionedRecord};
use crate::validator::{self, Validator};

/// Store constraint enforcing one account per email address.
pub const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

impl VersionedRecord for User {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey {
            constraint: EMAIL_CONSTRAINT,
            field: "email",
            value: self.email.clone(),
        }]
    }
}

/// Registration request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(
        validator::matches(email, validator::email_rx()),
        "email",
        "must be a valid email address",
    );
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(password.len() <= 72, "password", "must not be more than 72 bytes long");
}

fn validate_identity(v: &mut Validator, username: &str, email: &str) {
    v.check(!username.is_empty(), "username", "must be provided");
    v.check(
        username.len() <= 50,
        "username",
        "must not be more than 50 bytes long",
    );
    validate_email(v, email);
}

/// Validate a user, and the plaintext password when one is being set.
pub fn validate_user(v: &mut Validator, user: &User, plaintext: Option<&str>) {
    validate_identity(v, &user.username, &user.email);
    if let Some(plaintext) = plaintext {
        validate_password_plaintext(v, plaintext);
    }
}

/// Account operations over a user store.
pub struct Users {
    controller: OptimisticConcurrencyController<User>,
}

impl Users {
    pub fn new(store: SharedStore<User>, storage: &StorageConfig) -> Self {
        Self {
            controller: OptimisticConcurrencyController::new(store, storage.write_timeout()),
        }
    }

    /// Create an inactive account. A reused email fails with `DuplicateValue`.
    ///
    /// The input is validated before the password is hashed.
    pub async fn register(&self, input: NewUser) -> Result<User> {
        let mut v = Validator::new();
        validate_identity(&mut v, &input.username, &input.email);
        validate_password_plaintext(&mut v, &input.password);
        v.into_result()?;

        let password = Password::set(&input.password)?;
        let user = User {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            username: input.username,
            email: input.email,
            password,
            activated: false,
            version: 0,
        };

        let user = self.controller.insert(user).await?;
        info!(id = %user.id, "User registered");
        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        self.controller.find_one(&|u: &User| u.email == email).await
    }

    /// Persist changes to `user`, guarded by the version it was read at.
    ///
    /// On success `user.version` is advanced to the stored version.
    pub async fn update(&self, user: &mut User) -> Result<()> {
        let mut v = Validator::new();
        validate_user(&mut v, user, None);
        v.into_result()?;

        let staged = user.clone();
        user.version = self
            .controller
            .update(user.id, user.version, move |stored| {
                stored.username = staged.username;
                stored.email = staged.email;
                stored.password = staged.password;
                stored.activated = staged.activated;
            })
            .await?;
        Ok(())
    }
}
