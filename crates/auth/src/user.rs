//! User document for local sign-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{AggregateRoot, DomainError, DomainResult};
use stockbook_events::Event;

use crate::password::PasswordHash;

stockbook_core::aggregate_id!(
    /// User identifier.
    UserId,
    "UserId"
);

/// Aggregate root: User.
///
/// `name` is unique across users (enforced by the store on commit).
/// The password hash is stored with the document but has no public getter;
/// callers go through [`User::verify_password`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: UserId,
    name: String,
    password: PasswordHash,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    pub fn register(
        id: UserId,
        name: &str,
        password: PasswordHash,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("user name cannot be empty"));
        }

        Ok(Self {
            id,
            name: name.to_string(),
            password,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn verify_password(&self, password: &str) -> bool {
        self.password.verify(password)
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserEvent {
    UserRegistered {
        user_id: UserId,
        name: String,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::UserRegistered { .. } => "auth.user.registered",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::UserRegistered { occurred_at, .. } => *occurred_at,
        }
    }
}
