//! Local user accounts.

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::instrument;

use stockbook_auth::{PasswordPolicy, User, UserEvent, UserId};
use stockbook_events::{EventBus, EventEnvelope};

use crate::dispatcher::{Dispatcher, Outcome};
use crate::error::ServiceError;
use crate::store::DocumentStore;

/// Same message for an unknown name and a wrong password.
const AUTH_FAILED: &str = "invalid user name or password";

pub struct UserService<S, B> {
    dispatcher: Dispatcher<S, B>,
    policy: PasswordPolicy,
}

impl<S, B> UserService<S, B> {
    pub fn new(dispatcher: Dispatcher<S, B>, policy: PasswordPolicy) -> Self {
        Self { dispatcher, policy }
    }
}

impl<S, B> UserService<S, B>
where
    S: DocumentStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    #[instrument(skip(self, password), err)]
    pub fn register(&self, name: &str, password: &str) -> Result<User, ServiceError> {
        // Hash once, outside the retry loop.
        let hash = self.policy.hash(password)?;

        let (mut user, receipt) = self.dispatcher.execute("user.register", |_| {
            let now = Utc::now();
            let user = User::register(UserId::generate(), name, hash.clone(), now)?;

            let mut outcome = Outcome::new(user.clone());
            outcome.event(
                user.id_typed(),
                &UserEvent::UserRegistered {
                    user_id: user.id_typed(),
                    name: user.name().to_string(),
                    occurred_at: now,
                },
            )?;
            outcome.put(user);
            Ok(outcome)
        })?;

        receipt.stamp(&mut user);
        tracing::info!(user_id = %user.id_typed(), "user registered");
        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub fn authenticate(&self, name: &str, password: &str) -> Result<User, ServiceError> {
        let user = self.dispatcher.store().user_by_name(name.trim())?;
        match user {
            Some(user) if user.verify_password(password) => {
                tracing::info!(user_id = %user.id_typed(), "user authenticated");
                Ok(user)
            }
            _ => {
                tracing::warn!("authentication failed");
                Err(ServiceError::Unauthorized(AUTH_FAILED.to_string()))
            }
        }
    }
}
