//! Local user provisioning for logins.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use shared_types::User;
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::UserStore;

/// Result of provisioning a login
#[derive(Debug, Clone)]
pub struct ProvisionedUser {
    pub user: User,
    /// Whether this login created the user
    pub created: bool,
}

/// Fresh opaque client identifier: a random UUID, URL-safe base64 encoded.
pub fn generate_client_id() -> String {
    URL_SAFE.encode(Uuid::new_v4().to_string())
}

/// Maps identity-provider emails to local users.
#[derive(Clone)]
pub struct UserProvisioner {
    store: Arc<dyn UserStore>,
}

impl UserProvisioner {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Find the user for `email`, creating it on first login.
    ///
    /// Two concurrent first logins both end up with the row that won the
    /// insert; the loser's identifier is discarded.
    pub async fn provision(&self, email: &str) -> Result<ProvisionedUser> {
        if let Some(user) = self.store.find_by_email(email).await? {
            return Ok(ProvisionedUser {
                user,
                created: false,
            });
        }

        let client_id = generate_client_id();
        let created = self.store.insert_if_absent(email, &client_id).await?;

        let user = self
            .store
            .find_by_email(email)
            .await?
            .context("user missing right after insert")?;

        if created {
            tracing::info!("Created user {} for {}", user.id, email);
        } else {
            tracing::info!("Concurrent first login for {}, reusing stored user", email);
        }

        Ok(ProvisionedUser { user, created })
    }

    pub async fn find(&self, email: &str) -> Result<Option<User>> {
        self.store.find_by_email(email).await
    }
}
