//! User storage abstraction.
//!
//! The login flow only needs two operations, so it talks to a small trait
//! rather than to diesel directly. `PgUserStore` is the production
//! implementation; `MemoryUserStore` backs tests and local experiments.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared_types::User;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::{self, DbPool};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up the user with this exact email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert a user unless the email is already taken.
    ///
    /// Returns `true` when this call created the row.
    async fn insert_if_absent(&self, email: &str, client_id: &str) -> Result<bool>;
}

/// Postgres-backed store.
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut conn = self.pool.get().await.context("Failed to get DB connection")?;
        db::users::get_by_email(&mut conn, email).await
    }

    async fn insert_if_absent(&self, email: &str, client_id: &str) -> Result<bool> {
        let mut conn = self.pool.get().await.context("Failed to get DB connection")?;
        db::users::insert_if_absent(&mut conn, email, client_id).await
    }
}

/// In-process store with the same uniqueness rules as the `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.lock().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self
            .users
            .lock()
            .map_err(|_| anyhow::anyhow!("user store lock poisoned"))?;
        Ok(users.get(email).cloned())
    }

    async fn insert_if_absent(&self, email: &str, client_id: &str) -> Result<bool> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| anyhow::anyhow!("user store lock poisoned"))?;

        if users.contains_key(email) {
            return Ok(false);
        }
        if users.values().any(|u| u.client_id == client_id) {
            anyhow::bail!("client_id already assigned");
        }

        let id = i32::try_from(users.len() + 1).context("user id overflow")?;
        users.insert(
            email.to_string(),
            User {
                id,
                email: email.to_string(),
                client_id: client_id.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }
}
