use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncPgConnection, RunQueryDsl,
};
use shared_types::User;
use std::sync::Arc;

pub type DbPool = Pool<AsyncPgConnection>;

/// Open a connection that negotiates TLS against the webpki roots.
///
/// The URL's `sslmode` decides whether TLS is required (`require`) or only
/// attempted (`prefer`, the default).
async fn establish_tls_connection(
    database_url: String,
) -> diesel::ConnectionResult<AsyncPgConnection> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?
    .with_root_certificates(root_store)
    .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&database_url, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Postgres connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

/// Build the pool. Connections are opened lazily on first checkout.
pub fn establish_connection_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).build()?;

    Ok(pool)
}

// User database operations
pub mod users {
    use super::*;
    use crate::models::NewUser;

    pub async fn get_by_email(
        conn: &mut AsyncPgConnection,
        email_addr: &str,
    ) -> anyhow::Result<Option<User>> {
        use crate::schema::users::dsl::*;

        let user = users
            .filter(email.eq(email_addr))
            .first::<User>(conn)
            .await
            .optional()?;

        Ok(user)
    }

    /// Insert a user unless one with the same email exists.
    ///
    /// Returns whether a row was written. Losing a race against a concurrent
    /// insert is not an error; the caller re-reads the winning row.
    pub async fn insert_if_absent(
        conn: &mut AsyncPgConnection,
        email_addr: &str,
        client_id_val: &str,
    ) -> anyhow::Result<bool> {
        use crate::schema::users::dsl::*;

        let inserted = diesel::insert_into(users)
            .values(NewUser {
                email: email_addr,
                client_id: client_id_val,
            })
            .on_conflict(email)
            .do_nothing()
            .execute(conn)
            .await?;

        Ok(inserted == 1)
    }
}
