//! Business logic kept out of the HTTP handlers.

pub mod provision;

pub use provision::{generate_client_id, ProvisionedUser, UserProvisioner};
