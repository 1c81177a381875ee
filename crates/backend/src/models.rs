// Database models for Diesel
use diesel::prelude::*;

/// Insertable struct for new users
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub client_id: &'a str,
}
