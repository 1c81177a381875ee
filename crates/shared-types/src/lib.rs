use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User struct matching database column order exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct User {
    pub id: i32,
    pub email: String,
    /// Opaque identifier generated at first login, stable afterwards
    pub client_id: String,
    pub created_at: DateTime<Utc>,
}

/// Category of a one-shot flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

/// A message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Flash {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Flash {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

// API Request/Response types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUserResponse {
    pub email: String,
    pub client_id: String,
    pub email_verified: bool,
}
