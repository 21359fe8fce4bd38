use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored résumé. `version` and `previous_version` are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_default: bool,
    pub version: i32,
    pub previous_version: Option<Uuid>,
}

/// Column values for a résumé that has not been inserted yet.
/// Identity and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResume {
    pub user_id: Uuid,
    pub title: String,
    pub is_default: bool,
    pub version: i32,
    pub previous_version: Option<Uuid>,
}

impl NewResume {
    /// The root of a new version chain.
    pub fn first_version(user_id: Uuid, title: String, is_default: bool) -> Self {
        Self {
            user_id,
            title,
            is_default,
            version: 1,
            previous_version: None,
        }
    }
}
