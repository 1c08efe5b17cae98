use serde::{Deserialize, Serialize};

use super::{nullable, Nullable, Record, User};

/// Personal details attached to a user.
///
/// Unlike the other models, a missing identity card or phone is written out
/// as an explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub created_at: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub identity_card: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub user_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub user: Nullable<User>,
}

impl Record for UserProfile {
    const NAME: &'static str = "user_profile";
}
