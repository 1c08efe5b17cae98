use serde::{Deserialize, Serialize};

use super::{nullable, Country, Nullable, Record};

/// Account type values that grant the owner navigation
const OWNER_ACCOUNT_TYPES: &[&str] = &["Propietario", "Owner"];

/// Domain user, joined to an authenticated identity by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub identity_card: Nullable<String>,
    /// E.164 formatted
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub phone: Nullable<String>,
    pub email: String,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub picture_url: Nullable<String>,
    pub account_type: String,
    pub invite_code: String,
    pub country_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub country: Nullable<Country>,
}

impl User {
    pub fn is_owner(&self) -> bool {
        OWNER_ACCOUNT_TYPES.contains(&self.account_type.as_str())
    }
}

impl Record for User {
    const NAME: &'static str = "user";
}
