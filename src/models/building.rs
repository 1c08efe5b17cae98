use serde::{Deserialize, Serialize};

use super::{nullable, City, Nullable, Record, User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: i64,
    pub name: String,
    pub address: String,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Nullable<String>,
    /// Map location, either coordinates or a link
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub location: Nullable<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub has_parking: bool,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub year_built: Nullable<i32>,
    pub is_active: bool,
    pub owner_user_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub owner_user: Nullable<User>,
    pub city_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub city: Nullable<City>,
}

impl Record for Building {
    const NAME: &'static str = "building";
}
