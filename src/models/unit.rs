use serde::{Deserialize, Serialize};
use serde_json::Number;

use super::{nullable, Building, Nullable, Record};

/// Rentable unit inside a building
///
/// Money and area keep the data store's numeric representation, so `1200`
/// is written back as `1200` and not `1200.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    /// Label such as "101-A"
    pub name: String,
    pub floor: i32,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub area_m2: Nullable<Number>,
    pub rent: Number,
    pub is_occupied: bool,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub notes: Nullable<String>,
    pub building_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub building: Nullable<Building>,
}

impl Record for Unit {
    const NAME: &'static str = "unit";
}
