use serde::{Deserialize, Serialize};

use super::{nullable, Country, Nullable, Record};

/// State, province or department of a country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: i64,
    pub name: String,
    pub official_name: String,
    pub code: String,
    /// Administrative kind, e.g. "Provincia" or "Departamento"
    pub state_type: String,
    pub country_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub country: Nullable<Country>,
}

impl Record for State {
    const NAME: &'static str = "state";
}
