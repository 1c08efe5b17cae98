use serde::{Deserialize, Serialize};

use super::{nullable, Nullable, Record, State};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub state_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub state: Nullable<State>,
}

impl Record for City {
    const NAME: &'static str = "city";
}
