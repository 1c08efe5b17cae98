use serde::{Deserialize, Serialize};

use super::Record;

/// Currency used for rents and leases (e.g. `COP`, `USD`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: i64,
    pub name: String,
    /// ISO 4217 code
    pub code: String,
    pub symbol: String,
}

impl Record for Currency {
    const NAME: &'static str = "currency";
}
