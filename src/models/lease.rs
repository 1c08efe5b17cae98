use serde::{Deserialize, Serialize};
use serde_json::Number;

use super::{nullable, Currency, Nullable, Record, Unit, User};

/// Agreement between a tenant and a unit. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub id: i64,
    pub start_date: String,
    pub end_date: String,
    /// Set when the lease was ended ahead of its end date
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub termination_date: Nullable<String>,
    pub rent_amount: Number,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub contract_url: Nullable<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub notes: Nullable<String>,
    pub unit_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub unit: Nullable<Unit>,
    pub tenant_user_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub tenant_user: Nullable<User>,
    pub currency_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub currency: Nullable<Currency>,
}

impl Record for Lease {
    const NAME: &'static str = "lease";
}
