use serde::{Deserialize, Serialize};

use super::{nullable, Currency, Nullable, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: i64,
    pub name: String,
    pub iso2: String,
    pub iso3: String,
    /// International dialing code without the leading `+`
    pub phone_code: String,
    pub currency_id: i64,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub currency: Nullable<Currency>,
}

impl Record for Country {
    const NAME: &'static str = "country";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_country_round_trip_with_currency() {
        let value = json!({
            "id": 7,
            "name": "Colombia",
            "iso2": "CO",
            "iso3": "COL",
            "phone_code": "57",
            "currency_id": 1,
            "currency": {"id": 1, "name": "Peso colombiano", "code": "COP", "symbol": "$"}
        });
        let country = Country::from_json(value.clone()).unwrap();
        assert_eq!(country.currency.as_ref().and_then(Option::as_ref).map(|c| c.id), Some(1));
        assert_eq!(country.to_json(), value);
    }

    #[test]
    fn test_country_with_null_currency_round_trips() {
        let value = json!({
            "id": 1,
            "name": "Ecuador",
            "iso2": "EC",
            "iso3": "ECU",
            "phone_code": "593",
            "currency_id": 2,
            "currency": null
        });
        let country = Country::from_json(value.clone()).unwrap();
        assert_eq!(country.currency, Some(None));
        assert_eq!(country.to_json(), value);
    }
}
