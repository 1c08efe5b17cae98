//! Domain models mirrored from the data store.
//!
//! Relationships are carried as a foreign key plus an optionally populated
//! sibling object. Optional columns and relationships are `Nullable`, so a key
//! the row left out stays out and a key it sent as `null` comes back as `null`.

pub mod building;
pub mod city;
pub mod country;
pub mod currency;
pub mod lease;
pub mod state;
pub mod unit;
pub mod user;
pub mod user_profile;

pub use building::*;
pub use city::*;
pub use country::*;
pub use currency::*;
pub use lease::*;
pub use state::*;
pub use unit::*;
pub use user::*;
pub use user_profile::*;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// `None` when the key was absent, `Some(None)` when it was `null`
pub type Nullable<T> = Option<Option<T>>;

/// Deserializer for `Nullable` fields; pair with `default` so absent keys stay `None`
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Nullable<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A row that did not match its model's shape
#[derive(Error, Debug)]
#[error("Invalid {model} record: {source}")]
pub struct DeserializationError {
    pub model: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// JSON conversion shared by every model.
pub trait Record: Serialize + DeserializeOwned {
    const NAME: &'static str;

    fn from_json(value: Value) -> Result<Self, DeserializationError> {
        serde_json::from_value(value).map_err(|source| DeserializationError {
            model: Self::NAME,
            source,
        })
    }

    fn to_json(&self) -> Value {
        // Models contain only strings, numbers, booleans and nested models.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialization_error_names_model() {
        let err = Currency::from_json(json!({"id": "one"})).unwrap_err();
        assert_eq!(err.model, "currency");
        assert!(err.to_string().starts_with("Invalid currency record"));
    }

    #[test]
    fn test_nested_relationships_round_trip() {
        let value = json!({
            "id": 3,
            "name": "Quito",
            "state_id": 17,
            "state": {
                "id": 17,
                "name": "Pichincha",
                "official_name": "Provincia de Pichincha",
                "code": "EC-P",
                "state_type": "Provincia",
                "country_id": 1,
                "country": {
                    "id": 1,
                    "name": "Ecuador",
                    "iso2": "EC",
                    "iso3": "ECU",
                    "phone_code": "593",
                    "currency_id": 2
                }
            }
        });

        let city = City::from_json(value.clone()).unwrap();
        let state = city.state.clone().flatten().unwrap();
        let country = state.country.flatten().unwrap();
        assert_eq!(country.iso3, "ECU");
        assert!(country.currency.is_none());
        assert_eq!(city.to_json(), value);
    }

    #[test]
    fn test_null_relationship_is_kept() {
        let value = json!({"id": 3, "name": "Quito", "state_id": 17, "state": null});
        let city = City::from_json(value.clone()).unwrap();
        assert_eq!(city.state, Some(None));
        assert_eq!(city.to_json(), value);
    }
}
