//! Strongly-typed identifiers for marketplace records.
//!
//! Every persisted record uses a store-generated 64-bit serial key; the newtypes keep
//! a buyer id from being passed where a product id is expected.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::value::{FromValue, Value};

macro_rules! impl_serial_newtype {
    ($t:ident, $name:literal) => {
        #[doc = concat!("Identifier of a `", $name, "` record.")]
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(i64);

        impl $t {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::Int(value.0)
            }
        }

        impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self, CoreError> {
                i64::from_value(value).map(Self)
            }
        }

        impl FromStr for $t {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = i64::from_str(s)
                    .map_err(|e| CoreError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(raw))
            }
        }
    };
}

impl_serial_newtype!(UserId, "UserId");
impl_serial_newtype!(SupplierId, "SupplierId");
impl_serial_newtype!(CompanyId, "CompanyId");
impl_serial_newtype!(ProductId, "ProductId");
impl_serial_newtype!(OrderId, "OrderId");
impl_serial_newtype!(VariationValueId, "VariationValueId");
impl_serial_newtype!(VariationCountId, "VariationCountId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_round_trip() {
        let id: ProductId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn rejects_non_numeric_input() {
        let err = "abc".parse::<UserId>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidId(msg) if msg.starts_with("UserId")));
    }

    #[test]
    fn converts_through_value() {
        let value: Value = OrderId::new(7).into();
        assert_eq!(value, Value::Int(7));
        assert_eq!(OrderId::from_value(&value).unwrap(), OrderId::new(7));
    }
}
