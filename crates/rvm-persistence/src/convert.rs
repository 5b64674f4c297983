//! Conversion traits between typed values and [`StateValue`].
//!
//! Observable cells hold a concrete Rust type, while the state record holds
//! [`StateValue`]s. These traits bridge the two.
//!
//! # Design Note
//!
//! Conversion out of a [`StateValue`] is fallible: a record restored from
//! disk may hold a different variant than the one a cell expects. Callers
//! turn `None` into a type mismatch error; the value is never coerced.

use std::collections::BTreeMap;

use crate::value::StateValue;

/// Trait for types that can be written into a state record.
pub trait ToStateValue {
    /// Convert to a state value for persistence.
    fn to_state_value(&self) -> StateValue;
}

/// Trait for types that can be read back out of a state record.
pub trait FromStateValue: Sized {
    /// Convert from a state value, or `None` if the variant does not match.
    fn from_state_value(value: &StateValue) -> Option<Self>;
}

// =============================================================================
// SCALARS
// =============================================================================

macro_rules! scalar_conversion {
    ($ty:ty, $variant:ident) => {
        impl ToStateValue for $ty {
            fn to_state_value(&self) -> StateValue {
                StateValue::$variant(self.clone())
            }
        }

        impl FromStateValue for $ty {
            fn from_state_value(value: &StateValue) -> Option<Self> {
                match value {
                    StateValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

scalar_conversion!(bool, Bool);
scalar_conversion!(i32, Int);
scalar_conversion!(i64, Long);
scalar_conversion!(f32, Float);
scalar_conversion!(f64, Double);
scalar_conversion!(String, String);

impl ToStateValue for StateValue {
    fn to_state_value(&self) -> StateValue {
        self.clone()
    }
}

impl FromStateValue for StateValue {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        Some(value.clone())
    }
}

/// Raw bytes, stored as [`StateValue::Bytes`].
///
/// Cells cannot hold a bare `Vec<u8>`; binary payloads go through this
/// wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Bytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Bytes> for Vec<u8> {
    fn from(bytes: Bytes) -> Self {
        bytes.0
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl ToStateValue for Bytes {
    fn to_state_value(&self) -> StateValue {
        StateValue::Bytes(self.0.clone())
    }
}

impl FromStateValue for Bytes {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Bytes(v) => Some(Self(v.clone())),
            _ => None,
        }
    }
}

// =============================================================================
// CONTAINERS
// =============================================================================

/// `None` is stored as [`StateValue::Null`].
impl<T: ToStateValue> ToStateValue for Option<T> {
    fn to_state_value(&self) -> StateValue {
        match self {
            Some(v) => v.to_state_value(),
            None => StateValue::Null,
        }
    }
}

impl<T: FromStateValue> FromStateValue for Option<T> {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        if value.is_null() {
            return Some(None);
        }
        T::from_state_value(value).map(Some)
    }
}

impl<T: ToStateValue> ToStateValue for Vec<T> {
    fn to_state_value(&self) -> StateValue {
        StateValue::List(self.iter().map(ToStateValue::to_state_value).collect())
    }
}

impl<T: FromStateValue> FromStateValue for Vec<T> {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::List(items) => items.iter().map(T::from_state_value).collect(),
            _ => None,
        }
    }
}

impl<T: ToStateValue> ToStateValue for BTreeMap<String, T> {
    fn to_state_value(&self) -> StateValue {
        StateValue::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_state_value()))
                .collect(),
        )
    }
}

impl<T: FromStateValue> FromStateValue for BTreeMap<String, T> {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Map(entries) => entries
                .iter()
                .map(|(k, v)| T::from_state_value(v).map(|v| (k.clone(), v)))
                .collect(),
            _ => None,
        }
    }
}
