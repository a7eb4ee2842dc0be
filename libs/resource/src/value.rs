//! Three-state attribute values.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An attribute value as seen by the host during planning.
///
/// `Null` is a legitimately empty value; `Unknown` is a value that depends on
/// something not yet created and will only be known at apply time. The two
/// are never conflated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttrValue<T> {
    /// A concrete value.
    Known(T),

    /// Known to be empty.
    #[default]
    Null,

    /// Not yet known.
    Unknown,
}

impl<T> AttrValue<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// The concrete value, if known.
    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            Self::Null | Self::Unknown => None,
        }
    }

    pub fn as_ref(&self) -> AttrValue<&T> {
        match self {
            Self::Known(v) => AttrValue::Known(v),
            Self::Null => AttrValue::Null,
            Self::Unknown => AttrValue::Unknown,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> AttrValue<U> {
        match self {
            Self::Known(v) => AttrValue::Known(f(v)),
            Self::Null => AttrValue::Null,
            Self::Unknown => AttrValue::Unknown,
        }
    }

    /// Collapse to an option, treating unknown as absent.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            Self::Null | Self::Unknown => None,
        }
    }
}

impl<T> From<Option<T>> for AttrValue<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Null,
        }
    }
}

impl<T: Serialize> Serialize for AttrValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(v) => serializer.serialize_some(v),
            Self::Null => serializer.serialize_none(),
            Self::Unknown => Err(serde::ser::Error::custom(
                "unknown attribute values cannot be persisted",
            )),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for AttrValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}
