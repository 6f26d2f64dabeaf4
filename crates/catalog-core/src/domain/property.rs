//! Typed property bag.
//!
//! Catalog entities own an ordered list of named properties. Setting a
//! property is an upsert by name on that list, so stamping the same key
//! twice never produces duplicates.

use serde::{Deserialize, Serialize};

/// Name of the property that records which source produced an entity.
pub const SOURCE_ID_PROPERTY: &str = "source_id";

/// Value of a single property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl PropertyValue {
    /// Borrow the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A named property attached to a catalog entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Insert or replace the property called `name`.
///
/// The position of an existing property is kept; new properties are appended.
pub fn set_property(properties: &mut Vec<Property>, name: &str, value: impl Into<PropertyValue>) {
    let value = value.into();
    match properties.iter_mut().find(|p| p.name == name) {
        Some(existing) => existing.value = value,
        None => properties.push(Property {
            name: name.to_string(),
            value,
        }),
    }
}

/// Look up a property value by name.
pub fn get_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a PropertyValue> {
    properties.iter().find(|p| p.name == name).map(|p| &p.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_property_upserts_in_place() {
        let mut props = vec![Property::new("a", "1"), Property::new("b", 2)];

        set_property(&mut props, "a", "updated");
        set_property(&mut props, "c", true);

        assert_eq!(props.len(), 3);
        assert_eq!(props[0].name, "a");
        assert_eq!(props[0].value, PropertyValue::from("updated"));
        assert_eq!(props[2].value, PropertyValue::Bool(true));
    }

    #[test]
    fn test_get_property() {
        let props = vec![Property::new(SOURCE_ID_PROPERTY, "src-1")];

        assert_eq!(
            get_property(&props, SOURCE_ID_PROPERTY).and_then(PropertyValue::as_str),
            Some("src-1")
        );
        assert!(get_property(&props, "missing").is_none());
    }

    #[test]
    fn test_untagged_deserialization() {
        let values: Vec<PropertyValue> =
            serde_json::from_str(r#"[true, 3, 1.5, "text"]"#).unwrap();

        assert_eq!(
            values,
            vec![
                PropertyValue::Bool(true),
                PropertyValue::Int(3),
                PropertyValue::Double(1.5),
                PropertyValue::String("text".to_string()),
            ]
        );
    }
}
