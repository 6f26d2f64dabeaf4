//! Catalog model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::property::{Property, PropertyValue, SOURCE_ID_PROPERTY, get_property, set_property};

/// A machine-learning model entry in the catalog.
///
/// `id` is assigned by storage. A model without an id is saved as an insert
/// unless storage already holds a model with the same name for the same
/// source, in which case that row is updated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Database ID (absent until persisted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Logical name, unique within a source.
    pub name: String,

    /// Identifier of the model in the upstream system, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,

    /// Free-form properties (provider, license, tasks, ...).
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Model {
    /// Create a model with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set (or replace) a property.
    #[must_use]
    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        set_property(&mut self.properties, name, value);
        self
    }

    /// The id of the source that produced this model, if stamped.
    pub fn source_id(&self) -> Option<&str> {
        get_property(&self.properties, SOURCE_ID_PROPERTY).and_then(PropertyValue::as_str)
    }

    /// Stamp the producing source id onto the property list.
    pub fn set_source_id(&mut self, source_id: &str) {
        set_property(&mut self.properties, SOURCE_ID_PROPERTY, source_id);
    }
}
