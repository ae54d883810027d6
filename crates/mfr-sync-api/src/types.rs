//! Target-platform data shapes.
//!
//! Typed views of the JSON the platform returns for organisation units and
//! their associated collections, plus the message and audit-log records the
//! engine sends back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ApiError, ApiResult};

/// One raw attribute value as the platform returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub value: String,
    pub attribute: AttributeRef,
}

/// Reference to the attribute an [`AttributeValue`] belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Attribute values of one fetched entity, indexed by attribute id and code.
///
/// Built once per entity instead of re-scanning the raw list on every lookup.
#[derive(Debug, Clone, Default)]
pub struct AttributeBag {
    by_id: HashMap<String, String>,
    by_code: HashMap<String, String>,
}

impl AttributeBag {
    /// Build a bag from the platform's raw attribute-value list.
    pub fn from_values(values: &[AttributeValue]) -> Self {
        let mut bag = Self::default();
        for av in values {
            if let Some(ref id) = av.attribute.id {
                bag.by_id.insert(id.clone(), av.value.clone());
            }
            if let Some(ref code) = av.attribute.code {
                bag.by_code.insert(code.clone(), av.value.clone());
            }
        }
        bag
    }

    /// Look up a value by attribute id.
    pub fn by_id(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// Look up a value by attribute code.
    pub fn by_code(&self, code: &str) -> Option<&str> {
        self.by_code.get(code).map(String::as_str)
    }

    /// Check that an attribute is absent or holds an empty string.
    pub fn is_empty_or_missing(&self, id: &str) -> bool {
        self.by_id(id).map_or(true, str::is_empty)
    }
}

/// Reference to a metadata object by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl MetadataRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }
}

/// Geometry attached to an organisation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    Polygon { coordinates: serde_json::Value },
}

impl Geometry {
    /// Point geometry from registry coordinates.
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Geometry::Point {
            coordinates: [longitude, latitude],
        }
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, Geometry::Polygon { .. })
    }
}

/// A user account attached to an organisation unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnitUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub user_roles: Vec<MetadataRef>,
    #[serde(default)]
    pub user_groups: Vec<MetadataRef>,
    #[serde(default)]
    pub organisation_units: Vec<MetadataRef>,
}

/// An existing organisation unit on the target platform.
///
/// The engine only reads these and proposes patches; it never mutates a
/// fetched instance in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnit {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_date: Option<String>,
    #[serde(default)]
    pub attribute_values: Vec<AttributeValue>,
    #[serde(default)]
    pub data_sets: Vec<MetadataRef>,
    #[serde(default)]
    pub organisation_unit_groups: Vec<MetadataRef>,
    #[serde(default)]
    pub users: Vec<OrgUnitUser>,
    #[serde(default)]
    pub ancestors: Vec<MetadataRef>,
    #[serde(default)]
    pub children: Vec<MetadataRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<OrgUnit>>,
}

impl OrgUnit {
    /// Build the two-way attribute lookup for this unit.
    pub fn attribute_bag(&self) -> AttributeBag {
        AttributeBag::from_values(&self.attribute_values)
    }

    /// The unit's code, or an empty string when unset.
    pub fn code_str(&self) -> &str {
        self.code.as_deref().unwrap_or("")
    }

    /// Display names of the direct children.
    pub fn child_names(&self) -> Vec<String> {
        self.children
            .iter()
            .filter_map(|c| c.display_name.clone())
            .collect()
    }
}

/// Decode the `organisationUnits` envelope of a query response.
pub fn org_units_from_response(value: &serde_json::Value) -> ApiResult<Vec<OrgUnit>> {
    let list = value
        .get("organisationUnits")
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Array(vec![]));
    serde_json::from_value(list)
        .map_err(|e| ApiError::malformed("organisationUnits", e.to_string()))
}

/// Severity of an audit-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogType {
    Error,
    Success,
    Log,
}

/// One audit-log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// The entry's datastore key; the creation instant in RFC 3339.
    pub id: String,
    pub log_type: LogType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub username: String,
}

impl LogEntry {
    /// Create an entry stamped now for the given operator.
    pub fn new(log_type: LogType, message: impl Into<String>, username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: now.to_rfc3339(),
            log_type,
            message: message.into(),
            timestamp: now,
            username: username.into(),
        }
    }
}

/// Recipient reference in a message payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    #[serde(rename = "type")]
    pub recipient_type: String,
}

impl Recipient {
    pub fn user_group(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            recipient_type: "userGroup".to_string(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            recipient_type: "user".to_string(),
        }
    }
}

/// A notification message sent through the platform's conversation channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub subject: String,
    pub text: String,
    #[serde(default)]
    pub user_groups: Vec<Recipient>,
    #[serde(default)]
    pub users: Vec<Recipient>,
    #[serde(default)]
    pub organisation_units: Vec<Recipient>,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
}

impl Message {
    /// Message addressed to a set of user groups.
    pub fn to_user_groups<I, S>(subject: impl Into<String>, text: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            text: text.into(),
            user_groups: groups.into_iter().map(Recipient::user_group).collect(),
            users: Vec::new(),
            organisation_units: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Copy the sender in as a direct recipient.
    #[must_use]
    pub fn with_user(mut self, id: impl Into<String>) -> Self {
        self.users.push(Recipient::user(id));
        self
    }
}
