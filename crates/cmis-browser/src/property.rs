//! Tagged property values and their JSON / wire encodings.
//!
//! Every property carries an explicit [`PropertyKind`], so datetime values are
//! told apart from plain numbers by tag and never by inspecting the payload.

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{CmisError, CmisResult};

pub const OBJECT_ID: &str = "cmis:objectId";
pub const BASE_TYPE_ID: &str = "cmis:baseTypeId";
pub const OBJECT_TYPE_ID: &str = "cmis:objectTypeId";
pub const NAME: &str = "cmis:name";
pub const CREATED_BY: &str = "cmis:createdBy";
pub const CREATION_DATE: &str = "cmis:creationDate";
pub const LAST_MODIFICATION_DATE: &str = "cmis:lastModificationDate";
pub const CHANGE_TOKEN: &str = "cmis:changeToken";
pub const PARENT_ID: &str = "cmis:parentId";
pub const PATH: &str = "cmis:path";
pub const CONTENT_STREAM_LENGTH: &str = "cmis:contentStreamLength";
pub const CONTENT_STREAM_MIME_TYPE: &str = "cmis:contentStreamMimeType";
pub const CONTENT_STREAM_FILE_NAME: &str = "cmis:contentStreamFileName";
pub const CONTENT_STREAM_ID: &str = "cmis:contentStreamId";
pub const SOURCE_ID: &str = "cmis:sourceId";
pub const TARGET_ID: &str = "cmis:targetId";
pub const POLICY_TEXT: &str = "cmis:policyText";

// Succinct payloads drop the type tag; these ids are known to hold timestamps.
const WELL_KNOWN_DATETIME_PROPERTIES: &[&str] = &[CREATION_DATE, LAST_MODIFICATION_DATE];

/// Ordered property bag; iteration order is insertion order.
pub type Properties = IndexMap<String, PropertyValue>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    String,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Id,
    Uri,
    Html,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Id => "id",
            Self::Uri => "uri",
            Self::Html => "html",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "decimal" => Some(Self::Decimal),
            "boolean" => Some(Self::Boolean),
            "datetime" => Some(Self::DateTime),
            "id" => Some(Self::Id),
            "uri" => Some(Self::Uri),
            "html" => Some(Self::Html),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Id(String),
    Uri(String),
    Html(String),
}

impl Scalar {
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::String(_) => PropertyKind::String,
            Self::Integer(_) => PropertyKind::Integer,
            Self::Decimal(_) => PropertyKind::Decimal,
            Self::Boolean(_) => PropertyKind::Boolean,
            Self::DateTime(_) => PropertyKind::DateTime,
            Self::Id(_) => PropertyKind::Id,
            Self::Uri(_) => PropertyKind::Uri,
            Self::Html(_) => PropertyKind::Html,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) | Self::Id(value) | Self::Uri(value) | Self::Html(value) => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    /// Form-field rendering. Timestamps go out as epoch milliseconds.
    pub fn to_wire(&self) -> String {
        match self {
            Self::String(value) | Self::Id(value) | Self::Uri(value) | Self::Html(value) => {
                value.clone()
            }
            Self::Integer(value) => value.to_string(),
            Self::Decimal(value) => value.to_string(),
            Self::Boolean(value) => value.to_string(),
            Self::DateTime(value) => epoch_millis(value).to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::String(value) | Self::Id(value) | Self::Uri(value) | Self::Html(value) => {
                Value::String(value.clone())
            }
            Self::Integer(value) => json!(value),
            Self::Decimal(value) => json!(value),
            Self::Boolean(value) => Value::Bool(*value),
            Self::DateTime(value) => json!(epoch_millis(value)),
        }
    }

    pub fn from_json(kind: PropertyKind, value: &Value) -> CmisResult<Self> {
        let mismatch = || {
            CmisError::invalid_response(format!(
                "expected {} property value, got {value}",
                kind.as_str()
            ))
        };
        let text = || match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        };

        Ok(match kind {
            PropertyKind::String => Self::String(text().ok_or_else(mismatch)?),
            PropertyKind::Id => Self::Id(text().ok_or_else(mismatch)?),
            PropertyKind::Uri => Self::Uri(text().ok_or_else(mismatch)?),
            PropertyKind::Html => Self::Html(text().ok_or_else(mismatch)?),
            PropertyKind::Integer => Self::Integer(
                value
                    .as_i64()
                    .or_else(|| value.as_str().and_then(|raw| raw.parse().ok()))
                    .ok_or_else(mismatch)?,
            ),
            PropertyKind::Decimal => Self::Decimal(
                value
                    .as_f64()
                    .or_else(|| value.as_str().and_then(|raw| raw.parse().ok()))
                    .ok_or_else(mismatch)?,
            ),
            PropertyKind::Boolean => Self::Boolean(
                value
                    .as_bool()
                    .or_else(|| value.as_str().and_then(|raw| raw.parse().ok()))
                    .ok_or_else(mismatch)?,
            ),
            PropertyKind::DateTime => Self::DateTime(parse_datetime(value).ok_or_else(mismatch)?),
        })
    }
}

/// Rounded milliseconds since the Unix epoch.
pub fn epoch_millis(value: &DateTime<Utc>) -> i64 {
    let seconds = value.timestamp() as f64 + f64::from(value.timestamp_subsec_nanos()) / 1e9;
    (seconds * 1000.0).round() as i64
}

fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|millis| millis.round() as i64))
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                raw.parse::<i64>()
                    .ok()
                    .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            }),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyValue {
    kind: PropertyKind,
    values: Vec<Scalar>,
    multivalued: bool,
}

impl PropertyValue {
    pub fn single(value: Scalar) -> Self {
        Self {
            kind: value.kind(),
            values: vec![value],
            multivalued: false,
        }
    }

    /// A single-valued property with no value set.
    pub fn unset(kind: PropertyKind) -> Self {
        Self {
            kind,
            values: Vec::new(),
            multivalued: false,
        }
    }

    pub fn multi(kind: PropertyKind, values: Vec<Scalar>) -> CmisResult<Self> {
        if let Some(other) = values.iter().find(|value| value.kind() != kind) {
            return Err(CmisError::invalid_parameter(
                "propertyValue",
                other.to_wire(),
                format!("a {} value", kind.as_str()),
            ));
        }
        Ok(Self {
            kind,
            values,
            multivalued: true,
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::single(Scalar::String(value.into()))
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::single(Scalar::Id(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Self::single(Scalar::Integer(value))
    }

    pub fn decimal(value: f64) -> Self {
        Self::single(Scalar::Decimal(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::single(Scalar::Boolean(value))
    }

    pub fn datetime(value: DateTime<Utc>) -> Self {
        Self::single(Scalar::DateTime(value))
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn is_multivalued(&self) -> bool {
        self.multivalued
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn first(&self) -> Option<&Scalar> {
        self.values.first()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.first().and_then(Scalar::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.first().and_then(Scalar::as_i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.first().and_then(Scalar::as_bool)
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.first().and_then(Scalar::as_datetime)
    }

    /// Succinct JSON form: a scalar, an array, or null.
    pub fn to_json(&self) -> Value {
        if self.multivalued {
            Value::Array(self.values.iter().map(Scalar::to_json).collect())
        } else {
            self.first().map(Scalar::to_json).unwrap_or(Value::Null)
        }
    }

    /// Verbose JSON form carrying id, type and cardinality.
    pub fn to_verbose_json(&self, id: &str) -> Value {
        json!({
            "id": id,
            "type": self.kind.as_str(),
            "cardinality": if self.multivalued { "multi" } else { "single" },
            "value": self.to_json(),
        })
    }

    pub fn from_json(kind: PropertyKind, multivalued: bool, value: &Value) -> CmisResult<Self> {
        let values = match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| Scalar::from_json(kind, item))
                .collect::<CmisResult<Vec<_>>>()?,
            other => vec![Scalar::from_json(kind, other)?],
        };
        Ok(Self {
            kind,
            multivalued: multivalued || value.is_array(),
            values,
        })
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::decimal(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::boolean(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::datetime(value)
    }
}

/// Reads the property bag of an object payload in either succinct or verbose form.
pub fn properties_from_object_json(object: &Value) -> CmisResult<Properties> {
    if let Some(succinct) = object.get("succinctProperties") {
        let map = succinct
            .as_object()
            .ok_or_else(|| CmisError::invalid_response("succinctProperties is not an object"))?;
        return map
            .iter()
            .map(|(id, value)| Ok::<_, CmisError>((id.clone(), infer_succinct_value(id, value)?)))
            .collect();
    }

    if let Some(verbose) = object.get("properties") {
        let map = verbose
            .as_object()
            .ok_or_else(|| CmisError::invalid_response("properties is not an object"))?;
        return map
            .iter()
            .map(|(id, entry)| Ok::<_, CmisError>((id.clone(), verbose_value(id, entry)?)))
            .collect();
    }

    Err(CmisError::invalid_response(
        "object payload has neither succinctProperties nor properties",
    ))
}

/// Serializes a property bag in the requested representation.
pub fn properties_to_object_json(properties: &Properties, succinct: bool) -> Value {
    let mut map = Map::new();
    for (id, value) in properties {
        let encoded = if succinct {
            value.to_json()
        } else {
            value.to_verbose_json(id)
        };
        map.insert(id.clone(), encoded);
    }
    if succinct {
        json!({ "succinctProperties": Value::Object(map) })
    } else {
        json!({ "properties": Value::Object(map) })
    }
}

fn verbose_value(id: &str, entry: &Value) -> CmisResult<PropertyValue> {
    let kind = entry
        .get("type")
        .and_then(Value::as_str)
        .and_then(PropertyKind::parse)
        .ok_or_else(|| CmisError::invalid_response(format!("property {id} has no usable type")))?;
    let multivalued = entry.get("cardinality").and_then(Value::as_str) == Some("multi");
    PropertyValue::from_json(kind, multivalued, entry.get("value").unwrap_or(&Value::Null))
}

fn infer_succinct_value(id: &str, value: &Value) -> CmisResult<PropertyValue> {
    let sample = match value {
        Value::Array(items) => items.iter().find(|item| !item.is_null()),
        Value::Null => None,
        other => Some(other),
    };
    let kind = if WELL_KNOWN_DATETIME_PROPERTIES.contains(&id) {
        PropertyKind::DateTime
    } else {
        match sample {
            Some(Value::Bool(_)) => PropertyKind::Boolean,
            Some(Value::Number(number)) if number.is_i64() || number.is_u64() => {
                PropertyKind::Integer
            }
            Some(Value::Number(_)) => PropertyKind::Decimal,
            _ => PropertyKind::String,
        }
    };
    PropertyValue::from_json(kind, value.is_array(), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_wire_value_is_rounded_epoch_millis() {
        let timestamp = Utc.timestamp_opt(1_700_000_000, 123_600_000).unwrap();
        assert_eq!(Scalar::DateTime(timestamp).to_wire(), "1700000000124");
    }

    #[test]
    fn verbose_properties_use_declared_type_tag() {
        let payload = json!({
            "properties": {
                "cmis:name": {"id": "cmis:name", "type": "string", "cardinality": "single", "value": "doc1"},
                "cmis:creationDate": {"id": "cmis:creationDate", "type": "datetime", "cardinality": "single", "value": 1_700_000_000_000_i64},
                "tags": {"id": "tags", "type": "id", "cardinality": "multi", "value": ["a", "b"]},
                "size": {"id": "size", "type": "integer", "cardinality": "single", "value": null}
            }
        });

        let properties = properties_from_object_json(&payload).unwrap();
        let keys: Vec<&str> = properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["cmis:name", "cmis:creationDate", "tags", "size"]);

        assert_eq!(properties[NAME].as_str(), Some("doc1"));
        assert_eq!(
            properties[CREATION_DATE].as_datetime(),
            Utc.timestamp_millis_opt(1_700_000_000_000).single()
        );
        let tags = &properties["tags"];
        assert!(tags.is_multivalued());
        assert_eq!(tags.kind(), PropertyKind::Id);
        assert_eq!(tags.values().len(), 2);
        assert_eq!(properties["size"].first(), None);
        assert_eq!(properties["size"].kind(), PropertyKind::Integer);
    }

    #[test]
    fn succinct_properties_infer_kind_from_json_scalars() {
        let payload = json!({
            "succinctProperties": {
                "cmis:objectId": "abc",
                "cmis:contentStreamLength": 8,
                "ratio": 0.5,
                "cmis:isImmutable": false,
                "cmis:lastModificationDate": 1_700_000_000_000_i64
            }
        });

        let properties = properties_from_object_json(&payload).unwrap();
        assert_eq!(properties[OBJECT_ID].kind(), PropertyKind::String);
        assert_eq!(properties[CONTENT_STREAM_LENGTH].as_i64(), Some(8));
        assert_eq!(properties["ratio"].kind(), PropertyKind::Decimal);
        assert_eq!(properties["cmis:isImmutable"].as_bool(), Some(false));
        assert_eq!(
            properties[LAST_MODIFICATION_DATE].kind(),
            PropertyKind::DateTime
        );
    }

    #[test]
    fn object_without_property_bag_is_invalid() {
        let error = properties_from_object_json(&json!({"foo": 1})).unwrap_err();
        assert!(matches!(error, CmisError::InvalidResponse(_)));
    }

    #[test]
    fn multi_rejects_mixed_kinds() {
        let error = PropertyValue::multi(
            PropertyKind::String,
            vec![Scalar::String("a".into()), Scalar::Integer(1)],
        )
        .unwrap_err();
        assert!(matches!(error, CmisError::InvalidParameterValue { .. }));
    }

    #[test]
    fn verbose_json_output_reads_back_with_same_tags() {
        let mut properties = Properties::new();
        properties.insert(NAME.to_string(), PropertyValue::string("doc1"));
        properties.insert(
            CREATION_DATE.to_string(),
            PropertyValue::datetime(Utc.timestamp_millis_opt(1_650_000_000_000).unwrap()),
        );

        let decoded =
            properties_from_object_json(&properties_to_object_json(&properties, false)).unwrap();
        assert_eq!(decoded, properties);
    }
}
