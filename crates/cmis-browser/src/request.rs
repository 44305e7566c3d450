//! Turns operation parameters into browser binding wire parameters.

use std::fmt;

use bytes::Bytes;
use mime_guess::Mime;

use crate::error::{CmisError, CmisResult};
use crate::property::Properties;

pub const CMIS_ACTION: &str = "cmisaction";
pub const CMIS_SELECTOR: &str = "cmisselector";
pub const OBJECT_ID_PARAM: &str = "objectId";
pub const SUCCINCT_PARAM: &str = "succinct";
pub const PROPERTIES_PARAM: &str = "properties";
pub const CONTENT_PARAM: &str = "content";

/// Parameters whose values must come from a fixed set.
pub const ENUMERATED_PARAMS: &[(&str, &[&str])] = &[
    ("includeRelationships", &["none", "source", "target", "both"]),
    ("unfileObjects", &["unfile", "deletesinglefiled", "delete"]),
];

#[derive(Clone, PartialEq, Eq)]
pub struct ContentStream {
    pub data: Bytes,
    pub mime_type: String,
    pub filename: String,
}

impl ContentStream {
    pub fn new(
        data: impl Into<Bytes>,
        mime_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            filename: filename.into(),
        }
    }

    /// Checks the mime type parses the way the multipart encoder will read it.
    pub fn validate(&self) -> CmisResult<()> {
        self.mime_type.parse::<Mime>().map_err(|_| {
            CmisError::invalid_parameter(CONTENT_PARAM, self.mime_type.clone(), "a valid mime type")
        })?;
        Ok(())
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("len", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Text(String),
    Boolean(bool),
    Integer(i64),
    Properties(Properties),
    Content(ContentStream),
}

impl ParamValue {
    fn describe(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Boolean(value) => value.to_string(),
            Self::Integer(value) => value.to_string(),
            Self::Properties(_) => "<properties>".to_string(),
            Self::Content(_) => "<content>".to_string(),
        }
    }

    fn into_wire(self, key: &str) -> CmisResult<String> {
        match self {
            Self::Text(value) => Ok(value),
            Self::Boolean(value) => Ok(value.to_string()),
            Self::Integer(value) => Ok(value.to_string()),
            other => Err(CmisError::invalid_parameter(
                key,
                other.describe(),
                "a scalar value",
            )),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<Properties> for ParamValue {
    fn from(value: Properties) -> Self {
        Self::Properties(value)
    }
}

impl From<ContentStream> for ParamValue {
    fn from(value: ContentStream) -> Self {
        Self::Content(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportMode {
    Get,
    PostForm,
    PostMultipart,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::PostForm => "POST_FORM",
            Self::PostMultipart => "POST_MULTIPART",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded parameters ready for the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct WireRequest {
    pub params: Vec<(String, String)>,
    pub content: Option<ContentStream>,
    pub mode: TransportMode,
}

impl WireRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestBuilder {
    required: Vec<(String, ParamValue)>,
    optional: Vec<(String, Option<ParamValue>)>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        upsert(&mut self.required, key.into(), value.into());
        self
    }

    pub fn optional<V: Into<ParamValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        upsert(&mut self.optional, key.into(), value.map(Into::into));
        self
    }

    pub fn has(&self, key: &str) -> bool {
        self.required.iter().any(|(name, _)| name == key)
            || self
                .optional
                .iter()
                .any(|(name, value)| name == key && value.is_some())
    }

    /// Encodes the parameters. Fails before any I/O when an enumerated
    /// parameter holds a value outside its allowed set.
    pub fn build(self) -> CmisResult<WireRequest> {
        let mut merged = self.required;
        for (key, value) in self.optional {
            if let Some(value) = value {
                upsert(&mut merged, key, value);
            }
        }

        validate_enumerated(&merged)?;

        let mut params = Vec::with_capacity(merged.len());
        let mut properties = None;
        let mut content = None;
        for (key, value) in merged {
            match value {
                ParamValue::Properties(bag) if key == PROPERTIES_PARAM => properties = Some(bag),
                ParamValue::Content(stream) if key == CONTENT_PARAM => {
                    stream.validate()?;
                    content = Some(stream);
                }
                value => {
                    let encoded = value.into_wire(&key)?;
                    params.push((key, encoded));
                }
            }
        }

        if let Some(properties) = properties {
            encode_properties(&properties, &mut params);
        }

        let has_action = params.iter().any(|(key, _)| key == CMIS_ACTION);
        let mode = if content.is_some() {
            TransportMode::PostMultipart
        } else if has_action {
            TransportMode::PostForm
        } else {
            TransportMode::Get
        };

        Ok(WireRequest {
            params,
            content,
            mode,
        })
    }
}

fn upsert<V>(entries: &mut Vec<(String, V)>, key: String, value: V) {
    match entries.iter_mut().find(|(name, _)| *name == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

fn validate_enumerated(params: &[(String, ParamValue)]) -> CmisResult<()> {
    for (key, allowed) in ENUMERATED_PARAMS {
        let Some((_, value)) = params.iter().find(|(name, _)| name == *key) else {
            continue;
        };
        let accepted = matches!(value, ParamValue::Text(text) if allowed.contains(&text.as_str()));
        if !accepted {
            return Err(CmisError::invalid_parameter(
                *key,
                value.describe(),
                format!("one of {}", allowed.join(", ")),
            ));
        }
    }
    Ok(())
}

/// Emits `propertyId[n]` / `propertyValue[n]` pairs in insertion order.
/// Multi-valued properties use `propertyValue[n][m]`; unset values emit only the id.
pub fn encode_properties(properties: &Properties, out: &mut Vec<(String, String)>) {
    for (index, (id, value)) in properties.iter().enumerate() {
        out.push((format!("propertyId[{index}]"), id.clone()));
        if value.is_multivalued() {
            for (position, scalar) in value.values().iter().enumerate() {
                out.push((
                    format!("propertyValue[{index}][{position}]"),
                    scalar.to_wire(),
                ));
            }
        } else if let Some(scalar) = value.first() {
            out.push((format!("propertyValue[{index}]"), scalar.to_wire()));
        }
    }
}

/// Operation parameters plus the repository they address.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationRequest {
    pub repository_id: Option<String>,
    pub params: RequestBuilder,
}

impl OperationRequest {
    /// A request against the service root.
    pub fn service() -> Self {
        Self::default()
    }

    pub fn repository(repository_id: impl Into<String>) -> Self {
        Self {
            repository_id: Some(repository_id.into()),
            params: RequestBuilder::new(),
        }
    }

    pub fn selector(self, selector: &str) -> Self {
        self.param(CMIS_SELECTOR, selector)
    }

    pub fn action(self, action: &str) -> Self {
        self.param(CMIS_ACTION, action)
    }

    pub fn object_id(self, object_id: impl Into<String>) -> Self {
        self.param(OBJECT_ID_PARAM, object_id.into())
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params = self.params.required(key, value);
        self
    }

    pub fn optional<V: Into<ParamValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.params = self.params.optional(key, value);
        self
    }

    /// Whether the request addresses an object, which routes it to the root folder URL.
    pub fn addresses_object(&self) -> bool {
        self.params.has(OBJECT_ID_PARAM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyKind, PropertyValue, Scalar};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn properties_become_indexed_pairs_in_insertion_order() {
        let created_at = Utc.timestamp_opt(1_650_000_000, 0).unwrap();
        let mut properties = Properties::new();
        properties.insert("cmis:name".to_string(), PropertyValue::string("doc1"));
        properties.insert(
            "cmis:createdAt".to_string(),
            PropertyValue::datetime(created_at),
        );

        let wire = RequestBuilder::new()
            .required(CMIS_ACTION, "createDocument")
            .optional(PROPERTIES_PARAM, Some(properties))
            .build()
            .unwrap();

        assert_eq!(
            wire.params,
            pairs(&[
                ("cmisaction", "createDocument"),
                ("propertyId[0]", "cmis:name"),
                ("propertyValue[0]", "doc1"),
                ("propertyId[1]", "cmis:createdAt"),
                ("propertyValue[1]", "1650000000000"),
            ])
        );
        assert_eq!(wire.mode, TransportMode::PostForm);
    }

    #[test]
    fn multivalued_properties_use_nested_indexes() {
        let mut properties = Properties::new();
        properties.insert(
            "tags".to_string(),
            PropertyValue::multi(
                PropertyKind::String,
                vec![Scalar::String("a".into()), Scalar::String("b".into())],
            )
            .unwrap(),
        );
        properties.insert("cmis:description".to_string(), PropertyValue::unset(PropertyKind::String));

        let mut out = Vec::new();
        encode_properties(&properties, &mut out);
        assert_eq!(
            out,
            pairs(&[
                ("propertyId[0]", "tags"),
                ("propertyValue[0][0]", "a"),
                ("propertyValue[0][1]", "b"),
                ("propertyId[1]", "cmis:description"),
            ])
        );
    }

    #[test]
    fn transport_mode_selection() {
        let content = ContentStream::new("x", "text/plain", "x.txt");

        let multipart = RequestBuilder::new()
            .required(CONTENT_PARAM, content.clone())
            .build()
            .unwrap();
        assert_eq!(multipart.mode, TransportMode::PostMultipart);
        assert_eq!(multipart.content, Some(content.clone()));
        assert!(multipart.param(CONTENT_PARAM).is_none());

        let multipart_with_action = RequestBuilder::new()
            .required(CMIS_ACTION, "createDocument")
            .optional(CONTENT_PARAM, Some(content))
            .build()
            .unwrap();
        assert_eq!(multipart_with_action.mode, TransportMode::PostMultipart);

        let form = RequestBuilder::new()
            .required(CMIS_ACTION, "delete")
            .build()
            .unwrap();
        assert_eq!(form.mode, TransportMode::PostForm);

        let get = RequestBuilder::new()
            .required(CMIS_SELECTOR, "object")
            .build()
            .unwrap();
        assert_eq!(get.mode, TransportMode::Get);
    }

    #[test]
    fn absent_optional_parameters_are_dropped() {
        let wire = RequestBuilder::new()
            .required(CMIS_SELECTOR, "children")
            .optional("filter", None::<String>)
            .optional("maxItems", Some(10_i64))
            .optional(CONTENT_PARAM, None::<ContentStream>)
            .build()
            .unwrap();
        assert_eq!(
            wire.params,
            pairs(&[("cmisselector", "children"), ("maxItems", "10")])
        );
        assert_eq!(wire.mode, TransportMode::Get);
    }

    #[test]
    fn optional_value_overrides_required_with_same_key() {
        let wire = RequestBuilder::new()
            .required(SUCCINCT_PARAM, true)
            .optional(SUCCINCT_PARAM, Some(false))
            .build()
            .unwrap();
        assert_eq!(wire.param(SUCCINCT_PARAM), Some("false"));
    }

    #[test]
    fn include_relationships_outside_allowed_set_fails() {
        let error = RequestBuilder::new()
            .required(CMIS_SELECTOR, "object")
            .optional("includeRelationships", Some("sideways"))
            .build()
            .unwrap_err();
        match error {
            CmisError::InvalidParameterValue {
                parameter, value, ..
            } => {
                assert_eq!(parameter, "includeRelationships");
                assert_eq!(value, "sideways");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        for allowed in ["none", "source", "target", "both"] {
            RequestBuilder::new()
                .optional("includeRelationships", Some(allowed))
                .build()
                .expect("allowed value should pass");
        }
    }

    #[test]
    fn content_with_malformed_mime_type_fails_at_build() {
        let error = RequestBuilder::new()
            .required(CMIS_ACTION, "createDocument")
            .optional(
                CONTENT_PARAM,
                Some(ContentStream::new("x", "not a mime type", "x.txt")),
            )
            .build()
            .unwrap_err();
        match error {
            CmisError::InvalidParameterValue {
                parameter, value, ..
            } => {
                assert_eq!(parameter, CONTENT_PARAM);
                assert_eq!(value, "not a mime type");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        RequestBuilder::new()
            .required(
                CONTENT_PARAM,
                ContentStream::new("x", "text/plain; charset=utf-8", "x.txt"),
            )
            .build()
            .expect("parameterised mime type is valid");
    }

    #[test]
    fn structured_value_under_scalar_key_is_rejected() {
        let error = RequestBuilder::new()
            .required("filter", Properties::new())
            .build()
            .unwrap_err();
        assert!(matches!(error, CmisError::InvalidParameterValue { .. }));
    }

    #[test]
    fn operation_request_routes_by_object_id() {
        assert!(!OperationRequest::repository("r1").selector("repositoryInfo").addresses_object());
        assert!(OperationRequest::repository("r1").object_id("o1").addresses_object());
        assert!(
            !OperationRequest::repository("r1")
                .optional(OBJECT_ID_PARAM, None::<String>)
                .addresses_object()
        );
    }
}
