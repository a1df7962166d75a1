//! The JSON-like value model for session and ad events.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

use crate::error::EventError;

/// An opaque reference to a host object (a video element, an ad slot, ...).
///
/// The core never looks inside a host object; it only carries a label that
/// can be rendered in place of the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRef {
    label: String,
}

impl HostRef {
    /// Creates a reference with the given human-readable label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Returns the label of the referenced object.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Display for HostRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

/// A session or ad event as delivered by the measurement SDK.
///
/// Maps keep their entries in insertion order, which the query serializer
/// relies on to produce deterministic output.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventValue {
    /// JSON `null`.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number, integer or floating point.
    Number(Number),
    /// A string.
    String(String),
    /// An ordered sequence.
    Array(Vec<EventValue>),
    /// An insertion-ordered mapping from string keys to values.
    Map(Vec<(String, EventValue)>),
    /// A host object that cannot be serialized.
    Opaque(HostRef),
}

impl EventValue {
    /// Decodes an event from a JSON document whose top level is an object.
    pub fn from_json_str(json: &str) -> Result<Self, EventError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        match value {
            serde_json::Value::Object(_) => Ok(value.into()),
            other => Err(EventError::NotAnObject(json_kind(&other))),
        }
    }

    /// Builds a map from `(key, value)` pairs, keeping their order.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, EventValue)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Looks up `key` in a map. Returns `None` for non-maps.
    pub fn get(&self, key: &str) -> Option<&EventValue> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Follows a path of map keys.
    pub fn path(&self, keys: &[&str]) -> Option<&EventValue> {
        keys.iter().try_fold(self, |value, key| value.get(key))
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric payload as `f64`, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// The event's `type` field.
    pub fn event_type(&self) -> Option<&str> {
        self.get("type").and_then(Self::as_str)
    }

    /// The event's `timestamp` field, in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> Option<f64> {
        self.get("timestamp").and_then(Self::as_f64)
    }

    /// The viewability snapshot `data.adView.percentageInView`.
    pub fn percentage_in_view(&self) -> Option<f64> {
        self.path(&["data", "adView", "percentageInView"])
            .and_then(Self::as_f64)
    }

    /// Whether this event is a viewability geometry notification.
    pub fn is_geometry_change(&self) -> bool {
        self.event_type() == Some(crate::GEOMETRY_CHANGE)
    }

    /// Whether this is a map or array with at least one element.
    pub fn is_non_empty_container(&self) -> bool {
        match self {
            Self::Map(entries) => !entries.is_empty(),
            Self::Array(items) => !items.is_empty(),
            _ => false,
        }
    }

    /// Renders a scalar the way a URL query value carries it.
    ///
    /// Integral numbers print without a fractional part; `null` and booleans
    /// print their literal names. Containers return `None`.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Null => Some("null".to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(format_number(n)),
            Self::String(s) => Some(s.clone()),
            Self::Opaque(host) => Some(host.label().to_string()),
            Self::Array(_) | Self::Map(_) => None,
        }
    }
}

fn format_number(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                return (f as i64).to_string();
            }
        }
    }
    n.to_string()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl From<serde_json::Value> for EventValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for EventValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for EventValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for EventValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for EventValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for EventValue {
    /// Non-finite values have no JSON representation and become `Null`.
    fn from(f: f64) -> Self {
        Number::from_f64(f).map_or(Self::Null, Self::Number)
    }
}

impl From<HostRef> for EventValue {
    fn from(host: HostRef) -> Self {
        Self::Opaque(host)
    }
}

impl Serialize for EventValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};

        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Opaque(host) => serializer.serialize_str(host.label()),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for EventValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(percent: f64) -> EventValue {
        EventValue::map([
            ("type", EventValue::from("geometryChange")),
            ("timestamp", EventValue::from(1_507_000_000_000_i64)),
            (
                "data",
                EventValue::map([(
                    "adView",
                    EventValue::map([("percentageInView", EventValue::from(percent))]),
                )]),
            ),
        ])
    }

    #[test]
    fn json_decoding_preserves_key_order() {
        let event = EventValue::from_json_str(r#"{"z":1,"a":2,"m":{"y":true,"b":null}}"#)
            .expect("valid event");
        let EventValue::Map(entries) = &event else {
            panic!("expected a map");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(event.path(&["m", "y"]), Some(&EventValue::Bool(true)));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = EventValue::from_json_str("[1,2]").unwrap_err();
        assert!(matches!(err, EventError::NotAnObject("array")));
        assert!(matches!(
            EventValue::from_json_str("{").unwrap_err(),
            EventError::Decode(_)
        ));
    }

    #[test]
    fn accessors_read_geometry_fields() {
        let event = geometry(62.5);
        assert!(event.is_geometry_change());
        assert_eq!(event.event_type(), Some("geometryChange"));
        assert_eq!(event.timestamp(), Some(1_507_000_000_000.0));
        assert_eq!(event.percentage_in_view(), Some(62.5));
    }

    #[test]
    fn missing_percentage_is_none() {
        let event = EventValue::map([("type", EventValue::from("geometryChange"))]);
        assert_eq!(event.percentage_in_view(), None);
    }

    #[test]
    fn scalar_text_formats_like_a_query_value() {
        assert_eq!(EventValue::from(60.0).scalar_text().as_deref(), Some("60"));
        assert_eq!(EventValue::from(0.5).scalar_text().as_deref(), Some("0.5"));
        assert_eq!(EventValue::from(0_i64).scalar_text().as_deref(), Some("0"));
        assert_eq!(EventValue::from(false).scalar_text().as_deref(), Some("false"));
        assert_eq!(EventValue::Null.scalar_text().as_deref(), Some("null"));
        assert_eq!(EventValue::Array(vec![]).scalar_text(), None);
    }

    #[test]
    fn opaque_values_serialize_as_their_label() {
        let event = EventValue::map([("slot", EventValue::from(HostRef::new("div#ad")))]);
        let json = serde_json::to_string(&event).expect("serializable");
        assert_eq!(json, r#"{"slot":"div#ad"}"#);
    }

    #[test]
    fn deserialize_goes_through_json_model() {
        let event: EventValue = serde_json::from_str(r#"{"type":"impression","n":[1,"x"]}"#)
            .expect("valid json");
        assert_eq!(event.event_type(), Some("impression"));
        assert_eq!(
            event.get("n"),
            Some(&EventValue::Array(vec![EventValue::from(1_i64), EventValue::from("x")]))
        );
    }
}
