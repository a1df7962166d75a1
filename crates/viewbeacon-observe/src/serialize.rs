//! Flattening of event values into URL query strings.

use viewbeacon_types::EventValue;

/// Field name under which events carry the embedded video element.
pub const VIDEO_ELEMENT_KEY: &str = "videoElement";
/// Field name under which events carry the embedded ad slot element.
pub const SLOT_ELEMENT_KEY: &str = "slotElement";

/// Value sent in place of a `videoElement` field.
pub const VIDEO_ELEMENT_PLACEHOLDER: &str = "VideoElement (not serializable)";
/// Value sent in place of a `slotElement` field.
pub const SLOT_ELEMENT_PLACEHOLDER: &str = "SlotElement (not serializable)";

const EMPTY_ARRAY: &str = "%5B%5D";

/// Percent-encodes a query component. Only unreserved characters
/// (`A-Z a-z 0-9 - _ . ~`) pass through.
pub fn encode_component(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Flattens `value` into `&`-joined `key=value` pairs.
///
/// Nested fields get bracketed keys (`adView[percentageInView]`), array
/// elements are keyed by index, and pairs appear in iteration order. An empty
/// array stays visible as `%5B%5D`; an empty map emits nothing. The
/// `videoElement` and
/// `slotElement` fields are replaced by fixed placeholders whatever they
/// hold.
///
/// A scalar at the top level has no keys and produces an empty string.
pub fn serialize(value: &EventValue, prefix: Option<&str>) -> String {
    let mut pairs = Vec::new();
    collect_pairs(value, prefix, &mut pairs);
    let query = pairs.join("&");
    tracing::trace!(%query, "serialized event");
    query
}

fn collect_pairs(value: &EventValue, prefix: Option<&str>, out: &mut Vec<String>) {
    match value {
        EventValue::Map(entries) => {
            for (key, field) in entries {
                push_field(key, field, prefix, out);
            }
        }
        EventValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                push_field(&index.to_string(), item, prefix, out);
            }
        }
        _ => {}
    }
}

fn push_field(key: &str, value: &EventValue, prefix: Option<&str>, out: &mut Vec<String>) {
    let path = match prefix {
        Some(prefix) => format!("{prefix}[{key}]"),
        None => key.to_string(),
    };
    let encoded_key = encode_component(&path);

    if let Some(placeholder) = host_placeholder(key) {
        out.push(format!("{encoded_key}={}", encode_component(placeholder)));
        return;
    }

    match value {
        EventValue::Array(items) if items.is_empty() => {
            out.push(format!("{encoded_key}={EMPTY_ARRAY}"));
        }
        EventValue::Array(_) | EventValue::Map(_) => collect_pairs(value, Some(&path), out),
        scalar => {
            let text = scalar.scalar_text().unwrap_or_default();
            out.push(format!("{encoded_key}={}", encode_component(&text)));
        }
    }
}

fn host_placeholder(key: &str) -> Option<&'static str> {
    match key {
        VIDEO_ELEMENT_KEY => Some(VIDEO_ELEMENT_PLACEHOLDER),
        SLOT_ELEMENT_KEY => Some(SLOT_ELEMENT_PLACEHOLDER),
        _ => None,
    }
}
