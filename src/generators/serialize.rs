//! Media-type-keyed body serialization and RFC 6570-ish parameter-style
//! serialization.
//!
//! Bodies are serialized according to their declared media type; path,
//! query, header, and cookie parameters are serialized according to their
//! declared [`ParamStyle`] and `explode` flag, per the OpenAPI "Style
//! Values" table.

use crate::constants;
use crate::error::Error;
use crate::schema::model::{ParamStyle, media_type_matches};
use serde_json::Value;
use urlencoding::encode;

/// Serialize a generated body value for transport according to `media_type`.
///
/// # Errors
/// Returns [`Error::serialization_unsupported`] for a media type this
/// engine has no encoder for.
pub fn serialize_body(value: &Value, media_type: &str) -> Result<Vec<u8>, Error> {
    if media_type_matches(constants::CONTENT_TYPE_JSON, media_type) || media_type.ends_with("+json") {
        return serde_json::to_vec(value).map_err(Error::from);
    }
    if media_type_matches(constants::CONTENT_TYPE_YAML, media_type) {
        return serde_yaml::to_string(value)
            .map(String::into_bytes)
            .map_err(Error::from);
    }
    if media_type_matches(constants::CONTENT_TYPE_XML, media_type)
        || media_type_matches(constants::CONTENT_TYPE_TEXT_XML, media_type)
    {
        return Ok(to_xml("root", value).into_bytes());
    }
    if media_type_matches(constants::CONTENT_TYPE_FORM, media_type) {
        return Ok(to_form_urlencoded(value).into_bytes());
    }
    if media_type_matches(constants::CONTENT_TYPE_TEXT, media_type) {
        return Ok(value_to_plain_text(value).into_bytes());
    }
    if media_type.starts_with(constants::CONTENT_TYPE_PREFIX_IMAGE)
        || media_type_matches(constants::CONTENT_TYPE_OCTET_STREAM, media_type)
    {
        return Ok(value_to_plain_text(value).into_bytes());
    }

    Err(Error::serialization_unsupported(media_type))
}

fn value_to_plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_form_urlencoded(value: &Value) -> String {
    let Some(object) = value.as_object() else {
        return String::new();
    };
    object
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(&value_to_plain_text(v))))
        .collect::<Vec<_>>()
        .join("&")
}

fn to_xml(tag: &str, value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let inner: String = map.iter().map(|(k, v)| to_xml(k, v)).collect();
            format!("<{tag}>{inner}</{tag}>")
        }
        Value::Array(items) => items.iter().map(|item| to_xml(tag, item)).collect(),
        Value::Null => format!("<{tag}/>"),
        Value::Bool(b) => format!("<{tag}>{b}</{tag}>"),
        Value::Number(n) => format!("<{tag}>{n}</{tag}>"),
        Value::String(s) => format!("<{tag}>{}</{tag}>", xml_escape(s)),
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Encode a `multipart/form-data` body, returning the body bytes and the
/// boundary used so the caller can set the `Content-Type` header.
#[must_use]
pub fn serialize_multipart(value: &Value, boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(object) = value.as_object() {
        for (name, field_value) in object {
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            out.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            out.extend_from_slice(value_to_plain_text(field_value).as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

/// Serialize one parameter value according to its `style`/`explode`, e.g.
/// for a query parameter `id` with `style: form, explode: true` and array
/// value `[1,2,3]`, produces `"id=1&id=2&id=3"`.
#[must_use]
pub fn serialize_parameter(name: &str, value: &Value, style: ParamStyle, explode: bool) -> String {
    match style {
        ParamStyle::Simple => simple_style(value, explode),
        ParamStyle::Label => format!(".{}", label_style(value, explode)),
        ParamStyle::Matrix => matrix_style(name, value, explode),
        ParamStyle::Form => form_style(name, value, explode),
        ParamStyle::SpaceDelimited => delimited_style(value, ' '),
        ParamStyle::PipeDelimited => delimited_style(value, '|'),
        ParamStyle::DeepObject => deep_object_style(name, value),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn simple_style(value: &Value, explode: bool) -> String {
    match value {
        Value::Array(items) => items.iter().map(scalar).collect::<Vec<_>>().join(","),
        Value::Object(map) => {
            let sep = if explode { "=" } else { "," };
            let joiner = if explode { "," } else { "," };
            map.iter()
                .map(|(k, v)| format!("{k}{sep}{}", scalar(v)))
                .collect::<Vec<_>>()
                .join(joiner)
        }
        other => scalar(other),
    }
}

fn label_style(value: &Value, explode: bool) -> String {
    match value {
        Value::Array(items) => {
            let sep = if explode { "." } else { "," };
            items.iter().map(scalar).collect::<Vec<_>>().join(sep)
        }
        Value::Object(map) => {
            let sep = if explode { "." } else { "," };
            let pair_sep = if explode { "=" } else { "," };
            map.iter()
                .map(|(k, v)| format!("{k}{pair_sep}{}", scalar(v)))
                .collect::<Vec<_>>()
                .join(sep)
        }
        other => scalar(other),
    }
}

fn matrix_style(name: &str, value: &Value, explode: bool) -> String {
    match value {
        Value::Array(items) => {
            if explode {
                items.iter().map(|v| format!(";{name}={}", scalar(v))).collect()
            } else {
                format!(";{name}={}", items.iter().map(scalar).collect::<Vec<_>>().join(","))
            }
        }
        Value::Object(map) => {
            if explode {
                map.iter().map(|(k, v)| format!(";{k}={}", scalar(v))).collect()
            } else {
                let joined = map
                    .iter()
                    .map(|(k, v)| format!("{k},{}", scalar(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                format!(";{name}={joined}")
            }
        }
        other => format!(";{name}={}", scalar(other)),
    }
}

fn form_style(name: &str, value: &Value, explode: bool) -> String {
    match value {
        Value::Array(items) => {
            if explode {
                items
                    .iter()
                    .map(|v| format!("{}={}", encode(name), encode(&scalar(v))))
                    .collect::<Vec<_>>()
                    .join("&")
            } else {
                format!(
                    "{}={}",
                    encode(name),
                    encode(&items.iter().map(scalar).collect::<Vec<_>>().join(","))
                )
            }
        }
        Value::Object(map) => {
            if explode {
                map.iter()
                    .map(|(k, v)| format!("{}={}", encode(k), encode(&scalar(v))))
                    .collect::<Vec<_>>()
                    .join("&")
            } else {
                let joined = map
                    .iter()
                    .map(|(k, v)| format!("{k},{}", scalar(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}={}", encode(name), encode(&joined))
            }
        }
        other => format!("{}={}", encode(name), encode(&scalar(other))),
    }
}

fn delimited_style(value: &Value, delimiter: char) -> String {
    match value {
        Value::Array(items) => items.iter().map(scalar).collect::<Vec<_>>().join(&delimiter.to_string()),
        other => scalar(other),
    }
}

fn deep_object_style(name: &str, value: &Value) -> String {
    let Some(map) = value.as_object() else {
        return format!("{}={}", encode(name), encode(&scalar(value)));
    };
    map.iter()
        .map(|(k, v)| format!("{}[{}]={}", encode(name), encode(k), encode(&scalar(v))))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_explode_array_produces_repeated_keys() {
        let value = json!([1, 2, 3]);
        let encoded = serialize_parameter("id", &value, ParamStyle::Form, true);
        assert_eq!(encoded, "id=1&id=2&id=3");
    }

    #[test]
    fn form_non_explode_array_joins_with_commas() {
        let value = json!([1, 2, 3]);
        let encoded = serialize_parameter("id", &value, ParamStyle::Form, false);
        assert_eq!(encoded, "id=1%2C2%2C3");
    }

    #[test]
    fn simple_style_array_is_comma_joined_without_name() {
        let value = json!(["a", "b"]);
        assert_eq!(simple_style(&value, false), "a,b");
    }

    #[test]
    fn deep_object_style_brackets_each_property() {
        let value = json!({"x": 1, "y": 2});
        let encoded = serialize_parameter("point", &value, ParamStyle::DeepObject, true);
        assert!(encoded.contains("point%5Bx%5D=1"));
    }

    #[test]
    fn json_body_round_trips() {
        let value = json!({"a": 1});
        let bytes = serialize_body(&value, "application/json").unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn unsupported_media_type_is_an_error() {
        let value = json!({"a": 1});
        assert!(serialize_body(&value, "application/unknown-thing").is_err());
    }
}
