use axum::{
    body::Bytes,
    http::{HeaderMap, header},
};
use mime::Mime;
use serde_json::{Map, Value};
use url::form_urlencoded;

/// A request body as it arrived from the client, classified by its `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundBody {
    /// JSON or form data already decoded into key-value form.
    Structured(Value),
    /// Plain text that is relayed as-is.
    Text(String),
    /// Anything else, relayed byte-for-byte.
    Raw(Bytes),
}

impl InboundBody {
    pub fn from_request(headers: &HeaderMap, bytes: Bytes) -> Self {
        let Some(content_type) = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()?.parse::<Mime>().ok())
        else {
            return Self::Raw(bytes);
        };

        if is_json(&content_type) {
            return match serde_json::from_slice(&bytes) {
                Ok(value) => Self::Structured(value),
                Err(_) => Self::Raw(bytes),
            };
        }
        if content_type.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() {
            return Self::Structured(decode_form(&bytes));
        }
        if content_type.type_() == mime::TEXT {
            return match String::from_utf8(bytes.to_vec()) {
                Ok(text) => Self::Text(text),
                Err(_) => Self::Raw(bytes),
            };
        }
        Self::Raw(bytes)
    }

    /// The body to send upstream. Structured data is re-serialized to JSON text.
    pub fn into_upstream(self) -> reqwest::Body {
        match self {
            Self::Structured(value) => value.to_string().into(),
            Self::Text(text) => text.into(),
            Self::Raw(bytes) => bytes.into(),
        }
    }
}

fn is_json(content_type: &Mime) -> bool {
    content_type.type_() == mime::APPLICATION
        && (content_type.subtype() == mime::JSON || content_type.suffix() == Some(mime::JSON))
}

// Repeated keys collect into an array, in the order they were sent.
fn decode_form(bytes: &[u8]) -> Value {
    let mut fields = Map::new();
    for (key, value) in form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match fields.get_mut(&*key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(fields)
}

/// A response body received from upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamBody {
    Json(Value),
    Text(String),
}

impl From<String> for UpstreamBody {
    fn from(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InboundBody, UpstreamBody};
    use axum::{
        body::Bytes,
        http::{HeaderMap, HeaderValue, header},
    };
    use serde_json::json;

    fn headers_with(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    #[test]
    fn test_inbound_body_classification() {
        // JSON with parameters and vendor suffixes.
        assert_eq!(
            InboundBody::from_request(
                &headers_with("application/json; charset=utf-8"),
                Bytes::from_static(br#"{"a":1}"#)
            ),
            InboundBody::Structured(json!({"a": 1}))
        );
        assert_eq!(
            InboundBody::from_request(
                &headers_with("application/merge-patch+json"),
                Bytes::from_static(br#"[1,2]"#)
            ),
            InboundBody::Structured(json!([1, 2]))
        );

        // Malformed JSON is relayed untouched.
        assert_eq!(
            InboundBody::from_request(
                &headers_with("application/json"),
                Bytes::from_static(b"{not json")
            ),
            InboundBody::Raw(Bytes::from_static(b"{not json"))
        );

        // Text and binary.
        assert_eq!(
            InboundBody::from_request(&headers_with("text/plain"), Bytes::from_static(b"hello")),
            InboundBody::Text("hello".to_owned())
        );
        assert_eq!(
            InboundBody::from_request(&headers_with("text/plain"), Bytes::from_static(&[0xff, 0xfe])),
            InboundBody::Raw(Bytes::from_static(&[0xff, 0xfe]))
        );
        assert_eq!(
            InboundBody::from_request(
                &headers_with("application/octet-stream"),
                Bytes::from_static(&[0, 1, 2])
            ),
            InboundBody::Raw(Bytes::from_static(&[0, 1, 2]))
        );

        // No Content-Type at all.
        assert_eq!(
            InboundBody::from_request(&HeaderMap::new(), Bytes::from_static(b"{}")),
            InboundBody::Raw(Bytes::from_static(b"{}"))
        );
    }

    #[test]
    fn test_form_body_decoding() {
        assert_eq!(
            InboundBody::from_request(
                &headers_with("application/x-www-form-urlencoded"),
                Bytes::from_static(b"title=New+Title&tag=a&tag=b&tag=c&vendor=Acme%20Co")
            ),
            InboundBody::Structured(json!({
                "title": "New Title",
                "tag": ["a", "b", "c"],
                "vendor": "Acme Co",
            }))
        );
    }

    #[test]
    fn test_upstream_body_decoding() {
        assert_eq!(
            UpstreamBody::from(r#"{"errors":"Not Found"}"#.to_owned()),
            UpstreamBody::Json(json!({"errors": "Not Found"}))
        );
        assert_eq!(
            UpstreamBody::from("42".to_owned()),
            UpstreamBody::Json(json!(42))
        );
        assert_eq!(
            UpstreamBody::from("<html>Bad Gateway</html>".to_owned()),
            UpstreamBody::Text("<html>Bad Gateway</html>".to_owned())
        );
        assert_eq!(
            UpstreamBody::from(String::new()),
            UpstreamBody::Text(String::new())
        );
    }
}
