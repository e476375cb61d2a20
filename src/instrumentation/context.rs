//! Request snapshot handed to observers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Identity of the authenticated caller.
///
/// Inserted into request or response extensions by whatever auth layer the
/// host application runs; the instrumentation only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Session identifier, inserted into request extensions by the host's session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

/// Immutable view of one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
    /// Path plus query string as received.
    pub url: String,
    pub path: String,
    /// Lower-cased header names; repeated headers joined with ", ".
    pub headers: BTreeMap<String, String>,
    /// Parsed body (JSON or form), `{}` when absent or not inspected.
    pub body: Value,
    pub query: Map<String, Value>,
    pub ip: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    /// Context for `method url` with everything else empty.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query(query)),
            None => (url.clone(), Map::new()),
        };

        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            method: method.into(),
            url,
            path,
            headers: BTreeMap::new(),
            body: Value::Object(Map::new()),
            query,
            ip: "unknown".to_string(),
            user_id: None,
            session_id: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Body as JSON text, `{}` for a null body.
    pub fn body_text(&self) -> String {
        match &self.body {
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        }
    }

    pub fn query_text(&self) -> String {
        Value::Object(self.query.clone()).to_string()
    }
}

/// Parse an urlencoded string; repeated keys collect into an array.
pub fn parse_query(raw: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    map
}

/// Interpret a raw body according to its content type.
///
/// JSON and urlencoded forms are parsed; malformed JSON is kept as a string so
/// it can still be inspected; any other media type yields `{}`.
pub fn parse_body(content_type: Option<&str>, bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Object(Map::new());
    }
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();

    if content_type.contains("json") {
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Value::Object(parse_query(&String::from_utf8_lossy(bytes)))
    } else {
        Value::Object(Map::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_split_into_path_and_query() {
        let ctx = RequestContext::new("GET", "/api/recipes?search=soup&tag=a&tag=b");
        assert_eq!(ctx.path, "/api/recipes");
        assert_eq!(ctx.query["search"], "soup");
        assert_eq!(ctx.query["tag"], json!(["a", "b"]));
        assert_eq!(ctx.query_text(), r#"{"search":"soup","tag":["a","b"]}"#);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let ctx = RequestContext::new("GET", "/").with_header("User-Agent", "curl/8");
        assert_eq!(ctx.user_agent(), Some("curl/8"));
        assert_eq!(ctx.header("USER-AGENT"), Some("curl/8"));
    }

    #[test]
    fn test_body_parsing_by_content_type() {
        assert_eq!(parse_body(Some("application/json"), br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_body(Some("application/json"), b"{oops"), json!("{oops"));
        assert_eq!(
            parse_body(Some("application/x-www-form-urlencoded"), b"q=1+2"),
            json!({"q": "1 2"})
        );
        assert_eq!(parse_body(Some("image/png"), b"\x89PNG"), json!({}));
        assert_eq!(parse_body(None, b""), json!({}));
    }

    #[test]
    fn test_null_body_serializes_as_empty_object() {
        let ctx = RequestContext::new("POST", "/").with_body(Value::Null);
        assert_eq!(ctx.body_text(), "{}");
    }
}
