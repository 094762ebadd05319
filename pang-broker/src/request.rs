//! Request field extraction.
//!
//! Clients send fields either in a JSON body or in the query string, and
//! several fields have more than one accepted spelling. [`ApiRequest`] reads
//! both sources once and resolves every field through the [`Field`] alias
//! table: body keys first, then query keys, with empty strings treated as
//! absent.

use axum::body::Body;
use axum::extract::{FromRef, FromRequest, Query, Request};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{ApiError, ApiResult};

/// Ceiling on request body size, read from router state.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

/// A logical request field and its accepted key spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ConnectionId,
    ChatId,
    Prompt,
    Url,
    Json,
    Merge,
    Model,
    Enabled,
    Inform,
    Type,
}

impl Field {
    /// Accepted keys, in lookup order.
    pub const fn keys(self) -> &'static [&'static str] {
        match self {
            Self::ConnectionId => &["connectionId", "connectionID"],
            Self::ChatId => &["chatId", "chatID"],
            Self::Prompt => &["prompt", "PROMPT"],
            Self::Url => &["url", "URL"],
            Self::Json => &["json", "JSON"],
            Self::Merge => &["merge", "MERGE"],
            Self::Model => &["model"],
            Self::Enabled => &["enabled"],
            Self::Inform => &["inform", "text"],
            Self::Type => &["type"],
        }
    }
}

/// Body and query fields of one request.
#[derive(Debug, Default, Clone)]
pub struct ApiRequest {
    body: Map<String, Value>,
    query: HashMap<String, String>,
}

impl ApiRequest {
    pub fn new(body: Map<String, Value>, query: HashMap<String, String>) -> Self {
        Self { body, query }
    }

    /// Parse a raw body. Empty means `{}`; a non-object body carries no fields.
    pub fn parse_body(bytes: &[u8]) -> ApiResult<Map<String, Value>> {
        if bytes.is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Ok(Map::new()),
            Err(_) => Err(ApiError::invalid_body()),
        }
    }

    fn body_value(&self, field: Field) -> Option<&Value> {
        field
            .keys()
            .iter()
            .filter_map(|key| self.body.get(*key))
            .find(|value| is_present(value))
    }

    fn query_value(&self, field: Field) -> Option<&str> {
        field
            .keys()
            .iter()
            .filter_map(|key| self.query.get(*key))
            .map(String::as_str)
            .find(|value| !value.is_empty())
    }

    /// A field as text. Numbers and `true` are rendered; objects are ignored.
    pub fn string(&self, field: Field) -> Option<String> {
        let from_body = self.body_value(field).and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(true) => Some("true".to_string()),
            _ => None,
        });
        from_body.or_else(|| self.query_value(field).map(str::to_string))
    }

    /// A field as a boolean. Only real booleans or `"true"`/`"false"` count.
    pub fn bool(&self, field: Field) -> Option<bool> {
        let from_body = field
            .keys()
            .iter()
            .filter_map(|key| self.body.get(*key))
            .find_map(Value::as_bool);
        from_body.or_else(|| self.query_value(field).and_then(|v| v.parse().ok()))
    }

    /// A field as raw JSON. Query values come back as strings.
    pub fn value(&self, field: Field) -> Option<Value> {
        self.body_value(field)
            .cloned()
            .or_else(|| self.query_value(field).map(|v| Value::String(v.to_string())))
    }

    /// The trimmed connection id, required.
    pub fn connection_id(&self) -> ApiResult<String> {
        trimmed(self.string(Field::ConnectionId)).ok_or(ApiError::ConnectionRequired)
    }

    /// The trimmed chat id, required.
    pub fn chat_id(&self) -> ApiResult<String> {
        trimmed(self.string(Field::ChatId)).ok_or(ApiError::ChatIdRequired)
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_length_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

#[axum::async_trait]
impl<S> FromRequest<S> for ApiRequest
where
    BodyLimit: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let BodyLimit(limit) = BodyLimit::from_ref(state);

        let query = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .map(|Query(q)| q)
            .unwrap_or_default();

        let body: Body = req.into_body();
        let bytes = axum::body::to_bytes(body, limit).await.map_err(|err| {
            let inner = err.into_inner();
            if is_length_limit(&*inner) {
                ApiError::BodyTooLarge
            } else {
                ApiError::Server(inner.to_string())
            }
        })?;

        let body = Self::parse_body(&bytes)?;
        Ok(Self::new(body, query))
    }
}
