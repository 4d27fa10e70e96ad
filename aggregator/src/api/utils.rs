use crate::errors::GatewayError;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Response, StatusCode, Uri};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::http::json_response;
use std::collections::HashMap;

pub type HandlerBody = BoxBody<Bytes, GatewayError>;

/// Decoded query parameters. The first occurrence of a repeated key wins.
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn from_uri(uri: &Uri) -> Self {
        let mut params = HashMap::new();
        if let Some(query) = uri.query() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                params
                    .entry(key.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }
        Self(params)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// A parameter that must be present and not blank.
    pub fn required(&self, name: &str) -> Result<&str, GatewayError> {
        self.get(name)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::BadRequest(format!("Invalid or missing {name} parameter"))
            })
    }
}

/// Deserializes a JSON request body. An empty body reads as `{}`.
pub fn deserialize_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, GatewayError> {
    let bytes: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(bytes).map_err(|e| GatewayError::RequestBodyError(e.to_string()))
}

/// A `200` JSON response.
pub fn json_ok<T: Serialize>(value: &T) -> Result<Response<HandlerBody>, GatewayError> {
    let value = serde_json::to_value(value)
        .map_err(|e| GatewayError::InternalError(format!("Failed to serialize response: {e}")))?;
    Ok(json_response(StatusCode::OK, &value))
}
