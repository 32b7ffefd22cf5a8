use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A user question as received from the HTTP collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub user_id: String,
    pub query: String,
}

impl QueryRequest {
    /// Validate an untyped request body and return trimmed values.
    pub fn from_json(body: &Value) -> Result<Self> {
        let obj = body
            .as_object()
            .ok_or_else(|| Error::InvalidQuery("Request body must be a JSON object.".into()))?;
        let user_id = non_blank(obj.get("user_id"))
            .ok_or_else(|| Error::InvalidQuery("Missing or invalid 'user_id'. It must be a non-empty string.".into()))?;
        let query = non_blank(obj.get("query"))
            .ok_or_else(|| Error::InvalidQuery("Missing or invalid 'query'. It must be a non-empty string.".into()))?;
        Ok(Self { user_id, query })
    }
}

fn non_blank(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
