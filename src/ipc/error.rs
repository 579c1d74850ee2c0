use serde_json::json;

use crate::backend::BackendError;
use crate::sequencer::AssignError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<AssignError> for HandlerErr {
    fn from(e: AssignError) -> Self {
        let details = match &e {
            AssignError::Conflict { code } => Some(json!({ "rfid": code })),
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.notice(),
            details,
        }
    }
}

impl From<BackendError> for HandlerErr {
    fn from(e: BackendError) -> Self {
        HandlerErr::new("backend_failed", e.message)
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let value = params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))?;
    if value.is_empty() {
        return Err(HandlerErr::new(
            "bad_params",
            format!("{} must not be empty", key),
        ));
    }
    Ok(value)
}

/// Absent and `null` read as `None`; any other non-string is refused.
pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::new(
            "bad_params",
            format!("{} must be a string", key),
        )),
    }
}
