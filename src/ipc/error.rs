use crate::error::RecordsError;
use serde_json::json;

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

/// Envelope for a core error, keyed by its wire code.
pub fn records_err(id: &str, e: &RecordsError) -> serde_json::Value {
    tracing::debug!(code = e.code(), error = %e, "request failed");
    err(id, e.code(), e.to_string(), None)
}
