use crate::files::ReportFiles;
use crate::ipc::error::{err, records_err};
use crate::ipc::types::{AppState, Request};
use crate::settings::ensure_records_enabled;
use rusqlite::Connection;
use serde::de::DeserializeOwned;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Absent or null is `None`; any other non-integer is rejected.
pub fn optional_i64(req: &Request, key: &str) -> Result<Option<i64>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be an integer", key),
                None,
            )
        }),
    }
}

pub fn db_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn report_files(state: &AppState, req: &Request) -> Result<ReportFiles, serde_json::Value> {
    state
        .workspace
        .as_deref()
        .map(ReportFiles::for_workspace)
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Deserialize a typed payload. Absent or null reads as an empty object.
pub fn parse_value<T: DeserializeOwned>(
    req: &Request,
    value: Option<&serde_json::Value>,
) -> Result<T, serde_json::Value> {
    let value = match value {
        None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
        Some(v) => v.clone(),
    };
    serde_json::from_value(value)
        .map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

pub fn parse_params<T: DeserializeOwned>(req: &Request) -> Result<T, serde_json::Value> {
    parse_value(req, Some(&req.params))
}

/// Absent or null is `None`; anything else must deserialize as `T`.
pub fn optional_param<T: DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<Option<T>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| err(&req.id, "bad_params", format!("{}: {}", key, e), None)),
    }
}

/// Connection for academic-records methods; a disabled module is reported
/// before any parameter is looked at.
pub fn gated_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    let conn = db_conn(state, req)?;
    ensure_records_enabled(conn).map_err(|e| records_err(&req.id, &e))?;
    Ok(conn)
}
