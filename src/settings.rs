use crate::error::{RecordsError, RecordsResult};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

/// Feature-gate key for this subsystem.
pub const RECORDS_MODULE: &str = "academic_records";

pub fn module_key(module: &str) -> String {
    format!("module_{}_enabled", module)
}

/// A settings value, resolved from its stored string once at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SettingValue {
    Bool(bool),
    Number(f64),
    String(String),
    Json(serde_json::Value),
}

impl SettingValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "bool",
            SettingValue::Number(_) => "number",
            SettingValue::String(_) => "string",
            SettingValue::Json(_) => "json",
        }
    }

    fn encode(&self) -> RecordsResult<String> {
        Ok(match self {
            SettingValue::Bool(v) => v.to_string(),
            SettingValue::Number(v) => v.to_string(),
            SettingValue::String(v) => v.clone(),
            SettingValue::Json(v) => serde_json::to_string(v)
                .map_err(|e| RecordsError::validation(e.to_string()))?,
        })
    }

    /// Decode a stored (value, value_type) pair. Unknown types and values that
    /// do not parse as their declared type are rejected.
    pub fn decode(value: &str, value_type: &str) -> Option<Self> {
        match value_type {
            "bool" | "boolean" => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(SettingValue::Bool(true)),
                "false" | "0" => Some(SettingValue::Bool(false)),
                _ => None,
            },
            "number" => value.trim().parse::<f64>().ok().map(SettingValue::Number),
            "string" => Some(SettingValue::String(value.to_string())),
            "json" => serde_json::from_str(value).ok().map(SettingValue::Json),
            _ => None,
        }
    }

    /// Infer the variant from a wire value.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => SettingValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(v) => SettingValue::Number(v),
                None => SettingValue::Json(value.clone()),
            },
            serde_json::Value::String(s) => SettingValue::String(s.clone()),
            other => SettingValue::Json(other.clone()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

pub fn get_setting(conn: &Connection, key: &str) -> RecordsResult<Option<SettingValue>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT value, value_type FROM settings WHERE key = ?",
            [key],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    Ok(row.and_then(|(value, value_type)| SettingValue::decode(&value, &value_type)))
}

pub fn set_setting(conn: &Connection, key: &str, value: &SettingValue) -> RecordsResult<()> {
    if key.trim().is_empty() {
        return Err(RecordsError::validation("key must not be empty"));
    }
    conn.execute(
        "INSERT INTO settings(key, value, value_type) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, value_type = excluded.value_type",
        (key, value.encode()?, value.type_name()),
    )?;
    Ok(())
}

/// Missing or non-boolean flags count as disabled.
pub fn is_module_enabled(conn: &Connection, module: &str) -> RecordsResult<bool> {
    Ok(get_setting(conn, &module_key(module))?
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}

/// Gate checked before any other work. A disabled module looks like a missing
/// one to the caller.
pub fn ensure_records_enabled(conn: &Connection) -> RecordsResult<()> {
    if is_module_enabled(conn, RECORDS_MODULE)? {
        return Ok(());
    }
    tracing::warn!(module = RECORDS_MODULE, "request rejected: module disabled");
    Err(RecordsError::not_found("academic records module is not enabled"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn
    }

    #[test]
    fn gate_fails_closed() {
        let conn = conn();
        assert!(!is_module_enabled(&conn, RECORDS_MODULE).expect("read"));
        assert!(matches!(
            ensure_records_enabled(&conn),
            Err(RecordsError::NotFound(_))
        ));

        set_setting(
            &conn,
            &module_key(RECORDS_MODULE),
            &SettingValue::String("yes".into()),
        )
        .expect("write");
        assert!(!is_module_enabled(&conn, RECORDS_MODULE).expect("read"));

        set_setting(&conn, &module_key(RECORDS_MODULE), &SettingValue::Bool(true))
            .expect("write");
        assert!(ensure_records_enabled(&conn).is_ok());
    }

    #[test]
    fn values_round_trip_through_their_declared_type() {
        let conn = conn();
        let cases = [
            ("a", SettingValue::Bool(false)),
            ("b", SettingValue::Number(2.5)),
            ("c", SettingValue::String("Liceo".into())),
            ("d", SettingValue::Json(json!({ "x": [1, 2] }))),
        ];
        for (key, value) in &cases {
            set_setting(&conn, key, value).expect("write");
            assert_eq!(get_setting(&conn, key).expect("read").as_ref(), Some(value));
        }
        assert_eq!(get_setting(&conn, "missing").expect("read"), None);
    }

    #[test]
    fn decode_rejects_mismatched_payloads() {
        assert_eq!(SettingValue::decode("maybe", "bool"), None);
        assert_eq!(SettingValue::decode("1.5x", "number"), None);
        assert_eq!(SettingValue::decode("{", "json"), None);
        assert_eq!(SettingValue::decode("x", "blob"), None);
        assert_eq!(
            SettingValue::decode("1", "boolean"),
            Some(SettingValue::Bool(true))
        );
    }
}
