use crate::ipc::error::{err, ok, records_err};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::settings::{self, module_key, SettingValue};
use serde_json::json;

fn handle_features_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module = match required_str(req, "module") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match settings::is_module_enabled(conn, &module) {
        Ok(enabled) => ok(
            &req.id,
            json!({ "module": module, "key": module_key(&module), "enabled": enabled }),
        ),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_features_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module = match required_str(req, "module") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(enabled) = req.params.get("enabled").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "enabled must be a boolean", None);
    };
    if let Err(e) = settings::set_setting(conn, &module_key(&module), &SettingValue::Bool(enabled))
    {
        return records_err(&req.id, &e);
    }
    tracing::info!(module = %module, enabled, "feature flag updated");
    ok(&req.id, json!({ "module": module, "enabled": enabled }))
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let key = match required_str(req, "key") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match settings::get_setting(conn, &key) {
        Ok(value) => ok(&req.id, json!({ "key": key, "value": value })),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_settings_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let key = match required_str(req, "key") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("value") else {
        return err(&req.id, "bad_params", "missing value", None);
    };
    let value = SettingValue::from_json(raw);
    match settings::set_setting(conn, &key, &value) {
        Ok(()) => ok(&req.id, json!({ "key": key, "value": value })),
        Err(e) => records_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "features.get" => Some(handle_features_get(state, req)),
        "features.set" => Some(handle_features_set(state, req)),
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.set" => Some(handle_settings_set(state, req)),
        _ => None,
    }
}
