use crate::calc;
use crate::ipc::error::{ok, records_err};
use crate::ipc::helpers::{gated_conn, optional_param, parse_params, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::EntryType;
use crate::records::{self, EntryPatch, NewEntry};
use serde_json::json;

fn handle_entries_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let input: NewEntry = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::create_entry(conn, input) {
        Ok(entry) => ok(&req.id, json!({ "entry": entry })),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_entries_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let record_id = match required_str(req, "recordId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entry_type: Option<EntryType> = match optional_param(req, "entryType") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::list_entries(conn, &record_id, entry_type) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_entries_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::get_entry(conn, &id) {
        Ok(item) => {
            let grade_point = calc::entry_grade_point(&item.entry);
            ok(&req.id, json!({ "entry": item, "gradePoint": grade_point }))
        }
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_entries_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: EntryPatch = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::update_entry(conn, &id, patch) {
        Ok(entry) => ok(&req.id, json!({ "entry": entry })),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_entries_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::delete_entry(conn, &id) {
        Ok(entry) => ok(&req.id, json!({ "id": entry.id, "isActive": entry.is_active })),
        Err(e) => records_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "entries.create" => Some(handle_entries_create(state, req)),
        "entries.list" => Some(handle_entries_list(state, req)),
        "entries.get" => Some(handle_entries_get(state, req)),
        "entries.update" => Some(handle_entries_update(state, req)),
        "entries.delete" => Some(handle_entries_delete(state, req)),
        _ => None,
    }
}
