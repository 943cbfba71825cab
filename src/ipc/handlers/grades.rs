use crate::ipc::error::{ok, records_err};
use crate::ipc::helpers::{gated_conn, parse_params, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, GradePatch, NewGrade};
use serde_json::json;

fn handle_grades_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let input: NewGrade = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::create_grade(conn, input) {
        Ok(grade) => ok(&req.id, json!({ "grade": grade })),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let entry_id = match required_str(req, "entryId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::list_grades(conn, &entry_id) {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_grades_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::get_grade(conn, &id) {
        Ok(grade) => ok(&req.id, json!({ "grade": grade })),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_grades_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: GradePatch = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::update_grade(conn, &id, patch) {
        Ok(grade) => ok(&req.id, json!({ "grade": grade })),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_grades_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::delete_grade(conn, &id) {
        Ok(grade) => ok(&req.id, json!({ "id": grade.id, "isActive": grade.is_active })),
        Err(e) => records_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.create" => Some(handle_grades_create(state, req)),
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.get" => Some(handle_grades_get(state, req)),
        "grades.update" => Some(handle_grades_update(state, req)),
        "grades.delete" => Some(handle_grades_delete(state, req)),
        _ => None,
    }
}
