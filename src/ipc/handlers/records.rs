use crate::calc;
use crate::ipc::error::{ok, records_err};
use crate::ipc::helpers::{gated_conn, optional_i64, optional_param, parse_params, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, NewRecord, RecordPatch};
use crate::store::{Pagination, RecordFilter, RecordSortKey, SortOrder};
use serde_json::json;

fn handle_records_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let input: NewRecord = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::create_record(conn, input) {
        Ok(record) => ok(
            &req.id,
            json!({ "record": record, "derived": calc::record_derived(&record) }),
        ),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_records_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let filter: RecordFilter = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let page = match (optional_i64(req, "page"), optional_i64(req, "limit")) {
        (Ok(page), Ok(limit)) => Pagination::new(page, limit),
        (Err(e), _) | (_, Err(e)) => return e,
    };
    let sort: RecordSortKey = match optional_param(req, "sortBy") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let order: SortOrder = match optional_param(req, "sortOrder") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    match records::list_records(conn, &filter, page, sort, order) {
        Ok((list, total)) => ok(
            &req.id,
            json!({
                "records": list,
                "total": total,
                "page": page.page,
                "limit": page.limit
            }),
        ),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_records_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::get_record(conn, &id) {
        Ok(snapshot) => {
            let derived = calc::record_derived(&snapshot.record);
            ok(&req.id, json!({ "record": snapshot, "derived": derived }))
        }
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_records_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: RecordPatch = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::update_record(conn, &id, patch) {
        Ok(record) => ok(
            &req.id,
            json!({ "record": record, "derived": calc::record_derived(&record) }),
        ),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_records_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::delete_record(conn, &id) {
        Ok(record) => ok(&req.id, json!({ "id": record.id, "isActive": record.is_active })),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_records_recalculate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::recalculate(conn, &id) {
        Ok(record) => ok(
            &req.id,
            json!({ "id": record.id, "finalGpa": record.final_gpa, "version": record.version }),
        ),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_records_statistics(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match optional_i64(req, "academicYear") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::student_statistics(conn, &student_id, year) {
        Ok(stats) => ok(&req.id, json!(stats)),
        Err(e) => records_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.create" => Some(handle_records_create(state, req)),
        "records.list" => Some(handle_records_list(state, req)),
        "records.get" => Some(handle_records_get(state, req)),
        "records.update" => Some(handle_records_update(state, req)),
        "records.delete" => Some(handle_records_delete(state, req)),
        "records.recalculate" => Some(handle_records_recalculate(state, req)),
        "records.statistics" => Some(handle_records_statistics(state, req)),
        _ => None,
    }
}
