use crate::compositor::ReportOptions;
use crate::ipc::error::{ok, records_err};
use crate::ipc::helpers::{gated_conn, parse_value, report_files, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::reports;
use chrono::Utc;
use serde_json::json;

fn parse_options(req: &Request) -> Result<ReportOptions, serde_json::Value> {
    parse_value(req, req.params.get("options"))
}

fn handle_generate_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let files = match report_files(state, req) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match required_i64(req, "academicYear") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let options = match parse_options(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reports::generate_student_report(conn, &files, &student_id, year, &options) {
        Ok(generated) => ok(&req.id, json!(generated)),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_generate_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let files = match report_files(state, req) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match required_i64(req, "academicYear") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let options = match parse_options(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reports::generate_class_report(conn, &files, &class_id, year, &options) {
        Ok(generated) => ok(&req.id, json!(generated)),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_student_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match required_i64(req, "academicYear") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let options = match parse_options(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reports::student_model(conn, &student_id, year, &options, Utc::now()) {
        Ok(doc) => ok(&req.id, json!(doc)),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_download(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let files = match report_files(state, req) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let file_name = match required_str(req, "fileName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reports::download_report(conn, &files, &file_name) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let files = match report_files(state, req) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let file_name = match required_str(req, "fileName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reports::delete_report(conn, &files, &file_name) {
        Ok(deleted) => ok(&req.id, json!({ "fileName": file_name, "deleted": deleted })),
        Err(e) => records_err(&req.id, &e),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match gated_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let files = match report_files(state, req) {
        Ok(f) => f,
        Err(e) => return e,
    };
    match reports::list_reports(conn, &files) {
        Ok(list) => ok(&req.id, json!({ "reports": list })),
        Err(e) => records_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.generateStudent" => Some(handle_generate_student(state, req)),
        "reports.generateClass" => Some(handle_generate_class(state, req)),
        "reports.studentModel" => Some(handle_student_model(state, req)),
        "reports.download" => Some(handle_download(state, req)),
        "reports.delete" => Some(handle_delete(state, req)),
        "reports.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
