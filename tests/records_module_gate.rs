mod test_support;

use serde_json::json;
use test_support::{request, request_err, request_ok, spawn_sidecar, temp_dir, Fixture};

#[test]
fn disabled_module_hides_every_records_method() {
    let workspace = temp_dir("recordbookd-gate");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let flag = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "features.get",
        json!({ "module": "academic_records" }),
    );
    assert_eq!(flag["enabled"], json!(false));
    assert_eq!(flag["key"], json!("module_academic_records_enabled"));

    // Gate wins over parameter validation.
    let calls = [
        ("records.create", json!({})),
        ("records.list", json!({})),
        ("records.get", json!({ "id": "x" })),
        ("records.statistics", json!({ "studentId": "x" })),
        ("entries.create", json!({})),
        ("grades.update", json!({ "id": "x" })),
        ("reports.generateStudent", json!({})),
        ("reports.download", json!({ "fileName": "x.txt" })),
        ("reports.delete", json!({ "fileName": "x.txt" })),
    ];
    for (i, (method, params)) in calls.iter().enumerate() {
        let code = request_err(
            &mut stdin,
            &mut reader,
            &format!("g{}", i),
            method,
            params.clone(),
        );
        assert_eq!(code, "not_found", "{}", method);
    }

    // A non-boolean flag value still counts as disabled.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "settings.set",
        json!({ "key": "module_academic_records_enabled", "value": "true" }),
    );
    let code = request_err(&mut stdin, &mut reader, "4", "records.list", json!({}));
    assert_eq!(code, "not_found");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "features.set",
        json!({ "module": "academic_records", "enabled": true }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "6", "records.list", json!({}));
    assert_eq!(listed["total"], json!(0));

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn methods_before_workspace_select_report_no_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["workspacePath"].is_null());
    let code = request_err(&mut stdin, &mut reader, "2", "records.list", json!({}));
    assert_eq!(code, "no_workspace");
    let unknown = request(&mut stdin, &mut reader, "3", "records.explode", json!({}));
    assert_eq!(unknown["error"]["code"], json!("not_implemented"));
    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn disabling_after_use_blocks_existing_records() {
    let mut fx = Fixture::new("recordbookd-gate-toggle");
    let student_id = fx.student_id.clone();
    let record = fx.create_record(&student_id, 2024);
    let record_id = record["id"].as_str().expect("id").to_string();

    fx.ok(
        "features.set",
        json!({ "module": "academic_records", "enabled": false }),
    );
    assert_eq!(fx.err("records.get", json!({ "id": record_id })), "not_found");

    fx.ok(
        "features.set",
        json!({ "module": "academic_records", "enabled": true }),
    );
    fx.ok("records.get", json!({ "id": record_id }));
}
