mod test_support;

use serde_json::json;
use sha2::{Digest, Sha256};
use test_support::Fixture;

fn report_files(fx: &Fixture) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(fx.reports_dir())
        .expect("reports dir")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

fn seed_record(fx: &mut Fixture) -> String {
    let student_id = fx.student_id.clone();
    let record = fx.create_record(&student_id, 2024);
    let record_id = record["id"].as_str().expect("id").to_string();
    let entry_id = fx.academic_entry(&record_id, "Matemáticas");
    fx.add_grade(&entry_id, 60.0, 100.0);
    fx.add_grade(&entry_id, 90.0, 100.0);
    fx.ok(
        "entries.create",
        json!({
            "recordId": record_id,
            "entryType": "ACADEMIC",
            "title": "Taller",
            "entryDate": "2024-10-01",
            "letterGrade": "b+",
            "comments": "Entrega puntual"
        }),
    );
    fx.ok(
        "entries.create",
        json!({
            "recordId": record_id,
            "entryType": "BEHAVIORAL",
            "title": "Liderazgo",
            "description": "Coordinó la feria de ciencias",
            "entryDate": "2024-03-05"
        }),
    );
    fx.ok(
        "records.update",
        json!({ "id": record_id, "absences": 9, "tardiness": 2, "observations": "Gran avance" }),
    );
    record_id
}

#[test]
fn student_report_is_written_downloadable_and_deletable() {
    let mut fx = Fixture::new("recordbookd-report-student");
    seed_record(&mut fx);
    let student_id = fx.student_id.clone();

    let generated = fx.ok(
        "reports.generateStudent",
        json!({ "studentId": student_id, "academicYear": 2024 }),
    );
    let file_name = generated["fileName"].as_str().expect("fileName").to_string();
    assert!(file_name.starts_with(&format!("student-report_{}_2024_", student_id)));
    assert!(file_name.ends_with(".txt"));
    assert!(generated["generatedAt"].as_str().is_some());
    assert_eq!(report_files(&fx), vec![file_name.clone()]);

    let downloaded = fx.ok("reports.download", json!({ "fileName": file_name }));
    let content = downloaded["content"].as_str().expect("content").to_string();
    assert_eq!(downloaded["size"], generated["size"]);
    assert_eq!(content.len() as u64, generated["size"].as_u64().expect("size"));
    let digest: String = Sha256::digest(content.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    assert_eq!(generated["sha256"], json!(digest));

    assert!(content.contains("Institución Educativa"));
    assert!(content.contains("Nombre: Rojas, Ana"));
    assert!(content.contains("Matrícula: MAT-ROJAS"));
    assert!(content.contains("Grupo: 3A"));
    assert!(content.contains("Año académico: 2024-2025"));
    assert!(content.contains("Promedio: "));
    assert!(content.contains("Matemáticas: N/A (Créditos: 4)"));
    assert!(content.contains("Asignatura: B+ (Créditos: N/A)"));
    assert!(content.contains("Comentario: Entrega puntual"));
    assert!(content.contains("Ausencias: 9"));
    assert!(content.contains("Tardanzas: 2"));
    assert!(content.contains("Asistencia: 95%"));
    assert!(content.contains("Gran avance"));
    assert!(content.contains("05/03/2024: Liderazgo: Coordinó la feria de ciencias"));

    let listed = fx.ok("reports.list", json!({}));
    assert_eq!(listed["reports"][0]["fileName"], json!(file_name));

    let deleted = fx.ok("reports.delete", json!({ "fileName": file_name }));
    assert_eq!(deleted["deleted"], json!(true));
    let again = fx.ok("reports.delete", json!({ "fileName": file_name }));
    assert_eq!(again["deleted"], json!(false));
    assert_eq!(
        fx.err("reports.download", json!({ "fileName": file_name })),
        "not_found"
    );
    assert!(report_files(&fx).is_empty());
}

#[test]
fn missing_record_is_not_found_and_writes_nothing() {
    let mut fx = Fixture::new("recordbookd-report-missing");
    let student_id = fx.student_id.clone();
    assert_eq!(
        fx.err(
            "reports.generateStudent",
            json!({ "studentId": student_id, "academicYear": 2030 })
        ),
        "not_found"
    );
    assert_eq!(
        fx.err(
            "reports.generateStudent",
            json!({ "studentId": "ghost", "academicYear": 2024 })
        ),
        "not_found"
    );
    assert!(report_files(&fx).is_empty());
}

#[test]
fn options_shape_the_document() {
    let mut fx = Fixture::new("recordbookd-report-options");
    seed_record(&mut fx);
    let student_id = fx.student_id.clone();

    let generated = fx.ok(
        "reports.generateStudent",
        json!({
            "studentId": student_id,
            "academicYear": 2024,
            "options": { "includeGrades": false, "includeBehavioral": false, "language": "en" }
        }),
    );
    let content = fx.ok(
        "reports.download",
        json!({ "fileName": generated["fileName"] }),
    )["content"]
        .as_str()
        .expect("content")
        .to_string();
    assert!(!content.contains("Matemáticas"));
    assert!(!content.contains("Asignatura"));
    assert!(!content.contains("Liderazgo"));
    assert!(content.contains("Academic Report Card"));
    assert!(content.contains("Absences: 9"));

    let detailed = fx.ok(
        "reports.studentModel",
        json!({
            "studentId": student_id,
            "academicYear": 2024,
            "options": { "template": "detailed" }
        }),
    );
    let grades = detailed["sections"]
        .as_array()
        .expect("sections")
        .iter()
        .find(|s| s["kind"] == json!("grades"))
        .expect("grades section")
        .clone();
    assert_eq!(grades["lines"][0]["label"], json!("Matemáticas"));
    assert_eq!(
        grades["lines"][0]["details"],
        json!(["Prueba 60: 60/100 (60%, D)", "Prueba 90: 90/100 (90%, A)"])
    );

    assert_eq!(
        fx.err(
            "reports.studentModel",
            json!({ "studentId": student_id, "academicYear": 2024, "options": { "template": "fancy" } })
        ),
        "bad_params"
    );
}

#[test]
fn workspace_settings_drive_report_defaults() {
    let mut fx = Fixture::new("recordbookd-report-config");
    seed_record(&mut fx);
    let student_id = fx.student_id.clone();
    fx.ok(
        "settings.set",
        json!({ "key": "institution.name", "value": "Colegio Andino" }),
    );
    fx.ok(
        "settings.set",
        json!({ "key": "reports.defaultLanguage", "value": "en" }),
    );
    let model = fx.ok(
        "reports.studentModel",
        json!({ "studentId": student_id, "academicYear": 2024 }),
    );
    assert_eq!(model["language"], json!("en"));
    assert_eq!(model["sections"][0]["lines"][0]["text"], json!("Colegio Andino"));
}

#[test]
fn class_report_lists_students_with_records_only() {
    let mut fx = Fixture::new("recordbookd-report-class");
    seed_record(&mut fx);
    fx.add_student("Vega", "Luis");
    let class_id = fx.class_id.clone();
    fx.ok(
        "students.create",
        json!({ "classId": class_id, "lastName": "Paz", "firstName": "Inés", "active": false }),
    );

    let generated = fx.ok(
        "reports.generateClass",
        json!({ "classId": class_id, "academicYear": 2024 }),
    );
    let file_name = generated["fileName"].as_str().expect("fileName").to_string();
    assert!(file_name.starts_with(&format!("class-report_{}_2024_", class_id)));

    let content = fx.ok("reports.download", json!({ "fileName": file_name }))["content"]
        .as_str()
        .expect("content")
        .to_string();
    assert!(content.contains("Resumen Académico de Clase"));
    assert!(content.contains("Rojas, Ana: Promedio: "));
    assert!(!content.contains("Vega, Luis"));
    assert!(!content.contains("Paz, Inés"));
    assert!(content.contains("Estudiantes en la lista: 2"));
    assert!(content.contains("Estudiantes con expediente: 1"));

    let empty = fx.ok("classes.create", json!({ "name": "Vacía" }));
    assert_eq!(
        fx.err(
            "reports.generateClass",
            json!({ "classId": empty["classId"], "academicYear": 2024 })
        ),
        "not_found"
    );
    assert_eq!(
        fx.err(
            "reports.generateClass",
            json!({ "classId": "nope", "academicYear": 2024 })
        ),
        "not_found"
    );
}

#[test]
fn out_of_range_years_are_rejected_before_composing() {
    let mut fx = Fixture::new("recordbookd-report-years");
    seed_record(&mut fx);
    let class_id = fx.class_id.clone();
    let student_id = fx.student_id.clone();
    assert_eq!(
        fx.err(
            "reports.generateClass",
            json!({ "classId": class_id, "academicYear": i64::MAX })
        ),
        "bad_params"
    );
    assert_eq!(
        fx.err(
            "reports.studentModel",
            json!({ "studentId": student_id, "academicYear": i64::MAX })
        ),
        "bad_params"
    );
    assert!(report_files(&fx).is_empty());
    // The sidecar is still serving.
    let health = fx.ok("health", json!({}));
    assert!(health.is_object());
}

#[test]
fn path_like_file_names_are_rejected() {
    let mut fx = Fixture::new("recordbookd-report-names");
    assert_eq!(
        fx.err("reports.download", json!({ "fileName": "../recordbook.sqlite3" })),
        "bad_params"
    );
    assert_eq!(
        fx.err("reports.delete", json!({ "fileName": "a/b.txt" })),
        "bad_params"
    );
}
