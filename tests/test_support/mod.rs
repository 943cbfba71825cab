#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos(),
        TEMP_SEQ.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_recordbookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn recordbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

/// Full response envelope, success or not.
pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Asserts failure and returns the error code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

/// A sidecar with a fresh workspace, the records module enabled and one
/// class holding one student.
pub struct Fixture {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    pub workspace: PathBuf,
    pub class_id: String,
    pub student_id: String,
    seq: u64,
}

impl Fixture {
    pub fn new(prefix: &str) -> Self {
        let workspace = temp_dir(prefix);
        let (child, stdin, reader) = spawn_sidecar();
        let mut fx = Fixture {
            child,
            stdin,
            reader,
            workspace,
            class_id: String::new(),
            student_id: String::new(),
            seq: 0,
        };
        let path = fx.workspace.to_string_lossy().to_string();
        fx.ok("workspace.select", json!({ "path": path }));
        fx.ok(
            "features.set",
            json!({ "module": "academic_records", "enabled": true }),
        );
        let class = fx.ok("classes.create", json!({ "name": "3A" }));
        fx.class_id = class["classId"].as_str().expect("classId").to_string();
        fx.student_id = fx.add_student("Rojas", "Ana");
        fx
    }

    fn next_id(&mut self) -> String {
        self.seq += 1;
        self.seq.to_string()
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.next_id();
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn err(&mut self, method: &str, params: serde_json::Value) -> String {
        let id = self.next_id();
        request_err(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn add_student(&mut self, last: &str, first: &str) -> String {
        let class_id = self.class_id.clone();
        let res = self.ok(
            "students.create",
            json!({
                "classId": class_id,
                "lastName": last,
                "firstName": first,
                "studentNo": format!("MAT-{}", last.to_ascii_uppercase())
            }),
        );
        res["studentId"].as_str().expect("studentId").to_string()
    }

    pub fn create_record(&mut self, student_id: &str, year: i64) -> serde_json::Value {
        self.ok(
            "records.create",
            json!({ "studentId": student_id, "academicYear": year, "totalCredits": 30 }),
        )["record"]
            .clone()
    }

    pub fn academic_entry(&mut self, record_id: &str, subject: &str) -> String {
        let res = self.ok(
            "entries.create",
            json!({
                "recordId": record_id,
                "entryType": "ACADEMIC",
                "subject": subject,
                "title": format!("{} T1", subject),
                "entryDate": "2024-09-20",
                "credits": 4
            }),
        );
        res["entry"]["id"].as_str().expect("entry id").to_string()
    }

    pub fn add_grade(&mut self, entry_id: &str, earned: f64, total: f64) -> String {
        let res = self.ok(
            "grades.create",
            json!({
                "entryId": entry_id,
                "name": format!("Prueba {}", earned),
                "earnedPoints": earned,
                "totalPoints": total,
                "weight": 1
            }),
        );
        res["grade"]["id"].as_str().expect("grade id").to_string()
    }

    pub fn gpa(&mut self, record_id: &str) -> f64 {
        self.ok("records.get", json!({ "id": record_id }))["record"]["finalGpa"]
            .as_f64()
            .expect("finalGpa")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.workspace.join("reports")
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.workspace);
    }
}
