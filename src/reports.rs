//! Report generation on top of the compositor and the report file store.

use crate::compositor::{
    self, ClassReportInput, ClassRow, ReportDocument, ReportOptions, StudentReportInput,
};
use crate::config::ReportConfig;
use crate::error::{RecordsError, RecordsResult};
use crate::files::{report_file_name, ReportFiles, ReportScope, StoredFile};
use crate::records::validate_academic_year;
use crate::settings::ensure_records_enabled;
use crate::store;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub file_name: String,
    pub size: u64,
    pub generated_at: String,
    pub sha256: String,
}

impl GeneratedReport {
    fn new(stored: StoredFile, at: DateTime<Utc>) -> Self {
        Self {
            file_name: stored.file_name,
            size: stored.size,
            generated_at: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            sha256: stored.sha256,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedReport {
    pub file_name: String,
    pub size: u64,
    pub content: String,
}

/// Everything is resolved before the compositor runs, so a missing student or
/// record never leaves a file behind.
pub fn student_model(
    conn: &Connection,
    student_id: &str,
    academic_year: i64,
    options: &ReportOptions,
    at: DateTime<Utc>,
) -> RecordsResult<ReportDocument> {
    ensure_records_enabled(conn)?;
    validate_academic_year(academic_year)?;
    let student = store::find_student(conn, student_id)?
        .ok_or_else(|| RecordsError::not_found("student not found"))?;
    let record = store::find_active_record_for(conn, student_id, academic_year)?.ok_or_else(
        || {
            RecordsError::not_found(format!(
                "no academic record for this student in {}",
                academic_year
            ))
        },
    )?;
    let snapshot = store::load_snapshot(conn, record)?;
    let config = ReportConfig::load(conn)?;
    Ok(compositor::compose_student_report(&StudentReportInput {
        config: &config,
        options,
        student: &student,
        snapshot: &snapshot,
        generated_at: at,
    }))
}

pub fn generate_student_report(
    conn: &Connection,
    files: &ReportFiles,
    student_id: &str,
    academic_year: i64,
    options: &ReportOptions,
) -> RecordsResult<GeneratedReport> {
    let at = Utc::now();
    let doc = student_model(conn, student_id, academic_year, options, at)?;
    let name = report_file_name(ReportScope::Student, student_id, academic_year, at);
    let stored = files.write(&name, compositor::render_text(&doc).as_bytes())?;
    tracing::info!(file = %stored.file_name, student_id, academic_year, size = stored.size, "student report generated");
    Ok(GeneratedReport::new(stored, at))
}

pub fn generate_class_report(
    conn: &Connection,
    files: &ReportFiles,
    class_id: &str,
    academic_year: i64,
    options: &ReportOptions,
) -> RecordsResult<GeneratedReport> {
    ensure_records_enabled(conn)?;
    validate_academic_year(academic_year)?;
    let class_name = store::find_class_name(conn, class_id)?
        .ok_or_else(|| RecordsError::not_found("class not found"))?;
    // Withdrawn students stay on the class list but not on its report.
    let roster: Vec<_> = store::list_class_roster(conn, class_id)?
        .into_iter()
        .filter(|s| s.active)
        .collect();
    if roster.is_empty() {
        return Err(RecordsError::not_found("class has no students"));
    }

    let mut records = Vec::with_capacity(roster.len());
    for student in &roster {
        records.push(store::find_active_record_for(conn, &student.id, academic_year)?);
    }
    let rows: Vec<ClassRow<'_>> = roster
        .iter()
        .zip(records.iter())
        .map(|(student, record)| ClassRow {
            student,
            record: record.as_ref(),
        })
        .collect();

    let config = ReportConfig::load(conn)?;
    let at = Utc::now();
    let doc = compositor::compose_class_report(&ClassReportInput {
        config: &config,
        options,
        class_name: &class_name,
        academic_year,
        rows: &rows,
        generated_at: at,
    });
    let name = report_file_name(ReportScope::Class, class_id, academic_year, at);
    let stored = files.write(&name, compositor::render_text(&doc).as_bytes())?;
    tracing::info!(file = %stored.file_name, class_id, academic_year, students = roster.len(), "class report generated");
    Ok(GeneratedReport::new(stored, at))
}

pub fn download_report(
    conn: &Connection,
    files: &ReportFiles,
    file_name: &str,
) -> RecordsResult<DownloadedReport> {
    ensure_records_enabled(conn)?;
    let bytes = files.read(file_name)?;
    Ok(DownloadedReport {
        file_name: file_name.to_string(),
        size: bytes.len() as u64,
        content: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

/// Deleting a report that does not exist is a no-op, reported as `false`.
pub fn delete_report(conn: &Connection, files: &ReportFiles, file_name: &str) -> RecordsResult<bool> {
    ensure_records_enabled(conn)?;
    if !files.exists(file_name)? {
        return Ok(false);
    }
    let deleted = files.delete(file_name)?;
    if deleted {
        tracing::info!(file = file_name, "report deleted");
    }
    Ok(deleted)
}

pub fn list_reports(conn: &Connection, files: &ReportFiles) -> RecordsResult<Vec<StoredFile>> {
    ensure_records_enabled(conn)?;
    files.list()
}
