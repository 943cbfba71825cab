//! Record / entry / grade operations and the GPA cascade.
//!
//! Every public operation checks the feature gate first. Mutations of a grade
//! or of an ACADEMIC entry recompute the owning record's GPA inside the same
//! transaction as the mutation, so the stored GPA never lags its children and
//! a failed recalculation rolls the child write back with it.

use crate::calc;
use crate::error::{RecordsError, RecordsResult};
use crate::model::{Entry, EntryType, EntryWithGrades, Grade, Record, RecordSnapshot, RecordStatus};
use crate::settings::ensure_records_enabled;
use crate::store;
use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode};
use serde::Deserialize;
use uuid::Uuid;

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_date(field: &str, raw: &str) -> RecordsResult<String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| RecordsError::validation(format!("{} must be a YYYY-MM-DD date", field)))
}

fn non_negative(field: &str, value: Option<f64>) -> RecordsResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(RecordsError::validation(format!(
            "{} must be a non-negative number",
            field
        ))),
        _ => Ok(()),
    }
}

fn non_negative_int(field: &str, value: Option<i64>) -> RecordsResult<()> {
    match value {
        Some(v) if v < 0 => Err(RecordsError::validation(format!(
            "{} must not be negative",
            field
        ))),
        _ => Ok(()),
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn clean_letter(value: Option<String>) -> Option<String> {
    clean_text(value).map(|v| v.to_ascii_uppercase())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

// ---- lookups ----

fn require_active_record(conn: &Connection, id: &str) -> RecordsResult<Record> {
    match store::find_record(conn, id)? {
        Some(r) if r.is_active => Ok(r),
        _ => Err(RecordsError::not_found("record not found")),
    }
}

fn require_active_entry(conn: &Connection, id: &str) -> RecordsResult<Entry> {
    match store::find_entry(conn, id)? {
        Some(e) if e.is_active => Ok(e),
        _ => Err(RecordsError::not_found("entry not found")),
    }
}

fn require_active_grade(conn: &Connection, id: &str) -> RecordsResult<Grade> {
    match store::find_grade(conn, id)? {
        Some(g) if g.is_active => Ok(g),
        _ => Err(RecordsError::not_found("grade not found")),
    }
}

// ---- cascade ----

/// Reload the record, recompute its GPA from its active children and persist
/// it. Writes only when the value changed, so repeated calls are no-ops.
fn recalculate_in(conn: &Connection, record_id: &str) -> RecordsResult<Record> {
    let record = require_active_record(conn, record_id)?;
    let snapshot = store::load_snapshot(conn, record)?;
    let gpa = calc::recalc(&snapshot.entries);
    let mut record = snapshot.record;
    if record.final_gpa != gpa {
        tracing::debug!(record_id, from = record.final_gpa, to = gpa, "gpa recalculated");
        record.final_gpa = gpa;
        record.version += 1;
        record.updated_at = now_rfc3339();
        store::save_record(conn, &record)?;
    }
    Ok(record)
}

pub fn recalculate(conn: &Connection, record_id: &str) -> RecordsResult<Record> {
    ensure_records_enabled(conn)?;
    let tx = conn.unchecked_transaction()?;
    let record = recalculate_in(&tx, record_id)?;
    tx.commit()?;
    Ok(record)
}

// ---- records ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub student_id: String,
    pub academic_year: i64,
    pub status: Option<RecordStatus>,
    pub total_credits: Option<f64>,
    pub completed_credits: Option<f64>,
    pub absences: Option<i64>,
    pub tardiness: Option<i64>,
    pub promoted: Option<bool>,
    pub repeat_year: Option<bool>,
    pub observations: Option<String>,
    pub achievements: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    pub status: Option<RecordStatus>,
    /// Explicit override: when present the GPA is taken as given for this call.
    pub final_gpa: Option<f64>,
    pub total_credits: Option<f64>,
    pub completed_credits: Option<f64>,
    pub absences: Option<i64>,
    pub tardiness: Option<i64>,
    pub promoted: Option<bool>,
    pub repeat_year: Option<bool>,
    pub observations: Option<String>,
    pub achievements: Option<String>,
    pub expected_version: Option<i64>,
}

pub(crate) fn validate_academic_year(year: i64) -> RecordsResult<()> {
    if !(1900..=2200).contains(&year) {
        return Err(RecordsError::validation("academicYear is out of range"));
    }
    Ok(())
}

pub fn create_record(conn: &Connection, input: NewRecord) -> RecordsResult<Record> {
    ensure_records_enabled(conn)?;
    validate_academic_year(input.academic_year)?;
    non_negative("totalCredits", input.total_credits)?;
    non_negative("completedCredits", input.completed_credits)?;
    non_negative_int("absences", input.absences)?;
    non_negative_int("tardiness", input.tardiness)?;

    if store::find_student(conn, &input.student_id)?.is_none() {
        return Err(RecordsError::not_found("student not found"));
    }
    if store::find_active_record_for(conn, &input.student_id, input.academic_year)?.is_some() {
        return Err(RecordsError::conflict(format!(
            "an active record already exists for this student in {}",
            input.academic_year
        )));
    }

    let now = now_rfc3339();
    let record = Record {
        id: Uuid::new_v4().to_string(),
        student_id: input.student_id,
        academic_year: input.academic_year,
        status: input.status.unwrap_or(RecordStatus::Active),
        final_gpa: 0.0,
        total_credits: input.total_credits.unwrap_or(0.0),
        completed_credits: input.completed_credits.unwrap_or(0.0),
        absences: input.absences.unwrap_or(0),
        tardiness: input.tardiness.unwrap_or(0),
        promoted: input.promoted.unwrap_or(false),
        repeat_year: input.repeat_year.unwrap_or(false),
        observations: clean_text(input.observations),
        achievements: clean_text(input.achievements),
        is_active: true,
        version: 1,
        created_at: now.clone(),
        updated_at: now,
    };
    match store::insert_record(conn, &record) {
        Ok(()) => {}
        Err(RecordsError::Db(e)) if is_unique_violation(&e) => {
            return Err(RecordsError::conflict(
                "an active record already exists for this student and year",
            ));
        }
        Err(e) => return Err(e),
    }
    tracing::info!(record_id = %record.id, student_id = %record.student_id, year = record.academic_year, "record created");
    Ok(record)
}

pub fn get_record(conn: &Connection, id: &str) -> RecordsResult<RecordSnapshot> {
    ensure_records_enabled(conn)?;
    let record = require_active_record(conn, id)?;
    store::load_snapshot(conn, record)
}

pub fn list_records(
    conn: &Connection,
    filter: &store::RecordFilter,
    page: store::Pagination,
    sort: store::RecordSortKey,
    order: store::SortOrder,
) -> RecordsResult<(Vec<Record>, i64)> {
    ensure_records_enabled(conn)?;
    store::list_records(conn, filter, page, sort, order)
}

pub fn update_record(conn: &Connection, id: &str, patch: RecordPatch) -> RecordsResult<Record> {
    ensure_records_enabled(conn)?;
    non_negative("finalGpa", patch.final_gpa)?;
    non_negative("totalCredits", patch.total_credits)?;
    non_negative("completedCredits", patch.completed_credits)?;
    non_negative_int("absences", patch.absences)?;
    non_negative_int("tardiness", patch.tardiness)?;

    let tx = conn.unchecked_transaction()?;
    let mut record = require_active_record(&tx, id)?;
    if let Some(expected) = patch.expected_version {
        if expected != record.version {
            return Err(RecordsError::conflict(format!(
                "record was modified concurrently (expected version {}, found {})",
                expected, record.version
            )));
        }
    }

    if let Some(v) = patch.status {
        record.status = v;
    }
    if let Some(v) = patch.total_credits {
        record.total_credits = v;
    }
    if let Some(v) = patch.completed_credits {
        record.completed_credits = v;
    }
    if let Some(v) = patch.absences {
        record.absences = v;
    }
    if let Some(v) = patch.tardiness {
        record.tardiness = v;
    }
    if let Some(v) = patch.promoted {
        record.promoted = v;
    }
    if let Some(v) = patch.repeat_year {
        record.repeat_year = v;
    }
    if patch.observations.is_some() {
        record.observations = clean_text(patch.observations);
    }
    if patch.achievements.is_some() {
        record.achievements = clean_text(patch.achievements);
    }

    record.final_gpa = match patch.final_gpa {
        Some(gpa) => gpa,
        None => {
            let snapshot = store::load_snapshot(&tx, record.clone())?;
            calc::recalc(&snapshot.entries)
        }
    };
    record.version += 1;
    record.updated_at = now_rfc3339();
    store::save_record(&tx, &record)?;
    tx.commit()?;
    Ok(record)
}

pub fn delete_record(conn: &Connection, id: &str) -> RecordsResult<Record> {
    ensure_records_enabled(conn)?;
    let mut record = require_active_record(conn, id)?;
    record.is_active = false;
    record.version += 1;
    record.updated_at = now_rfc3339();
    store::save_record(conn, &record)?;
    tracing::info!(record_id = id, "record deactivated");
    Ok(record)
}

pub fn student_statistics(
    conn: &Connection,
    student_id: &str,
    academic_year: Option<i64>,
) -> RecordsResult<calc::StudentStatistics> {
    ensure_records_enabled(conn)?;
    let records = store::list_student_records(conn, student_id, academic_year)?;
    Ok(calc::student_statistics(&records))
}

// ---- entries ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub record_id: String,
    pub entry_type: EntryType,
    pub period: Option<String>,
    pub subject: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub entry_date: Option<String>,
    pub numeric_value: Option<f64>,
    pub letter_grade: Option<String>,
    pub credits: Option<f64>,
    pub comments: Option<String>,
    pub is_passing: Option<bool>,
    #[serde(default)]
    pub is_exempt: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    pub entry_type: Option<EntryType>,
    pub period: Option<String>,
    pub subject: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub entry_date: Option<String>,
    pub numeric_value: Option<f64>,
    pub letter_grade: Option<String>,
    pub credits: Option<f64>,
    pub comments: Option<String>,
    pub is_passing: Option<bool>,
    pub is_exempt: Option<bool>,
}

pub fn create_entry(conn: &Connection, input: NewEntry) -> RecordsResult<Entry> {
    ensure_records_enabled(conn)?;
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(RecordsError::validation("title must not be empty"));
    }
    non_negative("credits", input.credits)?;
    if matches!(input.numeric_value, Some(v) if !v.is_finite()) {
        return Err(RecordsError::validation("numericValue must be a number"));
    }
    let entry_date = match input.entry_date.as_deref() {
        Some(raw) => parse_date("entryDate", raw)?,
        None => Utc::now().date_naive().format("%Y-%m-%d").to_string(),
    };

    let tx = conn.unchecked_transaction()?;
    let record = require_active_record(&tx, &input.record_id)?;
    let now = now_rfc3339();
    let entry = Entry {
        id: Uuid::new_v4().to_string(),
        record_id: record.id.clone(),
        entry_type: input.entry_type,
        period: clean_text(input.period),
        subject: clean_text(input.subject),
        title,
        description: clean_text(input.description),
        entry_date,
        numeric_value: input.numeric_value,
        letter_grade: clean_letter(input.letter_grade),
        credits: input.credits,
        comments: clean_text(input.comments),
        is_passing: input.is_passing,
        is_exempt: input.is_exempt,
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    };
    store::insert_entry(&tx, &entry)?;
    if entry.entry_type == EntryType::Academic {
        recalculate_in(&tx, &record.id)?;
    }
    tx.commit()?;
    Ok(entry)
}

pub fn get_entry(conn: &Connection, id: &str) -> RecordsResult<EntryWithGrades> {
    ensure_records_enabled(conn)?;
    let entry = require_active_entry(conn, id)?;
    require_active_record(conn, &entry.record_id)?;
    let grades = store::list_grades(conn, &entry.id)?;
    Ok(EntryWithGrades { entry, grades })
}

pub fn list_entries(
    conn: &Connection,
    record_id: &str,
    entry_type: Option<EntryType>,
) -> RecordsResult<Vec<Entry>> {
    ensure_records_enabled(conn)?;
    require_active_record(conn, record_id)?;
    store::list_entries(conn, record_id, entry_type)
}

pub fn update_entry(conn: &Connection, id: &str, patch: EntryPatch) -> RecordsResult<Entry> {
    ensure_records_enabled(conn)?;
    non_negative("credits", patch.credits)?;
    if matches!(patch.numeric_value, Some(v) if !v.is_finite()) {
        return Err(RecordsError::validation("numericValue must be a number"));
    }

    let tx = conn.unchecked_transaction()?;
    let mut entry = require_active_entry(&tx, id)?;
    require_active_record(&tx, &entry.record_id)?;
    let was_academic = entry.entry_type == EntryType::Academic;

    if let Some(v) = patch.entry_type {
        entry.entry_type = v;
    }
    if patch.period.is_some() {
        entry.period = clean_text(patch.period);
    }
    if patch.subject.is_some() {
        entry.subject = clean_text(patch.subject);
    }
    if let Some(v) = patch.title {
        let v = v.trim().to_string();
        if v.is_empty() {
            return Err(RecordsError::validation("title must not be empty"));
        }
        entry.title = v;
    }
    if patch.description.is_some() {
        entry.description = clean_text(patch.description);
    }
    if let Some(raw) = patch.entry_date.as_deref() {
        entry.entry_date = parse_date("entryDate", raw)?;
    }
    if patch.numeric_value.is_some() {
        entry.numeric_value = patch.numeric_value;
    }
    if patch.letter_grade.is_some() {
        entry.letter_grade = clean_letter(patch.letter_grade);
    }
    if patch.credits.is_some() {
        entry.credits = patch.credits;
    }
    if patch.comments.is_some() {
        entry.comments = clean_text(patch.comments);
    }
    if patch.is_passing.is_some() {
        entry.is_passing = patch.is_passing;
    }
    if let Some(v) = patch.is_exempt {
        entry.is_exempt = v;
    }
    entry.updated_at = now_rfc3339();
    store::save_entry(&tx, &entry)?;

    // Re-typing away from ACADEMIC also changes the GPA.
    if was_academic || entry.entry_type == EntryType::Academic {
        recalculate_in(&tx, &entry.record_id)?;
    }
    tx.commit()?;
    Ok(entry)
}

pub fn delete_entry(conn: &Connection, id: &str) -> RecordsResult<Entry> {
    ensure_records_enabled(conn)?;
    let tx = conn.unchecked_transaction()?;
    let mut entry = require_active_entry(&tx, id)?;
    require_active_record(&tx, &entry.record_id)?;
    entry.is_active = false;
    entry.updated_at = now_rfc3339();
    store::save_entry(&tx, &entry)?;
    if entry.entry_type == EntryType::Academic {
        recalculate_in(&tx, &entry.record_id)?;
    }
    tx.commit()?;
    Ok(entry)
}

// ---- grades ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGrade {
    pub entry_id: String,
    pub grade_type: Option<String>,
    pub name: String,
    pub earned_points: f64,
    pub total_points: f64,
    pub weight: Option<f64>,
    pub grade_date: Option<String>,
    #[serde(default)]
    pub is_late: bool,
    #[serde(default)]
    pub is_excused: bool,
    #[serde(default)]
    pub is_dropped: bool,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradePatch {
    pub grade_type: Option<String>,
    pub name: Option<String>,
    pub earned_points: Option<f64>,
    pub total_points: Option<f64>,
    pub weight: Option<f64>,
    pub grade_date: Option<String>,
    pub is_late: Option<bool>,
    pub is_excused: Option<bool>,
    pub is_dropped: Option<bool>,
    pub comments: Option<String>,
}

fn refresh_derived(grade: &mut Grade) {
    grade.percentage = calc::grade_percentage(grade.earned_points, grade.total_points);
    grade.letter_grade = calc::grade_letter(grade.percentage).to_string();
}

/// Grade writes resolve the full parent chain; any inactive link is NotFound.
fn require_grade_parents(conn: &Connection, entry_id: &str) -> RecordsResult<Entry> {
    let entry = require_active_entry(conn, entry_id)?;
    require_active_record(conn, &entry.record_id)?;
    Ok(entry)
}

pub fn create_grade(conn: &Connection, input: NewGrade) -> RecordsResult<Grade> {
    ensure_records_enabled(conn)?;
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(RecordsError::validation("name must not be empty"));
    }
    non_negative("earnedPoints", Some(input.earned_points))?;
    non_negative("totalPoints", Some(input.total_points))?;
    non_negative("weight", input.weight)?;
    let grade_date = input
        .grade_date
        .as_deref()
        .map(|raw| parse_date("gradeDate", raw))
        .transpose()?;

    let tx = conn.unchecked_transaction()?;
    let entry = require_grade_parents(&tx, &input.entry_id)?;
    let now = now_rfc3339();
    let mut grade = Grade {
        id: Uuid::new_v4().to_string(),
        entry_id: entry.id.clone(),
        grade_type: clean_text(input.grade_type).unwrap_or_else(|| "other".to_string()),
        name,
        earned_points: input.earned_points,
        total_points: input.total_points,
        weight: input.weight,
        grade_date,
        is_late: input.is_late,
        is_excused: input.is_excused,
        is_dropped: input.is_dropped,
        comments: clean_text(input.comments),
        percentage: 0.0,
        letter_grade: String::new(),
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    };
    refresh_derived(&mut grade);
    store::insert_grade(&tx, &grade)?;
    recalculate_in(&tx, &entry.record_id)?;
    tx.commit()?;
    Ok(grade)
}

pub fn get_grade(conn: &Connection, id: &str) -> RecordsResult<Grade> {
    ensure_records_enabled(conn)?;
    let grade = require_active_grade(conn, id)?;
    require_grade_parents(conn, &grade.entry_id)?;
    Ok(grade)
}

pub fn list_grades(conn: &Connection, entry_id: &str) -> RecordsResult<Vec<Grade>> {
    ensure_records_enabled(conn)?;
    require_grade_parents(conn, entry_id)?;
    store::list_grades(conn, entry_id)
}

pub fn update_grade(conn: &Connection, id: &str, patch: GradePatch) -> RecordsResult<Grade> {
    ensure_records_enabled(conn)?;
    non_negative("earnedPoints", patch.earned_points)?;
    non_negative("totalPoints", patch.total_points)?;
    non_negative("weight", patch.weight)?;

    let tx = conn.unchecked_transaction()?;
    let mut grade = require_active_grade(&tx, id)?;
    let entry = require_grade_parents(&tx, &grade.entry_id)?;

    if let Some(v) = clean_text(patch.grade_type) {
        grade.grade_type = v;
    }
    if let Some(v) = patch.name {
        let v = v.trim().to_string();
        if v.is_empty() {
            return Err(RecordsError::validation("name must not be empty"));
        }
        grade.name = v;
    }
    if let Some(v) = patch.earned_points {
        grade.earned_points = v;
    }
    if let Some(v) = patch.total_points {
        grade.total_points = v;
    }
    if patch.weight.is_some() {
        grade.weight = patch.weight;
    }
    if let Some(raw) = patch.grade_date.as_deref() {
        grade.grade_date = Some(parse_date("gradeDate", raw)?);
    }
    if let Some(v) = patch.is_late {
        grade.is_late = v;
    }
    if let Some(v) = patch.is_excused {
        grade.is_excused = v;
    }
    if let Some(v) = patch.is_dropped {
        grade.is_dropped = v;
    }
    if patch.comments.is_some() {
        grade.comments = clean_text(patch.comments);
    }
    refresh_derived(&mut grade);
    grade.updated_at = now_rfc3339();
    store::save_grade(&tx, &grade)?;
    recalculate_in(&tx, &entry.record_id)?;
    tx.commit()?;
    Ok(grade)
}

pub fn delete_grade(conn: &Connection, id: &str) -> RecordsResult<Grade> {
    ensure_records_enabled(conn)?;
    let tx = conn.unchecked_transaction()?;
    let mut grade = require_active_grade(&tx, id)?;
    let entry = require_grade_parents(&tx, &grade.entry_id)?;
    grade.is_active = false;
    grade.updated_at = now_rfc3339();
    store::save_grade(&tx, &grade)?;
    recalculate_in(&tx, &entry.record_id)?;
    tx.commit()?;
    Ok(grade)
}
