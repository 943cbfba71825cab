use crate::error::RecordsResult;
use crate::model::{
    Entry, EntryType, EntryWithGrades, Grade, Record, RecordSnapshot, RecordStatus,
    StudentProfile,
};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;
use std::collections::HashMap;

const RECORD_COLUMNS: &str = "id, student_id, academic_year, status, final_gpa, total_credits,
    completed_credits, absences, tardiness, promoted, repeat_year, observations, achievements,
    is_active, version, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, record_id, entry_type, period, subject, title, description,
    entry_date, numeric_value, letter_grade, credits, comments, is_passing, is_exempt, is_active,
    created_at, updated_at";

const GRADE_COLUMNS: &str = "id, entry_id, grade_type, name, earned_points, total_points, weight,
    grade_date, is_late, is_excused, is_dropped, comments, percentage, letter_grade, is_active,
    created_at, updated_at";

fn bad_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<Record> {
    let status: String = r.get(3)?;
    let status = RecordStatus::parse(&status)
        .ok_or_else(|| bad_column(3, format!("unknown record status: {}", status)))?;
    Ok(Record {
        id: r.get(0)?,
        student_id: r.get(1)?,
        academic_year: r.get(2)?,
        status,
        final_gpa: r.get(4)?,
        total_credits: r.get(5)?,
        completed_credits: r.get(6)?,
        absences: r.get(7)?,
        tardiness: r.get(8)?,
        promoted: r.get::<_, i64>(9)? != 0,
        repeat_year: r.get::<_, i64>(10)? != 0,
        observations: r.get(11)?,
        achievements: r.get(12)?,
        is_active: r.get::<_, i64>(13)? != 0,
        version: r.get(14)?,
        created_at: r.get(15)?,
        updated_at: r.get(16)?,
    })
}

fn entry_from_row(r: &Row<'_>) -> rusqlite::Result<Entry> {
    let entry_type: String = r.get(2)?;
    let entry_type = EntryType::parse(&entry_type)
        .ok_or_else(|| bad_column(2, format!("unknown entry type: {}", entry_type)))?;
    Ok(Entry {
        id: r.get(0)?,
        record_id: r.get(1)?,
        entry_type,
        period: r.get(3)?,
        subject: r.get(4)?,
        title: r.get(5)?,
        description: r.get(6)?,
        entry_date: r.get(7)?,
        numeric_value: r.get(8)?,
        letter_grade: r.get(9)?,
        credits: r.get(10)?,
        comments: r.get(11)?,
        is_passing: r.get::<_, Option<i64>>(12)?.map(|v| v != 0),
        is_exempt: r.get::<_, i64>(13)? != 0,
        is_active: r.get::<_, i64>(14)? != 0,
        created_at: r.get(15)?,
        updated_at: r.get(16)?,
    })
}

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: r.get(0)?,
        entry_id: r.get(1)?,
        grade_type: r.get(2)?,
        name: r.get(3)?,
        earned_points: r.get(4)?,
        total_points: r.get(5)?,
        weight: r.get(6)?,
        grade_date: r.get(7)?,
        is_late: r.get::<_, i64>(8)? != 0,
        is_excused: r.get::<_, i64>(9)? != 0,
        is_dropped: r.get::<_, i64>(10)? != 0,
        comments: r.get(11)?,
        percentage: r.get(12)?,
        letter_grade: r.get(13)?,
        is_active: r.get::<_, i64>(14)? != 0,
        created_at: r.get(15)?,
        updated_at: r.get(16)?,
    })
}

// ---- records ----

pub fn insert_record(conn: &Connection, rec: &Record) -> RecordsResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO records({}) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            RECORD_COLUMNS
        ),
        rusqlite::params![
            rec.id,
            rec.student_id,
            rec.academic_year,
            rec.status.as_str(),
            rec.final_gpa,
            rec.total_credits,
            rec.completed_credits,
            rec.absences,
            rec.tardiness,
            rec.promoted as i64,
            rec.repeat_year as i64,
            rec.observations,
            rec.achievements,
            rec.is_active as i64,
            rec.version,
            rec.created_at,
            rec.updated_at,
        ],
    )?;
    Ok(())
}

/// Looks a record up by id whether or not it is active.
pub fn find_record(conn: &Connection, id: &str) -> RecordsResult<Option<Record>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM records WHERE id = ?", RECORD_COLUMNS),
            [id],
            record_from_row,
        )
        .optional()?)
}

pub fn find_active_record_for(
    conn: &Connection,
    student_id: &str,
    academic_year: i64,
) -> RecordsResult<Option<Record>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM records
                 WHERE student_id = ? AND academic_year = ? AND is_active = 1",
                RECORD_COLUMNS
            ),
            (student_id, academic_year),
            record_from_row,
        )
        .optional()?)
}

/// Writes every mutable column. The caller owns the version bump.
pub fn save_record(conn: &Connection, rec: &Record) -> RecordsResult<()> {
    conn.execute(
        "UPDATE records SET
           status = ?, final_gpa = ?, total_credits = ?, completed_credits = ?, absences = ?,
           tardiness = ?, promoted = ?, repeat_year = ?, observations = ?, achievements = ?,
           is_active = ?, version = ?, updated_at = ?
         WHERE id = ?",
        rusqlite::params![
            rec.status.as_str(),
            rec.final_gpa,
            rec.total_credits,
            rec.completed_credits,
            rec.absences,
            rec.tardiness,
            rec.promoted as i64,
            rec.repeat_year as i64,
            rec.observations,
            rec.achievements,
            rec.is_active as i64,
            rec.version,
            rec.updated_at,
            rec.id,
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFilter {
    pub student_id: Option<String>,
    pub academic_year: Option<i64>,
    pub status: Option<RecordStatus>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordSortKey {
    #[default]
    AcademicYear,
    FinalGpa,
    CreatedAt,
    UpdatedAt,
}

impl RecordSortKey {
    fn column(self) -> &'static str {
        match self {
            RecordSortKey::AcademicYear => "academic_year",
            RecordSortKey::FinalGpa => "final_gpa",
            RecordSortKey::CreatedAt => "created_at",
            RecordSortKey::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// 1-based page; limit clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
        }
    }

    fn offset(self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

pub fn list_records(
    conn: &Connection,
    filter: &RecordFilter,
    page: Pagination,
    sort: RecordSortKey,
    order: SortOrder,
) -> RecordsResult<(Vec<Record>, i64)> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    if !filter.include_inactive {
        clauses.push("is_active = 1");
    }
    if let Some(ref sid) = filter.student_id {
        clauses.push("student_id = ?");
        binds.push(Value::Text(sid.clone()));
    }
    if let Some(year) = filter.academic_year {
        clauses.push("academic_year = ?");
        binds.push(Value::Integer(year));
    }
    if let Some(status) = filter.status {
        clauses.push("status = ?");
        binds.push(Value::Text(status.as_str().to_string()));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM records {}", where_sql),
        params_from_iter(binds.iter()),
        |r| r.get(0),
    )?;

    let dir = match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    let sql = format!(
        "SELECT {} FROM records {} ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
        RECORD_COLUMNS,
        where_sql,
        sort.column(),
        dir
    );
    binds.push(Value::Integer(page.limit));
    binds.push(Value::Integer(page.offset()));
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params_from_iter(binds.iter()), record_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok((records, total))
}

pub fn list_student_records(
    conn: &Connection,
    student_id: &str,
    academic_year: Option<i64>,
) -> RecordsResult<Vec<Record>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM records
         WHERE student_id = ?1 AND is_active = 1 AND (?2 IS NULL OR academic_year = ?2)
         ORDER BY academic_year",
        RECORD_COLUMNS
    ))?;
    let records = stmt
        .query_map((student_id, academic_year), record_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(records)
}

// ---- entries ----

pub fn insert_entry(conn: &Connection, e: &Entry) -> RecordsResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO entries({}) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ENTRY_COLUMNS
        ),
        rusqlite::params![
            e.id,
            e.record_id,
            e.entry_type.as_str(),
            e.period,
            e.subject,
            e.title,
            e.description,
            e.entry_date,
            e.numeric_value,
            e.letter_grade,
            e.credits,
            e.comments,
            e.is_passing.map(|v| v as i64),
            e.is_exempt as i64,
            e.is_active as i64,
            e.created_at,
            e.updated_at,
        ],
    )?;
    Ok(())
}

pub fn find_entry(conn: &Connection, id: &str) -> RecordsResult<Option<Entry>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM entries WHERE id = ?", ENTRY_COLUMNS),
            [id],
            entry_from_row,
        )
        .optional()?)
}

pub fn save_entry(conn: &Connection, e: &Entry) -> RecordsResult<()> {
    conn.execute(
        "UPDATE entries SET
           entry_type = ?, period = ?, subject = ?, title = ?, description = ?, entry_date = ?,
           numeric_value = ?, letter_grade = ?, credits = ?, comments = ?, is_passing = ?,
           is_exempt = ?, is_active = ?, updated_at = ?
         WHERE id = ?",
        rusqlite::params![
            e.entry_type.as_str(),
            e.period,
            e.subject,
            e.title,
            e.description,
            e.entry_date,
            e.numeric_value,
            e.letter_grade,
            e.credits,
            e.comments,
            e.is_passing.map(|v| v as i64),
            e.is_exempt as i64,
            e.is_active as i64,
            e.updated_at,
            e.id,
        ],
    )?;
    Ok(())
}

pub fn list_entries(
    conn: &Connection,
    record_id: &str,
    entry_type: Option<EntryType>,
) -> RecordsResult<Vec<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM entries
         WHERE record_id = ?1 AND is_active = 1 AND (?2 IS NULL OR entry_type = ?2)
         ORDER BY entry_date, created_at, id",
        ENTRY_COLUMNS
    ))?;
    let entries = stmt
        .query_map((record_id, entry_type.map(|t| t.as_str())), entry_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(entries)
}

// ---- grades ----

pub fn insert_grade(conn: &Connection, g: &Grade) -> RecordsResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO grades({}) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            GRADE_COLUMNS
        ),
        rusqlite::params![
            g.id,
            g.entry_id,
            g.grade_type,
            g.name,
            g.earned_points,
            g.total_points,
            g.weight,
            g.grade_date,
            g.is_late as i64,
            g.is_excused as i64,
            g.is_dropped as i64,
            g.comments,
            g.percentage,
            g.letter_grade,
            g.is_active as i64,
            g.created_at,
            g.updated_at,
        ],
    )?;
    Ok(())
}

pub fn find_grade(conn: &Connection, id: &str) -> RecordsResult<Option<Grade>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM grades WHERE id = ?", GRADE_COLUMNS),
            [id],
            grade_from_row,
        )
        .optional()?)
}

pub fn save_grade(conn: &Connection, g: &Grade) -> RecordsResult<()> {
    conn.execute(
        "UPDATE grades SET
           grade_type = ?, name = ?, earned_points = ?, total_points = ?, weight = ?,
           grade_date = ?, is_late = ?, is_excused = ?, is_dropped = ?, comments = ?,
           percentage = ?, letter_grade = ?, is_active = ?, updated_at = ?
         WHERE id = ?",
        rusqlite::params![
            g.grade_type,
            g.name,
            g.earned_points,
            g.total_points,
            g.weight,
            g.grade_date,
            g.is_late as i64,
            g.is_excused as i64,
            g.is_dropped as i64,
            g.comments,
            g.percentage,
            g.letter_grade,
            g.is_active as i64,
            g.updated_at,
            g.id,
        ],
    )?;
    Ok(())
}

pub fn list_grades(conn: &Connection, entry_id: &str) -> RecordsResult<Vec<Grade>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM grades
         WHERE entry_id = ? AND is_active = 1
         ORDER BY grade_date, created_at, id",
        GRADE_COLUMNS
    ))?;
    let grades = stmt
        .query_map([entry_id], grade_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(grades)
}

/// Active entries of a record, each with its active grades.
pub fn load_snapshot(conn: &Connection, record: Record) -> RecordsResult<RecordSnapshot> {
    let entries = list_entries(conn, &record.id, None)?;

    let prefixed_grade_columns = GRADE_COLUMNS
        .split(',')
        .map(|c| format!("g.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM grades g
         JOIN entries e ON e.id = g.entry_id
         WHERE e.record_id = ? AND e.is_active = 1 AND g.is_active = 1
         ORDER BY g.grade_date, g.created_at, g.id",
        prefixed_grade_columns
    ))?;
    let grades = stmt
        .query_map([&record.id], grade_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut by_entry: HashMap<String, Vec<Grade>> = HashMap::new();
    for g in grades {
        by_entry.entry(g.entry_id.clone()).or_default().push(g);
    }

    let entries = entries
        .into_iter()
        .map(|entry| {
            let grades = by_entry.remove(&entry.id).unwrap_or_default();
            EntryWithGrades { entry, grades }
        })
        .collect();
    Ok(RecordSnapshot { record, entries })
}

// ---- roster ----

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<StudentProfile> {
    let last: String = r.get(3)?;
    let first: String = r.get(4)?;
    Ok(StudentProfile {
        id: r.get(0)?,
        class_id: r.get(1)?,
        class_name: r.get(2)?,
        display_name: format!("{}, {}", last, first),
        student_no: r.get(5)?,
        active: r.get::<_, i64>(6)? != 0,
    })
}

pub fn find_student(conn: &Connection, student_id: &str) -> RecordsResult<Option<StudentProfile>> {
    Ok(conn
        .query_row(
            "SELECT s.id, s.class_id, c.name, s.last_name, s.first_name, s.student_no, s.active
             FROM students s
             JOIN classes c ON c.id = s.class_id
             WHERE s.id = ?",
            [student_id],
            student_from_row,
        )
        .optional()?)
}

pub fn find_class_name(conn: &Connection, class_id: &str) -> RecordsResult<Option<String>> {
    Ok(conn
        .query_row("SELECT name FROM classes WHERE id = ?", [class_id], |r| {
            r.get(0)
        })
        .optional()?)
}

pub fn list_class_roster(conn: &Connection, class_id: &str) -> RecordsResult<Vec<StudentProfile>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.class_id, c.name, s.last_name, s.first_name, s.student_no, s.active
         FROM students s
         JOIN classes c ON c.id = s.class_id
         WHERE s.class_id = ?
         ORDER BY s.sort_order",
    )?;
    let students = stmt
        .query_map([class_id], student_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(students)
}
