use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "recordbook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            student_no TEXT,
            active INTEGER NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_sort ON students(class_id, sort_order)",
        [],
    )?;

    // Typed key/value store; feature flags live here as module_<name>_enabled.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            value_type TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            academic_year INTEGER NOT NULL,
            status TEXT NOT NULL,
            final_gpa REAL NOT NULL DEFAULT 0,
            total_credits REAL NOT NULL DEFAULT 0,
            completed_credits REAL NOT NULL DEFAULT 0,
            absences INTEGER NOT NULL DEFAULT 0,
            tardiness INTEGER NOT NULL DEFAULT 0,
            promoted INTEGER NOT NULL DEFAULT 0,
            repeat_year INTEGER NOT NULL DEFAULT 0,
            observations TEXT,
            achievements TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_student ON records(student_id)",
        [],
    )?;
    // At most one active record per (student, year); inactive rows are kept.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_records_active_student_year
         ON records(student_id, academic_year) WHERE is_active = 1",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries(
            id TEXT PRIMARY KEY,
            record_id TEXT NOT NULL,
            entry_type TEXT NOT NULL,
            period TEXT,
            subject TEXT,
            title TEXT NOT NULL,
            description TEXT,
            entry_date TEXT NOT NULL,
            numeric_value REAL,
            letter_grade TEXT,
            credits REAL,
            comments TEXT,
            is_passing INTEGER,
            is_exempt INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(record_id) REFERENCES records(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_record ON entries(record_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            entry_id TEXT NOT NULL,
            grade_type TEXT NOT NULL,
            name TEXT NOT NULL,
            earned_points REAL NOT NULL,
            total_points REAL NOT NULL,
            weight REAL,
            grade_date TEXT,
            is_late INTEGER NOT NULL DEFAULT 0,
            is_excused INTEGER NOT NULL DEFAULT 0,
            is_dropped INTEGER NOT NULL DEFAULT 0,
            comments TEXT,
            percentage REAL NOT NULL DEFAULT 0,
            letter_grade TEXT NOT NULL DEFAULT 'F',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(entry_id) REFERENCES entries(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_entry ON grades(entry_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
        let sql = format!("PRAGMA table_info({})", table);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            if name == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[test]
    fn schema_is_idempotent_and_versioned() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");
        assert!(table_has_column(&conn, "records", "version").expect("pragma"));
        assert!(!table_has_column(&conn, "records", "nope").expect("pragma"));
    }
}
