use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Completed,
    Transferred,
    Archived,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Completed => "completed",
            RecordStatus::Transferred => "transferred",
            RecordStatus::Archived => "archived",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "active" => Some(RecordStatus::Active),
            "completed" => Some(RecordStatus::Completed),
            "transferred" => Some(RecordStatus::Transferred),
            "archived" => Some(RecordStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Academic,
    Attendance,
    Behavioral,
    Achievement,
    Disciplinary,
    Medical,
    Other,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Academic => "ACADEMIC",
            EntryType::Attendance => "ATTENDANCE",
            EntryType::Behavioral => "BEHAVIORAL",
            EntryType::Achievement => "ACHIEVEMENT",
            EntryType::Disciplinary => "DISCIPLINARY",
            EntryType::Medical => "MEDICAL",
            EntryType::Other => "OTHER",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "ACADEMIC" => Some(EntryType::Academic),
            "ATTENDANCE" => Some(EntryType::Attendance),
            "BEHAVIORAL" => Some(EntryType::Behavioral),
            "ACHIEVEMENT" => Some(EntryType::Achievement),
            "DISCIPLINARY" => Some(EntryType::Disciplinary),
            "MEDICAL" => Some(EntryType::Medical),
            "OTHER" => Some(EntryType::Other),
            _ => None,
        }
    }
}

/// One student's academic year. `is_active = false` is the only deletion
/// mechanism: it hides the record from lookups by (student, year), from
/// listings and from statistics, but the row stays addressable by id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub student_id: String,
    pub academic_year: i64,
    pub status: RecordStatus,
    pub final_gpa: f64,
    pub total_credits: f64,
    pub completed_credits: f64,
    pub absences: i64,
    pub tardiness: i64,
    pub promoted: bool,
    pub repeat_year: bool,
    pub observations: Option<String>,
    pub achievements: Option<String>,
    pub is_active: bool,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub record_id: String,
    pub entry_type: EntryType,
    pub period: Option<String>,
    pub subject: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub entry_date: String,
    pub numeric_value: Option<f64>,
    pub letter_grade: Option<String>,
    pub credits: Option<f64>,
    pub comments: Option<String>,
    pub is_passing: Option<bool>,
    pub is_exempt: bool,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub entry_id: String,
    pub grade_type: String,
    pub name: String,
    pub earned_points: f64,
    pub total_points: f64,
    pub weight: Option<f64>,
    pub grade_date: Option<String>,
    pub is_late: bool,
    pub is_excused: bool,
    pub is_dropped: bool,
    pub comments: Option<String>,
    /// Derived from the raw points on every write.
    pub percentage: f64,
    /// Derived from `percentage` on every write.
    pub letter_grade: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Grade {
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryWithGrades {
    #[serde(flatten)]
    pub entry: Entry,
    pub grades: Vec<Grade>,
}

/// A record loaded together with its entries and their grades.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSnapshot {
    #[serde(flatten)]
    pub record: Record,
    pub entries: Vec<EntryWithGrades>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: String,
    pub class_id: String,
    pub class_name: String,
    pub display_name: String,
    pub student_no: Option<String>,
    pub active: bool,
}
