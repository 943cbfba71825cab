use crate::model::{Entry, EntryType, EntryWithGrades, Grade, Record, RecordStatus};
use serde::Serialize;

/// Fixed school-year length used for attendance percentages.
pub const SCHOOL_DAYS_PER_YEAR: f64 = 180.0;

/// Half-up rounding to an integer: `Floor(x + 0.5)`.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Half-up rounding to 2 decimals: `Floor(100*x + 0.5) / 100`
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

pub fn grade_percentage(earned_points: f64, total_points: f64) -> f64 {
    if total_points == 0.0 {
        return 0.0;
    }
    round_half_up(earned_points / total_points * 100.0)
}

pub fn grade_letter(percentage: f64) -> &'static str {
    if percentage >= 90.0 {
        "A"
    } else if percentage >= 80.0 {
        "B"
    } else if percentage >= 70.0 {
        "C"
    } else if percentage >= 60.0 {
        "D"
    } else {
        "F"
    }
}

/// Letter scale used for entries that carry a letter grade directly.
pub fn letter_grade_point(letter: &str) -> f64 {
    match letter.trim().to_ascii_uppercase().as_str() {
        "A+" | "A" => 4.0,
        "A-" => 3.7,
        "B+" => 3.3,
        "B" => 3.0,
        "B-" => 2.7,
        "C+" => 2.3,
        "C" => 2.0,
        "C-" => 1.7,
        "D+" => 1.3,
        "D" => 1.0,
        "D-" => 0.7,
        _ => 0.0,
    }
}

/// Numeric scale used for entries that carry a direct value. This is a
/// different scale from `grade_letter`; the two are kept apart on purpose.
pub fn numeric_grade_point(value: f64) -> f64 {
    if value >= 90.0 {
        4.0
    } else if value >= 80.0 {
        3.0
    } else if value >= 70.0 {
        2.0
    } else if value >= 60.0 {
        1.0
    } else {
        0.0
    }
}

pub fn entry_grade_point(entry: &Entry) -> f64 {
    if let Some(letter) = entry.letter_grade.as_deref() {
        return letter_grade_point(letter);
    }
    match entry.numeric_value {
        Some(v) => numeric_grade_point(v),
        None => 0.0,
    }
}

/// How an entry feeds the record GPA. An entry is in exactly one mode.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryScore<'a> {
    /// The entry owns at least one active grade. Dropped grades are kept in
    /// the list and skipped when summing.
    GradeBacked { grades: Vec<&'a Grade> },
    /// No active grades; the entry's own value weighted by its credits.
    DirectValued { value: f64, credits: f64 },
    Unscored,
}

pub fn classify_entry(item: &EntryWithGrades) -> EntryScore<'_> {
    let grades: Vec<&Grade> = item.grades.iter().filter(|g| g.is_active).collect();
    if !grades.is_empty() {
        return EntryScore::GradeBacked { grades };
    }
    match item.entry.numeric_value {
        Some(value) => EntryScore::DirectValued {
            value,
            credits: match item.entry.credits {
                Some(c) if c > 0.0 => c,
                _ => 1.0,
            },
        },
        None => EntryScore::Unscored,
    }
}

/// Record GPA over active ACADEMIC entries.
///
/// Grade-backed entries feed `Σ percentage·weight / Σ weight`; direct-valued
/// entries feed `Σ value·credits / Σ credits`. Both running totals are
/// combined into one weighted average and rounded to 2 decimals. Returns 0
/// when nothing contributed.
pub fn recalc(entries: &[EntryWithGrades]) -> f64 {
    let mut grade_sum = 0.0_f64;
    let mut weight_total = 0.0_f64;
    let mut direct_sum = 0.0_f64;
    let mut credit_total = 0.0_f64;

    for item in entries {
        if !item.entry.is_active || item.entry.entry_type != EntryType::Academic {
            continue;
        }
        match classify_entry(item) {
            EntryScore::GradeBacked { grades } => {
                for g in grades.into_iter().filter(|g| !g.is_dropped) {
                    let weight = g.effective_weight();
                    grade_sum += grade_percentage(g.earned_points, g.total_points) * weight;
                    weight_total += weight;
                }
            }
            EntryScore::DirectValued { value, credits } => {
                direct_sum += value * credits;
                credit_total += credits;
            }
            EntryScore::Unscored => {}
        }
    }

    let denom = weight_total + credit_total;
    if denom <= 0.0 {
        return 0.0;
    }
    round_off_2_decimals((grade_sum + direct_sum) / denom)
}

pub fn completion_percentage(record: &Record) -> f64 {
    if record.total_credits <= 0.0 {
        return 0.0;
    }
    round_half_up(record.completed_credits / record.total_credits * 100.0)
}

pub fn attendance_percentage(record: &Record) -> f64 {
    let present = SCHOOL_DAYS_PER_YEAR - record.absences as f64;
    round_half_up(present / SCHOOL_DAYS_PER_YEAR * 100.0).max(0.0)
}

pub fn is_year_complete(record: &Record) -> bool {
    record.status == RecordStatus::Completed || completion_percentage(record) >= 100.0
}

/// Derived quantities reported next to a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDerived {
    pub completion_percentage: f64,
    pub attendance_percentage: f64,
    pub is_year_complete: bool,
}

pub fn record_derived(record: &Record) -> RecordDerived {
    RecordDerived {
        completion_percentage: completion_percentage(record),
        attendance_percentage: attendance_percentage(record),
        is_year_complete: is_year_complete(record),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStatistics {
    pub total_records: usize,
    pub average_gpa: f64,
    pub total_credits: f64,
    pub completed_credits: f64,
    pub attendance_rate: f64,
}

/// Aggregates over a student's active records.
pub fn student_statistics(records: &[Record]) -> StudentStatistics {
    let active: Vec<&Record> = records.iter().filter(|r| r.is_active).collect();
    if active.is_empty() {
        return StudentStatistics {
            total_records: 0,
            average_gpa: 0.0,
            total_credits: 0.0,
            completed_credits: 0.0,
            attendance_rate: 0.0,
        };
    }
    let n = active.len() as f64;
    let gpa_sum: f64 = active.iter().map(|r| r.final_gpa).sum();
    let attendance_sum: f64 = active.iter().map(|r| attendance_percentage(r)).sum();
    StudentStatistics {
        total_records: active.len(),
        average_gpa: round_off_2_decimals(gpa_sum / n),
        total_credits: active.iter().map(|r| r.total_credits).sum(),
        completed_credits: active.iter().map(|r| r.completed_credits).sum(),
        attendance_rate: round_half_up(attendance_sum / n),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn record(total_credits: f64, completed_credits: f64, absences: i64) -> Record {
        Record {
            id: "r1".into(),
            student_id: "s1".into(),
            academic_year: 2024,
            status: RecordStatus::Active,
            final_gpa: 0.0,
            total_credits,
            completed_credits,
            absences,
            tardiness: 0,
            promoted: false,
            repeat_year: false,
            observations: None,
            achievements: None,
            is_active: true,
            version: 1,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn entry(entry_type: EntryType, numeric_value: Option<f64>, credits: Option<f64>) -> Entry {
        Entry {
            id: "e1".into(),
            record_id: "r1".into(),
            entry_type,
            period: None,
            subject: Some("Matemáticas".into()),
            title: "Unidad 1".into(),
            description: None,
            entry_date: "2024-10-01".into(),
            numeric_value,
            letter_grade: None,
            credits,
            comments: None,
            is_passing: None,
            is_exempt: false,
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn grade(earned: f64, total: f64, weight: Option<f64>) -> Grade {
        let percentage = grade_percentage(earned, total);
        Grade {
            id: format!("g-{earned}-{total}"),
            entry_id: "e1".into(),
            grade_type: "exam".into(),
            name: "Examen".into(),
            earned_points: earned,
            total_points: total,
            weight,
            grade_date: None,
            is_late: false,
            is_excused: false,
            is_dropped: false,
            comments: None,
            percentage,
            letter_grade: grade_letter(percentage).to_string(),
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn academic_with(grades: Vec<Grade>) -> EntryWithGrades {
        EntryWithGrades {
            entry: entry(EntryType::Academic, None, None),
            grades,
        }
    }

    #[test]
    fn percentage_rounds_and_guards_zero_total() {
        assert_eq!(grade_percentage(60.0, 100.0), 60.0);
        assert_eq!(grade_percentage(2.0, 3.0), 67.0);
        assert_eq!(grade_percentage(17.5, 20.0), 88.0);
        assert_eq!(grade_percentage(5.0, 0.0), 0.0);
    }

    #[test]
    fn letter_thresholds() {
        assert_eq!(grade_letter(90.0), "A");
        assert_eq!(grade_letter(89.0), "B");
        assert_eq!(grade_letter(70.0), "C");
        assert_eq!(grade_letter(60.0), "D");
        assert_eq!(grade_letter(59.0), "F");
    }

    #[test]
    fn entry_grade_point_prefers_letter_then_numeric() {
        let mut e = entry(EntryType::Academic, Some(95.0), None);
        assert_eq!(entry_grade_point(&e), 4.0);
        e.letter_grade = Some("B-".into());
        assert_eq!(entry_grade_point(&e), 2.7);
        e.letter_grade = Some("Z".into());
        assert_eq!(entry_grade_point(&e), 0.0);
        let bare = entry(EntryType::Academic, None, None);
        assert_eq!(entry_grade_point(&bare), 0.0);
        assert_eq!(numeric_grade_point(79.9), 2.0);
    }

    #[test]
    fn two_grades_average_to_75() {
        let entries = vec![academic_with(vec![
            grade(60.0, 100.0, Some(1.0)),
            grade(90.0, 100.0, None),
        ])];
        assert_eq!(recalc(&entries), 75.0);
    }

    #[test]
    fn dropped_grade_is_excluded() {
        let mut second = grade(90.0, 100.0, Some(1.0));
        second.is_dropped = true;
        let entries = vec![academic_with(vec![grade(60.0, 100.0, Some(1.0)), second])];
        assert_eq!(recalc(&entries), 60.0);
    }

    #[test]
    fn inactive_grade_is_excluded() {
        let mut second = grade(90.0, 100.0, Some(1.0));
        second.is_active = false;
        let entries = vec![academic_with(vec![grade(60.0, 100.0, Some(1.0)), second])];
        assert_eq!(recalc(&entries), 60.0);
    }

    #[test]
    fn gpa_is_order_independent() {
        let a = grade(73.0, 80.0, Some(2.0));
        let b = grade(41.0, 50.0, Some(0.5));
        let c = grade(9.0, 10.0, None);
        let forward = vec![academic_with(vec![a.clone(), b.clone(), c.clone()])];
        let backward = vec![academic_with(vec![c, b, a])];
        assert_eq!(recalc(&forward), recalc(&backward));
    }

    #[test]
    fn direct_valued_entries_use_credits() {
        let entries = vec![
            EntryWithGrades {
                entry: entry(EntryType::Academic, Some(80.0), Some(3.0)),
                grades: vec![],
            },
            EntryWithGrades {
                entry: entry(EntryType::Academic, Some(90.0), None),
                grades: vec![],
            },
        ];
        // (80*3 + 90*1) / (3 + 1)
        assert_eq!(recalc(&entries), 82.5);
    }

    #[test]
    fn zero_credits_count_as_one() {
        let entries = vec![
            EntryWithGrades {
                entry: entry(EntryType::Academic, Some(80.0), Some(0.0)),
                grades: vec![],
            },
            EntryWithGrades {
                entry: entry(EntryType::Academic, Some(100.0), None),
                grades: vec![],
            },
        ];
        assert_eq!(recalc(&entries), 90.0);
    }

    #[test]
    fn entry_with_grades_ignores_its_numeric_value() {
        let mut backed = academic_with(vec![grade(50.0, 100.0, None)]);
        backed.entry.numeric_value = Some(100.0);
        backed.entry.credits = Some(4.0);
        assert_eq!(
            classify_entry(&backed),
            EntryScore::GradeBacked {
                grades: backed.grades.iter().collect()
            }
        );
        assert_eq!(recalc(&[backed]), 50.0);
    }

    #[test]
    fn mixed_modes_combine_into_one_average() {
        let entries = vec![
            academic_with(vec![grade(60.0, 100.0, None), grade(90.0, 100.0, None)]),
            EntryWithGrades {
                entry: entry(EntryType::Academic, Some(100.0), Some(2.0)),
                grades: vec![],
            },
        ];
        // (60 + 90 + 200) / (1 + 1 + 2)
        assert_eq!(recalc(&entries), 87.5);
    }

    #[test]
    fn non_academic_and_empty_inputs_yield_zero() {
        let behavioral = EntryWithGrades {
            entry: entry(EntryType::Behavioral, Some(100.0), None),
            grades: vec![],
        };
        assert_eq!(recalc(&[behavioral]), 0.0);
        assert_eq!(recalc(&[]), 0.0);
        let unscored = EntryWithGrades {
            entry: entry(EntryType::Academic, None, None),
            grades: vec![],
        };
        assert_eq!(classify_entry(&unscored), EntryScore::Unscored);
        assert_eq!(recalc(&[unscored]), 0.0);
    }

    #[test]
    fn gpa_rounds_to_two_decimals() {
        let entries = vec![academic_with(vec![
            grade(1.0, 1.0, None),
            grade(2.0, 3.0, None),
            grade(2.0, 3.0, None),
        ])];
        // (100 + 67 + 67) / 3 = 78.0
        assert_eq!(recalc(&entries), 78.0);
        let weighted = vec![academic_with(vec![
            grade(70.0, 100.0, Some(1.0)),
            grade(80.0, 100.0, Some(2.0)),
        ])];
        // 230 / 3 = 76.666...
        assert_eq!(recalc(&weighted), 76.67);
    }

    #[test]
    fn completion_and_attendance() {
        assert_eq!(completion_percentage(&record(0.0, 0.0, 0)), 0.0);
        assert_eq!(completion_percentage(&record(30.0, 20.0, 0)), 67.0);
        assert_eq!(attendance_percentage(&record(0.0, 0.0, 9)), 95.0);
        assert_eq!(attendance_percentage(&record(0.0, 0.0, 400)), 0.0);
    }

    #[test]
    fn year_complete_by_status_or_credits() {
        let mut r = record(30.0, 30.0, 0);
        assert!(is_year_complete(&r));
        r.completed_credits = 10.0;
        assert!(!is_year_complete(&r));
        r.status = RecordStatus::Completed;
        assert!(is_year_complete(&r));
    }

    #[test]
    fn statistics_average_active_records_only() {
        let mut a = record(30.0, 30.0, 18);
        a.final_gpa = 80.0;
        let mut b = record(30.0, 15.0, 0);
        b.final_gpa = 85.5;
        let mut gone = record(30.0, 30.0, 180);
        gone.final_gpa = 10.0;
        gone.is_active = false;
        let stats = student_statistics(&[a, b, gone]);
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.average_gpa, 82.75);
        assert_eq!(stats.total_credits, 60.0);
        assert_eq!(stats.completed_credits, 45.0);
        assert_eq!(stats.attendance_rate, 95.0);
        assert_eq!(student_statistics(&[]).average_gpa, 0.0);
    }
}
