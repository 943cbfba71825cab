//! Report composition: builds a typed section model from a record snapshot and
//! renders it to printable text. Nothing here touches the database or disk.

use crate::calc;
use crate::config::ReportConfig;
use crate::model::{EntryType, EntryWithGrades, Grade, Record, RecordSnapshot, StudentProfile};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const SUBJECT_FALLBACK: &str = "Asignatura";
pub const NOT_AVAILABLE: &str = "N/A";
pub const EXEMPT: &str = "EX";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Es,
    En,
}

impl Language {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "es" => Some(Language::Es),
            "en" => Some(Language::En),
            _ => None,
        }
    }

    fn labels(self) -> &'static Labels {
        match self {
            Language::Es => &ES,
            Language::En => &EN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    Standard,
    Detailed,
    Summary,
}

impl Template {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Template::Standard),
            "detailed" => Some(Template::Detailed),
            "summary" => Some(Template::Summary),
            _ => None,
        }
    }
}

struct Labels {
    student_title: &'static str,
    class_title: &'static str,
    code: &'static str,
    student_section: &'static str,
    name: &'static str,
    student_no: &'static str,
    class_group: &'static str,
    academic_year: &'static str,
    summary_section: &'static str,
    gpa: &'static str,
    credits: &'static str,
    attendance: &'static str,
    promotion: &'static str,
    promoted: &'static str,
    retained: &'static str,
    pending: &'static str,
    grades_section: &'static str,
    comment: &'static str,
    late: &'static str,
    excused: &'static str,
    dropped: &'static str,
    attendance_section: &'static str,
    absences: &'static str,
    tardiness: &'static str,
    observations_section: &'static str,
    behavioral_section: &'static str,
    roster_section: &'static str,
    roster_size: &'static str,
    with_record: &'static str,
    generated: &'static str,
    disclaimer: &'static str,
}

static ES: Labels = Labels {
    student_title: "Boletín Académico",
    class_title: "Resumen Académico de Clase",
    code: "Código",
    student_section: "Datos del estudiante",
    name: "Nombre",
    student_no: "Matrícula",
    class_group: "Grupo",
    academic_year: "Año académico",
    summary_section: "Resumen académico",
    gpa: "Promedio",
    credits: "Créditos",
    attendance: "Asistencia",
    promotion: "Situación",
    promoted: "Promovido",
    retained: "Retenido",
    pending: "Pendiente",
    grades_section: "Calificaciones",
    comment: "Comentario",
    late: "tarde",
    excused: "justificado",
    dropped: "descartado",
    attendance_section: "Asistencia",
    absences: "Ausencias",
    tardiness: "Tardanzas",
    observations_section: "Observaciones",
    behavioral_section: "Conducta",
    roster_section: "Estudiantes",
    roster_size: "Estudiantes en la lista",
    with_record: "Estudiantes con expediente",
    generated: "Generado",
    disclaimer: "Este documento es un informe generado automáticamente y no sustituye al certificado oficial.",
};

static EN: Labels = Labels {
    student_title: "Academic Report Card",
    class_title: "Class Academic Summary",
    code: "Code",
    student_section: "Student",
    name: "Name",
    student_no: "Enrollment no.",
    class_group: "Class",
    academic_year: "Academic year",
    summary_section: "Academic summary",
    gpa: "GPA",
    credits: "Credits",
    attendance: "Attendance",
    promotion: "Standing",
    promoted: "Promoted",
    retained: "Retained",
    pending: "Pending",
    grades_section: "Grades",
    comment: "Comment",
    late: "late",
    excused: "excused",
    dropped: "dropped",
    attendance_section: "Attendance",
    absences: "Absences",
    tardiness: "Tardies",
    observations_section: "Observations",
    behavioral_section: "Behavior",
    roster_section: "Students",
    roster_size: "Students on roster",
    with_record: "Students with a record",
    generated: "Generated",
    disclaimer: "This document is an automatically generated report and does not replace the official transcript.",
};

/// Caller-facing options. Absent template/language fall back to the
/// workspace `ReportConfig`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    #[serde(default = "default_true")]
    pub include_grades: bool,
    #[serde(default = "default_true")]
    pub include_attendance: bool,
    #[serde(default = "default_true")]
    pub include_comments: bool,
    #[serde(default = "default_true")]
    pub include_behavioral: bool,
    pub template: Option<Template>,
    pub language: Option<Language>,
}

fn default_true() -> bool {
    true
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_grades: true,
            include_attendance: true,
            include_comments: true,
            include_behavioral: true,
            template: None,
            language: None,
        }
    }
}

impl ReportOptions {
    pub fn language_or(&self, cfg: &ReportConfig) -> Language {
        self.language.unwrap_or(cfg.default_language)
    }

    pub fn template_or(&self, cfg: &ReportConfig) -> Template {
        self.template.unwrap_or(cfg.default_template)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Header,
    Student,
    AcademicSummary,
    Grades,
    Attendance,
    Observations,
    Behavioral,
    ClassRoster,
    Footer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl Line {
    fn labeled(label: &str, text: impl Into<String>) -> Self {
        Self {
            label: Some(label.to_string()),
            text: text.into(),
            details: Vec::new(),
        }
    }

    fn plain(text: impl Into<String>) -> Self {
        Self {
            label: None,
            text: text.into(),
            details: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub kind: SectionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub lines: Vec<Line>,
}

impl Section {
    fn new(kind: SectionKind, heading: Option<&str>) -> Self {
        Self {
            kind,
            heading: heading.map(str::to_string),
            lines: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub title: String,
    pub language: Language,
    pub template: Template,
    pub generated_at: String,
    pub sections: Vec<Section>,
}

impl ReportDocument {
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }
}

fn fmt_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    let s = format!("{:.2}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn year_span(year: i64) -> String {
    format!("{}-{}", year, year.saturating_add(1))
}

pub fn display_gpa(gpa: f64) -> String {
    if gpa == 0.0 {
        NOT_AVAILABLE.to_string()
    } else {
        fmt_number(gpa)
    }
}

/// Exempt wins over any stored grade; a letter wins over a number.
pub fn display_grade(item: &EntryWithGrades) -> String {
    let entry = &item.entry;
    if entry.is_exempt {
        return EXEMPT.to_string();
    }
    if let Some(letter) = entry.letter_grade.as_deref() {
        return letter.to_string();
    }
    match entry.numeric_value {
        Some(v) => fmt_number(v),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn format_date(raw: &str, lang: Language) -> String {
    let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") else {
        return raw.to_string();
    };
    match lang {
        Language::Es => date.format("%d/%m/%Y").to_string(),
        Language::En => date.format("%m/%d/%Y").to_string(),
    }
}

fn format_timestamp(at: DateTime<Utc>, lang: Language) -> String {
    match lang {
        Language::Es => at.format("%d/%m/%Y %H:%M UTC").to_string(),
        Language::En => at.format("%m/%d/%Y %H:%M UTC").to_string(),
    }
}

fn header_section(cfg: &ReportConfig, title: &str, l: &Labels) -> Section {
    let mut s = Section::new(SectionKind::Header, None);
    s.lines.push(Line::plain(cfg.institution_name.clone()));
    if !cfg.institution_code.is_empty() {
        s.lines
            .push(Line::labeled(l.code, cfg.institution_code.clone()));
    }
    s.lines.push(Line::plain(title));
    s
}

fn footer_section(at: DateTime<Utc>, lang: Language) -> Section {
    let l = lang.labels();
    let mut s = Section::new(SectionKind::Footer, None);
    s.lines
        .push(Line::labeled(l.generated, format_timestamp(at, lang)));
    s.lines.push(Line::plain(l.disclaimer));
    s
}

fn promotion_label(record: &Record, l: &Labels) -> &'static str {
    if record.promoted {
        l.promoted
    } else if record.repeat_year {
        l.retained
    } else {
        l.pending
    }
}

fn grade_detail(g: &Grade, l: &Labels) -> String {
    let mut flags = Vec::new();
    if g.is_late {
        flags.push(l.late);
    }
    if g.is_excused {
        flags.push(l.excused);
    }
    if g.is_dropped {
        flags.push(l.dropped);
    }
    let mut out = format!(
        "{}: {}/{} ({}%, {})",
        g.name,
        fmt_number(g.earned_points),
        fmt_number(g.total_points),
        fmt_number(g.percentage),
        g.letter_grade
    );
    if !flags.is_empty() {
        out.push_str(&format!(" [{}]", flags.join(", ")));
    }
    out
}

fn entries_of<'a>(
    snapshot: &'a RecordSnapshot,
    entry_type: EntryType,
) -> impl Iterator<Item = &'a EntryWithGrades> + 'a {
    snapshot
        .entries
        .iter()
        .filter(move |e| e.entry.is_active && e.entry.entry_type == entry_type)
}

pub struct StudentReportInput<'a> {
    pub config: &'a ReportConfig,
    pub options: &'a ReportOptions,
    pub student: &'a StudentProfile,
    pub snapshot: &'a RecordSnapshot,
    pub generated_at: DateTime<Utc>,
}

pub fn compose_student_report(input: &StudentReportInput<'_>) -> ReportDocument {
    let lang = input.options.language_or(input.config);
    let template = input.options.template_or(input.config);
    let l = lang.labels();
    let record = &input.snapshot.record;
    let mut sections = Vec::new();

    sections.push(header_section(input.config, l.student_title, l));

    let mut student = Section::new(SectionKind::Student, Some(l.student_section));
    student
        .lines
        .push(Line::labeled(l.name, input.student.display_name.clone()));
    student.lines.push(Line::labeled(
        l.student_no,
        input
            .student
            .student_no
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    ));
    student
        .lines
        .push(Line::labeled(l.class_group, input.student.class_name.clone()));
    student.lines.push(Line::labeled(
        l.academic_year,
        year_span(record.academic_year),
    ));
    sections.push(student);

    let mut summary = Section::new(SectionKind::AcademicSummary, Some(l.summary_section));
    summary
        .lines
        .push(Line::labeled(l.gpa, display_gpa(record.final_gpa)));
    summary.lines.push(Line::labeled(
        l.credits,
        format!(
            "{}/{}",
            fmt_number(record.completed_credits),
            fmt_number(record.total_credits)
        ),
    ));
    summary.lines.push(Line::labeled(
        l.attendance,
        format!("{}%", fmt_number(calc::attendance_percentage(record))),
    ));
    summary
        .lines
        .push(Line::labeled(l.promotion, promotion_label(record, l)));
    sections.push(summary);

    if input.options.include_grades {
        let mut grades = Section::new(SectionKind::Grades, Some(l.grades_section));
        for item in entries_of(input.snapshot, EntryType::Academic) {
            let subject = item.entry.subject.as_deref().unwrap_or(SUBJECT_FALLBACK);
            let credits = item
                .entry
                .credits
                .map(fmt_number)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            let mut line = Line::labeled(
                subject,
                format!("{} ({}: {})", display_grade(item), l.credits, credits),
            );
            if template != Template::Summary {
                if let Some(comment) = item.entry.comments.as_deref() {
                    line.details.push(format!("{}: {}", l.comment, comment));
                }
            }
            if template == Template::Detailed {
                line.details
                    .extend(item.grades.iter().filter(|g| g.is_active).map(|g| grade_detail(g, l)));
            }
            grades.lines.push(line);
        }
        sections.push(grades);
    }

    if input.options.include_attendance {
        let mut att = Section::new(SectionKind::Attendance, Some(l.attendance_section));
        att.lines
            .push(Line::labeled(l.absences, record.absences.to_string()));
        att.lines
            .push(Line::labeled(l.tardiness, record.tardiness.to_string()));
        att.lines.push(Line::labeled(
            l.attendance,
            format!("{}%", fmt_number(calc::attendance_percentage(record))),
        ));
        sections.push(att);
    }

    if input.options.include_comments {
        if let Some(obs) = record.observations.as_deref().filter(|s| !s.trim().is_empty()) {
            let mut s = Section::new(SectionKind::Observations, Some(l.observations_section));
            s.lines.push(Line::plain(obs));
            sections.push(s);
        }
    }

    if input.options.include_behavioral {
        let mut beh = Section::new(SectionKind::Behavioral, Some(l.behavioral_section));
        for item in entries_of(input.snapshot, EntryType::Behavioral) {
            let date = format_date(&item.entry.entry_date, lang);
            let text = match (template, item.entry.description.as_deref()) {
                (Template::Summary, _) | (_, None) => item.entry.title.clone(),
                (_, Some(desc)) => format!("{}: {}", item.entry.title, desc),
            };
            beh.lines.push(Line::labeled(&date, text));
        }
        sections.push(beh);
    }

    sections.push(footer_section(input.generated_at, lang));

    ReportDocument {
        title: l.student_title.to_string(),
        language: lang,
        template,
        generated_at: input.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        sections,
    }
}

/// One roster row: the student and their record for the year, if any.
pub struct ClassRow<'a> {
    pub student: &'a StudentProfile,
    pub record: Option<&'a Record>,
}

pub struct ClassReportInput<'a> {
    pub config: &'a ReportConfig,
    pub options: &'a ReportOptions,
    pub class_name: &'a str,
    pub academic_year: i64,
    pub rows: &'a [ClassRow<'a>],
    pub generated_at: DateTime<Utc>,
}

pub fn compose_class_report(input: &ClassReportInput<'_>) -> ReportDocument {
    let lang = input.options.language_or(input.config);
    let template = input.options.template_or(input.config);
    let l = lang.labels();
    let mut sections = Vec::new();

    let mut header = header_section(input.config, l.class_title, l);
    header
        .lines
        .push(Line::labeled(l.class_group, input.class_name));
    header.lines.push(Line::labeled(
        l.academic_year,
        year_span(input.academic_year),
    ));
    header
        .lines
        .push(Line::labeled(l.roster_size, input.rows.len().to_string()));
    sections.push(header);

    let mut roster = Section::new(SectionKind::ClassRoster, Some(l.roster_section));
    for row in input.rows {
        // Students without a record for the year are left out.
        let Some(record) = row.record else {
            continue;
        };
        roster.lines.push(Line::labeled(
            &row.student.display_name,
            format!("{}: {}", l.gpa, display_gpa(record.final_gpa)),
        ));
    }
    let present = roster.lines.len();
    roster
        .lines
        .push(Line::labeled(l.with_record, present.to_string()));
    sections.push(roster);

    sections.push(footer_section(input.generated_at, lang));

    ReportDocument {
        title: l.class_title.to_string(),
        language: lang,
        template,
        generated_at: input.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        sections,
    }
}

const RULE: &str = "----------------------------------------";

pub fn render_text(doc: &ReportDocument) -> String {
    let mut out = String::new();
    for (i, section) in doc.sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if let Some(heading) = &section.heading {
            out.push_str(heading);
            out.push('\n');
            out.push_str(RULE);
            out.push('\n');
        }
        for line in &section.lines {
            match &line.label {
                Some(label) => out.push_str(&format!("{}: {}\n", label, line.text)),
                None => {
                    out.push_str(&line.text);
                    out.push('\n');
                }
            }
            for detail in &line.details {
                out.push_str("    ");
                out.push_str(detail);
                out.push('\n');
            }
        }
    }
    out
}
