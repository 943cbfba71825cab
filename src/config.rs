use crate::compositor::{Language, Template};
use crate::error::RecordsResult;
use crate::settings::get_setting;
use rusqlite::Connection;

pub const LOG_FILTER_ENV: &str = "RECORDBOOKD_LOG";
pub const LOG_FORMAT_ENV: &str = "RECORDBOOKD_LOG_FORMAT";
const DEFAULT_LOG_FILTER: &str = "recordbookd=info";

pub const INSTITUTION_NAME_KEY: &str = "institution.name";
pub const INSTITUTION_CODE_KEY: &str = "institution.code";
pub const DEFAULT_LANGUAGE_KEY: &str = "reports.defaultLanguage";
pub const DEFAULT_TEMPLATE_KEY: &str = "reports.defaultTemplate";
const DEFAULT_INSTITUTION_NAME: &str = "Institución Educativa";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

impl LogConfig {
    pub fn from_env() -> Self {
        let filter = std::env::var(LOG_FILTER_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let json = std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        Self { filter, json }
    }
}

/// Workspace-level report settings. Request options override the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub institution_name: String,
    pub institution_code: String,
    pub default_language: Language,
    pub default_template: Template,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            institution_name: DEFAULT_INSTITUTION_NAME.to_string(),
            institution_code: String::new(),
            default_language: Language::Es,
            default_template: Template::Standard,
        }
    }
}

impl ReportConfig {
    pub fn load(conn: &Connection) -> RecordsResult<Self> {
        let mut cfg = Self::default();
        if let Some(v) = string_setting(conn, INSTITUTION_NAME_KEY)? {
            cfg.institution_name = v;
        }
        if let Some(v) = string_setting(conn, INSTITUTION_CODE_KEY)? {
            cfg.institution_code = v;
        }
        if let Some(lang) = string_setting(conn, DEFAULT_LANGUAGE_KEY)?
            .as_deref()
            .and_then(Language::parse)
        {
            cfg.default_language = lang;
        }
        if let Some(template) = string_setting(conn, DEFAULT_TEMPLATE_KEY)?
            .as_deref()
            .and_then(Template::parse)
        {
            cfg.default_template = template;
        }
        Ok(cfg)
    }
}

fn string_setting(conn: &Connection, key: &str) -> RecordsResult<Option<String>> {
    Ok(get_setting(conn, key)?
        .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty()))
}
