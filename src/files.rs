//! Generated report files under `<workspace>/reports/`.

use crate::error::{RecordsError, RecordsResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const REPORTS_DIR: &str = "reports";
pub const REPORT_EXTENSION: &str = "txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
    Student,
    Class,
}

impl ReportScope {
    fn prefix(self) -> &'static str {
        match self {
            ReportScope::Student => "student-report",
            ReportScope::Class => "class-report",
        }
    }
}

fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// `{scope}_{subject}_{year}_{timestamp}.txt`, timestamp in microseconds.
pub fn report_file_name(
    scope: ReportScope,
    subject_id: &str,
    academic_year: i64,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        scope.prefix(),
        sanitize_component(subject_id),
        academic_year,
        at.format("%Y%m%dT%H%M%S%6fZ"),
        REPORT_EXTENSION
    )
}

/// Plain file names only: no separators, no parent references.
pub fn validate_file_name(name: &str) -> RecordsResult<()> {
    let bad = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.contains('\0')
        || name.starts_with('.');
    if bad {
        return Err(RecordsError::validation(format!(
            "invalid report file name: {}",
            name
        )));
    }
    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub file_name: String,
    pub size: u64,
    pub sha256: String,
}

pub struct ReportFiles {
    dir: PathBuf,
}

impl ReportFiles {
    pub fn for_workspace(workspace: &Path) -> Self {
        Self {
            dir: workspace.join(REPORTS_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, name: &str) -> RecordsResult<PathBuf> {
        validate_file_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Create-new write; an existing file with the same name is a Conflict.
    pub fn write(&self, name: &str, bytes: &[u8]) -> RecordsResult<StoredFile> {
        let path = self.path_of(name)?;
        std::fs::create_dir_all(&self.dir)?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RecordsError::conflict(format!(
                    "report file already exists: {}",
                    name
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let written = file.write_all(bytes).and_then(|_| file.sync_all());
        drop(file);
        if let Err(e) = written {
            // Leave no partial report behind.
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }
        Ok(StoredFile {
            file_name: name.to_string(),
            size: bytes.len() as u64,
            sha256: sha256_hex(bytes),
        })
    }

    pub fn exists(&self, name: &str) -> RecordsResult<bool> {
        Ok(self.path_of(name)?.is_file())
    }

    pub fn read(&self, name: &str) -> RecordsResult<Vec<u8>> {
        let path = self.path_of(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RecordsError::not_found(format!(
                "report not found: {}",
                name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns whether a file was removed; a missing file is not an error.
    pub fn delete(&self, name: &str) -> RecordsResult<bool> {
        let path = self.path_of(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Report files, newest name last.
    pub fn list(&self) -> RecordsResult<Vec<StoredFile>> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for ent in read_dir {
            let ent = ent?;
            let path = ent.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if path.extension().and_then(|s| s.to_str()) != Some(REPORT_EXTENSION) {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            out.push(StoredFile {
                file_name: name.to_string(),
                size: bytes.len() as u64,
                sha256: sha256_hex(&bytes),
            });
        }
        out.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(out)
    }
}
