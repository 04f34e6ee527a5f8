//! Bulk registration of labour profiles from an agency's CSV export.

mod parser;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::workflows::requirements::domain::LabourProfileDraft;

#[derive(Debug)]
pub enum LabourImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for LabourImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabourImportError::Io(err) => write!(f, "failed to read labour export: {}", err),
            LabourImportError::Csv(err) => write!(f, "invalid labour CSV data: {}", err),
        }
    }
}

impl std::error::Error for LabourImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LabourImportError::Io(err) => Some(err),
            LabourImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for LabourImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for LabourImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabourImport {
    pub profiles: Vec<LabourProfileDraft>,
    pub skipped: Vec<SkippedRow>,
}

pub struct LabourCsvImporter;

impl LabourCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<LabourImport, LabourImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Rows without a name or repeating an earlier passport number are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<LabourImport, LabourImportError> {
        let mut import = LabourImport::default();
        let mut passports: HashSet<String> = HashSet::new();

        for row in parser::parse_rows(reader)? {
            if row.name.is_empty() {
                import.skipped.push(SkippedRow {
                    line: row.line,
                    reason: "missing name".to_string(),
                });
                continue;
            }

            if let Some(passport) = &row.passport_number {
                if !passports.insert(passport.clone()) {
                    import.skipped.push(SkippedRow {
                        line: row.line,
                        reason: format!("duplicate passport number {passport}"),
                    });
                    continue;
                }
            }

            import.profiles.push(LabourProfileDraft {
                name: row.name,
                nationality: row.nationality,
                passport_number: row.passport_number,
                profession: row.profession,
            });
        }

        Ok(import)
    }
}
