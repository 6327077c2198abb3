//! Issue snapshots read from files instead of the store.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::models::IssueRecord;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON snapshot {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid CSV snapshot {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

/// Loads a snapshot, choosing the format from the file extension (`.csv`
/// for CSV, anything else as JSON).
pub fn load(path: &Path) -> Result<Vec<IssueRecord>, SnapshotError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => load_csv(path),
        _ => load_json(path),
    }
}

/// Reads a JSON array of issue documents.
pub fn load_json(path: &Path) -> Result<Vec<IssueRecord>, SnapshotError> {
    let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct CsvRow {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub resolved_at: Option<String>,
}

impl From<CsvRow> for IssueRecord {
    fn from(row: CsvRow) -> Self {
        IssueRecord {
            id: row.id,
            kind: row.kind,
            description: row.description,
            location: row.location,
            status: row.status,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        }
    }
}

/// Reads CSV rows with header `id,type,description,location,status,created_at,resolved_at`.
/// Empty cells are absent values.
pub fn load_csv(path: &Path) -> Result<Vec<IssueRecord>, SnapshotError> {
    let csv_error = |source: csv::Error| SnapshotError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let mut issues = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        issues.push(result.map_err(csv_error)?.into());
    }

    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(suffix: &str) -> tempfile::NamedTempFile {
        tempfile::Builder::new().suffix(suffix).tempfile().unwrap()
    }

    #[test]
    fn loads_json_documents() {
        let mut file = temp_file(".json");
        write!(
            file,
            r#"[
                {{"id": "1", "type": "corruption", "status": "pending",
                  "created_at": "2025-05-01T10:00:00Z", "location": "Ward 3"}},
                {{"id": "2", "created_at": 1746093600000}}
            ]"#
        )
        .unwrap();

        let issues = load(file.path()).unwrap();

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].location.as_deref(), Some("Ward 3"));
        assert_eq!(issues[1].kind, None);
        assert_eq!(issues[1].created_at.as_deref(), Some("1746093600000"));
    }

    #[test]
    fn loads_csv_with_empty_cells() {
        let mut file = temp_file(".csv");
        writeln!(
            file,
            "id,type,description,location,status,created_at,resolved_at"
        )
        .unwrap();
        writeln!(
            file,
            "1,infrastructure,Broken culvert,Ward 7,resolved,2025-05-01,2025-05-04"
        )
        .unwrap();
        writeln!(file, "2,scheme,Pension delayed,,pending,2025-05-02,").unwrap();

        let issues = load(file.path()).unwrap();

        assert_eq!(issues.len(), 2);
        assert!(issues[0].is_resolved());
        assert_eq!(issues[0].resolved_at.as_deref(), Some("2025-05-04"));
        assert_eq!(issues[1].location, None);
        assert_eq!(issues[1].resolved_at, None);
    }

    #[test]
    fn reports_malformed_json_with_path() {
        let mut file = temp_file(".json");
        write!(file, "{{\"id\": 1").unwrap();

        let err = load_json(file.path()).unwrap_err();

        assert!(matches!(err, SnapshotError::Json { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_json(&dir.path().join("absent.json")).unwrap_err();

        assert!(matches!(err, SnapshotError::Io { .. }));
    }
}
