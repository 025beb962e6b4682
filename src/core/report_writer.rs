use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use crate::models::report::Report;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("report could not be written to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the JSON report ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSink {
    Stdout,
    File(PathBuf),
}

/// Writes the report as pretty JSON to `output`, or to stdout without one.
pub fn write_report(report: &Report, output: Option<&Path>) -> Result<ReportSink, ReportError> {
    let json = report.to_json_pretty()?;
    match output {
        Some(path) => {
            fs::write(path, json + "\n").map_err(|source| ReportError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), "report written");
            Ok(ReportSink::File(path.to_path_buf()))
        }
        None => {
            println!("{json}");
            Ok(ReportSink::Stdout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::report::ProbeRecord;
    use crate::models::verdict::Verdict;

    #[test]
    fn writes_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut report = Report::default();
        report.record(ProbeRecord {
            id: "caps".into(),
            group: "general".into(),
            path: "/".into(),
            method: "GET".into(),
            verdict: Verdict::Valid(None),
        });
        let sink = write_report(&report, Some(&path)).unwrap();
        assert_eq!(sink, ReportSink::File(path.clone()));
        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["general"]["group_summary"], "Valid");
        assert_eq!(written["general"]["endpoints"]["caps"]["type"], "GET");
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");
        let err = write_report(&Report::default(), Some(&path)).unwrap_err();
        assert!(matches!(err, ReportError::Write { .. }));
    }
}
