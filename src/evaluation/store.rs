//! Durable per-subset reports with atomic completion markers.
//!
//! Layout inside the reports directory:
//! - `<subset>.csv`: `retrieved,expected,result` rows, one per query
//! - `<subset>.done.json`: [`CompletionMarker`], written only after the report
//!   has been flushed and renamed into place
//! - `.namematch.lock`: held by a running experiment
//!
//! A subset counts as complete only when its marker exists and the marker's
//! checksum matches the report bytes on disk.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::classify::ConfusionLabel;
use super::metrics::ConfusionCounts;
use super::subsets::FieldSubset;
use crate::tabular::{format_record, parse_records};

pub const REPORT_EXTENSION: &str = "csv";
pub const MARKER_SUFFIX: &str = ".done.json";
pub const LOCK_FILE: &str = ".namematch.lock";

const HEADER: [&str; 3] = ["retrieved", "expected", "result"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("reports directory {0} is locked by another run")]
    Locked(PathBuf),
    #[error("no completed report for subset '{0}'")]
    Missing(String),
}

impl StoreError {
    fn parse(path: &Path, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub retrieved: String,
    pub expected: String,
    pub result: ConfusionLabel,
}

/// Ordered query results for one field subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetResultReport {
    pub subset: FieldSubset,
    pub rows: Vec<ReportRow>,
}

impl SubsetResultReport {
    pub fn new(subset: FieldSubset) -> Self {
        Self {
            subset,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: ReportRow) {
        self.rows.push(row);
    }

    pub fn counts(&self) -> ConfusionCounts {
        self.rows.iter().map(|r| r.result).collect()
    }

    pub fn to_csv(&self) -> String {
        let mut out = format_record(&HEADER);
        for row in &self.rows {
            out.push_str(&format_record(&[
                &row.retrieved,
                &row.expected,
                row.result.as_str(),
            ]));
        }
        out
    }

    pub fn from_csv(subset: FieldSubset, text: &str, path: &Path) -> Result<Self, StoreError> {
        let records = parse_records(text).map_err(|e| StoreError::parse(path, e.to_string()))?;
        let mut iter = records.into_iter();
        match iter.next() {
            Some(header) if header == HEADER => {}
            Some(header) => {
                return Err(StoreError::parse(
                    path,
                    format!("unexpected header {header:?}"),
                ))
            }
            None => return Err(StoreError::parse(path, "missing header")),
        }

        let mut report = SubsetResultReport::new(subset);
        for (idx, record) in iter.enumerate() {
            let [retrieved, expected, result]: [String; 3] = record.try_into().map_err(|r: Vec<String>| {
                StoreError::parse(path, format!("row {} has {} columns, expected 3", idx + 1, r.len()))
            })?;
            let result = result
                .parse::<ConfusionLabel>()
                .map_err(|e| StoreError::parse(path, format!("row {}: {e}", idx + 1)))?;
            report.push(ReportRow {
                retrieved,
                expected,
                result,
            });
        }
        Ok(report)
    }
}

/// Proof that a subset's report was fully written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub subset: FieldSubset,
    pub rows: usize,
    pub counts: ConfusionCounts,
    /// blake3 hex digest of the report file bytes.
    pub checksum: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn report_path(&self, subset: &FieldSubset) -> PathBuf {
        self.dir
            .join(format!("{}.{REPORT_EXTENSION}", subset.canonical_name()))
    }

    pub fn marker_path(&self, subset: &FieldSubset) -> PathBuf {
        self.dir
            .join(format!("{}{MARKER_SUFFIX}", subset.canonical_name()))
    }

    /// Exclusive lock for the duration of a run.
    pub fn lock(&self) -> Result<RunLock, StoreError> {
        RunLock::acquire(&self.dir.join(LOCK_FILE))
    }

    /// Whether a verified report exists for `subset`.
    pub fn is_complete(&self, subset: &FieldSubset) -> Result<bool, StoreError> {
        Ok(self.verified_marker(subset)?.is_some())
    }

    fn verified_marker(&self, subset: &FieldSubset) -> Result<Option<CompletionMarker>, StoreError> {
        let marker_path = self.marker_path(subset);
        if !marker_path.exists() {
            return Ok(None);
        }
        let marker: CompletionMarker = match serde_json::from_str(&fs::read_to_string(&marker_path)?) {
            Ok(marker) => marker,
            Err(e) => {
                tracing::warn!(path = %marker_path.display(), error = %e, "unreadable completion marker");
                return Ok(None);
            }
        };
        let report_path = self.report_path(subset);
        if !report_path.exists() {
            tracing::warn!(subset = %subset, "completion marker without report");
            return Ok(None);
        }
        let bytes = fs::read(&report_path)?;
        if checksum(&bytes) != marker.checksum {
            tracing::warn!(subset = %subset, "report checksum mismatch; treating as incomplete");
            return Ok(None);
        }
        Ok(Some(marker))
    }

    /// Persist `report` and then its completion marker, each atomically.
    pub fn write(&self, report: &SubsetResultReport) -> Result<CompletionMarker, StoreError> {
        let csv = report.to_csv();
        write_atomic(&self.report_path(&report.subset), csv.as_bytes())?;

        let marker = CompletionMarker {
            subset: report.subset.clone(),
            rows: report.rows.len(),
            counts: report.counts(),
            checksum: checksum(csv.as_bytes()),
            completed_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&marker)?;
        write_atomic(&self.marker_path(&report.subset), &json)?;
        Ok(marker)
    }

    /// Read a completed report.
    pub fn read(&self, subset: &FieldSubset) -> Result<SubsetResultReport, StoreError> {
        if self.verified_marker(subset)?.is_none() {
            return Err(StoreError::Missing(subset.canonical_name()));
        }
        let path = self.report_path(subset);
        let text = fs::read_to_string(&path)?;
        SubsetResultReport::from_csv(subset.clone(), &text, &path)
    }

    /// Every subset with a verified report, sorted by canonical name.
    ///
    /// Report files without a valid marker are skipped with a warning.
    pub fn completed_subsets(&self) -> Result<Vec<FieldSubset>, StoreError> {
        let mut complete = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stem) = file_name.strip_suffix(&format!(".{REPORT_EXTENSION}")) else {
                continue;
            };
            let subset = match FieldSubset::parse(stem) {
                Ok(subset) => subset,
                Err(e) => {
                    tracing::warn!(file = file_name, error = %e, "skipping report with invalid name");
                    continue;
                }
            };
            if self.is_complete(&subset)? {
                complete.push(subset);
            } else {
                tracing::warn!(subset = %subset, "skipping report without completion marker");
            }
        }
        complete.sort_by_key(|s| s.canonical_name());
        Ok(complete)
    }
}

/// Guard holding the exclusive lock on the reports directory.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
}

impl RunLock {
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(path.parent().unwrap_or(path).to_path_buf()))?;
        Ok(Self { _file: file })
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StoreError::parse(path, "invalid file name"))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
