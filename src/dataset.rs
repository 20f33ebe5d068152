//! Name lists: the upload set and the expected/misspelled evaluation pairs.

use std::path::{Path, PathBuf};

use crate::tabular::parse_rows;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("expected names ({expected}) and misspelled names ({misspelled}) differ in length")]
    LengthMismatch { expected: usize, misspelled: usize },
}

/// Read one name per record, taking the first CSV column.
///
/// Row order is what pairs expected names with misspelled queries, so a blank
/// row inside the data is an error. Trailing blank lines are allowed.
pub fn load_names(path: impl AsRef<Path>) -> Result<Vec<String>, DatasetError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rows = parse_rows(&text).map_err(|e| DatasetError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    while rows.last().is_some_and(|row| row.is_blank()) {
        rows.pop();
    }

    let mut names = Vec::with_capacity(rows.len());
    for row in rows {
        match row.fields.into_iter().next() {
            Some(name) => names.push(name),
            None => {
                return Err(DatasetError::Parse {
                    path: path.to_path_buf(),
                    message: format!("blank row on line {}", row.line),
                })
            }
        }
    }
    Ok(names)
}

/// Expected names paired by row with their misspelled queries.
///
/// Row i of `misspelled` is always scored against row i of `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameDataset {
    expected: Vec<String>,
    misspelled: Vec<String>,
}

impl NameDataset {
    pub fn new(expected: Vec<String>, misspelled: Vec<String>) -> Result<Self, DatasetError> {
        if expected.len() != misspelled.len() {
            return Err(DatasetError::LengthMismatch {
                expected: expected.len(),
                misspelled: misspelled.len(),
            });
        }
        Ok(Self {
            expected,
            misspelled,
        })
    }

    pub fn load(
        expected_path: impl AsRef<Path>,
        misspelled_path: impl AsRef<Path>,
    ) -> Result<Self, DatasetError> {
        Self::new(load_names(expected_path)?, load_names(misspelled_path)?)
    }

    pub fn len(&self) -> usize {
        self.expected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    /// `(expected, misspelled)` in row order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.expected
            .iter()
            .zip(&self.misspelled)
            .map(|(e, m)| (e.as_str(), m.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = NameDataset::new(vec!["a".into(), "b".into()], vec!["x".into()]).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::LengthMismatch {
                expected: 2,
                misspelled: 1
            }
        ));
    }

    #[test]
    fn first_column_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.csv");
        std::fs::write(&path, "Smith,ignored\nJones\n\"Doe, Jr\"\n\n\n").unwrap();
        assert_eq!(load_names(&path).unwrap(), vec!["Smith", "Jones", "Doe, Jr"]);
    }

    #[test]
    fn blank_rows_inside_the_data_cannot_shift_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().join("names-expected.csv");
        let misspelled = dir.path().join("names-misspelled.csv");
        std::fs::write(&expected, "Smith\n\nJones\nBrown\n").unwrap();
        std::fs::write(&misspelled, "Smyth\nJnoes\n\nBrwon\n").unwrap();

        let err = NameDataset::load(&expected, &misspelled).unwrap_err();
        match err {
            DatasetError::Parse { path, message } => {
                assert_eq!(path, expected);
                assert_eq!(message, "blank row on line 2");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = load_names(&misspelled).unwrap_err();
        assert!(err.to_string().contains("blank row on line 3"));
    }
}
