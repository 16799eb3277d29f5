//! Golden-file comparison of record lines
//!
//! Expected files hold the record lines of a run without their prefix, one
//! per line. A `key=*` in an expected line matches any run of digits in that
//! position, for values such as capacities that vary between library builds.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

/// Placeholder used when one side has fewer lines than the other
pub const MISSING_LINE: &str = "<missing>";

#[derive(Debug, thiserror::Error)]
pub enum ExpectError {
    #[error("Expected output {} not found (run with --update to create it)", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read expected output {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write expected output {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// 1-based
    pub line: usize,
    pub actual: String,
    pub expected: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "line {}:", self.line)?;
        writeln!(f, "  expected: {}", self.expected)?;
        write!(f, "  actual:   {}", self.actual)
    }
}

pub fn line_matches(actual: &str, expected: &str) -> bool {
    if !expected.contains("=*") {
        return actual == expected;
    }
    let pattern = regex::escape(expected).replace(r"=\*", r"=\d+");
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(re) => re.is_match(actual),
        Err(e) => {
            tracing::warn!(expected = %expected, error = %e, "Unusable expected line");
            false
        }
    }
}

pub fn compare_output(actual: &[String], expected: &[String]) -> Vec<Mismatch> {
    let total = actual.len().max(expected.len());
    (0..total)
        .filter_map(|i| {
            let act = actual.get(i).map(|s| s.trim()).unwrap_or(MISSING_LINE);
            let exp = expected.get(i).map(|s| s.trim()).unwrap_or(MISSING_LINE);
            (!line_matches(act, exp)).then(|| Mismatch {
                line: i + 1,
                actual: act.to_string(),
                expected: exp.to_string(),
            })
        })
        .collect()
}

/// Non-blank lines of an expected-output file.
pub fn read_expected(path: &Path) -> Result<Vec<String>, ExpectError> {
    let contents = fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExpectError::NotFound(path.to_path_buf())
        } else {
            ExpectError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn write_expected(path: &Path, lines: &[String]) -> Result<(), ExpectError> {
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(path, contents).map_err(|source| ExpectError::Write {
        path: path.to_path_buf(),
        source,
    })
}
