use crate::model::RowCol;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::SystemTime;

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Table-level failures of a pipeline run. Any of these halts the run; no partial output is
/// produced alongside them.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The source could not be read or downloaded.
    #[error("Source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    /// The table does not have the header structure that the configured layout expects.
    #[error("Sheet shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    /// The source file was modified after it was loaded, so writing would clobber those changes.
    #[error(
        "Refusing to overwrite '{}': it was modified after it was loaded \
        (loaded {}, now {}). Reload and apply your edits again",
        path.display(),
        fmt_time(*loaded),
        fmt_time(*current)
    )]
    StaleWriteConflict {
        path: PathBuf,
        loaded: SystemTime,
        current: SystemTime,
    },

    /// The loaded source cannot be written back in its original shape.
    #[error("Unable to write back to the source: {0}")]
    UnsupportedWrite(String),

    /// A sum of amounts does not fit in a `Decimal`.
    #[error("The amounts are too large: {what} overflows")]
    Overflow { what: String },
}

impl PipelineError {
    pub(crate) fn unavailable(source_id: impl Into<String>, reason: impl Display) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn shape(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

fn fmt_time(t: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(t)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// A row that could not be turned into a record. These are recovered locally: the row is dropped
/// (or, for amounts under a zero-substitution policy, kept with a zero amount) and the issue is
/// reported next to the successfully parsed records.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RowIssue {
    location: RowCol,
    kind: IssueKind,
    dropped: bool,
}

impl RowIssue {
    pub(crate) fn new(location: RowCol, kind: IssueKind, dropped: bool) -> Self {
        Self {
            location,
            kind,
            dropped,
        }
    }

    pub fn location(&self) -> RowCol {
        self.location
    }

    pub fn kind(&self) -> &IssueKind {
        &self.kind
    }

    /// `false` when the row survived with a substituted value.
    pub fn dropped(&self) -> bool {
        self.dropped
    }
}

impl Display for RowIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let outcome = if self.dropped { "dropped" } else { "kept" };
        write!(f, "{} ({outcome}): {}", self.location.a1(), self.kind)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "issue", content = "value")]
pub enum IssueKind {
    UnparseableAmount(String),
    MissingTag,
    InvalidMonth(String),
}

impl Display for IssueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueKind::UnparseableAmount(s) => write!(f, "unparseable amount '{s}'"),
            IssueKind::MissingTag => write!(f, "missing tag"),
            IssueKind::InvalidMonth(s) => write!(f, "invalid month '{s}'"),
        }
    }
}
