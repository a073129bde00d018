use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    /// Input file missing, unreadable, or lacking a required column.
    Input(String),
    /// A data row could not be turned into a recipient.
    RowData { row: usize, reason: String },
    Layout { row: usize, source: LayoutError },
    /// A recipient failed verification under the abort policy.
    Verification { row: usize, reason: String },
    Config(String),
    Output { path: PathBuf, source: std::io::Error },
    Csv(csv::Error),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Input(reason) => write!(f, "invalid input: {reason}"),
            Error::RowData { row, reason } => write!(f, "row {row}: {reason}"),
            Error::Layout { row, source } => write!(f, "row {row}: {source}"),
            Error::Verification { row, reason } => {
                write!(f, "row {row}: address not verified: {reason}")
            }
            Error::Config(reason) => write!(f, "configuration error: {reason}"),
            Error::Output { path, source } => {
                write!(f, "cannot write {}: {source}", path.display())
            }
            Error::Csv(e) => write!(f, "CSV error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Layout { source, .. } => Some(source),
            Error::Output { source, .. } => Some(source),
            Error::Csv(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// The recipient block cannot be placed on the page.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    BlockTooWide { width: f32, page_width: f32 },
    EmptyBlock,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::BlockTooWide { width, page_width } => write!(
                f,
                "recipient block is {width:.1}pt wide, wider than the {page_width:.1}pt page"
            ),
            LayoutError::EmptyBlock => write!(f, "recipient block has no lines"),
        }
    }
}

impl std::error::Error for LayoutError {}

/// The verification check itself could not be performed.
#[derive(Debug)]
pub enum VerifyError {
    Network(String),
    Service(String),
    MalformedResponse(String),
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::Network(e) => write!(f, "network error: {e}"),
            VerifyError::Service(e) => write!(f, "service error: {e}"),
            VerifyError::MalformedResponse(e) => write!(f, "malformed response: {e}"),
        }
    }
}

impl std::error::Error for VerifyError {}

impl From<roxmltree::Error> for VerifyError {
    fn from(e: roxmltree::Error) -> Self {
        VerifyError::MalformedResponse(e.to_string())
    }
}
