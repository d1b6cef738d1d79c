use std::{error, fmt, io};

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Error taxonomy shared by the core engine, the transfer primitives and the
/// device backend.
///
/// Per-path occurrences of `NotFound`, `Transport`, `QuotaExceeded` and
/// `Cancelled` during a reconciliation run are recorded in the run summary
/// instead of aborting the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Error {
    NotFound(Utf8PathBuf),
    AlreadyExists(Utf8PathBuf),
    ParentMissing(Utf8PathBuf),
    TypeMismatch(Utf8PathBuf),
    Ambiguous {
        fragment: String,
        matches: Vec<String>,
    },
    Transport(String),
    Cancelled,
    QuotaExceeded,
    Io(String),
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "No such entry: {path}"),
            Self::AlreadyExists(path) => write!(f, "Entry already exists: {path}"),
            Self::ParentMissing(path) => write!(f, "Parent folder is missing for: {path}"),
            Self::TypeMismatch(path) => {
                write!(f, "File on one side, folder on the other: {path}")
            }
            Self::Ambiguous { fragment, matches } => {
                write!(
                    f,
                    "'{fragment}' matches {} entries: {}",
                    matches.len(),
                    matches.join(", ")
                )
            }
            Self::Transport(msg) => write!(f, "Transport error: {msg}"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::QuotaExceeded => f.write_str("Device storage quota exceeded"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl error::Error for Error {}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<camino::FromPathBufError> for Error {
    fn from(value: camino::FromPathBufError) -> Self {
        Self::Io(format!(
            "Non UTF-8 path: {}",
            value.as_path().display()
        ))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! io_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Io(format!($($t)*)));
    };
}

#[macro_export]
macro_rules! transport_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Transport(format!($($t)*)));
    };
}

#[macro_export]
macro_rules! config_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Config(format!($($t)*)));
    };
}

#[macro_export]
macro_rules! transport_error {
    ($($t:tt)*) => {
        $crate::Error::Transport(format!($($t)*))
    };
}
