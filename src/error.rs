use std::io;
use std::path::PathBuf;

use dicom_object::ReadError;

/// Failures raised while classifying, copying or inspecting DICOM files.
#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error("{} is missing required attribute {attribute}", path.display())]
    MissingAttribute {
        path: PathBuf,
        attribute: &'static str,
    },
    #[error("No items selected.")]
    NoSelection,
    #[error("No target folder selected.")]
    NoDestination,
    #[error("I/O failure on {}: {source}", path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: ReadError,
    },
}

impl SortError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SortError::IoFailure {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SortError>;
