use std::fmt;
use std::fmt::Formatter;

#[derive(Debug)]
pub enum Error {
    /// The feature-name list passed to training was empty.
    NoFeatures,
    /// A row of the feature matrix does not match the feature count.
    RaggedMatrix {
        row: usize,
        expected: usize,
        found: usize,
    },
    /// A stored model carries a format version this build does not understand.
    UnsupportedModelVersion { found: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFeatures => write!(f, "feature-name list must not be empty"),
            Self::RaggedMatrix {
                row,
                expected,
                found,
            } => write!(
                f,
                "row {} has {} values but the feature set has {}",
                row, found, expected
            ),
            Self::UnsupportedModelVersion { found } => {
                write!(f, "unsupported stored model format version {}", found)
            }
        }
    }
}

impl std::error::Error for Error {}
