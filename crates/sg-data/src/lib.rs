//! Instrument file readers and the native file writer

pub mod config;
pub mod date_format;
pub mod sources;
pub mod writer;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

// Re-exports
pub use config::{NullConfig, ReaderConfig};
pub use date_format::{DatePattern, Zone};
pub use sources::{
    DataFileReader, HoboReader, ReaderRegistry, ReefnetReader, SpeleoReader, WundergroundReader,
};
pub use writer::{save, NATIVE_EXTENSION};

/// Section of a file where reading failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPart {
    /// Magic line, column headers, section markers
    Head,
    /// Row structure
    Body,
    /// Dates and device records
    Data,
    /// A single cell value
    Value,
}

impl fmt::Display for ReadPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadPart::Head => "HEAD",
            ReadPart::Body => "BODY",
            ReadPart::Data => "DATA",
            ReadPart::Value => "VALUE",
        };
        write!(f, "{}", name)
    }
}

/// A file could not be turned into series
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{part} error in {} at line {line}: {message}", path.display())]
pub struct FileReadingError {
    pub part: ReadPart,
    pub path: PathBuf,
    /// 1-based line number, 0 when the whole file is concerned
    pub line: u64,
    pub message: String,
}

impl FileReadingError {
    pub fn new(part: ReadPart, path: &Path, line: u64, message: impl Into<String>) -> Self {
        Self {
            part,
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    pub fn head(path: &Path, line: u64, message: impl Into<String>) -> Self {
        Self::new(ReadPart::Head, path, line, message)
    }

    pub fn body(path: &Path, line: u64, message: impl Into<String>) -> Self {
        Self::new(ReadPart::Body, path, line, message)
    }

    pub fn data(path: &Path, line: u64, message: impl Into<String>) -> Self {
        Self::new(ReadPart::Data, path, line, message)
    }

    pub fn value(path: &Path, line: u64, message: impl Into<String>) -> Self {
        Self::new(ReadPart::Value, path, line, message)
    }
}

/// Errors that can occur while saving series
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("No series to save")]
    NothingToSave,
}

impl From<csv::Error> for WriteError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => {
                WriteError::Io(std::io::Error::new(io_err.kind(), error.to_string()))
            }
            _ => WriteError::Csv(error.to_string()),
        }
    }
}
