//! Error types shared by the conversion, relocation, and batch stages.
use crate::batch::Phase;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The step of a relocation that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelocateErrorKind {
    /// The source file could not be opened for reading.
    OpenSource,
    /// The destination file could not be created.
    OpenDest,
    /// Streaming bytes from source to destination failed.
    Copy,
    /// The destination could not be flushed to stable storage.
    Sync,
    /// The destination did not read back with the same checksum.
    Verify,
    /// The copy is durable but the source file could not be removed.
    RemoveSource,
}

impl fmt::Display for RelocateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OpenSource => "couldn't open source file",
            Self::OpenDest => "couldn't open destination file",
            Self::Copy => "writing to destination file failed",
            Self::Sync => "sync error",
            Self::Verify => "destination checksum mismatch",
            Self::RemoveSource => "failed removing original file",
        };
        f.write_str(s)
    }
}

/// A failed relocation, tagged with the step that failed.
#[derive(Debug, Error)]
#[error("{kind} ({}): {source}", .path.display())]
pub struct RelocateError {
    pub kind: RelocateErrorKind,
    /// The path the failing step was operating on.
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl RelocateError {
    pub(crate) fn new(kind: RelocateErrorKind, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            kind,
            path: path.into(),
            source,
        }
    }
}

/// A failed invocation of the external conversion tool.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("source path {} has no usable file name", .0.display())]
    InvalidSource(PathBuf),
    #[error("failed to launch converter {}: {source}", program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    /// `None` means the process was terminated by a signal.
    #[error("converter exited with unexpected status {}", display_code(.code))]
    ExitStatus { code: Option<i32> },
    #[error("converter reported success but {} was not produced", .0.display())]
    MissingOutput(PathBuf),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "(terminated by signal)".to_string(),
    }
}

/// Coarse classification of why a file ended up in the failed list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    Conversion,
    Relocation(RelocateErrorKind),
    /// The worker itself failed (could not start, or panicked).
    Internal,
    /// Another file in the same batch already claimed this name or output.
    Duplicate,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversion => f.write_str("conversion failed"),
            Self::Relocation(kind) => write!(f, "transfer failed: {kind}"),
            Self::Internal => f.write_str("internal error"),
            Self::Duplicate => f.write_str("duplicate in batch"),
        }
    }
}

/// Any failure on the way from a dropped file to a file on the device.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Conversion(#[from] ConvertError),
    #[error(transparent)]
    Relocation(#[from] RelocateError),
    #[error("{0}")]
    Worker(String),
    #[error("another file in this batch is also sent as {}", .0.display())]
    Duplicate(PathBuf),
}

impl TransferError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Conversion(_) => FailureClass::Conversion,
            Self::Relocation(e) => FailureClass::Relocation(e.kind),
            Self::Worker(_) => FailureClass::Internal,
            Self::Duplicate(_) => FailureClass::Duplicate,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("a batch is already {phase}; wait until it is idle")]
    Busy { phase: Phase },
}
