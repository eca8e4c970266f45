//! Error types shared across the crate.

use thiserror::Error;

/// Errors reported by the library.
///
/// Every fallible operation returns exactly one of these. The enum is
/// `Clone` so that memoized derivations can cache a failure and hand the
/// same error back to later callers instead of re-running an expensive
/// scan over a malformed file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A read returned fewer bytes than the operation needed.
    #[error("not enough bytes read")]
    NotEnoughBytesRead,

    /// The file is not an ELF, PE, or Mach-O executable this library handles.
    #[error("unsupported file")]
    UnsupportedFile,

    /// A named or address-resolved section does not exist in the file.
    #[error("section does not exist")]
    SectionDoesNotExist,

    /// None of the version discovery strategies produced a result.
    #[error("no goversion found")]
    NoGoVersionFound,

    /// No PCLN table could be located in the file.
    #[error("no pclntab located")]
    NoPCLNTab,

    /// The version tag is invalid or unknown to the version table.
    #[error("invalid go version")]
    InvalidGoVersion,

    /// No GOROOT path could be recovered from the binary.
    #[error("no goroot found")]
    NoGoRootFound,

    /// The symbol is not present in the file's symbol table.
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    /// The file carries no build information record (Go < 1.13 or stripped).
    #[error("no build info available")]
    NoBuildInfo,

    /// A moduledata candidate failed validation for every known layout.
    #[error("invalid moduledata")]
    InvalidModuledata,

    /// The located moduledata record is truncated.
    #[error("not enough data to decode moduledata")]
    InsufficientDataForModuledata,

    /// A raw build id marker had a start but no terminator.
    #[error("malformed build id")]
    MalformedBuildId,

    /// An I/O failure while opening or mapping the file.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_kind() {
        assert_eq!(Error::NoPCLNTab.to_string(), "no pclntab located");
        assert_eq!(
            Error::SymbolNotFound("runtime.text".into()).to_string(),
            "symbol not found: runtime.text"
        );
    }

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
