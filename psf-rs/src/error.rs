use std::path::PathBuf;

/// Represents all possible errors that can occur while reading PSF data.
///
/// Parser variants carry the absolute file offset at which the problem was
/// detected, so a corrupt file can be inspected with a hex viewer.
#[derive(Debug)]
pub enum PsfError {
    /// Fewer bytes remain at `offset` than a read required.
    Truncated { offset: usize, needed: usize },
    /// The first four bytes are not one of the accepted PSF magic numbers.
    BadSignature { offset: usize, signature: u32 },
    /// The table-of-contents scan produced a non-integral entry count or an
    /// offset outside the file.
    BadFooter { offset: usize, message: String },
    /// A section tag, sub-tag or element leader was not one of the expected
    /// values.
    MalformedSection { offset: usize, message: String },
    /// A signal definition references a type id that was never declared.
    UnknownType { offset: usize, type_ref: u32 },
    /// More than one top-level sweep variable was declared.
    UnsupportedSweep { offset: usize },
    /// A length-prefixed string holds bytes that are not valid UTF-8.
    BadEncoding { offset: usize },
    /// A string length is negative or larger than the remaining data.
    BadLength { offset: usize, length: i64 },
    /// A signal name was requested that the file does not contain.
    UnknownName(String),
    /// The `.psfxl` sidecar for a PSF-XL index file is absent.
    SidecarMissing(PathBuf),
    /// A PSF-XL chunk marker does not match the expected grammar.
    BadMarker { offset: usize, message: String },
    /// A PSF-XL payload run could not be Blosc-decompressed.
    BloscDecompress { offset: usize, message: String },
    /// A PSF-XL chunk carries a type field this reader does not decode.
    UnsupportedChunkType { offset: usize, chunk_type: i64 },
    /// The file is an ASCII "logFile"; it belongs to the text decoder, not
    /// the binary one.
    AsciiFile(PathBuf),
    /// Represents an error that occurs during I/O operations.
    Io(std::io::Error),
}

/// Provides a user-friendly string representation for each error variant in `PsfError`.
impl std::fmt::Display for PsfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PsfError::Truncated { offset, needed } => {
                write!(f, "truncated data at {offset:#x}: {needed} more bytes required")
            }
            PsfError::BadSignature { offset, signature } => {
                write!(f, "bad file signature {signature:#x} at {offset:#x}")
            }
            PsfError::BadFooter { offset, message } => {
                write!(f, "bad footer at {offset:#x}: {message}")
            }
            PsfError::MalformedSection { offset, message } => {
                write!(f, "malformed section at {offset:#x}: {message}")
            }
            PsfError::UnknownType { offset, type_ref } => {
                write!(f, "unknown type id {type_ref} referenced at {offset:#x}")
            }
            PsfError::UnsupportedSweep { offset } => {
                write!(f, "more than one sweep variable declared at {offset:#x}")
            }
            PsfError::BadEncoding { offset } => {
                write!(f, "invalid UTF-8 in string at {offset:#x}")
            }
            PsfError::BadLength { offset, length } => {
                write!(f, "implausible string length {length} at {offset:#x}")
            }
            PsfError::UnknownName(name) => write!(f, "signal not found: {name}"),
            PsfError::SidecarMissing(path) => {
                write!(f, "PSF-XL sidecar not found: {}", path.display())
            }
            PsfError::BadMarker { offset, message } => {
                write!(f, "bad chunk marker at {offset:#x}: {message}")
            }
            PsfError::BloscDecompress { offset, message } => {
                write!(f, "Blosc decompression failed at {offset:#x}: {message}")
            }
            PsfError::UnsupportedChunkType { offset, chunk_type } => {
                write!(f, "unsupported chunk type {chunk_type:#x} at {offset:#x}")
            }
            PsfError::AsciiFile(path) => {
                write!(f, "ASCII PSF file (use the logFile decoder): {}", path.display())
            }
            PsfError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

/// Implements the standard error trait for `PsfError`, allowing it to be used with
/// error chaining and other error handling utilities.
impl std::error::Error for PsfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PsfError::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Allows automatic conversion from `std::io::Error` to `PsfError`.
impl From<std::io::Error> for PsfError {
    fn from(error: std::io::Error) -> Self {
        PsfError::Io(error)
    }
}
