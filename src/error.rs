use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdfError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid file format: {0}")]
    Format(#[from] FormatError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl EdfError {
    /// Returns `true` when the input bytes were rejected as malformed EDF,
    /// as opposed to the file being unreachable or the writer being misused.
    pub fn is_format_error(&self) -> bool {
        matches!(self, EdfError::Format(_))
    }
}

/// Every way a byte stream can fail to decode as EDF.
///
/// Decoding is all-or-nothing: any of these aborts the parse and no
/// sensors or timestamps are returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("unexpected end of data at byte {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{field} field at byte {offset} is not a valid number: {text:?}")]
    InvalidNumber {
        field: &'static str,
        offset: usize,
        text: String,
    },

    #[error("invalid number of signals: {0}")]
    InvalidSignalCount(i64),

    #[error("channel {channel} declares {count} samples per record")]
    InvalidSampleCount { channel: usize, count: i64 },

    #[error("channel {channel} has digital minimum equal to digital maximum ({value})")]
    EmptyDigitalRange { channel: usize, value: i64 },

    #[error("incomplete data record at byte {offset}: channel {channel} needs {needed} bytes, {available} available")]
    IncompleteRecord {
        channel: usize,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("data record size overflows at channel {channel}")]
    RecordTooLarge { channel: usize },

    #[error("{remaining} trailing bytes but data records are empty")]
    UnconsumableData { remaining: usize },
}

pub type Result<T> = std::result::Result<T, EdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_errors_convert() {
        let err: EdfError = FormatError::InvalidSignalCount(-1).into();
        assert!(err.is_format_error());
        assert_eq!(err.to_string(), "Invalid file format: invalid number of signals: -1");

        let io_err: EdfError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(!io_err.is_format_error());
    }
}
