// Decoder failure taxonomy.
//
// Every way a decode can go wrong maps to exactly one variant, so callers
// can distinguish "this is not an SMF file" from "the file is an SMF file
// but truncated" from "the caller misused the reader". Per-event skip
// outcomes are NOT errors — they are an `EventRead::Skipped` result from
// `SmfReader::read_event`, and never surface here.

use std::fmt;
use std::io;

/// Everything that can fail while opening or decoding an SMF source.
#[derive(Debug)]
pub enum SmfError {
    /// The source does not begin with the `MThd` magic tag.
    Format,
    /// The header declares SMPTE absolute time (division high bit set).
    /// This encoding is intentionally unsupported.
    UnsupportedTime,
    /// Caller contract violation, e.g. seeking to track 0 or reading
    /// events before a track has been positioned.
    InvalidArgument(&'static str),
    /// The input ended in the middle of a field.
    PrematureEnd,
    /// The byte stream is internally inconsistent.
    Corrupt(&'static str),
    /// The underlying source failed for a reason other than clean
    /// end-of-input.
    Io(io::Error),
}

impl fmt::Display for SmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmfError::Format => write!(f, "not a standard MIDI file (bad MThd tag)"),
            SmfError::UnsupportedTime => {
                write!(f, "SMPTE absolute-time division is not supported")
            }
            SmfError::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            SmfError::PrematureEnd => write!(f, "input ended in the middle of a field"),
            SmfError::Corrupt(what) => write!(f, "corrupt event stream: {what}"),
            SmfError::Io(e) => write!(f, "read failed: {e}"),
        }
    }
}

impl std::error::Error for SmfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SmfError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SmfError {
    fn from(e: io::Error) -> Self {
        SmfError::Io(e)
    }
}
