//! Error taxonomies for encoded games and scoutfish queries.
//!
//! Both enums are closed and carry stable numeric codes so an embedding layer
//! can hand them across a boundary unchanged.

use thiserror::Error;

/// Failure (or deliberate absence of a value) while decoding or replaying a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DecodeError {
    /// Not a failure: the operation legitimately has nothing to return
    /// (ply past the end of the game, exhausted iterator).
    #[error("no value")]
    NoErrorNoValue,
    #[error("cannot decode an empty blob")]
    EmptyBlob,
    #[error("invalid compression level")]
    InvalidCompressionLevel,
    #[error("invalid encoded game construction data")]
    InvalidEncodedGameConstructionData,
    #[error("invalid data during decoding")]
    InvalidDataDuringDecoding,
}

impl DecodeError {
    pub fn code(self) -> u8 {
        match self {
            DecodeError::NoErrorNoValue => 0,
            DecodeError::EmptyBlob => 1,
            DecodeError::InvalidCompressionLevel => 2,
            DecodeError::InvalidEncodedGameConstructionData => 3,
            DecodeError::InvalidDataDuringDecoding => 4,
        }
    }

    /// True for the `NoErrorNoValue` sentinel, which callers must treat as
    /// "no value" rather than as a failure.
    pub fn is_no_value(self) -> bool {
        self == DecodeError::NoErrorNoValue
    }

    /// Flattens an optional result into the sentinel form used by embedders
    /// that only understand a single error code.
    pub fn flatten<T>(result: Result<Option<T>, DecodeError>) -> Result<T, DecodeError> {
        match result {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(DecodeError::NoErrorNoValue),
            Err(e) => Err(e),
        }
    }
}

/// Malformed scoutfish query text.
///
/// The last three variants only arise while writing a compiled query into a
/// caller-provided buffer; no query text can produce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ScoutfishQueryParseError {
    #[error("invalid piece letter")]
    InvalidPiece,
    #[error("invalid imbalance format")]
    InvalidImbalanceFormat,
    #[error("invalid material format")]
    InvalidMaterialFormat,
    #[error("invalid side to move")]
    InvalidSideToMove,
    #[error("invalid SAN")]
    InvalidSan,
    #[error("invalid query syntax or structure")]
    InvalidSyntaxOrStructure,
    #[error("failed to serialize compiled query")]
    SerializationFailed,
    #[error("output buffer too small for compiled query")]
    BufferTooSmall,
    #[error("failed to write compiled query")]
    WriteFailed,
}

impl ScoutfishQueryParseError {
    pub fn code(self) -> u8 {
        match self {
            ScoutfishQueryParseError::InvalidPiece => 1,
            ScoutfishQueryParseError::InvalidImbalanceFormat => 2,
            ScoutfishQueryParseError::InvalidMaterialFormat => 3,
            ScoutfishQueryParseError::InvalidSideToMove => 4,
            ScoutfishQueryParseError::InvalidSan => 5,
            ScoutfishQueryParseError::InvalidSyntaxOrStructure => 6,
            ScoutfishQueryParseError::SerializationFailed => 7,
            ScoutfishQueryParseError::BufferTooSmall => 8,
            ScoutfishQueryParseError::WriteFailed => 9,
        }
    }

    /// Whether this error can only come from compiled-query plumbing.
    pub fn is_internal(self) -> bool {
        self.code() >= 7
    }
}

/// A sub-FEN pattern could not be parsed. Intentionally carries no detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid sub-FEN pattern")]
pub struct SubfenParseError;

/// Failure to build an encoded game from PGN move text.
#[derive(Debug, Error)]
pub enum PgnEncodeError {
    #[error("no game found in PGN")]
    NoGame,
    #[error("parsing error: {0}")]
    Reader(#[from] std::io::Error),
    #[error("illegal move {san} at ply {ply}")]
    IllegalMove { ply: usize, san: String },
    #[error("games from a custom starting position cannot be encoded")]
    CustomStartingPosition,
    #[error("encoding failed: {0}")]
    Encode(#[from] DecodeError),
}
