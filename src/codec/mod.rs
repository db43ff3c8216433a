//! Encoded game container: decoding, encoding and recompression.
//!
//! Every buffer ends with a one-byte trailer. Bits 7-6 hold the compression
//! level, bits 2-0 the number of zero padding bits in the last payload byte
//! (bit-packed levels only), bits 5-3 are reserved and must be zero.
//! All games start from the standard initial position.

mod bits;
mod compact;
mod naive;
mod ranked;

use shakmaty::{Chess, Move, Position, Role, Square};

use crate::error::DecodeError;

/// Trade-off between encoded size and replay cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionLevel {
    /// Two bytes per ply; no move generation needed to locate a move.
    #[default]
    Low = 0,
    /// Piece index plus a role-specific destination index, bit-packed.
    Medium = 1,
    /// Rank in a heuristically ordered legal move list, prefix coded.
    High = 2,
}

impl CompressionLevel {
    pub const ALL: [CompressionLevel; 3] = [
        CompressionLevel::Low,
        CompressionLevel::Medium,
        CompressionLevel::High,
    ];
}

impl TryFrom<u8> for CompressionLevel {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressionLevel::Low),
            1 => Ok(CompressionLevel::Medium),
            2 => Ok(CompressionLevel::High),
            _ => Err(DecodeError::InvalidCompressionLevel),
        }
    }
}

const LEVEL_SHIFT: u8 = 6;
const PADDING_MASK: u8 = 0b0000_0111;
const RESERVED_MASK: u8 = 0b0011_1000;

fn trailer(level: CompressionLevel, padding: u8) -> u8 {
    ((level as u8) << LEVEL_SHIFT) | (padding & PADDING_MASK)
}

/// Splits a buffer into level, payload and padding bit count.
fn split_trailer(bytes: &[u8]) -> Result<(CompressionLevel, &[u8], u8), DecodeError> {
    let (&last, payload) = bytes.split_last().ok_or(DecodeError::EmptyBlob)?;
    let level = CompressionLevel::try_from(last >> LEVEL_SHIFT)?;
    if last & RESERVED_MASK != 0 {
        return Err(DecodeError::InvalidEncodedGameConstructionData);
    }

    let padding = last & PADDING_MASK;
    let padding_allowed = level != CompressionLevel::Low && !payload.is_empty();
    if padding != 0 && !padding_allowed {
        return Err(DecodeError::InvalidEncodedGameConstructionData);
    }

    Ok((level, payload, padding))
}

/// Reads only the trailer of an encoded buffer.
pub fn compression_level(bytes: &[u8]) -> Result<CompressionLevel, DecodeError> {
    split_trailer(bytes).map(|(level, _, _)| level)
}

/// A decoded game: the validated move list from the standard start position.
///
/// Only constructed through decoding or [`ParsedGame::from_moves`], both of
/// which check every move for legality, so replaying it cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGame {
    level: CompressionLevel,
    moves: Vec<Move>,
}

impl ParsedGame {
    /// Validates a move list played from the standard start position.
    pub fn from_moves(moves: Vec<Move>) -> Result<ParsedGame, DecodeError> {
        let mut pos = Chess::default();
        for &m in &moves {
            if !pos.legal_moves().contains(&m) {
                return Err(DecodeError::InvalidDataDuringDecoding);
            }
            pos.play_unchecked(m);
        }
        Ok(ParsedGame {
            level: CompressionLevel::default(),
            moves,
        })
    }

    /// Level of the buffer this game was decoded from.
    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Number of plies.
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Encodes the move list at `level`.
    pub fn encode(&self, level: CompressionLevel) -> Result<Vec<u8>, DecodeError> {
        let (mut bytes, padding) = match level {
            CompressionLevel::Low => (naive::encode(&self.moves)?, 0),
            CompressionLevel::Medium => compact::encode(&self.moves)?,
            CompressionLevel::High => ranked::encode(&self.moves)?,
        };
        bytes.push(trailer(level, padding));
        Ok(bytes)
    }
}

/// Decodes and validates an encoded game.
pub fn decode(bytes: &[u8]) -> Result<ParsedGame, DecodeError> {
    let (level, payload, padding) = split_trailer(bytes)?;
    let moves = match level {
        CompressionLevel::Low => naive::decode(payload),
        CompressionLevel::Medium => compact::decode(payload, padding),
        CompressionLevel::High => ranked::decode(payload, padding),
    }
    .inspect_err(|e| {
        tracing::debug!(error = %e, len = bytes.len(), ?level, "failed to decode game");
    })?;

    Ok(ParsedGame { level, moves })
}

/// Re-encodes a buffer at another compression level.
///
/// The input is only read; an invalid level is rejected before any decoding.
pub fn recompress(bytes: &[u8], level: u8) -> Result<Vec<u8>, DecodeError> {
    let level = CompressionLevel::try_from(level)?;
    decode(bytes)?.encode(level)
}

/// Square the king lands on when castling with the rook on `rook`.
pub(crate) fn castle_king_destination(king: Square, rook: Square) -> u8 {
    let rank_start = (king as u8) & !7;
    if rook as u8 > king as u8 {
        rank_start + 6
    } else {
        rank_start + 2
    }
}

/// Looks up the legal move described by origin, destination and promotion.
///
/// Castling may be given either as king-to-rook or as king-to-destination.
pub(crate) fn find_legal_move(
    pos: &Chess,
    from: u8,
    to: u8,
    promotion: Option<Role>,
) -> Result<Move, DecodeError> {
    if from > 63 || to > 63 {
        return Err(DecodeError::InvalidDataDuringDecoding);
    }

    pos.legal_moves()
        .into_iter()
        .find(|m| match *m {
            Move::Castle { king, rook } => {
                king as u8 == from
                    && promotion.is_none()
                    && (rook as u8 == to || castle_king_destination(king, rook) == to)
            }
            _ => {
                m.from().map(|sq| sq as u8) == Some(from)
                    && m.to() as u8 == to
                    && m.promotion() == promotion
            }
        })
        .ok_or(DecodeError::InvalidDataDuringDecoding)
}

/// Square with index `index`, rejecting anything off the board.
pub(crate) fn square(index: i32) -> Result<Square, DecodeError> {
    if (0..64).contains(&index) {
        Ok(Square::new(index as u32))
    } else {
        Err(DecodeError::InvalidDataDuringDecoding)
    }
}
