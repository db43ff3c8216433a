//! Level 0: two bytes per ply.
//!
//! First byte: origin square, bit 6 set for promotions, bit 7 set for
//! captures. Second byte: destination square, promotion piece in bits 6-7
//! (queen, rook, bishop, knight). Castling is stored king-to-rook.

use shakmaty::{Chess, Move, Position, Role};

use super::find_legal_move;
use crate::error::DecodeError;

const CAPTURE_FLAG: u8 = 0b1000_0000;
const PROMOTION_FLAG: u8 = 0b0100_0000;
const SQUARE_MASK: u8 = 0b0011_1111;

fn promotion_bits(role: Role) -> Result<u8, DecodeError> {
    match role {
        Role::Queen => Ok(0b0000_0000),
        Role::Rook => Ok(0b0100_0000),
        Role::Bishop => Ok(0b1000_0000),
        Role::Knight => Ok(0b1100_0000),
        _ => Err(DecodeError::InvalidDataDuringDecoding),
    }
}

fn promotion_role(b2: u8) -> Role {
    match b2 >> 6 {
        0 => Role::Queen,
        1 => Role::Rook,
        2 => Role::Bishop,
        _ => Role::Knight,
    }
}

pub(super) fn encode(moves: &[Move]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(moves.len() * 2);
    for m in moves {
        let from = m.from().ok_or(DecodeError::InvalidDataDuringDecoding)? as u8;
        let to = match *m {
            Move::Castle { rook, .. } => rook as u8,
            _ => m.to() as u8,
        };

        let mut b1 = from;
        let mut b2 = to;
        if m.is_capture() {
            b1 |= CAPTURE_FLAG;
        }
        if let Some(role) = m.promotion() {
            b1 |= PROMOTION_FLAG;
            b2 |= promotion_bits(role)?;
        }
        out.push(b1);
        out.push(b2);
    }
    Ok(out)
}

pub(super) fn decode(payload: &[u8]) -> Result<Vec<Move>, DecodeError> {
    if payload.len() % 2 != 0 {
        return Err(DecodeError::InvalidEncodedGameConstructionData);
    }

    let mut pos = Chess::default();
    let mut moves = Vec::with_capacity(payload.len() / 2);
    for pair in payload.chunks_exact(2) {
        let (b1, b2) = (pair[0], pair[1]);
        let promotion = (b1 & PROMOTION_FLAG != 0).then(|| promotion_role(b2));
        let m = find_legal_move(&pos, b1 & SQUARE_MASK, b2 & SQUARE_MASK, promotion)?;
        pos.play_unchecked(m);
        moves.push(m);
    }
    Ok(moves)
}
