//! Level 2: each move is its rank in a deterministic ordering of the legal
//! moves, written as an Elias gamma code of `rank + 1`.
//!
//! Likely moves (promotions, captures, moves to squares no enemy pawn
//! guards, moves toward the center) sort first and so get the short codes.

use std::cmp::Reverse;

use shakmaty::{Chess, Color, Move, Position};

use super::bits::{pack, BitSink, BitSource};
use crate::board_serialization::PieceKind;
use crate::error::DecodeError;

/// 218 legal moves is the known maximum, so `rank + 1` never needs more.
const MAX_GAMMA_ZEROS: u8 = 8;

const FILE_A: u64 = 0x0101_0101_0101_0101;
const FILE_H: u64 = FILE_A << 7;

fn centrality(sq: u8) -> u32 {
    let (file, rank) = (u32::from(sq & 7), u32::from(sq >> 3));
    file.min(7 - file) + rank.min(7 - rank)
}

/// Squares attacked by the given side's pawns.
fn pawn_attacks(pawns: u64, color: Color) -> u64 {
    match color {
        Color::White => ((pawns & !FILE_A) << 7) | ((pawns & !FILE_H) << 9),
        Color::Black => ((pawns & !FILE_H) >> 7) | ((pawns & !FILE_A) >> 9),
    }
}

fn score(m: &Move, enemy_pawn_attacks: u64) -> u32 {
    let from = m.from().map_or(0, |sq| sq as u8);
    let to = m.to() as u8;

    let promotion = m.promotion().map_or(0, |role| u32::from(PieceKind::from(role).code()));
    let capture = u32::from(m.is_capture());
    let safe = u32::from(enemy_pawn_attacks & (1u64 << to) == 0);
    let centrality_gain = centrality(to) + 6 - centrality(from);

    (promotion << 26)
        | (capture << 25)
        | (safe << 22)
        | (centrality_gain << 12)
        | (u32::from(to) << 6)
        | u32::from(from)
}

/// Legal moves, most likely first.
fn ranked_moves(pos: &Chess) -> Vec<Move> {
    let board = pos.board();
    let them = !pos.turn();
    let enemy_pawns = (board.pawns() & board.by_color(them)).0;
    let attacks = pawn_attacks(enemy_pawns, them);

    let mut moves: Vec<Move> = pos.legal_moves().into_iter().collect();
    moves.sort_by_key(|m| Reverse(score(m, attacks)));
    moves
}

fn write_gamma(sink: &mut BitSink<'_>, value: u32) -> Result<(), DecodeError> {
    let width = (32 - value.leading_zeros()) as u8;
    sink.write(0, width - 1)?;
    sink.write(value, width)
}

fn read_gamma(source: &mut BitSource<'_>) -> Result<u32, DecodeError> {
    let mut zeros = 0u8;
    while !source.read_bit()? {
        zeros += 1;
        if zeros > MAX_GAMMA_ZEROS {
            return Err(DecodeError::InvalidDataDuringDecoding);
        }
    }
    Ok((1 << zeros) | source.read(zeros)?)
}

pub(super) fn encode(moves: &[Move]) -> Result<(Vec<u8>, u8), DecodeError> {
    pack(|sink| {
        let mut pos = Chess::default();
        for &m in moves {
            let rank = ranked_moves(&pos)
                .iter()
                .position(|candidate| *candidate == m)
                .ok_or(DecodeError::InvalidDataDuringDecoding)?;
            write_gamma(sink, rank as u32 + 1)?;
            pos.play_unchecked(m);
        }
        Ok(())
    })
}

pub(super) fn decode(payload: &[u8], padding: u8) -> Result<Vec<Move>, DecodeError> {
    let mut source = BitSource::new(payload, padding)?;
    let mut pos = Chess::default();
    let mut moves = Vec::new();

    while !source.is_exhausted() {
        let rank = read_gamma(&mut source)? as usize - 1;
        let m = *ranked_moves(&pos)
            .get(rank)
            .ok_or(DecodeError::InvalidDataDuringDecoding)?;
        pos.play_unchecked(m);
        moves.push(m);
    }
    Ok(moves)
}
