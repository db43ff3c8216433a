//! Level 1: piece selector plus a destination index whose width depends on
//! the moving piece.
//!
//! The selector is the moving piece's rank among the side to move's pieces
//! in ascending square order, written with just enough bits for the current
//! piece count. Destinations are relative to the origin square:
//!
//! | piece            | bits | index                                         |
//! |------------------|------|-----------------------------------------------|
//! | knight           | 3    | jump offset                                   |
//! | rook             | 4    | target rank, or target file with bit 3 set    |
//! | bishop           | 4    | target rank, bit 3 set on the a1-h8 direction |
//! | queen            | 5    | rook index, or bishop index with bit 4 set    |
//! | king             | 3    | step offset, castling reuses impossible steps |
//! | pawn             | 2    | push, captures, double push                   |
//! | promoting pawn   | 4    | file shift in bits 2-3, piece in bits 0-1     |

use shakmaty::{Chess, Color, Move, Position, Role};

use super::bits::{pack, BitSink, BitSource};
use super::find_legal_move;
use crate::error::DecodeError;

const NEEDED_BITS: [u8; 33] = [
    0, 0, 1, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5,
    5,
];

const KNIGHT_JUMPS: [i32; 8] = [6, 10, 15, 17, -6, -10, -15, -17];
const KING_STEPS: [i32; 8] = [1, 9, 8, 7, -1, -9, -8, -7];
const PAWN_STEPS: [i32; 4] = [8, 7, 9, 16];

fn own_pieces(pos: &Chess) -> u64 {
    pos.board().by_color(pos.turn()).0
}

fn selector_width(own: u64) -> Result<u8, DecodeError> {
    NEEDED_BITS
        .get(own.count_ones() as usize)
        .copied()
        .ok_or(DecodeError::InvalidDataDuringDecoding)
}

fn nth_square(mask: u64, n: u32) -> Option<u8> {
    let mut rest = mask;
    for _ in 0..n {
        rest &= rest.checked_sub(1)?;
    }
    (rest != 0).then(|| rest.trailing_zeros() as u8)
}

fn file(sq: i32) -> i32 {
    sq & 7
}

fn rank(sq: i32) -> i32 {
    sq >> 3
}

fn offset_index(table: &[i32], diff: i32) -> Result<u32, DecodeError> {
    table
        .iter()
        .position(|&d| d == diff)
        .map(|i| i as u32)
        .ok_or(DecodeError::InvalidDataDuringDecoding)
}

fn rook_index(from: i32, to: i32) -> u32 {
    if file(from) == file(to) {
        rank(to) as u32
    } else {
        file(to) as u32 | 0b1000
    }
}

fn bishop_index(from: i32, to: i32) -> u32 {
    // h8-a1 is a multiple of both 9 and 7; it belongs to the a1-h8 direction.
    if (to - from) % 9 == 0 {
        rank(to) as u32 | 0b1000
    } else {
        rank(to) as u32
    }
}

fn promotion_index(role: Role) -> Result<u32, DecodeError> {
    match role {
        Role::Queen => Ok(0),
        Role::Rook => Ok(1),
        Role::Bishop => Ok(2),
        Role::Knight => Ok(3),
        _ => Err(DecodeError::InvalidDataDuringDecoding),
    }
}

fn promotion_role(index: u32) -> Role {
    match index & 0b11 {
        0 => Role::Queen,
        1 => Role::Rook,
        2 => Role::Bishop,
        _ => Role::Knight,
    }
}

fn is_promoting_rank(from: i32, turn: Color) -> bool {
    match turn {
        Color::White => rank(from) == 6,
        Color::Black => rank(from) == 1,
    }
}

/// Index and width of the destination for `m`, which must be legal for `turn`.
fn destination_index(m: &Move, turn: Color) -> Result<(u32, u8), DecodeError> {
    let from = m.from().ok_or(DecodeError::InvalidDataDuringDecoding)? as i32;

    if let Move::Castle { rook, .. } = *m {
        let kingside = rook as i32 > from;
        let index = match (turn, kingside) {
            (Color::White, true) => 5,
            (Color::White, false) => 6,
            (Color::Black, true) => 1,
            (Color::Black, false) => 2,
        };
        return Ok((index, 3));
    }

    let to = m.to() as i32;
    let diff = to - from;
    match m.role() {
        Role::Knight => Ok((offset_index(&KNIGHT_JUMPS, diff)?, 3)),
        Role::Rook => Ok((rook_index(from, to), 4)),
        Role::Bishop => Ok((bishop_index(from, to), 4)),
        Role::Queen => {
            if file(from) == file(to) || rank(from) == rank(to) {
                Ok((rook_index(from, to), 5))
            } else {
                Ok((bishop_index(from, to) | 0b1_0000, 5))
            }
        }
        Role::King => Ok((offset_index(&KING_STEPS, diff)?, 3)),
        Role::Pawn => match m.promotion() {
            Some(role) => {
                let shift = match file(to) - file(from) {
                    0 => 0,
                    -1 => 4,
                    1 => 8,
                    _ => return Err(DecodeError::InvalidDataDuringDecoding),
                };
                Ok((shift | promotion_index(role)?, 4))
            }
            None => Ok((offset_index(&PAWN_STEPS, diff.abs())?, 2)),
        },
    }
}

fn rook_target(from: i32, index: u32) -> i32 {
    let index = index as i32;
    if index & 0b1000 != 0 {
        rank(from) * 8 + (index & 7)
    } else {
        (index & 7) * 8 + file(from)
    }
}

fn bishop_target(from: i32, index: u32) -> i32 {
    let index = index as i32;
    let rank_delta = (index & 7) - rank(from);
    if index & 0b1000 != 0 {
        from + 9 * rank_delta
    } else {
        from + 7 * rank_delta
    }
}

/// Reads one destination and resolves it to (to, promotion).
fn read_destination(
    source: &mut BitSource<'_>,
    role: Role,
    from: i32,
    turn: Color,
) -> Result<(i32, Option<Role>), DecodeError> {
    let white = turn == Color::White;
    match role {
        Role::Knight => Ok((from + KNIGHT_JUMPS[source.read(3)? as usize], None)),
        Role::Rook => Ok((rook_target(from, source.read(4)?), None)),
        Role::Bishop => Ok((bishop_target(from, source.read(4)?), None)),
        Role::Queen => {
            let index = source.read(5)?;
            if index & 0b1_0000 != 0 {
                Ok((bishop_target(from, index & 0b1111), None))
            } else {
                Ok((rook_target(from, index), None))
            }
        }
        Role::King => {
            let index = source.read(3)?;
            let to = match (white, from, index) {
                (true, 4, 5) => 7,
                (true, 4, 6) => 0,
                (false, 60, 1) => 63,
                (false, 60, 2) => 56,
                _ => from + KING_STEPS[index as usize],
            };
            Ok((to, None))
        }
        Role::Pawn if is_promoting_rank(from, turn) => {
            let index = source.read(4)?;
            let diff = match (index >> 2, white) {
                (0, true) => 8,
                (1, true) => 7,
                (2, true) => 9,
                (0, false) => -8,
                (1, false) => -9,
                (2, false) => -7,
                _ => return Err(DecodeError::InvalidDataDuringDecoding),
            };
            Ok((from + diff, Some(promotion_role(index))))
        }
        Role::Pawn => {
            let step = PAWN_STEPS[source.read(2)? as usize];
            Ok((if white { from + step } else { from - step }, None))
        }
    }
}

fn write_move(sink: &mut BitSink<'_>, pos: &Chess, m: &Move) -> Result<(), DecodeError> {
    let from = m.from().ok_or(DecodeError::InvalidDataDuringDecoding)? as u32;
    let own = own_pieces(pos);
    let below = own & ((1u64 << from) - 1);
    sink.write(below.count_ones(), selector_width(own)?)?;

    let (index, width) = destination_index(m, pos.turn())?;
    sink.write(index, width)
}

pub(super) fn encode(moves: &[Move]) -> Result<(Vec<u8>, u8), DecodeError> {
    pack(|sink| {
        let mut pos = Chess::default();
        for &m in moves {
            write_move(sink, &pos, &m)?;
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
        let own = own_pieces(&pos);
        let selector = source.read(selector_width(own)?)?;
        let from = nth_square(own, selector).ok_or(DecodeError::InvalidDataDuringDecoding)?;
        let role = pos
            .board()
            .role_at(super::square(from as i32)?)
            .ok_or(DecodeError::InvalidDataDuringDecoding)?;

        let (to, promotion) = read_destination(&mut source, role, from as i32, pos.turn())?;
        if !(0..64).contains(&to) {
            return Err(DecodeError::InvalidDataDuringDecoding);
        }
        let m = find_legal_move(&pos, from, to as u8, promotion)?;
        pos.play_unchecked(m);
        moves.push(m);
    }
    Ok(moves)
}
