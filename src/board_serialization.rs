//! Board state serialization helpers.
//!
//! Board encoding: 0=empty, 1-6=white PNBRQK, 7-12=black pnbrqk
//! This matches python-chess piece_type (1-6) with color offset (+6 for black).
//!
//! Square indexing: a1=0, b1=1, ..., h1=7, a2=8, ..., h8=63

use serde::{Deserialize, Serialize};
use shakmaty::{Color, Role};

use crate::bitboards::Bitboards;

/// Square names in board order.
pub const SQUARE_NAMES: [&str; 64] = [
    "a1", "b1", "c1", "d1", "e1", "f1", "g1", "h1", //
    "a2", "b2", "c2", "d2", "e2", "f2", "g2", "h2", //
    "a3", "b3", "c3", "d3", "e3", "f3", "g3", "h3", //
    "a4", "b4", "c4", "d4", "e4", "f4", "g4", "h4", //
    "a5", "b5", "c5", "d5", "e5", "f5", "g5", "h5", //
    "a6", "b6", "c6", "d6", "e6", "f6", "g6", "h6", //
    "a7", "b7", "c7", "d7", "e7", "f7", "g7", "h7", //
    "a8", "b8", "c8", "d8", "e8", "f8", "g8", "h8", //
];

/// Kind of piece, independent of color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub const ALL: [PieceKind; 6] = [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ];

    /// 1-6 in PNBRQK order.
    pub fn code(self) -> u8 {
        match self {
            PieceKind::Pawn => 1,
            PieceKind::Knight => 2,
            PieceKind::Bishop => 3,
            PieceKind::Rook => 4,
            PieceKind::Queen => 5,
            PieceKind::King => 6,
        }
    }

    /// Lowercase FEN letter.
    pub fn char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn upper_char(self) -> char {
        self.char().to_ascii_uppercase()
    }

    /// FEN letter for a piece of this kind, uppercase for white.
    pub fn colored_char(self, color: Color) -> char {
        match color {
            Color::White => self.upper_char(),
            Color::Black => self.char(),
        }
    }

    /// Accepts either case.
    pub fn from_char(c: char) -> Option<PieceKind> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }
}

impl From<Role> for PieceKind {
    fn from(role: Role) -> Self {
        match role {
            Role::Pawn => PieceKind::Pawn,
            Role::Knight => PieceKind::Knight,
            Role::Bishop => PieceKind::Bishop,
            Role::Rook => PieceKind::Rook,
            Role::Queen => PieceKind::Queen,
            Role::King => PieceKind::King,
        }
    }
}

impl From<PieceKind> for Role {
    fn from(kind: PieceKind) -> Self {
        match kind {
            PieceKind::Pawn => Role::Pawn,
            PieceKind::Knight => Role::Knight,
            PieceKind::Bishop => Role::Bishop,
            PieceKind::Rook => Role::Rook,
            PieceKind::Queen => Role::Queen,
            PieceKind::King => Role::King,
        }
    }
}

/// Packs a colored piece into the 1-12 board code.
pub fn piece_code(color: Color, kind: PieceKind) -> u8 {
    let color_offset = if color == Color::White { 0 } else { 6 };
    kind.code() + color_offset
}

/// Inverse of [`piece_code`]; `None` for 0 and out-of-range codes.
pub fn decode_piece_code(code: u8) -> Option<(Color, PieceKind)> {
    let color = match code {
        1..=6 => Color::White,
        7..=12 => Color::Black,
        _ => return None,
    };
    let kind = PieceKind::ALL[((code - 1) % 6) as usize];
    Some((color, kind))
}

/// 64-slot piece-code array plus the matching bitboards.
///
/// Both views are updated together by [`BoardState::put`] and
/// [`BoardState::take`], so they never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    squares: [u8; 64],
    bitboards: Bitboards,
}

impl BoardState {
    pub fn empty() -> Self {
        BoardState {
            squares: [0; 64],
            bitboards: Bitboards::default(),
        }
    }

    pub fn starting_position() -> Self {
        const BACK_RANK: [PieceKind; 8] = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];

        let mut board = BoardState::empty();
        for (file, &kind) in BACK_RANK.iter().enumerate() {
            let file = file as u8;
            board.put(file, Color::White, kind);
            board.put(8 + file, Color::White, PieceKind::Pawn);
            board.put(48 + file, Color::Black, PieceKind::Pawn);
            board.put(56 + file, Color::Black, kind);
        }
        board
    }

    /// Piece codes in square order (0 = empty).
    pub fn codes(&self) -> &[u8; 64] {
        &self.squares
    }

    pub fn bitboards(&self) -> &Bitboards {
        &self.bitboards
    }

    /// `None` for empty squares and for indices past h8.
    pub fn piece_at(&self, square: u8) -> Option<(Color, PieceKind)> {
        self.squares
            .get(square as usize)
            .copied()
            .and_then(decode_piece_code)
    }

    /// FEN letter per square, `None` for empty squares.
    pub fn chars(&self) -> [Option<char>; 64] {
        let mut out = [None; 64];
        for (sq, slot) in out.iter_mut().enumerate() {
            *slot = self
                .piece_at(sq as u8)
                .map(|(color, kind)| kind.colored_char(color));
        }
        out
    }

    /// Places a piece, replacing whatever stood on the square. Off-board
    /// indices are ignored.
    pub fn put(&mut self, square: u8, color: Color, kind: PieceKind) {
        self.take(square);
        if let Some(slot) = self.squares.get_mut(square as usize) {
            *slot = piece_code(color, kind);
            self.bitboards.toggle(square, color, kind);
        }
    }

    /// Removes and returns the piece on `square`, if any.
    pub fn take(&mut self, square: u8) -> Option<(Color, PieceKind)> {
        let piece = self.piece_at(square)?;
        *self.squares.get_mut(square as usize)? = 0;
        self.bitboards.toggle(square, piece.0, piece.1);
        Some(piece)
    }

    /// Piece placement field of a FEN, rank 8 first.
    pub fn board_fen(&self) -> String {
        let mut fen = String::with_capacity(72);
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                match self.piece_at(rank * 8 + file) {
                    Some((color, kind)) => {
                        if empty > 0 {
                            fen.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        fen.push(kind.colored_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                fen.push('/');
            }
        }
        fen
    }
}

impl Default for BoardState {
    fn default() -> Self {
        BoardState::starting_position()
    }
}
