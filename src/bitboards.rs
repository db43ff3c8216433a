//! Twelve piece masks, one per (color, piece kind).

use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::board_serialization::PieceKind;

/// One 64-bit mask per colored piece; bit `i` is square `i` (a1 = 0, h8 = 63).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bitboards {
    pub w_k: u64,
    pub w_q: u64,
    pub w_r: u64,
    pub w_b: u64,
    pub w_n: u64,
    pub w_p: u64,
    pub b_k: u64,
    pub b_q: u64,
    pub b_r: u64,
    pub b_b: u64,
    pub b_n: u64,
    pub b_p: u64,
}

impl Bitboards {
    pub fn mask(&self, color: Color, kind: PieceKind) -> u64 {
        match (color, kind) {
            (Color::White, PieceKind::King) => self.w_k,
            (Color::White, PieceKind::Queen) => self.w_q,
            (Color::White, PieceKind::Rook) => self.w_r,
            (Color::White, PieceKind::Bishop) => self.w_b,
            (Color::White, PieceKind::Knight) => self.w_n,
            (Color::White, PieceKind::Pawn) => self.w_p,
            (Color::Black, PieceKind::King) => self.b_k,
            (Color::Black, PieceKind::Queen) => self.b_q,
            (Color::Black, PieceKind::Rook) => self.b_r,
            (Color::Black, PieceKind::Bishop) => self.b_b,
            (Color::Black, PieceKind::Knight) => self.b_n,
            (Color::Black, PieceKind::Pawn) => self.b_p,
        }
    }

    fn mask_mut(&mut self, color: Color, kind: PieceKind) -> &mut u64 {
        match (color, kind) {
            (Color::White, PieceKind::King) => &mut self.w_k,
            (Color::White, PieceKind::Queen) => &mut self.w_q,
            (Color::White, PieceKind::Rook) => &mut self.w_r,
            (Color::White, PieceKind::Bishop) => &mut self.w_b,
            (Color::White, PieceKind::Knight) => &mut self.w_n,
            (Color::White, PieceKind::Pawn) => &mut self.w_p,
            (Color::Black, PieceKind::King) => &mut self.b_k,
            (Color::Black, PieceKind::Queen) => &mut self.b_q,
            (Color::Black, PieceKind::Rook) => &mut self.b_r,
            (Color::Black, PieceKind::Bishop) => &mut self.b_b,
            (Color::Black, PieceKind::Knight) => &mut self.b_n,
            (Color::Black, PieceKind::Pawn) => &mut self.b_p,
        }
    }

    /// Flips the bit for `square` in the mask of the given piece; off-board
    /// indices leave the masks untouched.
    pub fn toggle(&mut self, square: u8, color: Color, kind: PieceKind) {
        *self.mask_mut(color, kind) ^= 1u64.checked_shl(u32::from(square)).unwrap_or(0);
    }

    pub fn white(&self) -> u64 {
        self.w_k | self.w_q | self.w_r | self.w_b | self.w_n | self.w_p
    }

    pub fn black(&self) -> u64 {
        self.b_k | self.b_q | self.b_r | self.b_b | self.b_n | self.b_p
    }

    pub fn by_color(&self, color: Color) -> u64 {
        match color {
            Color::White => self.white(),
            Color::Black => self.black(),
        }
    }

    /// Both colors' masks for one piece kind.
    pub fn by_kind(&self, kind: PieceKind) -> u64 {
        self.mask(Color::White, kind) | self.mask(Color::Black, kind)
    }

    pub fn occupied(&self) -> u64 {
        self.white() | self.black()
    }

    pub fn piece_at(&self, square: u8) -> Option<(Color, PieceKind)> {
        let bit = 1u64.checked_shl(u32::from(square))?;
        for color in [Color::White, Color::Black] {
            for kind in PieceKind::ALL {
                if self.mask(color, kind) & bit != 0 {
                    return Some((color, kind));
                }
            }
        }
        None
    }

    pub fn count(&self, color: Color, kind: PieceKind) -> u8 {
        self.mask(color, kind).count_ones() as u8
    }

    /// White-minus-black piece count for one kind.
    pub fn imbalance(&self, kind: PieceKind) -> i8 {
        self.count(Color::White, kind) as i8 - self.count(Color::Black, kind) as i8
    }

    pub fn counts(&self) -> PieceCounts {
        PieceCounts {
            w_k: self.w_k.count_ones() as u8,
            w_q: self.w_q.count_ones() as u8,
            w_r: self.w_r.count_ones() as u8,
            w_b: self.w_b.count_ones() as u8,
            w_n: self.w_n.count_ones() as u8,
            w_p: self.w_p.count_ones() as u8,
            b_k: self.b_k.count_ones() as u8,
            b_q: self.b_q.count_ones() as u8,
            b_r: self.b_r.count_ones() as u8,
            b_b: self.b_b.count_ones() as u8,
            b_n: self.b_n.count_ones() as u8,
            b_p: self.b_p.count_ones() as u8,
        }
    }

    /// True when no square is claimed by two masks.
    pub fn is_disjoint(&self) -> bool {
        let masks = [
            self.w_k, self.w_q, self.w_r, self.w_b, self.w_n, self.w_p, self.b_k, self.b_q,
            self.b_r, self.b_b, self.b_n, self.b_p,
        ];
        let total: u32 = masks.iter().map(|m| m.count_ones()).sum();
        total == self.occupied().count_ones()
    }
}

/// Number of pieces of each colored kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PieceCounts {
    pub w_k: u8,
    pub w_q: u8,
    pub w_r: u8,
    pub w_b: u8,
    pub w_n: u8,
    pub w_p: u8,
    pub b_k: u8,
    pub b_q: u8,
    pub b_r: u8,
    pub b_b: u8,
    pub b_n: u8,
    pub b_p: u8,
}
