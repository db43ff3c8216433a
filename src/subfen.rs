//! Partial-position patterns written as the board field of a FEN.
//!
//! `8/8/8/8/4P3/8/8/8` matches any position with a white pawn on e4,
//! regardless of what else is on the board.

use std::str::FromStr;

use nom::{
    branch::alt,
    character::complete::{char, one_of, satisfy},
    combinator::all_consuming,
    multi::{many1, separated_list1},
    IResult, Parser,
};
use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::bitboards::Bitboards;
use crate::board_serialization::PieceKind;
use crate::codec::ParsedGame;
use crate::error::{DecodeError, SubfenParseError};
use crate::replay::Replay;

/// Required pieces as eight masks; a position matches when every set bit of
/// every mask is also set in the position's corresponding mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subfen {
    pub white: u64,
    pub black: u64,
    pub king: u64,
    pub queen: u64,
    pub rook: u64,
    pub bishop: u64,
    pub knight: u64,
    pub pawn: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RankItem {
    Empty(u8),
    Piece(char),
}

fn rank_item(input: &str) -> IResult<&str, RankItem> {
    alt((
        one_of("12345678").map(|c| RankItem::Empty(c as u8 - b'0')),
        satisfy(|c| PieceKind::from_char(c).is_some()).map(RankItem::Piece),
    ))
    .parse(input)
}

fn board_field(input: &str) -> IResult<&str, Vec<Vec<RankItem>>> {
    separated_list1(char('/'), many1(rank_item)).parse(input)
}

impl Subfen {
    pub fn parse(text: &str) -> Result<Subfen, SubfenParseError> {
        let (_, ranks) = all_consuming(board_field)
            .parse(text.trim())
            .map_err(|_| SubfenParseError)?;
        if ranks.len() != 8 {
            return Err(SubfenParseError);
        }

        let mut subfen = Subfen::default();
        for (i, items) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file = 0u8;
            for item in items {
                match *item {
                    RankItem::Empty(n) => {
                        file = file
                            .checked_add(n)
                            .filter(|f| *f <= 8)
                            .ok_or(SubfenParseError)?;
                    }
                    RankItem::Piece(c) => {
                        if file >= 8 {
                            return Err(SubfenParseError);
                        }
                        let kind = PieceKind::from_char(c).ok_or(SubfenParseError)?;
                        let color = if c.is_ascii_uppercase() {
                            Color::White
                        } else {
                            Color::Black
                        };
                        subfen.add(rank * 8 + file, color, kind);
                        file += 1;
                    }
                }
            }
            if file != 8 {
                return Err(SubfenParseError);
            }
        }
        Ok(subfen)
    }

    fn add(&mut self, square: u8, color: Color, kind: PieceKind) {
        let bit = 1u64 << square;
        match color {
            Color::White => self.white |= bit,
            Color::Black => self.black |= bit,
        }
        *self.kind_mask_mut(kind) |= bit;
    }

    fn kind_mask_mut(&mut self, kind: PieceKind) -> &mut u64 {
        match kind {
            PieceKind::King => &mut self.king,
            PieceKind::Queen => &mut self.queen,
            PieceKind::Rook => &mut self.rook,
            PieceKind::Bishop => &mut self.bishop,
            PieceKind::Knight => &mut self.knight,
            PieceKind::Pawn => &mut self.pawn,
        }
    }

    pub fn matches_board(&self, bitboards: &Bitboards) -> bool {
        let pairs = [
            (self.white, bitboards.white()),
            (self.black, bitboards.black()),
            (self.king, bitboards.by_kind(PieceKind::King)),
            (self.queen, bitboards.by_kind(PieceKind::Queen)),
            (self.rook, bitboards.by_kind(PieceKind::Rook)),
            (self.bishop, bitboards.by_kind(PieceKind::Bishop)),
            (self.knight, bitboards.by_kind(PieceKind::Knight)),
            (self.pawn, bitboards.by_kind(PieceKind::Pawn)),
        ];
        pairs.iter().all(|(want, have)| want & have == *want)
    }

    /// Tests the game's final position.
    pub fn matches(&self, game: &ParsedGame) -> Result<bool, DecodeError> {
        let bitboards = game
            .pieces_at_position(-1)?
            .ok_or(DecodeError::InvalidDataDuringDecoding)?;
        Ok(self.matches_board(&bitboards))
    }

    /// Tests every position from the start through the final move.
    pub fn matches_any_position(&self, game: &ParsedGame) -> Result<bool, DecodeError> {
        let mut replay = Replay::new(game);
        loop {
            if self.matches_board(replay.state().bitboards()) {
                return Ok(true);
            }
            if !replay.skip()? {
                return Ok(false);
            }
        }
    }
}

impl FromStr for Subfen {
    type Err = SubfenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subfen::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, tests::SAMPLE_LOW};

    #[test]
    fn test_parse_single_piece() {
        let subfen = Subfen::parse("8/8/8/8/4P3/8/8/8").unwrap();
        assert_eq!(subfen.white, 1 << 28);
        assert_eq!(subfen.pawn, 1 << 28);
        assert_eq!(subfen.black, 0);
        assert_eq!(subfen.king, 0);
    }

    #[test]
    fn test_parse_start_position() {
        let subfen: Subfen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR".parse().unwrap();
        assert_eq!(subfen.white, 0xffff);
        assert_eq!(subfen.black, 0xffff << 48);
        assert_eq!(subfen.king, (1 << 4) | (1 << 60));
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "8/8/8/8/8/8/8",
            "8/8/8/8/8/8/8/8/8",
            "8/8/8/8/9/8/8/8",
            "8/8/8/8/4X3/8/8/8",
            "8/8/8/8/4P4/8/8/8",
            "8/8/8/8/4P2/8/8/8",
            "8/8/8/8/8/8/8/8 w",
            "45/8/8/8/8/8/8/8",
            "7P1/8/8/8/8/8/8/8",
        ] {
            assert_eq!(Subfen::parse(bad), Err(SubfenParseError), "{bad:?}");
        }
    }

    #[test]
    fn test_long_rank_is_rejected() {
        // Enough digits to wrap a byte-sized file counter back to zero.
        let bad = format!("{}P7/8/8/8/8/8/8/8", "8".repeat(32));
        assert_eq!(Subfen::parse(&bad), Err(SubfenParseError));
        let bad = format!("{}/8/8/8/8/8/8/8", "1".repeat(300));
        assert_eq!(Subfen::parse(&bad), Err(SubfenParseError));
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let subfen = Subfen::parse("8/8/8/8/8/8/8/8").unwrap();
        let game = decode(SAMPLE_LOW).unwrap();
        assert!(subfen.matches(&game).unwrap());
        let empty = ParsedGame::from_moves(vec![]).unwrap();
        assert!(subfen.matches(&empty).unwrap());
    }

    #[test]
    fn test_final_position_only() {
        let game = decode(SAMPLE_LOW).unwrap();
        // White queen on f7 at the end.
        let queen_f7 = Subfen::parse("8/5Q2/8/8/8/8/8/8").unwrap();
        assert!(queen_f7.matches(&game).unwrap());

        // The e2 pawn is gone by the end but present at the start.
        let pawn_e2 = Subfen::parse("8/8/8/8/8/8/4P3/8").unwrap();
        assert!(!pawn_e2.matches(&game).unwrap());
        assert!(pawn_e2.matches_any_position(&game).unwrap());
    }

    #[test]
    fn test_agrees_with_bitboards() {
        let game = decode(SAMPLE_LOW).unwrap();
        let bb = game.pieces_at_position(-1).unwrap().unwrap();
        let exact = Subfen {
            white: bb.white(),
            black: bb.black(),
            king: bb.by_kind(PieceKind::King),
            queen: bb.by_kind(PieceKind::Queen),
            rook: bb.by_kind(PieceKind::Rook),
            bishop: bb.by_kind(PieceKind::Bishop),
            knight: bb.by_kind(PieceKind::Knight),
            pawn: bb.by_kind(PieceKind::Pawn),
        };
        assert!(exact.matches(&game).unwrap());

        let mut too_much = exact;
        too_much.rook |= 1 << 35;
        too_much.white |= 1 << 35;
        assert!(!too_much.matches(&game).unwrap());
    }
}
