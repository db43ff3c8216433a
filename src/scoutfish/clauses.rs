//! Leaf predicates of a query rule and the grammars of their string forms.

use std::str::FromStr;

use nom::{
    character::complete::{char, one_of},
    combinator::all_consuming,
    multi::many0,
    sequence::preceded,
    IResult, Parser,
};
use serde::{Deserialize, Serialize};
use shakmaty::san::{San, SanPlus};
use shakmaty::{CastlingSide, Color, File, Move, Rank, Role, Square};

use crate::bitboards::Bitboards;
use crate::board_serialization::PieceKind;
use crate::error::ScoutfishQueryParseError;

/// Pawn, knight, bishop, rook, queen: the first five entries of `PieceKind::ALL`.
const NON_KING: usize = 5;

fn piece_letters(input: &str) -> IResult<&str, Vec<char>> {
    many0(one_of("PNBRQ")).parse(input)
}

fn tally(letters: &[char]) -> [u8; NON_KING] {
    let mut counts = [0u8; NON_KING];
    for &c in letters {
        if let Some(kind) = PieceKind::from_char(c) {
            if let Some(slot) = PieceKind::ALL.iter().position(|k| *k == kind) {
                counts[slot] = counts[slot].saturating_add(1);
            }
        }
    }
    counts
}

fn counts_of(bitboards: &Bitboards, color: Color) -> [u8; NON_KING] {
    let mut counts = [0u8; NON_KING];
    for (slot, kind) in PieceKind::ALL[..NON_KING].iter().enumerate() {
        counts[slot] = bitboards.count(color, *kind);
    }
    counts
}

/// Exact non-king piece counts for both sides, written `K<white>K<black>`
/// (`KBNKP`: white bishop and knight against a black pawn).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    white: [u8; NON_KING],
    black: [u8; NON_KING],
}

fn material_sides(input: &str) -> IResult<&str, (Vec<char>, Vec<char>)> {
    (
        preceded(char('K'), piece_letters),
        preceded(char('K'), piece_letters),
    )
        .parse(input)
}

impl Material {
    pub fn parse(text: &str) -> Result<Material, ScoutfishQueryParseError> {
        if !text.starts_with('K') {
            return Err(ScoutfishQueryParseError::InvalidMaterialFormat);
        }
        match all_consuming(material_sides).parse(text) {
            Ok((_, (white, black))) => Ok(Material {
                white: tally(&white),
                black: tally(&black),
            }),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                // Parsing stops at the first character it cannot use.
                match e.input.chars().next() {
                    None | Some('K') => Err(ScoutfishQueryParseError::InvalidMaterialFormat),
                    Some(_) => Err(ScoutfishQueryParseError::InvalidPiece),
                }
            }
            Err(nom::Err::Incomplete(_)) => Err(ScoutfishQueryParseError::InvalidMaterialFormat),
        }
    }

    pub fn matches(&self, bitboards: &Bitboards) -> bool {
        counts_of(bitboards, Color::White) == self.white
            && counts_of(bitboards, Color::Black) == self.black
    }
}

/// Per-type difference between the sides, written `<white>v<black>`
/// (`PPvN`: white is two pawns up and a knight down, whatever else is on
/// the board).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Imbalance {
    difference: [i8; NON_KING],
}

fn imbalance_sides(input: &str) -> IResult<&str, (Vec<char>, char, Vec<char>)> {
    (piece_letters, char('v'), piece_letters).parse(input)
}

impl Imbalance {
    pub fn parse(text: &str) -> Result<Imbalance, ScoutfishQueryParseError> {
        if text.matches('v').count() != 1 {
            return Err(ScoutfishQueryParseError::InvalidImbalanceFormat);
        }
        let (_, (white, _, black)) = all_consuming(imbalance_sides)
            .parse(text)
            .map_err(|_| ScoutfishQueryParseError::InvalidPiece)?;

        let (white, black) = (tally(&white), tally(&black));
        let mut difference = [0i8; NON_KING];
        for (slot, d) in difference.iter_mut().enumerate() {
            *d = white[slot] as i8 - black[slot] as i8;
        }
        Ok(Imbalance { difference })
    }

    pub fn matches(&self, bitboards: &Bitboards) -> bool {
        PieceKind::ALL[..NON_KING]
            .iter()
            .zip(self.difference)
            .all(|(kind, d)| bitboards.imbalance(*kind) == d)
    }
}

/// A set of piece kinds, written as uppercase letters (`NB`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceSet(u8);

impl PieceSet {
    pub fn parse(text: &str) -> Result<PieceSet, ScoutfishQueryParseError> {
        let mut set = PieceSet::default();
        for c in text.chars() {
            if !c.is_ascii_uppercase() {
                return Err(ScoutfishQueryParseError::InvalidPiece);
            }
            let kind = PieceKind::from_char(c).ok_or(ScoutfishQueryParseError::InvalidPiece)?;
            set.0 |= 1 << kind.code();
        }
        Ok(set)
    }

    pub fn contains(&self, kind: PieceKind) -> bool {
        self.0 & (1 << kind.code()) != 0
    }
}

/// The parts of a SAN token a move is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SanPattern {
    Normal {
        role: PieceKind,
        file: Option<u8>,
        rank: Option<u8>,
        capture: bool,
        to: u8,
        promotion: Option<PieceKind>,
    },
    Castle {
        kingside: bool,
    },
}

impl SanPattern {
    pub fn parse(text: &str) -> Result<SanPattern, ScoutfishQueryParseError> {
        let san_plus =
            SanPlus::from_str(text.trim()).map_err(|_| ScoutfishQueryParseError::InvalidSan)?;
        match san_plus.san {
            San::Normal {
                role,
                file,
                rank,
                capture,
                to,
                promotion,
            } => Ok(SanPattern::Normal {
                role: role.into(),
                file: file.map(|f| f as u8),
                rank: rank.map(|r| r as u8),
                capture,
                to: to as u8,
                promotion: promotion.map(PieceKind::from),
            }),
            San::Castle(side) => Ok(SanPattern::Castle {
                kingside: side == CastlingSide::KingSide,
            }),
            _ => Err(ScoutfishQueryParseError::InvalidSan),
        }
    }

    /// The SAN token this pattern was parsed from, minus any check suffix.
    fn to_san(self) -> Option<San> {
        match self {
            SanPattern::Normal {
                role,
                file,
                rank,
                capture,
                to,
                promotion,
            } => Some(San::Normal {
                role: role.into(),
                file: file.map(File::try_from).transpose().ok()?,
                rank: rank.map(Rank::try_from).transpose().ok()?,
                capture,
                to: Square::try_from(to).ok()?,
                promotion: promotion.map(Role::from),
            }),
            SanPattern::Castle { kingside: true } => Some(San::Castle(CastlingSide::KingSide)),
            SanPattern::Castle { kingside: false } => Some(San::Castle(CastlingSide::QueenSide)),
        }
    }

    pub fn matches(&self, m: &Move) -> bool {
        self.to_san().is_some_and(|san| san.matches(*m))
    }
}
