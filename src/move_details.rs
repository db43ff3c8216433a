//! Per-move metadata and a cursor that produces it ply by ply.

use crate::board_serialization::PieceKind;
use crate::codec::ParsedGame;
use crate::error::DecodeError;
use crate::replay::Replay;

/// Facts about one move, computed while replaying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveDetails {
    /// Zero-based index of the move in the game.
    pub ply: u16,
    pub role: PieceKind,
    pub from: u8,
    /// For castling, the square the king lands on.
    pub to: u8,
    pub capture: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
    pub is_castle: bool,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_en_passant: bool,
}

/// Cursor over a game's moves.
///
/// Each iterator owns its replay state, so any number of them can walk the
/// same game independently.
pub struct MoveDetailsIterator<'a> {
    replay: Replay<'a>,
    failed: bool,
}

impl<'a> MoveDetailsIterator<'a> {
    pub fn new(game: &'a ParsedGame) -> Self {
        MoveDetailsIterator {
            replay: Replay::new(game),
            failed: false,
        }
    }

    /// Index of the move the next call to `next` returns.
    pub fn position(&self) -> usize {
        self.replay.ply()
    }

    /// Moves not yet returned.
    pub fn remaining(&self) -> usize {
        self.replay.remaining()
    }

    /// Returns the move with absolute index `ply`, counting from the end when
    /// negative (`-1` is the last move), and leaves the cursor after it.
    ///
    /// Seeking backwards restarts the replay from the first move.
    pub fn seek(&mut self, ply: i64) -> Option<Result<MoveDetails, DecodeError>> {
        let len = self.replay.len() as i64;
        let target = if ply >= 0 { ply } else { len + ply };
        if target < 0 || target >= len {
            return None;
        }

        let target = target as usize;
        if target < self.replay.ply() {
            self.replay.restart();
            self.failed = false;
        }
        self.nth(target - self.replay.ply())
    }

    /// Sentinel form of `next` for embedders that only carry an error code.
    pub fn next_or_sentinel(&mut self) -> Result<MoveDetails, DecodeError> {
        DecodeError::flatten(self.next().transpose())
    }
}

impl Iterator for MoveDetailsIterator<'_> {
    type Item = Result<MoveDetails, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.replay.step().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }

    /// Skips `n` moves without computing their check flags.
    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        for _ in 0..n {
            match self.replay.skip() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.failed { 0 } else { self.remaining() };
        (remaining, Some(remaining))
    }
}

impl ParsedGame {
    pub fn move_details(&self) -> MoveDetailsIterator<'_> {
        MoveDetailsIterator::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, tests::SAMPLE_LOW};

    #[test]
    fn test_first_moves() {
        let game = decode(SAMPLE_LOW).unwrap();
        let mut it = game.move_details();
        let e4 = it.next().unwrap().unwrap();
        assert_eq!(e4.ply, 0);
        assert_eq!(e4.role, PieceKind::Pawn);
        assert_eq!((e4.from, e4.to), (12, 28));
        assert_eq!(e4.capture, None);
        assert!(!e4.is_check);

        let e5 = it.next().unwrap().unwrap();
        assert_eq!(e5.ply, 1);
        assert_eq!((e5.from, e5.to), (52, 36));
    }

    #[test]
    fn test_flags_through_sample() {
        let game = decode(SAMPLE_LOW).unwrap();
        let details: Vec<MoveDetails> = game.move_details().map(|d| d.unwrap()).collect();
        assert_eq!(details.len(), 19);

        let castle = details[6];
        assert!(castle.is_castle);
        assert_eq!(castle.role, PieceKind::King);
        assert_eq!((castle.from, castle.to), (4, 6));

        let bxf7 = details[10];
        assert_eq!(bxf7.capture, Some(PieceKind::Pawn));
        assert!(bxf7.is_check);
        assert!(!bxf7.is_checkmate);

        let mate = details[18];
        assert!(mate.is_check);
        assert!(mate.is_checkmate);
        assert_eq!(mate.role, PieceKind::Queen);
    }

    #[test]
    fn test_exhaustion_maps_to_sentinel() {
        let game = decode(SAMPLE_LOW).unwrap();
        let mut it = game.move_details();
        assert_eq!(it.by_ref().count(), 19);
        assert!(it.next().is_none());
        assert_eq!(it.next_or_sentinel(), Err(DecodeError::NoErrorNoValue));
    }

    #[test]
    fn test_nth_matches_sequential() {
        let game = decode(SAMPLE_LOW).unwrap();
        let all: Vec<MoveDetails> = game.move_details().map(|d| d.unwrap()).collect();

        let mut it = game.move_details();
        assert_eq!(it.nth(10).unwrap().unwrap(), all[10]);
        assert_eq!(it.position(), 11);
        // Relative to the cursor, like any iterator.
        assert_eq!(it.nth(2).unwrap().unwrap(), all[13]);
        assert!(it.nth(50).is_none());
    }

    #[test]
    fn test_seek_is_absolute() {
        let game = decode(SAMPLE_LOW).unwrap();
        let all: Vec<MoveDetails> = game.move_details().map(|d| d.unwrap()).collect();

        let mut it = game.move_details();
        assert_eq!(it.seek(15).unwrap().unwrap(), all[15]);
        assert_eq!(it.seek(3).unwrap().unwrap(), all[3]);
        assert_eq!(it.seek(-1).unwrap().unwrap(), all[18]);
        assert!(it.seek(19).is_none());
        assert!(it.seek(-20).is_none());
    }

    #[test]
    fn test_independent_iterators() {
        let game = decode(SAMPLE_LOW).unwrap();
        let mut a = game.move_details();
        let mut b = game.move_details();
        a.nth(5);
        assert_eq!(b.next().unwrap().unwrap().ply, 0);
        assert_eq!(a.next().unwrap().unwrap().ply, 6);
    }

    #[test]
    fn test_empty_game() {
        let game = ParsedGame::from_moves(vec![]).unwrap();
        let mut it = game.move_details();
        assert!(it.next().is_none());
        assert!(it.nth(0).is_none());
    }
}
