//! Building encoded games from PGN move text.
//!
//! Only the mainline is kept; variations and comments are skipped. Games
//! that declare their own starting position through a `FEN` tag are
//! rejected, since every encoded game starts from the standard position.

use std::io::Cursor;
use std::ops::ControlFlow;

use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use shakmaty::{Chess, Move, Position};

use crate::codec::{CompressionLevel, ParsedGame};
use crate::error::{DecodeError, PgnEncodeError};

const STANDARD_FEN: &[u8] = b"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Collects the mainline moves of one game.
#[derive(Default)]
struct MoveCollector {
    pos: Chess,
    moves: Vec<Move>,
}

impl Visitor for MoveCollector {
    /// Whether a non-standard starting position was declared.
    type Tags = bool;
    type Movetext = ();
    type Output = Result<Vec<Move>, PgnEncodeError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(false)
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        if key.eq_ignore_ascii_case(b"FEN") && value.as_bytes() != STANDARD_FEN {
            *tags = true;
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        if tags {
            return ControlFlow::Break(Err(PgnEncodeError::CustomStartingPosition));
        }
        self.pos = Chess::default();
        self.moves.clear();
        ControlFlow::Continue(())
    }

    fn san(
        &mut self,
        _movetext: &mut Self::Movetext,
        san_plus: SanPlus,
    ) -> ControlFlow<Self::Output> {
        match san_plus.san.to_move(&self.pos) {
            Ok(m) => {
                self.pos.play_unchecked(m);
                self.moves.push(m);
                ControlFlow::Continue(())
            }
            Err(_) => ControlFlow::Break(Err(PgnEncodeError::IllegalMove {
                ply: self.moves.len(),
                san: san_plus.to_string(),
            })),
        }
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true)) // mainline only
    }

    fn end_game(&mut self, _movetext: Self::Movetext) -> Self::Output {
        Ok(std::mem::take(&mut self.moves))
    }
}

/// Parses the first game in `pgn`.
pub fn parse_pgn(pgn: &str) -> Result<ParsedGame, PgnEncodeError> {
    let mut reader = Reader::new(Cursor::new(pgn));
    let mut collector = MoveCollector::default();
    let moves = reader
        .read_game(&mut collector)?
        .ok_or(PgnEncodeError::NoGame)?
        .inspect_err(|e| tracing::debug!(error = %e, "rejected PGN"))?;
    Ok(ParsedGame::from_moves(moves)?)
}

/// Encodes the first game in `pgn` at `level`.
pub fn encode_pgn(pgn: &str, level: CompressionLevel) -> Result<Vec<u8>, PgnEncodeError> {
    Ok(parse_pgn(pgn)?.encode(level)?)
}

/// Encodes legal moves from the standard starting position.
pub fn encode_moves(moves: &[Move], level: CompressionLevel) -> Result<Vec<u8>, DecodeError> {
    ParsedGame::from_moves(moves.to_vec())?.encode(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::codec::tests::SAMPLE_LOW;

    const SAMPLE_PGN: &str = r#"[Event "Casual game"]
[White "A"]
[Black "B"]
[Result "1-0"]

1. e4 e5 2. Bc4 Nc6 3. Nf3 b6 4. O-O Nf6 5. c3 Bc5 6. Bxf7+ Kxf7
7. Ng5+ Kg8 8. Qb3+ Nd5 9. Qxd5+ Kf8 10. Qf7# 1-0"#;

    #[test]
    fn test_parse_game_without_headers() {
        let game = parse_pgn("1. Nf3 d5 2. e4 c5 3. exd5 e5 4. dxe6 0-1").unwrap();
        assert_eq!(game.len(), 7);
        assert_eq!(game.to_uci_string(), "g1f3 d7d5 e2e4 c7c5 e4d5 e7e5 d5e6");
    }

    #[test]
    fn test_encode_reproduces_known_blob() {
        assert_eq!(encode_pgn(SAMPLE_PGN, CompressionLevel::Low).unwrap(), SAMPLE_LOW);
    }

    #[test]
    fn test_every_level_decodes_to_same_game() {
        let expected = parse_pgn(SAMPLE_PGN).unwrap();
        for level in CompressionLevel::ALL {
            let bytes = encode_pgn(SAMPLE_PGN, level).unwrap();
            let game = decode(&bytes).unwrap();
            assert_eq!(game.level(), level);
            assert_eq!(game.moves(), expected.moves());
        }
    }

    #[test]
    fn test_variations_and_comments_are_skipped() {
        let pgn = "1. e4 { best by test } (1. d4 d5 2. c4) e5 2. Nf3 (2. f4 exf4) Nc6 *";
        let game = parse_pgn(pgn).unwrap();
        assert_eq!(game.to_pgn_string(), "1. e4 e5 2. Nf3 Nc6");
    }

    #[test]
    fn test_illegal_move() {
        match parse_pgn("1. e4 e4 *") {
            Err(PgnEncodeError::IllegalMove { ply, san }) => {
                assert_eq!(ply, 1);
                assert_eq!(san, "e4");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_custom_starting_position() {
        let pgn = r#"[FEN "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3"]

3. Bb5 a6 1-0"#;
        assert!(matches!(
            parse_pgn(pgn),
            Err(PgnEncodeError::CustomStartingPosition)
        ));

        // Lowercase key, standard position: accepted.
        let pgn = r#"[fen "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"]

1. d4 *"#;
        assert_eq!(parse_pgn(pgn).unwrap().len(), 1);
    }

    #[test]
    fn test_no_game() {
        assert!(matches!(parse_pgn(""), Err(PgnEncodeError::NoGame)));
    }

    #[test]
    fn test_encode_moves() {
        let game = parse_pgn("1. e4 e5 *").unwrap();
        let bytes = encode_moves(game.moves(), CompressionLevel::High).unwrap();
        assert_eq!(decode(&bytes).unwrap().to_pgn_string(), "1. e4 e5");
    }
}
