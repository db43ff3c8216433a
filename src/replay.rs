//! Incremental replay of a parsed game.
//!
//! The board array and bitboards are mutated one move at a time; a shakmaty
//! position is kept in lockstep to answer check and checkmate questions.

use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Color, Move, Position, Role};

use crate::bitboards::{Bitboards, PieceCounts};
use crate::board_serialization::{BoardState, PieceKind, SQUARE_NAMES};
use crate::codec::{castle_king_destination, ParsedGame};
use crate::error::DecodeError;
use crate::move_details::MoveDetails;

const WHITE_KINGSIDE: usize = 0;
const WHITE_QUEENSIDE: usize = 1;
const BLACK_KINGSIDE: usize = 2;
const BLACK_QUEENSIDE: usize = 3;

/// Everything needed to describe the position after some number of plies.
#[derive(Debug, Clone)]
pub struct ReplayState {
    board: BoardState,
    turn: Color,
    castling: [bool; 4],
    ep_square: Option<u8>,
    halfmoves: u32,
    fullmoves: u32,
    chess: Chess,
    ply: usize,
}

impl Default for ReplayState {
    fn default() -> Self {
        ReplayState::new()
    }
}

impl ReplayState {
    pub fn new() -> Self {
        ReplayState {
            board: BoardState::starting_position(),
            turn: Color::White,
            castling: [true; 4],
            ep_square: None,
            halfmoves: 0,
            fullmoves: 1,
            chess: Chess::default(),
            ply: 0,
        }
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn bitboards(&self) -> &Bitboards {
        self.board.bitboards()
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    /// Number of moves applied so far.
    pub fn ply(&self) -> usize {
        self.ply
    }

    pub fn position(&self) -> &Chess {
        &self.chess
    }

    /// En-passant target square after a double pawn push, whether or not a
    /// capture is actually possible.
    pub fn ep_square(&self) -> Option<u8> {
        self.ep_square
    }

    /// Applies `m` and describes it.
    pub fn apply(&mut self, m: Move) -> Result<MoveDetails, DecodeError> {
        let ply = u16::try_from(self.ply).map_err(|_| DecodeError::InvalidDataDuringDecoding)?;
        let mut details = self.apply_quiet(m)?;
        details.ply = ply;
        details.is_check = self.chess.is_check();
        details.is_checkmate = details.is_check && self.chess.is_checkmate();
        Ok(details)
    }

    /// Applies `m` without computing check flags.
    pub fn apply_quiet(&mut self, m: Move) -> Result<MoveDetails, DecodeError> {
        let turn = self.turn;
        let from = m.from().ok_or(DecodeError::InvalidDataDuringDecoding)? as u8;
        let mut details = MoveDetails {
            ply: 0,
            role: PieceKind::from(m.role()),
            from,
            to: m.to() as u8,
            capture: m.capture().map(PieceKind::from),
            promotion: m.promotion().map(PieceKind::from),
            is_castle: false,
            is_check: false,
            is_checkmate: false,
            is_en_passant: false,
        };

        let mut next_ep = None;
        match m {
            Move::Normal {
                role,
                to,
                promotion,
                ..
            } => {
                let to = to as u8;
                self.lift(from, turn)?;
                self.board.take(to);
                let kind = PieceKind::from(promotion.unwrap_or(role));
                self.board.put(to, turn, kind);
                if role == Role::Pawn && from.abs_diff(to) == 16 {
                    next_ep = Some((from + to) / 2);
                }
            }
            Move::EnPassant { to, .. } => {
                let to = to as u8;
                self.lift(from, turn)?;
                self.board.put(to, turn, PieceKind::Pawn);
                self.board.take((to & 7) | (from & !7));
                details.is_en_passant = true;
            }
            Move::Castle { king, rook } => {
                let king_to = castle_king_destination(king, rook);
                let rook_to = if king_to & 7 == 6 { king_to - 1 } else { king_to + 1 };
                self.lift(from, turn)?;
                self.board.take(rook as u8);
                self.board.put(king_to, turn, PieceKind::King);
                self.board.put(rook_to, turn, PieceKind::Rook);
                details.to = king_to;
                details.is_castle = true;
            }
            Move::Put { .. } => return Err(DecodeError::InvalidDataDuringDecoding),
        }

        self.revoke_castling(&m, from);
        self.ep_square = next_ep;
        if m.role() == Role::Pawn || m.is_capture() {
            self.halfmoves = 0;
        } else {
            self.halfmoves += 1;
        }
        if turn == Color::Black {
            self.fullmoves += 1;
        }
        self.turn = !turn;
        self.chess.play_unchecked(m);
        self.ply += 1;
        Ok(details)
    }

    fn lift(&mut self, from: u8, turn: Color) -> Result<PieceKind, DecodeError> {
        match self.board.take(from) {
            Some((color, kind)) if color == turn => Ok(kind),
            _ => Err(DecodeError::InvalidDataDuringDecoding),
        }
    }

    fn revoke_castling(&mut self, m: &Move, from: u8) {
        if m.role() == Role::King {
            match self.turn {
                Color::White => {
                    self.castling[WHITE_KINGSIDE] = false;
                    self.castling[WHITE_QUEENSIDE] = false;
                }
                Color::Black => {
                    self.castling[BLACK_KINGSIDE] = false;
                    self.castling[BLACK_QUEENSIDE] = false;
                }
            }
        }
        for sq in [from, m.to() as u8] {
            match sq {
                0 => self.castling[WHITE_QUEENSIDE] = false,
                7 => self.castling[WHITE_KINGSIDE] = false,
                56 => self.castling[BLACK_QUEENSIDE] = false,
                63 => self.castling[BLACK_KINGSIDE] = false,
                _ => {}
            }
        }
    }

    fn castling_field(&self) -> String {
        let field: String = ['K', 'Q', 'k', 'q']
            .iter()
            .zip(self.castling)
            .filter(|(_, allowed)| *allowed)
            .map(|(c, _)| *c)
            .collect();
        if field.is_empty() {
            "-".to_string()
        } else {
            field
        }
    }

    /// Full six-field FEN.
    pub fn fen(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.board.board_fen(),
            if self.turn == Color::White { 'w' } else { 'b' },
            self.castling_field(),
            self.ep_square.map_or("-", |sq| SQUARE_NAMES[sq as usize]),
            self.halfmoves,
            self.fullmoves,
        )
    }
}

/// Maps a signed ply onto `0..=len`; negative plies count back from the end
/// (`-1` is the final position).
pub fn resolve_ply(ply: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if ply >= 0 { ply } else { len + ply + 1 };
    (0..=len).contains(&index).then_some(index as usize)
}

/// A replay cursor bound to one game.
#[derive(Debug, Clone)]
pub struct Replay<'a> {
    moves: &'a [Move],
    state: ReplayState,
}

impl<'a> Replay<'a> {
    pub fn new(game: &'a ParsedGame) -> Self {
        Replay {
            moves: game.moves(),
            state: ReplayState::new(),
        }
    }

    pub fn state(&self) -> &ReplayState {
        &self.state
    }

    pub fn ply(&self) -> usize {
        self.state.ply
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.moves.len().saturating_sub(self.state.ply)
    }

    /// The move about to be played, if any.
    pub fn upcoming(&self) -> Option<&'a Move> {
        self.moves.get(self.state.ply)
    }

    pub fn restart(&mut self) {
        self.state = ReplayState::new();
    }

    /// Plays the next move; `Ok(None)` once the game is over.
    pub fn step(&mut self) -> Result<Option<MoveDetails>, DecodeError> {
        match self.upcoming() {
            Some(&m) => self.state.apply(m).map(Some),
            None => Ok(None),
        }
    }

    /// Plays the next move without describing it; `Ok(false)` once the game is over.
    pub fn skip(&mut self) -> Result<bool, DecodeError> {
        match self.upcoming() {
            Some(&m) => self.state.apply_quiet(m).map(|_| true),
            None => Ok(false),
        }
    }

    /// Advances until `ply` moves have been applied.
    pub fn seek(&mut self, ply: usize) -> Result<(), DecodeError> {
        if ply < self.state.ply {
            self.restart();
        }
        while self.state.ply < ply {
            if !self.skip()? {
                return Err(DecodeError::NoErrorNoValue);
            }
        }
        Ok(())
    }
}

impl ParsedGame {
    /// Replays the first `ply` moves (signed, see [`resolve_ply`]).
    pub fn state_at(&self, ply: i64) -> Result<Option<ReplayState>, DecodeError> {
        let Some(index) = resolve_ply(ply, self.len()) else {
            return Ok(None);
        };
        let mut replay = Replay::new(self);
        replay.seek(index)?;
        Ok(Some(replay.state))
    }

    pub fn board_at_position(&self, ply: i64) -> Result<Option<BoardState>, DecodeError> {
        Ok(self.state_at(ply)?.map(|state| state.board))
    }

    pub fn pieces_at_position(&self, ply: i64) -> Result<Option<Bitboards>, DecodeError> {
        Ok(self.state_at(ply)?.map(|state| *state.bitboards()))
    }

    pub fn fen_at_position(&self, ply: i64) -> Result<Option<String>, DecodeError> {
        Ok(self.state_at(ply)?.map(|state| state.fen()))
    }

    pub fn piece_counts_at_position(&self, ply: i64) -> Result<Option<PieceCounts>, DecodeError> {
        Ok(self.state_at(ply)?.map(|state| state.bitboards().counts()))
    }

    /// Space-separated UCI moves; castling is the king's two-square step (`e1g1`).
    pub fn to_uci_string(&self) -> String {
        self.moves()
            .iter()
            .map(|m| UciMove::from_standard(*m).to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Numbered SAN move text, e.g. `1. e4 e5 2. Nf3`.
    pub fn to_pgn_string(&self) -> String {
        let mut out = String::new();
        let mut pos = Chess::default();
        for (i, m) in self.moves().iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            if i % 2 == 0 {
                out.push_str(&format!("{}. ", i / 2 + 1));
            }
            out.push_str(&SanPlus::from_move_and_play_unchecked(&mut pos, *m).to_string());
        }
        out
    }

    /// One FEN piece letter per move, uppercase for white's moves.
    pub fn moved_pieces(&self) -> String {
        self.moves()
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let color = if i % 2 == 0 { Color::White } else { Color::Black };
                PieceKind::from(m.role()).colored_char(color)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::{random_game, SAMPLE_LOW};
    use crate::codec::{decode, find_legal_move};
    use crate::pgn::parse_pgn;
    use proptest::prelude::*;
    use shakmaty::fen::Fen;
    use shakmaty::EnPassantMode;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn game_from_uci(pairs: &[(u8, u8)]) -> ParsedGame {
        let mut pos = Chess::default();
        let mut moves = Vec::new();
        for &(from, to) in pairs {
            let m = find_legal_move(&pos, from, to, None).unwrap();
            pos.play_unchecked(m);
            moves.push(m);
        }
        ParsedGame::from_moves(moves).unwrap()
    }

    #[test]
    fn test_resolve_ply() {
        assert_eq!(resolve_ply(0, 2), Some(0));
        assert_eq!(resolve_ply(2, 2), Some(2));
        assert_eq!(resolve_ply(3, 2), None);
        assert_eq!(resolve_ply(-1, 2), Some(2));
        assert_eq!(resolve_ply(-3, 2), Some(0));
        assert_eq!(resolve_ply(-4, 2), None);
        assert_eq!(resolve_ply(0, 0), Some(0));
    }

    #[test]
    fn test_e4_e5_fens() {
        let game = game_from_uci(&[(12, 28), (52, 36)]);
        assert_eq!(game.fen_at_position(0).unwrap().unwrap(), START_FEN);
        assert_eq!(
            game.fen_at_position(1).unwrap().unwrap(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        assert_eq!(
            game.fen_at_position(-1).unwrap().unwrap(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2"
        );
        assert_eq!(game.fen_at_position(3).unwrap(), None);
    }

    #[test]
    fn test_e4_e5_pieces() {
        let game = game_from_uci(&[(12, 28), (52, 36)]);
        let bb = game.pieces_at_position(2).unwrap().unwrap();
        assert_ne!(bb.w_p & (1 << 28), 0);
        assert_ne!(bb.b_p & (1 << 36), 0);
        assert_eq!(bb.w_p & (1 << 12), 0);
        assert_eq!(bb.b_p & (1 << 52), 0);
        assert_eq!(game.to_uci_string(), "e2e4 e7e5");
        assert_eq!(game.to_pgn_string(), "1. e4 e5");
        assert_eq!(game.moved_pieces(), "Pp");
    }

    #[test]
    fn test_board_chars() {
        let game = game_from_uci(&[(12, 28)]);
        let board = game.board_at_position(1).unwrap().unwrap();
        let chars = board.chars();
        assert_eq!(chars[28], Some('P'));
        assert_eq!(chars[12], None);
        assert_eq!(chars[60], Some('k'));
    }

    #[test]
    fn test_sample_text() {
        let game = decode(SAMPLE_LOW).unwrap();
        assert_eq!(
            game.to_uci_string(),
            "e2e4 e7e5 f1c4 b8c6 g1f3 b7b6 e1g1 g8f6 c2c3 f8c5 c4f7 e8f7 f3g5 f7g8 d1b3 f6d5 b3d5 g8f8 d5f7"
        );
        assert_eq!(
            game.to_pgn_string(),
            "1. e4 e5 2. Bc4 Nc6 3. Nf3 b6 4. O-O Nf6 5. c3 Bc5 6. Bxf7+ Kxf7 \
             7. Ng5+ Kg8 8. Qb3+ Nd5 9. Qxd5+ Kf8 10. Qf7#"
        );
        assert_eq!(game.moved_pieces(), "PpBnNpKnPbBkNkQnQkQ");
    }

    #[test]
    fn test_castling_rights_and_counters() {
        let game = decode(SAMPLE_LOW).unwrap();
        // After 4. O-O: white has no rights left, black keeps both.
        let fen = game.fen_at_position(7).unwrap().unwrap();
        assert_eq!(
            fen,
            "r1bqkbnr/p1pp1ppp/1pn5/4p3/2B1P3/5N2/PPPP1PPP/RNBQ1RK1 b kq - 1 4"
        );
        // After 6...Kxf7 nobody can castle.
        let fen = game.fen_at_position(12).unwrap().unwrap();
        assert!(fen.contains(" w - - 0 7"), "{fen}");
    }

    #[test]
    fn test_rook_captured_on_home_square() {
        let game = parse_pgn("1. b3 g5 2. Bb2 Nh6 3. Bxh8 *").unwrap();
        assert_eq!(
            game.fen_at_position(-1).unwrap().unwrap(),
            "rnbqkb1B/pppppp1p/7n/6p1/8/1P6/P1PPPPPP/RN1QKBNR b KQq - 0 3"
        );
    }

    #[test]
    fn test_promotion_text() {
        let game =
            parse_pgn("1. h4 g5 2. hxg5 Nf6 3. gxf6 Rg8 4. fxe7 Rg6 5. exd8=Q+ Kxd8 *").unwrap();
        assert_eq!(
            game.to_uci_string(),
            "h2h4 g7g5 h4g5 g8f6 g5f6 h8g8 f6e7 g8g6 e7d8q e8d8"
        );
        assert_eq!(
            game.to_pgn_string(),
            "1. h4 g5 2. hxg5 Nf6 3. gxf6 Rg8 4. fxe7 Rg6 5. exd8=Q+ Kxd8"
        );
        let board = game.board_at_position(9).unwrap().unwrap();
        assert_eq!(board.piece_at(59), Some((Color::White, PieceKind::Queen)));
        assert_eq!(game.moved_pieces(), "PpPnPrPrPk");
    }

    #[test]
    fn test_disambiguated_san() {
        let game = parse_pgn("1. Nf3 e6 2. d3 e5 3. Nbd2 *").unwrap();
        assert_eq!(game.to_pgn_string(), "1. Nf3 e6 2. d3 e5 3. Nbd2");
    }

    #[test]
    fn test_en_passant_capture() {
        // 1. e4 a6 2. e5 d5 3. exd6
        let game = game_from_uci(&[(12, 28), (48, 40), (28, 36), (51, 35), (36, 43)]);
        let details: Vec<MoveDetails> = game.move_details().map(|d| d.unwrap()).collect();
        assert!(details[4].is_en_passant);
        assert_eq!(details[4].capture, Some(PieceKind::Pawn));

        let board = game.board_at_position(-1).unwrap().unwrap();
        assert_eq!(board.piece_at(35), None);
        assert_eq!(board.piece_at(43), Some((Color::White, PieceKind::Pawn)));
        assert_eq!(game.to_pgn_string(), "1. e4 a6 2. e5 d5 3. exd6");
    }

    #[test]
    fn test_piece_counts() {
        let game = decode(SAMPLE_LOW).unwrap();
        let counts = game.piece_counts_at_position(-1).unwrap().unwrap();
        assert_eq!(counts.w_b, 1);
        assert_eq!(counts.b_p, 7);
        assert_eq!(counts.b_n, 1);
        assert_eq!(counts.w_q, 1);
    }

    fn changed_squares(a: &BoardState, b: &BoardState) -> usize {
        a.codes().iter().zip(b.codes()).filter(|(x, y)| x != y).count()
    }

    proptest! {
        #[test]
        fn prop_replay_matches_shakmaty(ids in proptest::collection::vec(any::<u16>(), 0..120)) {
            let game = ParsedGame::from_moves(random_game(&ids)).unwrap();
            let mut replay = Replay::new(&game);
            let mut previous = replay.state().board().clone();
            while replay.step().unwrap().is_some() {
                let state = replay.state();
                let bb = state.bitboards();
                prop_assert!(bb.is_disjoint());
                prop_assert_eq!(
                    bb.occupied().count_ones() as usize,
                    state.board().codes().iter().filter(|c| **c != 0).count()
                );

                let board = state.position().board();
                for color in [Color::White, Color::Black] {
                    for kind in PieceKind::ALL {
                        let expected = board.by_color(color) & board.by_role(Role::from(kind));
                        prop_assert_eq!(bb.mask(color, kind), expected.0, "{:?} {:?}", color, kind);
                    }
                }
                prop_assert_eq!(
                    state.fen(),
                    Fen::from_position(state.position(), EnPassantMode::Always).to_string()
                );

                // Castling touches four squares; everything else at most three.
                prop_assert!(changed_squares(&previous, state.board()) <= 4);
                previous = state.board().clone();
            }
        }
    }
}
