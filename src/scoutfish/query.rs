//! Compiled query tree and its evaluation over a replay.

use serde::{Deserialize, Serialize};
use shakmaty::{Color, Move};

use super::clauses::{Imbalance, Material, PieceSet, SanPattern};
use super::raw::{RawQuery, RawRule, RawSequenceElement, RawStreak, Strings};
use crate::board_serialization::PieceKind;
use crate::codec::ParsedGame;
use crate::error::{DecodeError, ScoutfishQueryParseError};
use crate::replay::{Replay, ReplayState};
use crate::subfen::Subfen;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Side {
    White,
    Black,
}

impl Side {
    fn parse(text: &str) -> Result<Side, ScoutfishQueryParseError> {
        match text {
            "white" => Ok(Side::White),
            "black" => Ok(Side::Black),
            _ => Err(ScoutfishQueryParseError::InvalidSideToMove),
        }
    }

    fn color(self) -> Color {
        match self {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

/// One conjunction of clauses. Within a clause the alternatives are OR-ed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Rule {
    sub_fen: Option<Vec<Subfen>>,
    material: Option<Vec<Material>>,
    imbalance: Option<Vec<Imbalance>>,
    white_move: Option<Vec<SanPattern>>,
    black_move: Option<Vec<SanPattern>>,
    moved: Option<PieceSet>,
    captured: Option<PieceSet>,
    stm: Option<Side>,
    pass: bool,
}

fn compile_list<T>(
    strings: &Option<Strings>,
    parse: impl Fn(&str) -> Result<T, ScoutfishQueryParseError>,
) -> Result<Option<Vec<T>>, ScoutfishQueryParseError> {
    strings.as_ref().map(|s| s.compile(parse)).transpose()
}

fn any_of<T>(alternatives: &Option<Vec<T>>, test: impl Fn(&T) -> bool) -> bool {
    alternatives
        .as_ref()
        .map_or(true, |alts| alts.iter().any(test))
}

impl Rule {
    fn compile(raw: &RawRule) -> Result<Rule, ScoutfishQueryParseError> {
        Ok(Rule {
            sub_fen: compile_list(&raw.sub_fen, |s| {
                Subfen::parse(s).map_err(|_| ScoutfishQueryParseError::InvalidPiece)
            })?,
            material: compile_list(&raw.material, Material::parse)?,
            imbalance: compile_list(&raw.imbalance, Imbalance::parse)?,
            white_move: compile_list(&raw.white_move, SanPattern::parse)?,
            black_move: compile_list(&raw.black_move, SanPattern::parse)?,
            moved: raw.moved.as_deref().map(PieceSet::parse).transpose()?,
            captured: raw.captured.as_deref().map(PieceSet::parse).transpose()?,
            stm: raw.stm.as_deref().map(Side::parse).transpose()?,
            pass: raw.pass.is_some(),
        })
    }

    /// Tests the position in `state` together with the move about to be
    /// played from it (`None` at the final position).
    pub(crate) fn apply(&self, state: &ReplayState, upcoming: Option<&Move>) -> bool {
        let turn = state.turn();
        if self.stm.is_some_and(|side| side.color() != turn) {
            return false;
        }
        if self.white_move.is_some() && turn != Color::White {
            return false;
        }
        if self.black_move.is_some() && turn != Color::Black {
            return false;
        }
        if let Some(set) = self.moved {
            if !upcoming.is_some_and(|m| set.contains(PieceKind::from(m.role()))) {
                return false;
            }
        }
        if let Some(set) = self.captured {
            let captured = upcoming.and_then(|m| m.capture());
            if !captured.is_some_and(|role| set.contains(PieceKind::from(role))) {
                return false;
            }
        }

        let bitboards = state.bitboards();
        let san_matches = |p: &SanPattern| upcoming.is_some_and(|m| p.matches(m));
        any_of(&self.material, |m| m.matches(bitboards))
            && any_of(&self.imbalance, |i| i.matches(bitboards))
            && any_of(&self.white_move, san_matches)
            && any_of(&self.black_move, san_matches)
            && any_of(&self.sub_fen, |s| s.matches_board(bitboards))
    }
}

/// Rules that must hold on consecutive plies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Streak {
    rules: Vec<Rule>,
}

impl Streak {
    fn compile(raw: &RawStreak) -> Result<Streak, ScoutfishQueryParseError> {
        if raw.streak.is_empty() {
            return Err(ScoutfishQueryParseError::InvalidSyntaxOrStructure);
        }
        let rules = raw.streak.iter().map(Rule::compile).collect::<Result<_, _>>()?;
        Ok(Streak { rules })
    }

    /// Progress flags with only the first rule armed.
    fn fresh(&self) -> Vec<bool> {
        let mut active = vec![false; self.rules.len()];
        if let Some(first) = active.first_mut() {
            *first = true;
        }
        active
    }

    /// Feeds one ply; true when the last rule completes a run.
    ///
    /// `active[i]` means rules `0..i` held on the plies just before this one.
    /// The first rule stays armed so a run may start on any ply.
    fn advance(&self, active: &mut [bool], state: &ReplayState, upcoming: Option<&Move>) -> bool {
        let last = self.rules.len().saturating_sub(1);
        for i in (0..self.rules.len()).rev() {
            if !active[i] {
                continue;
            }
            let hit = self.rules[i].apply(state, upcoming);
            if i > 0 {
                active[i] = false;
            }
            if hit {
                if i == last {
                    return true;
                }
                active[i + 1] = true;
            }
        }
        false
    }

    /// Plies covered by a run ending at `ply`.
    fn span(&self, ply: u16) -> impl Iterator<Item = u16> {
        let len = u16::try_from(self.rules.len()).unwrap_or(u16::MAX);
        ply.saturating_sub(len.saturating_sub(1))..=ply
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Element {
    Rule(Rule),
    Streak(Streak),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Query {
    Rule(Rule),
    Sequence(Vec<Element>),
    Streak(Streak),
}

impl Query {
    pub(crate) fn compile(raw: &RawQuery) -> Result<Query, ScoutfishQueryParseError> {
        match raw {
            RawQuery::Rule(rule) => Ok(Query::Rule(Rule::compile(rule)?)),
            RawQuery::Streak(streak) => Ok(Query::Streak(Streak::compile(streak)?)),
            RawQuery::Sequence(sequence) => {
                if sequence.sequence.is_empty() {
                    return Err(ScoutfishQueryParseError::InvalidSyntaxOrStructure);
                }
                let elements = sequence
                    .sequence
                    .iter()
                    .map(|element| match element {
                        RawSequenceElement::Rule(rule) => Rule::compile(rule).map(Element::Rule),
                        RawSequenceElement::Streak(streak) => {
                            Streak::compile(streak).map(Element::Streak)
                        }
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Query::Sequence(elements))
            }
        }
    }

    /// Plies of the first match that starts at or after `start_ply`.
    pub(crate) fn first_match(
        &self,
        game: &ParsedGame,
        start_ply: usize,
    ) -> Result<Option<Vec<u16>>, DecodeError> {
        if start_ply > game.len() {
            return Ok(None);
        }
        let mut replay = Replay::new(game);
        replay.seek(start_ply)?;

        let mut progress = Progress::new(self);
        loop {
            let ply =
                u16::try_from(replay.ply()).map_err(|_| DecodeError::InvalidDataDuringDecoding)?;
            if let Some(plies) = progress.feed(replay.state(), replay.upcoming(), ply) {
                return Ok(Some(plies));
            }
            if !replay.skip()? {
                return Ok(None);
            }
        }
    }
}

/// Per-evaluation matching state.
enum Progress<'q> {
    Rule(&'q Rule),
    Streak {
        streak: &'q Streak,
        active: Vec<bool>,
    },
    Sequence {
        elements: &'q [Element],
        index: usize,
        active: Vec<bool>,
        plies: Vec<u16>,
    },
}

impl<'q> Progress<'q> {
    fn new(query: &'q Query) -> Self {
        match query {
            Query::Rule(rule) => Progress::Rule(rule),
            Query::Streak(streak) => Progress::Streak {
                streak,
                active: streak.fresh(),
            },
            Query::Sequence(elements) => Progress::Sequence {
                elements,
                index: 0,
                active: Self::arm(elements.first()),
                plies: Vec::new(),
            },
        }
    }

    fn arm(element: Option<&Element>) -> Vec<bool> {
        match element {
            Some(Element::Streak(streak)) => streak.fresh(),
            _ => Vec::new(),
        }
    }

    /// Feeds one ply and returns the matched plies once the query completes.
    fn feed(&mut self, state: &ReplayState, upcoming: Option<&Move>, ply: u16) -> Option<Vec<u16>> {
        match self {
            Progress::Rule(rule) => rule.apply(state, upcoming).then(|| vec![ply]),
            Progress::Streak { streak, active } => streak
                .advance(active, state, upcoming)
                .then(|| streak.span(ply).collect()),
            Progress::Sequence {
                elements,
                index,
                active,
                plies,
            } => {
                let element = elements.get(*index)?;
                match element {
                    Element::Rule(rule) => {
                        if !rule.apply(state, upcoming) {
                            return None;
                        }
                        plies.push(ply);
                    }
                    Element::Streak(streak) => {
                        if !streak.advance(active, state, upcoming) {
                            return None;
                        }
                        plies.extend(streak.span(ply));
                    }
                }
                *index += 1;
                if *index == elements.len() {
                    return Some(std::mem::take(plies));
                }
                *active = Self::arm(elements.get(*index));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::codec::tests::{random_game, SAMPLE_LOW};
    use proptest::prelude::*;

    fn compile(text: &str) -> Query {
        Query::compile(&RawQuery::parse(text.as_bytes()).unwrap()).unwrap()
    }

    fn rule(text: &str) -> Rule {
        match compile(text) {
            Query::Rule(rule) => rule,
            other => panic!("not a rule: {other:?}"),
        }
    }

    /// The rule's verdict at every ply 0..=N.
    fn verdicts(rule: &Rule, game: &ParsedGame) -> Vec<bool> {
        let mut replay = Replay::new(game);
        let mut out = Vec::new();
        loop {
            out.push(rule.apply(replay.state(), replay.upcoming()));
            if !replay.skip().unwrap() {
                return out;
            }
        }
    }

    #[test]
    fn test_empty_rule_matches_start() {
        let game = decode(SAMPLE_LOW).unwrap();
        assert_eq!(compile("{}").first_match(&game, 0).unwrap(), Some(vec![0]));
        assert_eq!(compile("{}").first_match(&game, 19).unwrap(), Some(vec![19]));
        assert_eq!(compile("{}").first_match(&game, 20).unwrap(), None);
    }

    #[test]
    fn test_side_restricted_moves() {
        let game = decode(SAMPLE_LOW).unwrap();
        let white_castles = rule(r#"{"white-move": "O-O"}"#);
        let hits = verdicts(&white_castles, &game);
        assert_eq!(hits.iter().filter(|h| **h).count(), 1);
        assert!(hits[6]);

        // Nobody plays Kxf7 as white.
        assert!(!verdicts(&rule(r#"{"white-move": "Kxf7"}"#), &game)
            .into_iter()
            .any(|h| h));
        assert!(verdicts(&rule(r#"{"black-move": "Kxf7"}"#), &game)[11]);
    }

    #[test]
    fn test_moved_and_captured_need_a_move() {
        let game = decode(SAMPLE_LOW).unwrap();
        let any_piece = rule(r#"{"moved": "KQRBNP"}"#);
        let hits = verdicts(&any_piece, &game);
        assert!(hits[..19].iter().all(|h| *h));
        assert!(!hits[19]);

        let bishop_taken = compile(r#"{"captured": "B"}"#);
        assert_eq!(bishop_taken.first_match(&game, 0).unwrap(), Some(vec![11]));
    }

    #[test]
    fn test_streak_span() {
        let game = decode(SAMPLE_LOW).unwrap();
        let query = compile(
            r#"{"streak": [{"white-move": "Bxf7"}, {"black-move": "Kxf7"}, {"white-move": "Ng5"}]}"#,
        );
        assert_eq!(query.first_match(&game, 0).unwrap(), Some(vec![10, 11, 12]));
        assert_eq!(query.first_match(&game, 11).unwrap(), None);
    }

    #[test]
    fn test_streak_restarts_after_a_miss() {
        let game = decode(SAMPLE_LOW).unwrap();
        // Queen moves at plies 14, 16 and 18 are never adjacent; 16 is
        // followed by a king move.
        let query = compile(r#"{"streak": [{"moved": "Q"}, {"moved": "K"}]}"#);
        assert_eq!(query.first_match(&game, 0).unwrap(), Some(vec![16, 17]));
        let never = compile(r#"{"streak": [{"moved": "Q"}, {"moved": "Q"}]}"#);
        assert_eq!(never.first_match(&game, 0).unwrap(), None);
    }

    #[test]
    fn test_sequence_order() {
        let game = decode(SAMPLE_LOW).unwrap();
        let query = compile(r#"{"sequence": [{"white-move": "O-O"}, {"black-move": "Kxf7"}]}"#);
        assert_eq!(query.first_match(&game, 0).unwrap(), Some(vec![6, 11]));

        let reversed =
            compile(r#"{"sequence": [{"black-move": "Kxf7"}, {"white-move": "O-O"}]}"#);
        assert_eq!(reversed.first_match(&game, 0).unwrap(), None);
    }

    #[test]
    fn test_sequence_with_streak() {
        let game = decode(SAMPLE_LOW).unwrap();
        let query = compile(
            r#"{"sequence": [{"white-move": "c3"}, {"streak": [{"moved": "B"}, {"moved": "K"}]}]}"#,
        );
        // c3 at ply 8, then the bishop-king run Bxf7+ Kxf7.
        assert_eq!(query.first_match(&game, 0).unwrap(), Some(vec![8, 10, 11]));
    }

    #[test]
    fn test_compile_errors() {
        use ScoutfishQueryParseError::*;
        let err = |text: &str| Query::compile(&RawQuery::parse(text.as_bytes()).unwrap());
        assert_eq!(err(r#"{"stm": "red"}"#), Err(InvalidSideToMove));
        assert_eq!(err(r#"{"sub-fen": "8/8"}"#), Err(InvalidPiece));
        assert_eq!(err(r#"{"material": ["KK", "KX"]}"#), Err(InvalidPiece));
        assert_eq!(err(r#"{"imbalance": "PP"}"#), Err(InvalidImbalanceFormat));
        assert_eq!(err(r#"{"white-move": "Zz9"}"#), Err(InvalidSan));
        assert_eq!(err(r#"{"streak": []}"#), Err(InvalidSyntaxOrStructure));
        assert_eq!(err(r#"{"sequence": []}"#), Err(InvalidSyntaxOrStructure));
    }

    proptest! {
        #[test]
        fn prop_rule_is_conjunction_of_clauses(
            ids in proptest::collection::vec(any::<u16>(), 0..80),
        ) {
            let game = ParsedGame::from_moves(random_game(&ids)).unwrap();
            let clauses = [
                r#""stm": "white""#,
                r#""moved": "PN""#,
                r#""imbalance": ["v", "PvN"]"#,
                r#""sub-fen": "8/8/8/8/8/8/8/4K3""#,
                r#""white-move": ["e4", "d4", "Nf3", "exd5"]"#,
                r#""material": "KQRRBBNNPPPPPPPPKQRRBBNNPPPPPPP""#,
            ];
            let singles: Vec<Vec<bool>> = clauses
                .iter()
                .map(|c| verdicts(&rule(&format!("{{{c}}}")), &game))
                .collect();
            let combined = verdicts(&rule(&format!("{{{}}}", clauses.join(", "))), &game);
            for (ply, verdict) in combined.iter().enumerate() {
                let expected = singles.iter().all(|s| s[ply]);
                prop_assert_eq!(*verdict, expected, "ply {}", ply);
            }
        }
    }
}
