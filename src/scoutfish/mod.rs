//! Scoutfish-style position queries.
//!
//! A query is JSON: a single rule, `{"sequence": [...]}` of rules and streaks
//! matched at increasing plies, or `{"streak": [...]}` of rules matched on
//! consecutive plies.
//!
//! ```
//! use chessblob::{decode, ScoutfishQuery};
//!
//! let query = ScoutfishQuery::parse(r#"{"white-move": "O-O", "stm": "white"}"#).unwrap();
//! let game = decode(&[0x00]).unwrap();
//! assert!(!query.matches(&game).unwrap());
//! ```

mod clauses;
mod query;
mod raw;
mod window;

use std::io::Write;
use std::str::FromStr;

pub use clauses::{Imbalance, Material, PieceSet, SanPattern};
pub use window::{PlyWindow, WINDOW_PLIES, WINDOW_WORDS};

use crate::codec::ParsedGame;
use crate::error::{DecodeError, ScoutfishQueryParseError};
use query::Query;
use raw::RawQuery;

/// A validated query, ready to be evaluated against any number of games.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoutfishQuery {
    query: Query,
}

impl ScoutfishQuery {
    pub fn parse(text: &str) -> Result<ScoutfishQuery, ScoutfishQueryParseError> {
        Self::parse_bytes(text.as_bytes())
    }

    pub fn parse_bytes(text: &[u8]) -> Result<ScoutfishQuery, ScoutfishQueryParseError> {
        let raw = RawQuery::parse(text).map_err(|e| {
            tracing::debug!(error = %e, "query is not valid JSON for any query shape");
            ScoutfishQueryParseError::InvalidSyntaxOrStructure
        })?;
        Ok(ScoutfishQuery {
            query: Query::compile(&raw)?,
        })
    }

    /// Whether the query matches anywhere in the game.
    pub fn matches(&self, game: &ParsedGame) -> Result<bool, DecodeError> {
        Ok(self.query.first_match(game, 0)?.is_some())
    }

    /// Plies of the first match starting at or after `start_ply`.
    pub fn find_match(
        &self,
        game: &ParsedGame,
        start_ply: usize,
    ) -> Result<Option<Vec<u16>>, DecodeError> {
        self.query.first_match(game, start_ply)
    }

    /// The first match starting at or after `start_ply`, as a ply window.
    pub fn match_window(&self, game: &ParsedGame, start_ply: usize) -> Result<PlyWindow, DecodeError> {
        let plies = self.find_match(game, start_ply)?.unwrap_or_default();
        Ok(PlyWindow::from_plies(&plies))
    }

    /// Writes the matching plies into `out` and returns `(count, min_ply)`.
    /// A count of zero means no match; `out` is then all zeros.
    pub fn matches_plies(
        &self,
        game: &ParsedGame,
        out: &mut [u32; WINDOW_WORDS],
    ) -> Result<(u32, u16), DecodeError> {
        self.matches_plies_from(game, 0, out)
    }

    /// Like [`matches_plies`](Self::matches_plies), ignoring matches that
    /// start before `start_ply`. Used to page past a truncated window.
    pub fn matches_plies_from(
        &self,
        game: &ParsedGame,
        start_ply: u16,
        out: &mut [u32; WINDOW_WORDS],
    ) -> Result<(u32, u16), DecodeError> {
        let window = self.match_window(game, usize::from(start_ply))?;
        *out = window.bits;
        Ok((window.count, window.min_ply))
    }

    /// Serializes the compiled query into `out`, returning the bytes written.
    pub fn write_compiled(&self, out: &mut [u8]) -> Result<usize, ScoutfishQueryParseError> {
        let bytes = serde_json::to_vec(&self.query)
            .map_err(|_| ScoutfishQueryParseError::SerializationFailed)?;
        if bytes.len() > out.len() {
            return Err(ScoutfishQueryParseError::BufferTooSmall);
        }
        let mut cursor = &mut out[..];
        cursor
            .write_all(&bytes)
            .map_err(|_| ScoutfishQueryParseError::WriteFailed)?;
        Ok(bytes.len())
    }

    /// Reads a query written by [`write_compiled`](Self::write_compiled).
    pub fn from_compiled(bytes: &[u8]) -> Result<ScoutfishQuery, ScoutfishQueryParseError> {
        let query = serde_json::from_slice(bytes)
            .map_err(|_| ScoutfishQueryParseError::InvalidSyntaxOrStructure)?;
        Ok(ScoutfishQuery { query })
    }
}

impl FromStr for ScoutfishQuery {
    type Err = ScoutfishQueryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScoutfishQuery::parse(s)
    }
}
