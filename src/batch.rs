//! Columnar entry points: evaluate many encoded games in parallel.
//!
//! Inputs are arrow arrays of encoded games (or PGN text); outputs line up
//! row for row. A null input row, or a row with no value (a ply past the end
//! of the game), gives a null output row. Any other failure aborts the call
//! with the row index and error code.

use arrow_array::{
    Array, BinaryArray, BooleanArray, LargeBinaryArray, LargeStringArray, StringArray,
};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::codec::{decode, CompressionLevel};
use crate::error::DecodeError;
use crate::pgn::encode_pgn;
use crate::scoutfish::ScoutfishQuery;

#[derive(Clone, Debug, Default)]
pub struct BatchConfig {
    /// Worker threads; `None` uses one per CPU.
    pub num_threads: Option<usize>,
}

impl BatchConfig {
    fn thread_pool(&self) -> Result<ThreadPool, String> {
        let num_threads = self.num_threads.unwrap_or_else(num_cpus::get);
        ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| format!("Failed to build Rayon thread pool: {}", e))
    }
}

fn binary_rows(array: &dyn Array) -> Result<Vec<Option<&[u8]>>, String> {
    if let Some(binary) = array.as_any().downcast_ref::<BinaryArray>() {
        Ok(binary.iter().collect())
    } else if let Some(large) = array.as_any().downcast_ref::<LargeBinaryArray>() {
        Ok(large.iter().collect())
    } else {
        Err(format!(
            "Unsupported array type for encoded games: {:?}",
            array.data_type()
        ))
    }
}

fn string_rows(array: &dyn Array) -> Result<Vec<Option<&str>>, String> {
    if let Some(strings) = array.as_any().downcast_ref::<StringArray>() {
        Ok(strings.iter().collect())
    } else if let Some(large) = array.as_any().downcast_ref::<LargeStringArray>() {
        Ok(large.iter().collect())
    } else {
        Err(format!(
            "Unsupported array type for PGN text: {:?}",
            array.data_type()
        ))
    }
}

/// `NoErrorNoValue` becomes a null row; every other error is reported.
fn decoded<T>(result: Result<T, DecodeError>) -> Result<Option<T>, String> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_no_value() => Ok(None),
        Err(e) => Err(format!("{e} (code {})", e.code())),
    }
}

fn map_rows<T, R, F>(rows: Vec<Option<T>>, config: &BatchConfig, f: F) -> Result<Vec<Option<R>>, String>
where
    T: Copy + Send + Sync,
    R: Send,
    F: Fn(T) -> Result<Option<R>, String> + Send + Sync,
{
    let pool = config.thread_pool()?;
    tracing::trace!(
        rows = rows.len(),
        threads = pool.current_num_threads(),
        "evaluating batch"
    );
    pool.install(|| {
        rows.par_iter()
            .enumerate()
            .map(|(i, row)| match *row {
                Some(value) => f(value).map_err(|e| {
                    tracing::debug!(row = i, error = %e, "batch row failed");
                    format!("row {i}: {e}")
                }),
                None => Ok(None),
            })
            .collect()
    })
}

/// Whether `query` matches each game.
pub fn query_matches_column(
    games: &dyn Array,
    query: &ScoutfishQuery,
    config: &BatchConfig,
) -> Result<BooleanArray, String> {
    let rows = binary_rows(games)?;
    let out = map_rows(rows, config, |bytes| {
        decoded(decode(bytes).and_then(|game| query.matches(&game)))
    })?;
    Ok(BooleanArray::from(out))
}

/// FEN of each game at `ply` (signed, `-1` is the final position).
pub fn fen_at_position_column(
    games: &dyn Array,
    ply: i64,
    config: &BatchConfig,
) -> Result<StringArray, String> {
    let rows = binary_rows(games)?;
    let out = map_rows(rows, config, |bytes| {
        decoded(DecodeError::flatten(
            decode(bytes).and_then(|game| game.fen_at_position(ply)),
        ))
    })?;
    Ok(StringArray::from(out))
}

/// Each game re-encoded at `level`.
pub fn recompress_column(
    games: &dyn Array,
    level: CompressionLevel,
    config: &BatchConfig,
) -> Result<BinaryArray, String> {
    let rows = binary_rows(games)?;
    let out = map_rows(rows, config, |bytes| {
        decoded(decode(bytes).and_then(|game| game.encode(level)))
    })?;
    Ok(BinaryArray::from_iter(out))
}

/// Each PGN game encoded at `level`.
pub fn encode_pgn_column(
    pgns: &dyn Array,
    level: CompressionLevel,
    config: &BatchConfig,
) -> Result<BinaryArray, String> {
    let rows = string_rows(pgns)?;
    let out = map_rows(rows, config, |pgn| {
        encode_pgn(pgn, level).map(Some).map_err(|e| e.to_string())
    })?;
    Ok(BinaryArray::from_iter(out))
}
