//! Compact binary encoding of chess games, with replay, sub-FEN matching and
//! scoutfish-style position queries over the encoded form.
//!
//! ```
//! use chessblob::{decode, encode_pgn, CompressionLevel};
//!
//! let bytes = encode_pgn("1. e4 e5 *", CompressionLevel::Medium).unwrap();
//! let game = decode(&bytes).unwrap();
//! assert_eq!(game.to_uci_string(), "e2e4 e7e5");
//! assert_eq!(game.fen_at_position(3).unwrap(), None);
//! ```

pub mod batch;
pub mod bitboards;
pub mod board_serialization;
pub mod codec;
pub mod error;
pub mod move_details;
pub mod pgn;
pub mod replay;
pub mod scoutfish;
pub mod subfen;

pub use batch::BatchConfig;
pub use bitboards::{Bitboards, PieceCounts};
pub use board_serialization::{BoardState, PieceKind, SQUARE_NAMES};
pub use codec::{compression_level, decode, recompress, CompressionLevel, ParsedGame};
pub use error::{DecodeError, PgnEncodeError, ScoutfishQueryParseError, SubfenParseError};
pub use move_details::{MoveDetails, MoveDetailsIterator};
pub use pgn::{encode_moves, encode_pgn, parse_pgn};
pub use replay::{Replay, ReplayState};
pub use scoutfish::{PlyWindow, ScoutfishQuery, WINDOW_PLIES, WINDOW_WORDS};
pub use subfen::Subfen;
