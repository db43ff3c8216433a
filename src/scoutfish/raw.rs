//! Query JSON exactly as written, before any string is interpreted.

use serde::de::IgnoredAny;
use serde::Deserialize;

/// A value that may be written as one string or a list of strings.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub(super) enum Strings {
    Single(String),
    Multiple(Vec<String>),
}

impl Strings {
    /// Interprets every string, failing on the first bad one.
    pub(super) fn compile<T, E>(&self, f: impl Fn(&str) -> Result<T, E>) -> Result<Vec<T>, E> {
        match self {
            Strings::Single(s) => Ok(vec![f(s.as_str())?]),
            Strings::Multiple(v) => v.iter().map(|s| f(s.as_str())).collect(),
        }
    }
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawRule {
    #[serde(rename = "sub-fen")]
    pub sub_fen: Option<Strings>,
    pub material: Option<Strings>,
    pub imbalance: Option<Strings>,
    #[serde(rename = "white-move")]
    pub white_move: Option<Strings>,
    #[serde(rename = "black-move")]
    pub black_move: Option<Strings>,
    pub moved: Option<String>,
    pub captured: Option<String>,
    pub stm: Option<String>,
    pub pass: Option<IgnoredAny>,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawStreak {
    pub streak: Vec<RawRule>,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub(super) enum RawSequenceElement {
    Rule(RawRule),
    Streak(RawStreak),
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawSequence {
    pub sequence: Vec<RawSequenceElement>,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub(super) enum RawQuery {
    Rule(RawRule),
    Sequence(RawSequence),
    Streak(RawStreak),
}

impl RawQuery {
    pub(super) fn parse(text: &[u8]) -> Result<RawQuery, serde_json::Error> {
        serde_json::from_slice(text)
    }
}
