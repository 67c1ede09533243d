//! Capability sets.
use std::fmt;
use std::str::FromStr;

use crate::engines::{Engine, Processor};

/// Analyses requested for a run.
///
/// Each level includes the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capabilities {
    /// Sentences, tokens and offsets.
    Tokenize,
    /// Tokenize, part of speech and lemmas.
    Tag,
    /// Tag and constituency trees.
    Parse,
}

impl Capabilities {
    pub fn tags(&self) -> bool {
        *self >= Capabilities::Tag
    }

    pub fn parse(&self) -> bool {
        *self == Capabilities::Parse
    }

    /// Processors of the main annotation call.
    /// Constituency parsing is a separate call per sentence.
    pub fn processors(&self) -> Vec<Processor> {
        if self.tags() {
            vec![Processor::Tokenize, Processor::Pos, Processor::Lemma]
        } else {
            vec![Processor::Tokenize]
        }
    }

    /// Restricts the set to what `engine` supports.
    ///
    /// Returns the capabilities that could be kept, and the ones that were dropped.
    pub fn negotiate(self, engine: &dyn Engine) -> (Capabilities, Option<Capabilities>) {
        let available = if !(engine.supports(Processor::Pos) && engine.supports(Processor::Lemma))
        {
            Capabilities::Tokenize
        } else if !engine.supports(Processor::Constituency) {
            Capabilities::Tag
        } else {
            Capabilities::Parse
        };

        if available < self {
            (available, Some(self))
        } else {
            (self, None)
        }
    }
}

impl FromStr for Capabilities {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tokenize" => Ok(Capabilities::Tokenize),
            "tag" => Ok(Capabilities::Tag),
            "parse" => Ok(Capabilities::Parse),
            other => Err(format!(
                "unknown processors {other:?} (expected tokenize, tag or parse)"
            )),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capabilities::Tokenize => f.write_str("tokenize"),
            Capabilities::Tag => f.write_str("tokenize,pos,lemma"),
            Capabilities::Parse => f.write_str("tokenize,pos,lemma,constituency"),
        }
    }
}
