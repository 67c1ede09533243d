//! Engine trait and the raw structures engines return.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use oxilangtag::LanguageTag;
use serde::{Deserialize, Serialize};

/// Analyses an engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Processor {
    Tokenize,
    Pos,
    Lemma,
    Constituency,
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Processor::Tokenize => "tokenize",
            Processor::Pos => "pos",
            Processor::Lemma => "lemma",
            Processor::Constituency => "constituency",
        };
        f.write_str(name)
    }
}

/// Compute backend an engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Gpu,
    Cpu,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpu" | "cuda" => Ok(Backend::Gpu),
            "cpu" => Ok(Backend::Cpu),
            other => Err(format!("unknown backend {other:?} (expected gpu or cpu)")),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Gpu => f.write_str("gpu"),
            Backend::Cpu => f.write_str("cpu"),
        }
    }
}

/// Error raised by an engine.
///
/// Engines only report a message: whether an error is transient is decided by the
/// executor, by matching the message against known signatures.
///
/// A fatal error means the engine itself can no longer be trusted (e.g. its protocol
/// stream is out of sync). It is never isolated to a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    message: String,
    fatal: bool,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine error: {}", self.message)
    }
}

impl std::error::Error for EngineError {}

/// A word as reported by an engine.
///
/// Offsets are in characters, relative to the text given to [Engine::annotate].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    #[serde(default)]
    pub lemma: Option<String>,
    #[serde(default)]
    pub upos: Option<String>,
    #[serde(default)]
    pub xpos: Option<String>,
    #[serde(default)]
    pub feats: Option<String>,
    pub start_char: usize,
    pub end_char: usize,
}

/// A sentence as reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    pub words: Vec<Word>,
}

/// Settings shared by every engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub lang: LanguageTag<String>,
    pub processors: Vec<Processor>,
    /// Model package (e.g. `default_accurate`, `default_fast`).
    pub package: String,
    pub model_dir: Option<PathBuf>,
    /// Allow fetching missing resources.
    pub download: bool,
    pub backend: Backend,
}

impl EngineConfig {
    /// Same configuration, on another backend.
    pub fn on_backend(&self, backend: Backend) -> Self {
        Self {
            backend,
            ..self.clone()
        }
    }
}

/// Annotation engine.
///
/// An engine is constructed once (model loading can be slow) and then reused for every
/// call of a run.
pub trait Engine {
    /// Whether the engine can run `processor` for its configured language.
    fn supports(&self, processor: Processor) -> bool;

    /// Segment `text` into sentences and run `processors` on them.
    fn annotate(&mut self, text: &str, processors: &[Processor])
        -> Result<Vec<Sentence>, EngineError>;

    /// Constituency parse of `text`, one bracketed tree per sentence found in it.
    fn parse(&mut self, text: &str) -> Result<Vec<String>, EngineError>;

    /// Drop transient buffers held between calls.
    fn release(&mut self) {}
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn supports(&self, processor: Processor) -> bool {
        (**self).supports(processor)
    }

    fn annotate(
        &mut self,
        text: &str,
        processors: &[Processor],
    ) -> Result<Vec<Sentence>, EngineError> {
        (**self).annotate(text, processors)
    }

    fn parse(&mut self, text: &str) -> Result<Vec<String>, EngineError> {
        (**self).parse(text)
    }

    fn release(&mut self) {
        (**self).release()
    }
}
