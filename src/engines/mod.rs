/*! Annotation engines.

All engines implement [Engine], the black box the [crate::annotator::Annotator] talks to.

- [RuleEngine]: built-in baseline, no model needed.
- [ProcessEngine]: external annotation server spoken to over a JSON-lines pipe.
!*/
mod engine;
mod process;
mod rule;

use std::str::FromStr;

use crate::error::Error;

pub use engine::{Backend, Engine, EngineConfig, EngineError, Processor, Sentence, Word};
pub use process::ProcessEngine;
pub use rule::RuleEngine;

/// Engine names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineName {
    Rule,
    Process,
}

impl FromStr for EngineName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule" => Ok(EngineName::Rule),
            "process" => Ok(EngineName::Process),
            other => Err(format!("unknown engine {other:?} (expected rule or process)")),
        }
    }
}

/// Which engine to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineKind {
    Rule,
    /// Command line of the annotation server.
    Process(Vec<String>),
}

impl EngineKind {
    /// Resolve `name`, taking the server command line from `command` for process engines.
    ///
    /// The command is split on whitespace.
    pub fn new(name: EngineName, command: Option<&str>) -> Result<Self, Error> {
        match (name, command) {
            (EngineName::Rule, _) => Ok(EngineKind::Rule),
            (EngineName::Process, Some(command)) if !command.trim().is_empty() => Ok(
                EngineKind::Process(command.split_whitespace().map(String::from).collect()),
            ),
            (EngineName::Process, _) => Err(Error::Custom(
                "the process engine needs a command line (--engine-cmd)".to_string(),
            )),
        }
    }

    /// Build (and load) an engine for `config`.
    pub fn build(&self, config: &EngineConfig) -> Result<Box<dyn Engine>, Error> {
        match self {
            EngineKind::Rule => Ok(Box::new(RuleEngine::new(&config.lang))),
            EngineKind::Process(command) => Ok(Box::new(ProcessEngine::spawn(command, config)?)),
        }
    }
}
