/*! Subprocess engine.

Drives an external annotation server (e.g. a Stanza wrapper script) over a JSON-lines protocol:
one request per line on the child's stdin, one response per line on its stdout.

```text
> {"op":"init","lang":"en","processors":"tokenize,pos,lemma","package":"default_accurate","model_dir":null,"download":false,"backend":"gpu"}
< {"ok":true,"processors":["tokenize","pos","lemma","constituency"]}
> {"op":"annotate","text":"The cat sat.","processors":"tokenize,pos,lemma"}
< {"ok":true,"sentences":[{"text":"The cat sat.","words":[...]}]}
> {"op":"parse","text":"The cat sat."}
< {"ok":true,"trees":["(S (NP (DT The) (NN cat)) (VP (VBD sat)) (. .))"]}
> {"op":"release"}
< {"ok":true}
```

Failures are reported as `{"ok":false,"error":"..."}`; the error message is kept verbatim so
that backend failures (e.g. CUDA errors) can be recognized by the executor.

Replies are matched to requests by position only. Once a reply is missing or unreadable
(a stray log line on stdout, a closed pipe) the stream can no longer be trusted: the engine
is marked broken and every later call fails with a fatal error.
!*/
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use itertools::Itertools;
use log::{debug, info, warn};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::{Backend, Engine, EngineConfig, EngineError, Processor, Sentence};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Request<'a> {
    Init {
        lang: &'a str,
        processors: String,
        package: &'a str,
        model_dir: Option<&'a Path>,
        download: bool,
        backend: Backend,
    },
    Annotate {
        text: &'a str,
        processors: String,
    },
    Parse {
        text: &'a str,
    },
    Release,
}

#[derive(Debug, Deserialize)]
struct Status {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitReply {
    processors: Vec<Processor>,
}

#[derive(Debug, Deserialize)]
struct AnnotateReply {
    sentences: Vec<Sentence>,
}

#[derive(Debug, Deserialize)]
struct ParseReply {
    trees: Vec<String>,
}

fn processor_list(processors: &[Processor]) -> String {
    processors.iter().join(",")
}

/// Reads one response line and converts it into `T`.
///
/// Only a well-formed `{"ok":false}` reply gives a recoverable error.
fn read_reply<T: DeserializeOwned>(line: &str) -> Result<T, EngineError> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| EngineError::fatal(format!("invalid response from engine: {e}: {line:?}")))?;
    let status: Status = serde_json::from_value(value.clone())
        .map_err(|e| EngineError::fatal(format!("invalid response from engine: {e}: {line:?}")))?;
    if !status.ok {
        return Err(EngineError::new(
            status
                .error
                .unwrap_or_else(|| "engine reported an unspecified error".to_string()),
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| EngineError::fatal(format!("unexpected response from engine: {e}")))
}

pub struct ProcessEngine {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    supported: HashSet<Processor>,
    backend: Backend,
    /// Why the protocol stream was abandoned.
    broken: Option<String>,
}

impl ProcessEngine {
    /// Spawn `command` and initialize it with `config`.
    ///
    /// Model loading happens here, once.
    pub fn spawn(command: &[String], config: &EngineConfig) -> Result<Self, Error> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Custom("empty engine command".to_string()))?;

        info!("starting engine {:?} on {}", command, config.backend);
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Custom("could not open engine stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Custom("could not open engine stdout".to_string()))?;

        let mut engine = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            supported: HashSet::new(),
            backend: config.backend,
            broken: None,
        };

        let init: InitReply = engine.call(&Request::Init {
            lang: config.lang.as_str(),
            processors: processor_list(&config.processors),
            package: &config.package,
            model_dir: config.model_dir.as_deref(),
            download: config.download,
            backend: config.backend,
        })?;
        debug!("engine supports {:?}", init.processors);
        engine.supported = init.processors.into_iter().collect();

        Ok(engine)
    }

    fn call<T: DeserializeOwned>(&mut self, request: &Request) -> Result<T, EngineError> {
        if let Some(reason) = &self.broken {
            return Err(EngineError::fatal(format!(
                "engine on {} is out of sync since: {}",
                self.backend, reason
            )));
        }

        let result = self.exchange(request);
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!("engine on {} can no longer be used: {}", self.backend, e);
                self.broken = Some(e.message().to_string());
            }
        }
        result
    }

    fn exchange<T: DeserializeOwned>(&mut self, request: &Request) -> Result<T, EngineError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| EngineError::new(format!("could not serialize request: {e}")))?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| EngineError::fatal(format!("could not write to engine: {e}")))?;

        let mut response = String::new();
        match self.stdout.read_line(&mut response) {
            Ok(0) => Err(EngineError::fatal(format!(
                "engine on {} closed its output",
                self.backend
            ))),
            Ok(_) => read_reply(response.trim_end()),
            Err(e) => Err(EngineError::fatal(format!(
                "could not read from engine: {e}"
            ))),
        }
    }
}

impl Engine for ProcessEngine {
    fn supports(&self, processor: Processor) -> bool {
        self.supported.contains(&processor)
    }

    fn annotate(
        &mut self,
        text: &str,
        processors: &[Processor],
    ) -> Result<Vec<Sentence>, EngineError> {
        let reply: AnnotateReply = self.call(&Request::Annotate {
            text,
            processors: processor_list(processors),
        })?;
        Ok(reply.sentences)
    }

    fn parse(&mut self, text: &str) -> Result<Vec<String>, EngineError> {
        let reply: ParseReply = self.call(&Request::Parse { text })?;
        Ok(reply.trees)
    }

    fn release(&mut self) {
        if self.broken.is_some() {
            return;
        }
        if let Err(e) = self.call::<IgnoredAny>(&Request::Release) {
            warn!("engine could not release its buffers: {e}");
        }
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("engine already stopped: {e}");
        }
        let _ = self.child.wait();
    }
}
