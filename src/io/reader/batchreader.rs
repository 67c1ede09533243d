/*! Batch reader

Groups the non-empty lines of a text file into fixed-size [Batch]es.

Lines are trimmed, empty lines are skipped, and the last batch may be smaller than the
batch size. Batches never overlap and keep the file order.
!*/
use std::borrow::Cow;
use std::fmt;
use std::io::{BufRead, Lines};
use std::str::FromStr;

use itertools::Itertools;

use crate::error::Error;

/// How the lines of a batch are submitted to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Each line is a unit of work.
    #[default]
    Line,
    /// The whole batch is joined (space-separated) into a single unit.
    Join,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "line" => Ok(Mode::Line),
            "join" => Ok(Mode::Join),
            other => Err(format!("unknown mode {other:?} (expected line or join)")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Line => f.write_str("line"),
            Mode::Join => f.write_str("join"),
        }
    }
}

/// A trimmed, non-empty line and its (1-based) line number in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub text: String,
}

/// Text submitted in one engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit<'a> {
    /// Line number of the first line of the unit.
    pub line: usize,
    pub text: Cow<'a, str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    index: usize,
    lines: Vec<Line>,
}

impl Batch {
    pub fn new(index: usize, lines: Vec<Line>) -> Self {
        Self { index, lines }
    }

    /// 0-based position of the batch in its file.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Units of work of this batch.
    pub fn units(&self, mode: Mode) -> Vec<Unit<'_>> {
        match mode {
            Mode::Line => self
                .lines
                .iter()
                .map(|line| Unit {
                    line: line.number,
                    text: Cow::Borrowed(line.text.as_str()),
                })
                .collect(),
            Mode::Join => match self.lines.first() {
                Some(first) => vec![Unit {
                    line: first.number,
                    text: Cow::Owned(self.lines.iter().map(|l| l.text.as_str()).join(" ")),
                }],
                None => Vec::new(),
            },
        }
    }
}

/// Lazily yields [Batch]es from a line-oriented reader.
#[derive(Debug)]
pub struct BatchReader<R> {
    lines: Lines<R>,
    batch_size: usize,
    header_lines: usize,
    line_number: usize,
    next_index: usize,
}

impl<R: BufRead> BatchReader<R> {
    /// `header_lines` first lines are skipped.
    pub fn new(reader: R, batch_size: usize, header_lines: usize) -> Result<Self, Error> {
        if batch_size == 0 {
            return Err(Error::Custom("batch size must be positive".to_string()));
        }
        Ok(Self {
            lines: reader.lines(),
            batch_size,
            header_lines,
            line_number: 0,
            next_index: 0,
        })
    }
}

impl<R: BufRead> Iterator for BatchReader<R> {
    type Item = Result<Batch, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut lines = Vec::with_capacity(self.batch_size);
        while lines.len() < self.batch_size {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(Error::Io(e))),
                None => break,
            };
            self.line_number += 1;
            if self.line_number <= self.header_lines {
                continue;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            lines.push(Line {
                number: self.line_number,
                text: trimmed.to_string(),
            });
        }

        if lines.is_empty() {
            None
        } else {
            let batch = Batch::new(self.next_index, lines);
            self.next_index += 1;
            Some(Ok(batch))
        }
    }
}
