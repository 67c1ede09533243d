//! Equivalence checking of annotation files.
//!
//! An annotation file is equivalent to its source when the concatenation of every
//! `sent_text`, stripped of all whitespace, equals the source text stripped of all whitespace.
//! This catches any character the tokenizer dropped, merged or altered.
//!
//! Annotation files are read record by record, and each (source, annotation) pair is checked
//! independently of the others.
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use itertools::{EitherOrBoth, Itertools};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::de::{DeserializeSeed, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;
use crate::io::reader::Corpus;

/// Whether `c` is ignored when comparing texts.
///
/// Unicode whitespace, plus the information separators U+001C..U+001F that line-splitting
/// tools commonly treat as whitespace too.
pub fn is_blank(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Removes every blank character.
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !is_blank(*c)).collect()
}

/// A source file and one of its annotation files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pair {
    pub original: PathBuf,
    pub annotations: PathBuf,
}

impl Pair {
    pub fn new(original: PathBuf, annotations: PathBuf) -> Self {
        Self {
            original,
            annotations,
        }
    }
}

/// Result of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Equivalent,
    /// Texts differ from this (whitespace-stripped) character offset on.
    Mismatch { offset: usize },
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Equivalent => f.write_str("equivalent"),
            Verdict::Mismatch { offset } => write!(f, "mismatch at character {offset}"),
        }
    }
}

/// Only the fields the check needs.
#[derive(Deserialize)]
struct SentText {
    sent_text: String,
}

#[derive(Deserialize)]
struct LineText {
    sent_annotations: Vec<SentText>,
}

/// Streams the records of an annotation array, appending stripped sentence texts to a buffer.
struct Concat<'a>(&'a mut String);

impl<'de, 'a> DeserializeSeed<'de> for Concat<'a> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 'a> Visitor<'de> for Concat<'a> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of line annotations")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(line) = seq.next_element::<LineText>()? {
            for sentence in line.sent_annotations {
                self.0
                    .extend(sentence.sent_text.chars().filter(|c| !is_blank(*c)));
            }
        }
        Ok(())
    }
}

/// Reconstructed (whitespace-stripped) text of an annotation file.
pub fn reconstruct(annotations: &Path) -> Result<String, Error> {
    let reader = BufReader::new(File::open(annotations)?);
    let mut de = serde_json::Deserializer::from_reader(reader);
    let mut text = String::new();
    Concat(&mut text).deserialize(&mut de)?;
    de.end()?;
    Ok(text)
}

/// Whitespace-stripped text of a source file, minus `header_lines` first lines.
pub fn original(path: &Path, header_lines: usize) -> Result<String, Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut text = String::new();
    for line in reader.lines().skip(header_lines) {
        text.extend(line?.chars().filter(|c| !is_blank(*c)));
    }
    Ok(text)
}

/// Compare two stripped texts.
pub fn compare(original: &str, reconstructed: &str) -> Verdict {
    let offset = original
        .chars()
        .zip_longest(reconstructed.chars())
        .position(|pair| match pair {
            EitherOrBoth::Both(a, b) => a != b,
            _ => true,
        });
    match offset {
        None => Verdict::Equivalent,
        Some(offset) => Verdict::Mismatch { offset },
    }
}

/// Check a single pair.
pub fn check_pair(pair: &Pair, header_lines: usize) -> Result<Verdict, Error> {
    debug!("checking {:?} against {:?}", pair.annotations, pair.original);
    let original = original(&pair.original, header_lines)?;
    let reconstructed = reconstruct(&pair.annotations)?;
    Ok(compare(&original, &reconstructed))
}

/// Check every pair, in parallel. Results are in the order of `pairs`.
pub fn check_all(pairs: &[Pair], header_lines: usize) -> Vec<Result<Verdict, Error>> {
    pairs
        .par_iter()
        .map(|pair| check_pair(pair, header_lines))
        .collect()
}

/// Pairs every `.txt` file found in `roots` with its `_parsed.json` and `.json` annotations.
///
/// Source files without annotations are reported and left out.
pub fn discover_pairs(roots: &[PathBuf]) -> Result<Vec<Pair>, Error> {
    let corpus = Corpus::from_paths(roots)?;
    let mut pairs = Vec::new();
    for file in corpus.files() {
        let candidates = [file.output_path(true, None), file.output_path(false, None)];
        let found: Vec<Pair> = candidates
            .into_iter()
            .filter(|annotations| annotations.is_file())
            .map(|annotations| Pair::new(file.path().to_path_buf(), annotations))
            .collect();
        if found.is_empty() {
            warn!("{:?} has no annotation file", file.path());
        }
        pairs.extend(found);
    }
    info!("found {} pairs", pairs.len());
    Ok(pairs)
}

/// CSV row of a check report.
#[derive(Debug, Serialize)]
struct ReportEntry<'a> {
    original: &'a Path,
    annotations: &'a Path,
    result: String,
}

/// Write results as CSV at `dst`.
pub fn write_report(
    dst: &Path,
    pairs: &[Pair],
    results: &[Result<Verdict, Error>],
) -> Result<(), Error> {
    let mut out = csv::WriterBuilder::new().from_path(dst)?;
    for (pair, result) in pairs.iter().zip(results) {
        let result = match result {
            Ok(verdict) => verdict.to_string(),
            Err(e) => format!("error: {e}"),
        };
        out.serialize(ReportEntry {
            original: &pair.original,
            annotations: &pair.annotations,
            result,
        })?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn strip() {
        assert_eq!(strip_whitespace(" a b\tc\n d\u{a0}e "), "abcde");
        assert_eq!(strip_whitespace("a\u{1c}b\u{1d}c\u{1e}d\u{1f}e"), "abcde");
        assert_eq!(strip_whitespace("a\u{1b}b"), "a\u{1b}b");
    }

    #[test]
    fn separators_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let original = write(dir.path(), "a.txt", "The cat\u{1e}sat.\n");
        let annotations = write(
            dir.path(),
            "a.json",
            r#"[{"sent_annotations": [{"sent_text": "The cat sat.", "word_annotations": []}]}]"#,
        );
        let verdict = check_pair(&Pair::new(original, annotations), 0).unwrap();
        assert_eq!(verdict, Verdict::Equivalent);
    }

    #[test]
    fn compare_offsets() {
        assert_eq!(compare("abc", "abc"), Verdict::Equivalent);
        assert_eq!(compare("abc", "abd"), Verdict::Mismatch { offset: 2 });
        assert_eq!(compare("abc", "ab"), Verdict::Mismatch { offset: 2 });
        assert_eq!(compare("", "x"), Verdict::Mismatch { offset: 0 });
        assert_eq!(compare("", ""), Verdict::Equivalent);
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const ANNOTATIONS: &str = r#"[
        {"sent_annotations": [
            {"sent_text": "The cat sat.", "constituency_parse": null, "word_annotations": []},
            {"sent_text": "It purred.", "word_annotations": []}
        ]},
        {"sent_annotations": [{"sent_text": "Good cat!", "word_annotations": []}]}
    ]"#;

    #[test]
    fn equivalent_pair() {
        let dir = tempfile::tempdir().unwrap();
        let original = write(dir.path(), "a.txt", "The cat sat.  It purred.\n\n Good\tcat!\n");
        let annotations = write(dir.path(), "a.json", ANNOTATIONS);
        let verdict = check_pair(&Pair::new(original, annotations), 0).unwrap();
        assert_eq!(verdict, Verdict::Equivalent);
    }

    #[test]
    fn dropped_character() {
        let dir = tempfile::tempdir().unwrap();
        let original = write(dir.path(), "a.txt", "The cat sat. It purred.\nGood cat!!\n");
        let annotations = write(dir.path(), "a.json", ANNOTATIONS);
        let verdict = check_pair(&Pair::new(original, annotations), 0).unwrap();
        assert_eq!(verdict, Verdict::Mismatch { offset: 27 });
    }

    #[test]
    fn truncated_annotations_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let original = write(dir.path(), "a.txt", "The cat sat.");
        let annotations = write(
            dir.path(),
            "a.json",
            r#"[{"sent_annotations": [{"sent_text": "The cat sat.", "word_annotations": []}]},"#,
        );
        assert!(check_pair(&Pair::new(original, annotations), 0).is_err());
    }

    #[test]
    fn header_lines_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let original = write(dir.path(), "a.txt", "# header\nThe cat sat. It purred.\nGood cat!");
        let annotations = write(dir.path(), "a.json", ANNOTATIONS);
        let pair = Pair::new(original, annotations);
        assert_eq!(check_pair(&pair, 1).unwrap(), Verdict::Equivalent);
        assert!(matches!(check_pair(&pair, 0).unwrap(), Verdict::Mismatch { .. }));
    }

    #[test]
    fn pairs_and_report() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "The cat sat. It purred. Good cat!");
        write(dir.path(), "a_parsed.json", ANNOTATIONS);
        write(dir.path(), "b.txt", "Other text.");
        write(dir.path(), "b.json", "[]");
        write(dir.path(), "c.txt", "No annotations.");

        let pairs = discover_pairs(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].annotations.ends_with("a_parsed.json"));
        assert!(pairs[1].annotations.ends_with("b.json"));

        let results = check_all(&pairs, 0);
        assert_eq!(results[0].as_ref().unwrap(), &Verdict::Equivalent);
        assert_eq!(
            results[1].as_ref().unwrap(),
            &Verdict::Mismatch { offset: 0 }
        );

        let report = dir.path().join("report.csv");
        write_report(&report, &pairs, &results).unwrap();
        let content = fs::read_to_string(report).unwrap();
        assert!(content.starts_with("original,annotations,result\n"));
        assert!(content.contains("mismatch at character 0"));
    }
}
