//! Rule-based engine.
//!
//! Sentences end after `.`, `!`, `?` or `…` (plus any closing quote or bracket),
//! tokens are Unicode word boundaries (UAX#29) minus whitespace.
//!
//! Tagging is a baseline: a small closed-class lexicon and suffix heuristics for English,
//! shape only (`PUNCT`, `NUM`, `X`) for other languages.
//! Constituency parsing is a flat `(S …)` bracketing and is only available for English.
use std::collections::HashMap;

use lazy_static::lazy_static;
use oxilangtag::LanguageTag;
use unicode_segmentation::UnicodeSegmentation;

use super::{Engine, EngineError, Processor, Sentence, Word};

const TERMINALS: [&str; 5] = [".", "!", "?", "…", "。"];
const CLOSERS: [&str; 8] = ["\"", "'", ")", "]", "}", "»", "”", "’"];

lazy_static! {
    /// Closed-class English words with their (upos, xpos) tags.
    static ref LEXICON: HashMap<&'static str, (&'static str, &'static str)> = {
        let mut m = HashMap::new();
        let classes: [(&[&str], (&str, &str)); 7] = [
            (
                &["the", "a", "an", "this", "that", "these", "those", "every", "some", "no"],
                ("DET", "DT"),
            ),
            (
                &["i", "you", "he", "she", "it", "we", "they", "me", "him", "us", "them"],
                ("PRON", "PRP"),
            ),
            (&["my", "your", "his", "her", "its", "our", "their"], ("PRON", "PRP$")),
            (
                &["in", "on", "at", "of", "to", "for", "with", "from", "by", "about", "into"],
                ("ADP", "IN"),
            ),
            (&["and", "or", "but", "nor"], ("CCONJ", "CC")),
            (
                &[
                    "is", "are", "was", "were", "be", "been", "am", "has", "have", "had", "do",
                    "does", "did",
                ],
                ("AUX", "VB"),
            ),
            (
                &["will", "would", "can", "could", "shall", "should", "may", "might", "must"],
                ("AUX", "MD"),
            ),
        ];
        for (words, tags) in classes {
            for word in words {
                m.insert(*word, tags);
            }
        }
        m
    };
}

/// A token and its location in the annotated text.
#[derive(Debug)]
struct Token<'t> {
    text: &'t str,
    byte_start: usize,
    byte_end: usize,
    start_char: usize,
    end_char: usize,
}

/// Splits `text` on word boundaries, keeping track of character offsets.
fn tokens(text: &str) -> Vec<Token<'_>> {
    let mut chars = 0;
    let mut tokens = Vec::new();
    for (byte_start, segment) in text.split_word_bound_indices() {
        let len = segment.chars().count();
        if !segment.chars().all(char::is_whitespace) {
            tokens.push(Token {
                text: segment,
                byte_start,
                byte_end: byte_start + segment.len(),
                start_char: chars,
                end_char: chars + len,
            });
        }
        chars += len;
    }
    tokens
}

/// Groups tokens into sentences.
fn sentences(tokens: Vec<Token<'_>>) -> Vec<Vec<Token<'_>>> {
    let mut sentences = Vec::new();
    let mut current = Vec::new();
    let mut closing = false;
    for token in tokens {
        let terminal = TERMINALS.contains(&token.text);
        if closing && !terminal && !CLOSERS.contains(&token.text) {
            sentences.push(std::mem::take(&mut current));
            closing = false;
        }
        closing |= terminal;
        current.push(token);
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

fn punctuation_tags(token: &str) -> (&'static str, &'static str) {
    match token {
        t if TERMINALS.contains(&t) => ("PUNCT", "."),
        "," => ("PUNCT", ","),
        ":" | ";" | "-" | "—" => ("PUNCT", ":"),
        "(" | "[" | "{" => ("PUNCT", "-LRB-"),
        ")" | "]" | "}" => ("PUNCT", "-RRB-"),
        t if CLOSERS.contains(&t) || t == "“" || t == "‘" || t == "«" => ("PUNCT", "''"),
        _ => ("SYM", "SYM"),
    }
}

/// (upos, xpos, lemma) of a token.
fn tag(token: &str, sentence_initial: bool, english: bool) -> (String, Option<String>, String) {
    let lower = token.to_lowercase();
    if !token.chars().any(char::is_alphanumeric) {
        let (upos, xpos) = punctuation_tags(token);
        return (upos.to_string(), Some(xpos.to_string()), token.to_string());
    }
    if token
        .chars()
        .all(|c| c.is_numeric() || c == '.' || c == ',')
    {
        return ("NUM".to_string(), Some("CD".to_string()), lower);
    }
    if !english {
        return ("X".to_string(), None, lower);
    }

    if let Some((upos, xpos)) = LEXICON.get(lower.as_str()) {
        return (upos.to_string(), Some(xpos.to_string()), lower);
    }
    let capitalized = token.chars().next().map_or(false, char::is_uppercase);
    let (upos, xpos) = if capitalized && !sentence_initial {
        ("PROPN", "NNP")
    } else if lower.ends_with("ly") {
        ("ADV", "RB")
    } else if lower.ends_with("ing") {
        ("VERB", "VBG")
    } else if lower.ends_with("ed") {
        ("VERB", "VBD")
    } else if lower.ends_with('s') && !lower.ends_with("ss") && lower.chars().count() > 3 {
        ("NOUN", "NNS")
    } else {
        ("NOUN", "NN")
    };
    let lemma = match xpos {
        "NNS" => lower[..lower.len() - 1].to_string(),
        _ => lower,
    };
    (upos.to_string(), Some(xpos.to_string()), lemma)
}

fn escape_bracket(token: &str) -> &str {
    match token {
        "(" => "-LRB-",
        ")" => "-RRB-",
        t => t,
    }
}

#[derive(Debug, Clone)]
pub struct RuleEngine {
    english: bool,
}

impl RuleEngine {
    pub fn new(lang: &LanguageTag<String>) -> Self {
        Self {
            english: lang.primary_language() == "en",
        }
    }
}

impl Engine for RuleEngine {
    fn supports(&self, processor: Processor) -> bool {
        match processor {
            Processor::Constituency => self.english,
            _ => true,
        }
    }

    fn annotate(
        &mut self,
        text: &str,
        processors: &[Processor],
    ) -> Result<Vec<Sentence>, EngineError> {
        let pos = processors.contains(&Processor::Pos);
        let lemma = processors.contains(&Processor::Lemma);

        let sentences = sentences(tokens(text))
            .into_iter()
            .filter_map(|sentence| {
                let first = sentence.first()?;
                let last = sentence.last()?;
                let sent_text = text[first.byte_start..last.byte_end].to_string();
                let words = sentence
                    .iter()
                    .enumerate()
                    .map(|(idx, token)| {
                        let mut word = Word {
                            text: token.text.to_string(),
                            lemma: None,
                            upos: None,
                            xpos: None,
                            feats: None,
                            start_char: token.start_char,
                            end_char: token.end_char,
                        };
                        if pos || lemma {
                            let (upos, xpos, l) = tag(token.text, idx == 0, self.english);
                            if pos {
                                word.upos = Some(upos);
                                word.xpos = xpos;
                            }
                            if lemma {
                                word.lemma = Some(l);
                            }
                        }
                        word
                    })
                    .collect();
                Some(Sentence {
                    text: sent_text,
                    words,
                })
            })
            .collect();
        Ok(sentences)
    }

    fn parse(&mut self, text: &str) -> Result<Vec<String>, EngineError> {
        if !self.english {
            return Err(EngineError::new("no constituency parser for this language"));
        }
        let trees = sentences(tokens(text))
            .into_iter()
            .map(|sentence| {
                let leaves: Vec<String> = sentence
                    .iter()
                    .enumerate()
                    .map(|(idx, token)| {
                        let (upos, xpos, _) = tag(token.text, idx == 0, self.english);
                        let label = xpos.unwrap_or(upos);
                        format!("({} {})", escape_bracket(&label), escape_bracket(token.text))
                    })
                    .collect();
                format!("(S {})", leaves.join(" "))
            })
            .collect();
        Ok(trees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english() -> RuleEngine {
        RuleEngine::new(&LanguageTag::parse("en".to_string()).unwrap())
    }

    const ALL: [Processor; 3] = [Processor::Tokenize, Processor::Pos, Processor::Lemma];

    #[test]
    fn two_sentences() {
        let mut e = english();
        let sentences = e.annotate("The cat sat. It purred.", &ALL).unwrap();
        assert_eq!(sentences.len(), 2);

        let texts: Vec<&str> = sentences[0].words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["The", "cat", "sat", "."]);
        let starts: Vec<usize> = sentences[0].words.iter().map(|w| w.start_char).collect();
        assert_eq!(starts, vec![0, 4, 8, 11]);

        let texts: Vec<&str> = sentences[1].words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["It", "purred", "."]);
        let starts: Vec<usize> = sentences[1].words.iter().map(|w| w.start_char).collect();
        assert_eq!(starts, vec![13, 16, 22]);

        assert_eq!(sentences[0].text, "The cat sat.");
        assert_eq!(sentences[1].text, "It purred.");
    }

    #[test]
    fn char_offsets_not_bytes() {
        let mut e = english();
        let sentences = e.annotate("Ça va. Très bien!", &ALL).unwrap();
        let bien = &sentences[1].words[1];
        assert_eq!(bien.text, "bien");
        assert_eq!(bien.start_char, 12);
        assert_eq!(bien.end_char, 16);
    }

    #[test]
    fn closing_quote_stays() {
        let mut e = english();
        let sentences = e.annotate("He said \"stop.\" Then left...", &ALL).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "He said \"stop.\"");
        assert_eq!(sentences[1].text, "Then left...");
    }

    #[test]
    fn tokenize_only_has_no_tags() {
        let mut e = english();
        let sentences = e.annotate("Cats sleep.", &[Processor::Tokenize]).unwrap();
        assert!(sentences[0].words.iter().all(|w| w.upos.is_none()));
        assert!(sentences[0].words.iter().all(|w| w.lemma.is_none()));
    }

    #[test]
    fn tags() {
        let mut e = english();
        let sentences = e.annotate("The cats saw Paris.", &ALL).unwrap();
        let w = &sentences[0].words;
        assert_eq!(w[0].upos.as_deref(), Some("DET"));
        assert_eq!(w[1].lemma.as_deref(), Some("cat"));
        assert_eq!(w[3].upos.as_deref(), Some("PROPN"));
        assert_eq!(w[4].upos.as_deref(), Some("PUNCT"));
    }

    #[test]
    fn parse_flat_tree() {
        let mut e = english();
        let trees = e.parse("The cat (sat).").unwrap();
        assert_eq!(
            trees,
            vec!["(S (DT The) (NN cat) (-LRB- -LRB-) (NN sat) (-RRB- -RRB-) (. .))".to_string()]
        );
    }

    #[test]
    fn no_parser_for_other_languages() {
        let mut e = RuleEngine::new(&LanguageTag::parse("ru".to_string()).unwrap());
        assert!(!e.supports(Processor::Constituency));
        assert!(e.supports(Processor::Pos));
        assert!(e.parse("Кот сидел.").is_err());
    }

    #[test]
    fn whitespace_only() {
        let mut e = english();
        assert!(e.annotate("   ", &ALL).unwrap().is_empty());
    }
}
