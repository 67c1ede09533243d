//! Engine adapter.
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use log::{debug, warn};

use crate::annotation::{SentenceAnnotation, Tags, WordAnnotation};
use crate::engines::{Engine, EngineError, Processor, Sentence};
use crate::error::Error;

use super::Capabilities;

/// What `sent_text` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SentText {
    /// The sentence as found in the input, trimmed.
    #[default]
    Surface,
    /// Lemmas (or token text when there is no lemma) joined by spaces.
    ///
    /// Output written this way does not pass the equivalence check.
    Lemmas,
}

impl FromStr for SentText {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "surface" => Ok(SentText::Surface),
            "lemmas" => Ok(SentText::Lemmas),
            other => Err(format!(
                "unknown sent_text policy {other:?} (expected surface or lemmas)"
            )),
        }
    }
}

impl fmt::Display for SentText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentText::Surface => f.write_str("surface"),
            SentText::Lemmas => f.write_str("lemmas"),
        }
    }
}

/// Turns engine output into [SentenceAnnotation]s.
///
/// The capability set is negotiated once, when the annotator is built, and never changes
/// afterwards.
pub struct Annotator {
    engine: Box<dyn Engine>,
    capabilities: Capabilities,
    processors: Vec<Processor>,
    sent_text: SentText,
}

impl Annotator {
    /// Wraps an already loaded engine.
    ///
    /// Requested capabilities that the engine lacks are disabled, with a single warning.
    /// Fails if the engine cannot even tokenize.
    pub fn new(
        engine: Box<dyn Engine>,
        requested: Capabilities,
        sent_text: SentText,
    ) -> Result<Self, Error> {
        if !engine.supports(Processor::Tokenize) {
            return Err(Error::Custom(
                "annotation engine does not provide a tokenizer".to_string(),
            ));
        }

        let (capabilities, dropped) = requested.negotiate(engine.as_ref());
        if let Some(dropped) = dropped {
            warn!(
                "{} is not available with this engine/language, running {} only",
                dropped, capabilities
            );
        }
        if sent_text == SentText::Lemmas && !capabilities.tags() {
            warn!("no lemmas without tagging: sent_text will hold token text");
        }

        Ok(Self {
            processors: capabilities.processors(),
            engine,
            capabilities,
            sent_text,
        })
    }

    /// Capabilities actually in use.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Annotate a unit of text.
    ///
    /// Word ids are renumbered from 1 and offsets are checked, so that a misbehaving engine
    /// surfaces as an [EngineError] for this unit only.
    pub fn annotate(&mut self, text: &str) -> Result<Vec<SentenceAnnotation>, EngineError> {
        let sentences = self.engine.annotate(text, &self.processors)?;
        let mut annotations = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            if let Some(annotation) = self.sentence(sentence)? {
                annotations.push(annotation);
            }
        }
        Ok(annotations)
    }

    fn sentence(&mut self, sentence: Sentence) -> Result<Option<SentenceAnnotation>, EngineError> {
        let surface = sentence.text.trim();
        if surface.is_empty() && !self.capabilities.tags() {
            debug!("skipping empty sentence");
            return Ok(None);
        }

        let tags = self.capabilities.tags();
        let words: Vec<WordAnnotation> = sentence
            .words
            .into_iter()
            .enumerate()
            .map(|(idx, word)| {
                let annotation = WordAnnotation::new(idx + 1, word.text, word.start_char, word.end_char);
                if tags {
                    annotation.with_tags(Tags {
                        lemma: word.lemma,
                        upos: word.upos.unwrap_or_else(|| "X".to_string()),
                        xpos: word.xpos,
                        feats: word.feats,
                    })
                } else {
                    annotation
                }
            })
            .collect();

        let sent_text = match self.sent_text {
            SentText::Surface => surface.to_string(),
            SentText::Lemmas => words
                .iter()
                .map(|w| w.lemma().unwrap_or(&w.text))
                .join(" "),
        };

        let mut annotation = SentenceAnnotation::new(sent_text, words);
        annotation.check_words().map_err(EngineError::new)?;

        if self.capabilities.parse() {
            annotation.constituency_parse = Some(self.parse(surface));
        }
        Ok(Some(annotation))
    }

    /// Parse a sentence, degrading to `None` on failure.
    fn parse(&mut self, sentence: &str) -> Option<String> {
        match self.engine.parse(sentence) {
            Ok(trees) if !trees.is_empty() => Some(format!("(ROOT {})", trees.join(" "))),
            Ok(_) => {
                warn!("no constituency tree for {:?}", sentence);
                None
            }
            Err(e) => {
                warn!("constituency parse failed for {:?}: {}", sentence, e);
                None
            }
        }
    }

    /// Asks the engine to drop its transient buffers.
    pub fn release(&mut self) {
        self.engine.release();
    }
}
