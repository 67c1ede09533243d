//! Annotation records, as written in the output JSON arrays.
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Tagging fields of a word.
///
/// Absent from the JSON output when only tokenization was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Tags {
    pub lemma: Option<String>,
    pub upos: String,
    pub xpos: Option<String>,
    pub feats: Option<String>,
}

/// A single token of a sentence.
///
/// `start_char` and `end_char` are character (not byte) offsets into the text the engine
/// was given, `end_char` being exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WordAnnotation {
    pub id: usize,
    pub text: String,
    #[serde(flatten)]
    pub tags: Option<Tags>,
    pub start_char: usize,
    pub end_char: usize,
}

impl WordAnnotation {
    pub fn new(id: usize, text: String, start_char: usize, end_char: usize) -> Self {
        Self {
            id,
            text,
            tags: None,
            start_char,
            end_char,
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn lemma(&self) -> Option<&str> {
        self.tags.as_ref().and_then(|t| t.lemma.as_deref())
    }
}

/// A sentence and its words.
///
/// `constituency_parse` has three states:
/// - `None`: parsing was not requested, the key is not serialized,
/// - `Some(None)`: parsing was attempted and failed, serialized as `null`,
/// - `Some(Some(tree))`: the bracketed tree, rooted in `ROOT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SentenceAnnotation {
    pub sent_text: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    #[schemars(with = "Option<String>")]
    pub constituency_parse: Option<Option<String>>,
    pub word_annotations: Vec<WordAnnotation>,
}

/// Distinguishes a `null` value from a missing key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl SentenceAnnotation {
    pub fn new(sent_text: String, word_annotations: Vec<WordAnnotation>) -> Self {
        Self {
            sent_text,
            constituency_parse: None,
            word_annotations,
        }
    }

    /// Checks that ids are `1..=n` and that offsets are well ordered.
    pub fn check_words(&self) -> Result<(), String> {
        let mut previous_start = 0;
        for (idx, word) in self.word_annotations.iter().enumerate() {
            if word.id != idx + 1 {
                return Err(format!(
                    "word {:?} has id {}, expected {}",
                    word.text,
                    word.id,
                    idx + 1
                ));
            }
            if word.start_char > word.end_char {
                return Err(format!(
                    "word {:?} starts after its end ({} > {})",
                    word.text, word.start_char, word.end_char
                ));
            }
            if word.start_char < previous_start {
                return Err(format!(
                    "word {:?} starts at {}, before previous word ({})",
                    word.text, word.start_char, previous_start
                ));
            }
            previous_start = word.start_char;
        }
        Ok(())
    }
}

/// One record of the output array: the sentences of one line, one joined batch,
/// or a single sentence depending on the layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LineAnnotation {
    pub sent_annotations: Vec<SentenceAnnotation>,
}

impl LineAnnotation {
    pub fn new(sent_annotations: Vec<SentenceAnnotation>) -> Self {
        Self { sent_annotations }
    }
}
