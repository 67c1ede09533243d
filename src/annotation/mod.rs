/*! Annotation data model.

Records produced by the [crate::annotator::Annotator] and consumed once by the writers.
!*/
mod types;

pub use types::{LineAnnotation, SentenceAnnotation, Tags, WordAnnotation};
