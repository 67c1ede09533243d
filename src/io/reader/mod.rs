/*! Corpus reading utilities

[Corpus] discovers source files, [BatchReader] splits each of them into [Batch]es.
!*/
mod batchreader;
pub mod corpus;

pub use batchreader::{Batch, BatchReader, Line, Mode, Unit};
pub use corpus::{Corpus, SourceFile};
