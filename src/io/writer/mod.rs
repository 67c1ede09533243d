/*!
# Annotation writing

Annotations are written as one JSON array per source file, record after record, by
[JsonArrayWriter]. Only the record being written is held in memory.
!*/
mod json_array;
mod writertrait;

pub use json_array::JsonArrayWriter;
pub use writertrait::WriterTrait;
