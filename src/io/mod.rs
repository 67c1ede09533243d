/*!
# IO utilities

Corpus reading ([reader]) and annotation saving ([writer]).
!*/
pub mod reader;
pub mod writer;
