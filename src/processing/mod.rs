/*! Offline processing of annotated corpora.

- [check]: equivalence between source files and their annotations.
!*/
pub mod check;
