pub mod annotation;
pub mod annotator;
pub mod engines;
pub mod error;
pub mod io;
pub mod pipelines;
pub mod processing;
