//! Pipelines.
//!
//! Pipelines implement the light [pipeline::Pipeline] trait.
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod tag;

pub use pipeline::Pipeline;
pub use tag::Tagger;
