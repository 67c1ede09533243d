/*! Engine adapter.

Wraps an [crate::engines::Engine] and exposes annotation as [crate::annotation] records,
according to a negotiated [Capabilities] set.
!*/
#[allow(clippy::module_inception)]
mod annotator;
mod capabilities;

pub use annotator::{Annotator, SentText};
pub use capabilities::Capabilities;
