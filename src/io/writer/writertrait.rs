use crate::error::Error;

/// Record sink. Records are handed over one at a time.
pub trait WriterTrait {
    type Item;

    fn write_single(&mut self, val: &Self::Item) -> Result<(), Error>;

    /// Number of records written so far.
    fn count(&self) -> usize;
}
