//! Streaming JSON array writer.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

use log::debug;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::Error;

use super::WriterTrait;

/// Writes records as elements of a single JSON array, one at a time.
///
/// `[` is written on creation, each record is serialized straight to the underlying writer
/// (preceded by `,` for every record but the first), and `]` is only written by
/// [JsonArrayWriter::finish]. A writer that is dropped without being finished leaves an
/// unterminated array behind, which is how interrupted runs are recognized.
pub struct JsonArrayWriter<T, W: Write> {
    inner: W,
    count: usize,
    pretty: bool,
    record: PhantomData<fn(&T)>,
}

impl<T: Serialize> JsonArrayWriter<T, BufWriter<File>> {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path, pretty: bool) -> Result<Self, Error> {
        debug!("creating {:?}", path);
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), pretty)
    }
}

impl<T: Serialize, W: Write> JsonArrayWriter<T, W> {
    /// Wraps `inner` and writes the array start token.
    pub fn new(mut inner: W, pretty: bool) -> Result<Self, Error> {
        inner.write_all(b"[")?;
        Ok(Self {
            inner,
            count: 0,
            pretty,
            record: PhantomData,
        })
    }

    /// Closes the array, flushes, and gives back the underlying writer.
    pub fn finish(mut self) -> Result<W, Error> {
        if self.pretty && self.count > 0 {
            self.inner.write_all(b"\n")?;
        }
        self.inner.write_all(b"]")?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<T: Serialize, W: Write> WriterTrait for JsonArrayWriter<T, W> {
    type Item = T;

    fn write_single(&mut self, record: &T) -> Result<(), Error> {
        if self.count > 0 {
            self.inner.write_all(b",")?;
        }
        if self.pretty {
            self.inner.write_all(b"\n")?;
            let formatter = PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut self.inner, formatter);
            record.serialize(&mut ser)?;
        } else {
            serde_json::to_writer(&mut self.inner, record)?;
        }
        self.count += 1;
        Ok(())
    }

    fn count(&self) -> usize {
        self.count
    }
}
