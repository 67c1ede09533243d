/*! Corpus discovery

A [Corpus] is the ordered list of [SourceFile]s of a run.
Directories are searched recursively for `*.txt` files, sorted lexicographically.
!*/
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Error;

use super::batchreader::BatchReader;

/// A text file to annotate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
}

impl SourceFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file and iterate over its batches.
    pub fn batches(
        &self,
        batch_size: usize,
        header_lines: usize,
    ) -> Result<BatchReader<BufReader<File>>, Error> {
        let file = File::open(&self.path)?;
        BatchReader::new(BufReader::new(file), batch_size, header_lines)
    }

    /// Annotation file path: `<stem>.json`, or `<stem>_parsed.json` when constituency
    /// parsing is on.
    ///
    /// The file is put next to the source unless `dst` is given.
    pub fn output_path(&self, parsed: bool, dst: Option<&Path>) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = if parsed { "_parsed.json" } else { ".json" };
        let filename = format!("{stem}{ext}");

        match dst {
            Some(dst) => dst.join(filename),
            None => self.path.with_file_name(filename),
        }
    }
}

/// Ordered collection of source files.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    files: Vec<SourceFile>,
}

impl Corpus {
    /// Build a corpus from files and directories.
    ///
    /// Files are kept in the given order, directories are expanded in place.
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self, Error> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                let found = Self::discover(path)?;
                if found.is_empty() {
                    warn!("no .txt files found in {:?}", path);
                }
                files.extend(found.into_iter().map(SourceFile::new));
            } else if path.is_file() {
                files.push(SourceFile::new(path.clone()));
            } else {
                return Err(Error::Custom(format!("{:?}: no such file or directory", path)));
            }
        }
        debug!("corpus has {} files", files.len());
        Ok(Self { files })
    }

    /// Recursively list `*.txt` files under `root`, sorted.
    pub fn discover(root: &Path) -> Result<Vec<PathBuf>, Error> {
        let pattern = format!(
            "{}/**/*.txt",
            glob::Pattern::escape(&root.to_string_lossy())
        );
        let mut paths = glob::glob(&pattern)?.collect::<Result<Vec<PathBuf>, _>>()?;
        paths.sort();
        Ok(paths)
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
