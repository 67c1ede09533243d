//! Corpus tagging pipeline.
//!
//! Every source file of the corpus is read batch by batch, each batch goes through the
//! [Executor], and each record is written to the file's JSON array as soon as it is produced.
//!
//! Files are processed one after the other, and so are batches. If a batch fails and the
//! policy is [FailurePolicy::Abort], the run stops and the current output file is left
//! unterminated.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use log::{error, info};
use serde::Serialize;

use crate::annotation::LineAnnotation;
use crate::error::Error;
use crate::io::reader::{Corpus, SourceFile};
use crate::io::writer::{JsonArrayWriter, WriterTrait};
use crate::pipelines::pipeline::Pipeline;

use super::Executor;

/// What to do when a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the run.
    #[default]
    Abort,
    /// Log the failure and go on with the next batch.
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(FailurePolicy::Abort),
            "skip" => Ok(FailurePolicy::Skip),
            other => Err(format!("unknown policy {other:?} (expected abort or skip)")),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => f.write_str("abort"),
            FailurePolicy::Skip => f.write_str("skip"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TagSettings {
    pub batch_size: usize,
    pub header_lines: usize,
    pub policy: FailurePolicy,
    pub pretty: bool,
    /// Output directory. Outputs go next to their sources when unset.
    pub dst: Option<PathBuf>,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            batch_size: 2000,
            header_lines: 0,
            policy: FailurePolicy::default(),
            pretty: false,
            dst: None,
        }
    }
}

/// Per-file summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub batches: usize,
    pub records: usize,
    pub skipped_lines: usize,
    pub fallback_batches: usize,
    pub failed_batches: usize,
}

pub struct Tagger {
    corpus: Corpus,
    executor: Executor,
    settings: TagSettings,
}

impl Tagger {
    pub fn new(corpus: Corpus, executor: Executor, settings: TagSettings) -> Self {
        Self {
            corpus,
            executor,
            settings,
        }
    }

    /// Annotate a single file.
    fn tag_file(&mut self, file: &SourceFile) -> Result<FileReport, Error> {
        let parsed = self.executor.capabilities().parse();
        let dst = file.output_path(parsed, self.settings.dst.as_deref());
        info!("tagging {:?} into {:?}", file.path(), dst);

        let mut report = FileReport {
            src: file.path().to_path_buf(),
            dst: dst.clone(),
            ..Default::default()
        };

        let batches = file.batches(self.settings.batch_size, self.settings.header_lines)?;
        let mut writer: JsonArrayWriter<LineAnnotation, _> =
            JsonArrayWriter::create(&dst, self.settings.pretty)?;

        for batch in batches {
            let batch = batch?;
            report.batches += 1;

            let result = self
                .executor
                .run_batch(&batch, |record| writer.write_single(&record));

            match result {
                Ok(batch_report) => {
                    report.records += batch_report.records;
                    report.skipped_lines += batch_report.skipped;
                    if batch_report.fallback {
                        report.fallback_batches += 1;
                    }
                }
                Err(e) if self.settings.policy == FailurePolicy::Skip => {
                    error!(
                        "{:?}: batch {} failed, skipping it: {}",
                        file.path(),
                        batch.index(),
                        e
                    );
                    report.failed_batches += 1;
                }
                Err(e) => {
                    error!("{:?}: batch {} failed: {}", file.path(), batch.index(), e);
                    return Err(Error::Batch {
                        path: file.path().to_path_buf(),
                        index: batch.index(),
                        source: Box::new(e),
                    });
                }
            }
        }

        writer.finish()?;
        info!(
            "{:?}: {} records from {} batches ({} lines skipped, {} batches on fallback, {} failed)",
            file.path(),
            report.records,
            report.batches,
            report.skipped_lines,
            report.fallback_batches,
            report.failed_batches
        );
        Ok(report)
    }
}

impl Pipeline<Vec<FileReport>> for Tagger {
    fn run(&mut self) -> Result<Vec<FileReport>, Error> {
        if let Some(dst) = &self.settings.dst {
            std::fs::create_dir_all(dst)?;
        }

        let files = self.corpus.files().to_vec();
        info!("tagging {} files", files.len());

        let mut reports = Vec::with_capacity(files.len());
        for file in &files {
            reports.push(self.tag_file(file)?);
        }
        Ok(reports)
    }
}
