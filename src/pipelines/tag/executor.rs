/*! Fault-tolerant batch execution.

Each batch starts on the primary annotator. When the engine fails with an error matching one
of the transient signatures (typically an accelerator the installed kernels do not support),
the batch is resumed on the fallback annotator, from the unit that failed. Units emitted
before the failure are kept, so the batch content is the same as without failure.

Other errors depend on the [Mode]:
- [Mode::Line]: the line is skipped with a warning, the batch goes on,
- [Mode::Join]: the batch fails.

A transient error on the fallback (or without fallback) fails the batch, and so does a fatal
engine error. Engines are asked to release their transient buffers after every batch, failed
or not.
!*/
use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};

use crate::annotation::{LineAnnotation, SentenceAnnotation};
use crate::annotator::{Annotator, Capabilities};
use crate::engines::EngineError;
use crate::error::Error;
use crate::io::reader::{Batch, Mode};

/// Error messages recognized as backend incompatibilities.
pub const DEFAULT_TRANSIENT_SIGNATURES: [&str; 6] = [
    "no kernel image is available for execution on the device",
    "invalid device function",
    "CUBLAS_STATUS_ARCH_MISMATCH",
    "CUBLAS_STATUS_NOT_SUPPORTED",
    "CUDNN_STATUS_ARCH_MISMATCH",
    "CUDA out of memory",
];

/// How records are cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// One record per unit of work (line or joined batch).
    #[default]
    Unit,
    /// One record per sentence.
    Sentence,
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unit" => Ok(Layout::Unit),
            "sentence" => Ok(Layout::Sentence),
            other => Err(format!("unknown layout {other:?} (expected unit or sentence)")),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Unit => f.write_str("unit"),
            Layout::Sentence => f.write_str("sentence"),
        }
    }
}

/// Outcome of a successful batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records emitted.
    pub records: usize,
    /// Lines skipped after a per-line error.
    pub skipped: usize,
    /// Whether the batch switched to the fallback annotator.
    pub fallback: bool,
}

type AnnotatorFactory = Box<dyn FnOnce() -> Result<Annotator, Error>>;

enum Fallback {
    None,
    Pending(AnnotatorFactory),
    Ready(Annotator),
}

pub struct Executor {
    primary: Annotator,
    fallback: Fallback,
    mode: Mode,
    layout: Layout,
    signatures: Vec<String>,
}

impl Executor {
    /// Executor without fallback, using the default transient signatures.
    pub fn new(primary: Annotator, mode: Mode) -> Self {
        Self {
            primary,
            fallback: Fallback::None,
            mode,
            layout: Layout::default(),
            signatures: DEFAULT_TRANSIENT_SIGNATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_fallback(mut self, fallback: Annotator) -> Self {
        self.fallback = Fallback::Ready(fallback);
        self
    }

    /// The fallback is only built the first time a batch needs it.
    pub fn with_lazy_fallback<F>(mut self, factory: F) -> Self
    where
        F: FnOnce() -> Result<Annotator, Error> + 'static,
    {
        self.fallback = Fallback::Pending(Box::new(factory));
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Replaces the transient signatures.
    pub fn with_signatures(mut self, signatures: Vec<String>) -> Self {
        self.signatures = signatures;
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.primary.capabilities()
    }

    /// Whether `error` is a backend failure worth retrying elsewhere.
    pub fn is_transient(&self, error: &EngineError) -> bool {
        self.signatures
            .iter()
            .any(|signature| error.message().contains(signature.as_str()))
    }

    fn has_fallback(&self) -> bool {
        !matches!(self.fallback, Fallback::None)
    }

    /// Get the fallback annotator, building it if needed.
    fn fallback(&mut self) -> Result<&mut Annotator, Error> {
        if let Fallback::Pending(_) = self.fallback {
            if let Fallback::Pending(factory) = std::mem::replace(&mut self.fallback, Fallback::None)
            {
                info!("loading fallback annotator");
                let annotator = factory()?;
                if annotator.capabilities() != self.primary.capabilities() {
                    return Err(Error::Custom(format!(
                        "fallback annotator runs {}, primary runs {}",
                        annotator.capabilities(),
                        self.primary.capabilities()
                    )));
                }
                self.fallback = Fallback::Ready(annotator);
            }
        }

        match &mut self.fallback {
            Fallback::Ready(annotator) => Ok(annotator),
            _ => Err(Error::Custom("no fallback backend available".to_string())),
        }
    }

    /// Annotate `batch`, handing every record to `emit` as soon as it is produced.
    ///
    /// Records are emitted in input order. An error means the batch failed; records emitted
    /// before the failure have already been handed over.
    pub fn run_batch<F>(&mut self, batch: &Batch, mut emit: F) -> Result<BatchReport, Error>
    where
        F: FnMut(LineAnnotation) -> Result<(), Error>,
    {
        let result = self.run_units(batch, &mut emit);
        self.release();
        if let Ok(report) = &result {
            debug!("batch {}: {:?}", batch.index(), report);
        }
        result
    }

    fn run_units<F>(&mut self, batch: &Batch, emit: &mut F) -> Result<BatchReport, Error>
    where
        F: FnMut(LineAnnotation) -> Result<(), Error>,
    {
        let mut report = BatchReport::default();
        let units = batch.units(self.mode);
        let mut idx = 0;

        while let Some(unit) = units.get(idx) {
            let annotator = if report.fallback {
                self.fallback()?
            } else {
                &mut self.primary
            };

            match annotator.annotate(&unit.text) {
                Ok(sentences) => {
                    report.records += emit_records(self.layout, sentences, emit)?;
                    idx += 1;
                }
                Err(e) if e.is_fatal() => {
                    return Err(Error::Engine(e));
                }
                Err(e) if self.is_transient(&e) && !report.fallback && self.has_fallback() => {
                    warn!(
                        "batch {}: backend failure on line {} ({}), resuming on fallback backend",
                        batch.index(),
                        unit.line,
                        e
                    );
                    report.fallback = true;
                }
                Err(e) if self.is_transient(&e) || self.mode == Mode::Join => {
                    return Err(Error::Engine(e));
                }
                Err(e) => {
                    warn!(
                        "batch {}: skipping line {}: {}",
                        batch.index(),
                        unit.line,
                        e
                    );
                    report.skipped += 1;
                    idx += 1;
                }
            }
        }

        Ok(report)
    }

    fn release(&mut self) {
        self.primary.release();
        if let Fallback::Ready(annotator) = &mut self.fallback {
            annotator.release();
        }
    }
}

/// Hands sentences over as records, following `layout`.
fn emit_records<F>(
    layout: Layout,
    sentences: Vec<SentenceAnnotation>,
    emit: &mut F,
) -> Result<usize, Error>
where
    F: FnMut(LineAnnotation) -> Result<(), Error>,
{
    match layout {
        Layout::Unit => {
            emit(LineAnnotation::new(sentences))?;
            Ok(1)
        }
        Layout::Sentence => {
            let count = sentences.len();
            for sentence in sentences {
                emit(LineAnnotation::new(vec![sentence]))?;
            }
            Ok(count)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use oxilangtag::LanguageTag;

    use crate::annotator::SentText;
    use crate::engines::{Engine, Processor, RuleEngine, Sentence};
    use crate::io::reader::Line;

    use super::*;

    const CUDA: &str = "CUDA error: no kernel image is available for execution on the device";

    /// Rule engine failing on texts containing a trigger word.
    struct Faulty {
        inner: RuleEngine,
        trigger: &'static str,
        message: &'static str,
        fatal: bool,
        calls: Rc<RefCell<usize>>,
        releases: Rc<RefCell<usize>>,
    }

    impl Faulty {
        fn new(trigger: &'static str, message: &'static str) -> Self {
            Self {
                inner: RuleEngine::new(&LanguageTag::parse("en".to_string()).unwrap()),
                trigger,
                message,
                fatal: false,
                calls: Rc::new(RefCell::new(0)),
                releases: Rc::new(RefCell::new(0)),
            }
        }

        fn fatal(mut self) -> Self {
            self.fatal = true;
            self
        }
    }

    impl Engine for Faulty {
        fn supports(&self, processor: Processor) -> bool {
            self.inner.supports(processor)
        }

        fn annotate(
            &mut self,
            text: &str,
            processors: &[Processor],
        ) -> Result<Vec<Sentence>, EngineError> {
            *self.calls.borrow_mut() += 1;
            if !self.trigger.is_empty() && text.contains(self.trigger) {
                return Err(if self.fatal {
                    EngineError::fatal(self.message)
                } else {
                    EngineError::new(self.message)
                });
            }
            self.inner.annotate(text, processors)
        }

        fn parse(&mut self, text: &str) -> Result<Vec<String>, EngineError> {
            self.inner.parse(text)
        }

        fn release(&mut self) {
            *self.releases.borrow_mut() += 1;
        }
    }

    fn annotator(engine: impl Engine + 'static) -> Annotator {
        Annotator::new(Box::new(engine), Capabilities::Tag, SentText::Surface).unwrap()
    }

    fn batch(index: usize, lines: &[&str]) -> Batch {
        Batch::new(
            index,
            lines
                .iter()
                .enumerate()
                .map(|(i, l)| Line {
                    number: i + 1,
                    text: l.to_string(),
                })
                .collect(),
        )
    }

    fn run(executor: &mut Executor, batch: &Batch) -> (Result<BatchReport, Error>, Vec<LineAnnotation>) {
        let mut records = Vec::new();
        let report = executor.run_batch(batch, |r| {
            records.push(r);
            Ok(())
        });
        (report, records)
    }

    const LINES: [&str; 3] = ["The cat sat.", "The GPU dog ran. It barked.", "Birds fly."];

    #[test]
    fn no_failure() {
        let mut ex = Executor::new(annotator(Faulty::new("", "")), Mode::Line);
        let (report, records) = run(&mut ex, &batch(0, &LINES));
        let report = report.unwrap();
        assert_eq!(report.records, 3);
        assert!(!report.fallback);
        assert_eq!(records[1].sent_annotations.len(), 2);
    }

    #[test]
    fn fallback_gives_same_content() {
        let mut reference = Executor::new(annotator(Faulty::new("", "")), Mode::Line);
        let (_, expected) = run(&mut reference, &batch(4, &LINES));

        let fallback = Faulty::new("", "");
        let fallback_calls = fallback.calls.clone();
        let mut ex = Executor::new(annotator(Faulty::new("GPU", CUDA)), Mode::Line)
            .with_fallback(annotator(fallback));
        let (report, records) = run(&mut ex, &batch(4, &LINES));
        let report = report.unwrap();

        assert!(report.fallback);
        assert_eq!(report.records, 3);
        assert_eq!(records, expected);
        // resumed from the failing line: lines 2 and 3 only
        assert_eq!(*fallback_calls.borrow(), 2);
    }

    #[test]
    fn lazy_fallback_built_once() {
        let built = Rc::new(RefCell::new(0));
        let counter = built.clone();
        let mut ex = Executor::new(annotator(Faulty::new("GPU", CUDA)), Mode::Join)
            .with_lazy_fallback(move || {
                *counter.borrow_mut() += 1;
                Ok(annotator(Faulty::new("", "")))
            });

        assert_eq!(*built.borrow(), 0);
        for index in 0..3 {
            let (report, records) = run(&mut ex, &batch(index, &LINES));
            assert!(report.unwrap().fallback);
            assert_eq!(records.len(), 1);
        }
        assert_eq!(*built.borrow(), 1);
    }

    #[test]
    fn transient_without_fallback_fails() {
        let mut ex = Executor::new(annotator(Faulty::new("GPU", CUDA)), Mode::Line);
        let (report, records) = run(&mut ex, &batch(0, &LINES));
        assert!(report.is_err());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn transient_on_fallback_fails() {
        let mut ex = Executor::new(annotator(Faulty::new("GPU", CUDA)), Mode::Line)
            .with_fallback(annotator(Faulty::new("GPU", CUDA)));
        let (report, _) = run(&mut ex, &batch(0, &LINES));
        assert!(matches!(report, Err(Error::Engine(_))));
    }

    #[test]
    fn bad_line_is_skipped() {
        let mut ex = Executor::new(annotator(Faulty::new("GPU", "index out of range")), Mode::Line);
        let (report, records) = run(&mut ex, &batch(0, &LINES));
        let report = report.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.records, 2);
        assert_eq!(records.len(), LINES.len() - 1);
        assert_eq!(records[1].sent_annotations[0].sent_text, "Birds fly.");
    }

    #[test]
    fn bad_join_batch_fails() {
        let mut ex = Executor::new(annotator(Faulty::new("GPU", "index out of range")), Mode::Join);
        let (report, records) = run(&mut ex, &batch(0, &LINES));
        assert!(report.is_err());
        assert!(records.is_empty());
    }

    #[test]
    fn fatal_error_fails_the_line_batch() {
        let engine = Faulty::new("GPU", "invalid response from engine").fatal();
        let calls = engine.calls.clone();
        let mut ex = Executor::new(annotator(engine), Mode::Line)
            .with_fallback(annotator(Faulty::new("", "")));
        let (report, records) = run(&mut ex, &batch(0, &LINES));
        assert!(matches!(report, Err(Error::Engine(ref e)) if e.is_fatal()));
        assert_eq!(records.len(), 1);
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn release_after_every_batch() {
        let engine = Faulty::new("GPU", "index out of range");
        let releases = engine.releases.clone();
        let mut ex = Executor::new(annotator(engine), Mode::Join);

        let (report, _) = run(&mut ex, &batch(0, &["Birds fly."]));
        assert!(report.is_ok());
        assert_eq!(*releases.borrow(), 1);

        let (report, _) = run(&mut ex, &batch(1, &LINES));
        assert!(report.is_err());
        assert_eq!(*releases.borrow(), 2);
    }

    #[test]
    fn custom_signatures() {
        let ex = Executor::new(annotator(Faulty::new("", "")), Mode::Line)
            .with_signatures(vec!["MPS backend".to_string()]);
        assert!(ex.is_transient(&EngineError::new("MPS backend out of memory")));
        assert!(!ex.is_transient(&EngineError::new(CUDA)));
    }

    #[test]
    fn sentence_layout() {
        let mut ex =
            Executor::new(annotator(Faulty::new("", "")), Mode::Join).with_layout(Layout::Sentence);
        let (report, records) = run(&mut ex, &batch(0, &LINES));
        assert_eq!(report.unwrap().records, 4);
        assert!(records.iter().all(|r| r.sent_annotations.len() == 1));
    }

    #[test]
    fn fallback_capabilities_must_match() {
        let tokenizer =
            Annotator::new(Box::new(Faulty::new("", "")), Capabilities::Tokenize, SentText::Surface)
                .unwrap();
        let mut ex = Executor::new(annotator(Faulty::new("GPU", CUDA)), Mode::Line)
            .with_lazy_fallback(move || Ok(tokenizer));
        let (report, _) = run(&mut ex, &batch(0, &LINES));
        assert!(report.is_err());
    }
}
