//! # Annotag
//!
//! Batch linguistic annotation of line-oriented text corpora.
//! Each `.txt` file gets a `.json` sibling holding one record per line (or per batch),
//! with tokens, tags, lemmas, character offsets and optionally constituency parses.
//!
//! ## Getting started
//!
//! ```sh
//! annotag 0.1.0
//! batch linguistic annotation of text corpora.
//!
//! USAGE:
//!     annotag <SUBCOMMAND>
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!
//! SUBCOMMANDS:
//!     check     Check that annotation files hold their source text
//!     help      Prints this message or the help of the given subcommand(s)
//!     schema    Print the JSON schema of annotation files
//!     tag       Annotate text files into JSON
//! ```
//!
//! Set `RUST_LOG=info` to follow progress, fallbacks and skipped lines.
use structopt::StructOpt;

use annotag::annotation::LineAnnotation;
use annotag::annotator::Annotator;
use annotag::engines::{EngineConfig, EngineKind};
use annotag::error::Error;
use annotag::io::reader::Corpus;
use annotag::pipelines::tag::{Executor, TagSettings};
use annotag::pipelines::{Pipeline, Tagger};
use annotag::processing::check;

#[macro_use]
extern crate log;

mod cli;

fn tag(opt: cli::Tag) -> Result<(), Error> {
    let kind = EngineKind::new(opt.engine, opt.engine_cmd.as_deref())?;

    let config = EngineConfig {
        lang: opt.lang.clone(),
        processors: opt.processors.processors(),
        package: opt.package.clone(),
        model_dir: opt.model_dir.clone(),
        download: opt.download,
        backend: opt.backend,
    };

    let primary = Annotator::new(kind.build(&config)?, opt.processors, opt.sent_text)?;
    let mut executor = Executor::new(primary, opt.mode).with_layout(opt.layout);
    if !opt.transient_signatures.is_empty() {
        executor = executor.with_signatures(opt.transient_signatures.clone());
    }
    if opt.no_fallback {
        info!("running without fallback backend");
    } else {
        let config = config.on_backend(opt.fallback_backend);
        let requested = executor.capabilities();
        let sent_text = opt.sent_text;
        executor = executor.with_lazy_fallback(move || {
            info!("loading fallback engine on {}", config.backend);
            Annotator::new(kind.build(&config)?, requested, sent_text)
        });
    }

    let corpus = Corpus::from_paths(&opt.src)?;
    if corpus.is_empty() {
        warn!("no .txt file found in {:?}", opt.src);
    }

    let settings = TagSettings {
        batch_size: opt.batch_size,
        header_lines: opt.header_lines,
        policy: opt.on_error,
        pretty: opt.pretty,
        dst: opt.dst,
    };
    let mut tagger = Tagger::new(corpus, executor, settings);
    let reports = tagger.run()?;

    if let Some(dst) = opt.report {
        let mut out = csv::Writer::from_path(&dst)?;
        for report in &reports {
            out.serialize(report)?;
        }
        out.flush()?;
        info!("report written to {:?}", dst);
    }
    Ok(())
}

fn check_corpus(opt: cli::Check) -> Result<(), Error> {
    let pairs = check::discover_pairs(&opt.src)?;
    let results = check::check_all(&pairs, opt.header_lines);

    let mut failures = 0;
    for (pair, result) in pairs.iter().zip(&results) {
        match result {
            Ok(check::Verdict::Equivalent) => {
                info!("{:?}: equivalent", pair.annotations)
            }
            Ok(verdict) => {
                error!("{:?}: {}", pair.annotations, verdict);
                failures += 1;
            }
            Err(e) => {
                error!("{:?}: {}", pair.annotations, e);
                failures += 1;
            }
        }
    }

    if let Some(dst) = opt.report {
        check::write_report(&dst, &pairs, &results)?;
    }

    if failures > 0 {
        return Err(Error::Custom(format!(
            "{} of {} annotation files failed the check",
            failures,
            pairs.len()
        )));
    }
    println!("{} annotation files checked, all equivalent", pairs.len());
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::init();

    let opt = cli::Annotag::from_args();
    debug!("cli args\n{:#?}", opt);

    match opt {
        cli::Annotag::Tag(t) => tag(t)?,
        cli::Annotag::Check(c) => check_corpus(c)?,
        cli::Annotag::Schema => {
            let schema = schemars::schema_for!(Vec<LineAnnotation>);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    };
    Ok(())
}
