//! Command line arguments and parameters management/parsing.
use std::path::PathBuf;

use oxilangtag::LanguageTag;
use structopt::StructOpt;

use annotag::annotator::{Capabilities, SentText};
use annotag::engines::{Backend, EngineName};
use annotag::io::reader::Mode;
use annotag::pipelines::tag::{FailurePolicy, Layout};

#[derive(Debug, StructOpt)]
#[structopt(name = "annotag", about = "batch linguistic annotation of text corpora.")]
/// Holds every command that is callable by the `annotag` command.
pub enum Annotag {
    #[structopt(about = "Annotate text files into JSON")]
    Tag(Tag),
    #[structopt(about = "Check that annotation files hold their source text")]
    Check(Check),
    #[structopt(about = "Print the JSON schema of annotation files")]
    Schema,
}

/// Validates a BCP47 language tag.
fn parse_lang(s: &str) -> Result<LanguageTag<String>, oxilangtag::LanguageTagParseError> {
    LanguageTag::parse(s.to_string())
}

#[derive(Debug, StructOpt)]
/// Tag command and parameters.
///
/// ```sh
/// annotag-tag 0.1.0
/// Annotate text files into JSON
///
/// USAGE:
///     annotag tag [FLAGS] [OPTIONS] --lang <lang> <src>...
///
/// ARGS:
///     <src>...    source files or directories (searched for *.txt)
/// ```
pub struct Tag {
    #[structopt(
        parse(from_os_str),
        required = true,
        help = "source files or directories (searched for *.txt)"
    )]
    pub src: Vec<PathBuf>,
    #[structopt(
        parse(from_os_str),
        long = "dst",
        help = "output directory. Outputs are written next to their sources by default."
    )]
    pub dst: Option<PathBuf>,
    #[structopt(long = "lang", parse(try_from_str = parse_lang), help = "language of the corpus (BCP47)")]
    pub lang: LanguageTag<String>,
    #[structopt(
        long = "processors",
        default_value = "tag",
        help = "annotation depth: tokenize, tag or parse"
    )]
    pub processors: Capabilities,
    #[structopt(
        long = "batch-size",
        short = "s",
        default_value = "2000",
        help = "number of lines per batch"
    )]
    pub batch_size: usize,
    #[structopt(
        long = "mode",
        default_value = "line",
        help = "line: one engine call per line. join: one call per batch."
    )]
    pub mode: Mode,
    #[structopt(
        long = "layout",
        default_value = "unit",
        help = "unit: one record per line (or batch). sentence: one record per sentence."
    )]
    pub layout: Layout,
    #[structopt(long = "engine", default_value = "rule", help = "engine: rule or process")]
    pub engine: EngineName,
    #[structopt(
        long = "engine-cmd",
        help = "annotation server command line, for the process engine"
    )]
    pub engine_cmd: Option<String>,
    #[structopt(long = "backend", default_value = "gpu", help = "primary backend")]
    pub backend: Backend,
    #[structopt(
        long = "fallback-backend",
        default_value = "cpu",
        help = "backend used on transient primary backend errors"
    )]
    pub fallback_backend: Backend,
    #[structopt(long = "no-fallback", help = "fail on transient backend errors")]
    pub no_fallback: bool,
    #[structopt(
        long = "transient-signature",
        number_of_values = 1,
        help = "error message fragment marking a transient backend error (repeatable, replaces the defaults)"
    )]
    pub transient_signatures: Vec<String>,
    #[structopt(parse(from_os_str), long = "model-dir", help = "model directory")]
    pub model_dir: Option<PathBuf>,
    #[structopt(long = "download", help = "allow the engine to fetch missing models")]
    pub download: bool,
    #[structopt(long = "package", default_value = "default", help = "model package")]
    pub package: String,
    #[structopt(
        long = "on-error",
        default_value = "abort",
        help = "on batch failure: abort or skip"
    )]
    pub on_error: FailurePolicy,
    #[structopt(
        long = "header-lines",
        default_value = "0",
        help = "number of lines to ignore at the start of each file"
    )]
    pub header_lines: usize,
    #[structopt(long = "pretty", help = "indent JSON output")]
    pub pretty: bool,
    #[structopt(
        long = "sent-text",
        default_value = "surface",
        help = "sent_text content: surface (the sentence text as found in the source) or lemmas"
    )]
    pub sent_text: SentText,
    #[structopt(
        parse(from_os_str),
        long = "report",
        help = "write a per-file CSV report there"
    )]
    pub report: Option<PathBuf>,
}

#[derive(Debug, StructOpt)]
/// Check command and parameters.
pub struct Check {
    #[structopt(
        parse(from_os_str),
        required = true,
        help = "directories (or .txt files) holding sources and annotations"
    )]
    pub src: Vec<PathBuf>,
    #[structopt(
        long = "header-lines",
        default_value = "0",
        help = "number of lines to ignore at the start of each source"
    )]
    pub header_lines: usize,
    #[structopt(parse(from_os_str), long = "report", help = "write a CSV report there")]
    pub report: Option<PathBuf>,
}
