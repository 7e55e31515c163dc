//! docsync-convert - plain JSON document <-> event archive converter
//!
//! `up` wraps a plain JSON document as a single-event archive; `down`
//! replays an archive to a chosen tip and writes out the resulting plain
//! JSON document (spec.md §6).

mod archive;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::ser::{CompactFormatter, PrettyFormatter, Serializer};
use serde_json::Value;

use archive::Archive;

/// Convert between plain JSON documents and docsync event archives.
#[derive(Parser, Debug)]
#[command(name = "docsync-convert")]
#[command(about = "Convert between plain JSON documents and docsync event archives")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wrap a plain JSON document as a single-event archive.
    Up {
        /// Input plain JSON document.
        input: PathBuf,
        /// Output event archive.
        doc: PathBuf,
        /// Indent output by 4 spaces instead of writing it compact.
        #[arg(long)]
        pretty: bool,
    },
    /// Replay an archive to a tip and write out the resulting document.
    Down {
        /// Input event archive.
        doc: PathBuf,
        /// Output plain JSON document.
        r#static: PathBuf,
        /// Hex prefix of the event to replay to; must match exactly one event.
        tip_prefix: String,
        /// Indent output by 4 spaces instead of writing it compact.
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("docsync-convert: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Up { input, doc, pretty } => run_up(&input, &doc, pretty),
        Command::Down {
            doc,
            r#static,
            tip_prefix,
            pretty,
        } => run_down(&doc, &r#static, &tip_prefix, pretty),
    }
}

fn run_up(input: &PathBuf, doc: &PathBuf, pretty: bool) -> Result<()> {
    let value: Value = read_json(input)?;
    let archive = Archive::from_value(value).context("failed to hash input document")?;
    write_json(doc, &archive, pretty)
}

fn run_down(doc: &PathBuf, static_path: &PathBuf, tip_prefix: &str, pretty: bool) -> Result<()> {
    let archive: Archive = read_json(doc)?;
    let tip = archive
        .resolve_prefix(tip_prefix)
        .context("failed to resolve tip prefix")?;
    let mut document = archive.into_document();
    document
        .goto(tip, |_| {})
        .context("failed to replay event chain to the requested tip")?;
    write_json(static_path, &document.export(), pretty)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse JSON from {}", path.display()))
}

fn write_json<T: Serialize>(path: &PathBuf, value: &T, pretty: bool) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    if pretty {
        let mut serializer = Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut serializer)
    } else {
        let mut serializer = Serializer::with_formatter(&mut writer, CompactFormatter);
        value.serialize(&mut serializer)
    }
    .with_context(|| format!("failed to write {}", path.display()))?;

    use std::io::Write;
    writer.write_all(b"\n")?;
    Ok(())
}
