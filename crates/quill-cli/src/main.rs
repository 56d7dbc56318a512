//! quill: parse SQL and print one JSON syntax tree document per statement.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser as _;
use quill_ast::{deserialize_with, fingerprint, serialize, Arena, Deserialized, Document, Statement};
use quill_parser::ParseResult;

mod config;
mod logging;

use config::Config;

fn main() {
    if let Err(error) = Command::parse().run() {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}

/// Handles command-line parsing.
#[derive(clap::Parser)]
#[command(about = "Parses SQL into JSON syntax tree documents.", version)]
struct Command {
    /// SQL file to read; standard input when omitted.
    file: Option<PathBuf>,

    /// Configuration file path.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Indent each document.
    #[arg(short, long)]
    pretty: bool,

    /// Wrap each document with its SHA-256 fingerprint.
    #[arg(short, long)]
    fingerprint: bool,

    /// Derive display names before encoding.
    #[arg(short = 'n', long)]
    names: bool,

    /// Decode every document again and check it matches the parsed statement.
    #[arg(long)]
    verify: bool,

    /// Maximum nesting depth, overriding the configuration.
    #[arg(long)]
    max_depth: Option<usize>,
}

impl Command {
    fn run(self) -> anyhow::Result<()> {
        dotenvy::dotenv().ok();

        let mut config = match &self.config {
            Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => Config::from_env()?,
        };
        if let Some(depth) = self.max_depth {
            if depth == 0 {
                bail!("--max-depth must be at least 1");
            }
            config.parser.max_depth = depth;
        }
        config.output.pretty |= self.pretty;
        config.output.fingerprint |= self.fingerprint;
        config.output.names |= self.names;
        logging::init(&config.logging)?;

        let sql = match &self.file {
            Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
            None => {
                let mut sql = String::new();
                std::io::stdin().read_to_string(&mut sql).context("reading standard input")?;
                sql
            }
        };

        let mut parsed = quill_parser::parse_with(&sql, &config.parse_options())?;
        if config.output.names {
            parsed.derive_names()?;
        }
        tracing::info!(statements = parsed.statements().len(), "parsed input");

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for handle in parsed.statements() {
            let stmt = parsed.statement(*handle)?;
            let doc = serialize(stmt, parsed.arena())?;
            if self.verify {
                verify(&parsed, stmt, &doc, &config)?;
            }
            let doc = if config.output.fingerprint {
                serde_json::json!({
                    "fingerprint": fingerprint(stmt, parsed.arena())?,
                    "statement": doc,
                })
            } else {
                doc
            };
            let text = if config.output.pretty {
                serde_json::to_string_pretty(&doc)?
            } else {
                serde_json::to_string(&doc)?
            };
            writeln!(out, "{text}")?;
        }
        Ok(())
    }
}

/// Decode `doc` into a fresh arena and compare it against `stmt`.
fn verify(parsed: &ParseResult, stmt: &Statement, doc: &Document, config: &Config) -> anyhow::Result<()> {
    let decoded: Deserialized<Statement> = deserialize_with(doc, &config.decode_options())?;
    let mut arena = Arena::new();
    let copy = arena.splice(decoded)?;
    if parsed.arena().bind(stmt)? != arena.bind(&copy)? {
        bail!("{:?} statement changed after a document round trip", stmt.statement_type());
    }
    tracing::debug!(kind = ?stmt.statement_type(), "document verified");
    Ok(())
}
