/// バイトコード構造化 CLI
///
/// Usage:
///   structurer listing.json
///   structurer listing.json --config options.json --offsets
///   structurer bodies.json --json

use anyhow::{Context, Result};
use bytecode_structurer::{BodyDecompiler, DecompileOptions, DecompiledBody, ListingEntry};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "structurer")]
#[command(about = "Recover structured control flow from decoded bytecode listings", long_about = None)]
struct Cli {
    /// Listing JSON (one body, or an array of bodies)
    #[arg(value_name = "LISTING")]
    listing: PathBuf,

    /// Options JSON
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print jumps as-is without structuring
    #[arg(long)]
    raw: bool,

    /// Prefix each statement with its start offset
    #[arg(long)]
    offsets: bool,

    /// Spaces per indent level
    #[arg(long, value_name = "N")]
    indent: Option<usize>,

    /// Maximum rewrite passes per body
    #[arg(long, value_name = "N")]
    max_passes: Option<usize>,

    /// Emit results as JSON
    #[arg(long)]
    json: bool,
}

/// 入力ファイルの形式
#[derive(Deserialize)]
#[serde(untagged)]
enum ListingFile {
    Single(Vec<ListingEntry>),
    Batch(Vec<Vec<ListingEntry>>),
}

impl ListingFile {
    fn into_bodies(self) -> Vec<Vec<ListingEntry>> {
        match self {
            ListingFile::Single(listing) => vec![listing],
            ListingFile::Batch(listings) => listings,
        }
    }
}

fn load_options(cli: &Cli) -> Result<DecompileOptions> {
    let mut options = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => DecompileOptions::default(),
    };

    // フラグで上書き
    if cli.raw {
        options.create_control_statements = false;
    }
    if cli.offsets {
        options.show_start_offsets = true;
    }
    if let Some(width) = cli.indent {
        options.indent_width = width;
    }
    if cli.max_passes.is_some() {
        options.max_passes = cli.max_passes;
    }
    Ok(options)
}

fn load_listings(path: &Path) -> Result<Vec<Vec<ListingEntry>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read listing {}", path.display()))?;
    let file: ListingFile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid listing {}", path.display()))?;
    Ok(file.into_bodies())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = load_options(&cli)?;
    let listings = load_listings(&cli.listing)?;
    info!("Structuring {} bodies from {}", listings.len(), cli.listing.display());

    let decompiler = BodyDecompiler::new(options);
    let mut bodies: Vec<DecompiledBody> = Vec::new();
    for (index, result) in decompiler.decompile_bodies(listings).into_iter().enumerate() {
        let body = result.with_context(|| format!("Body {} rejected", index))?;
        bodies.push(body);
    }

    let incomplete = bodies.iter().filter(|b| b.incomplete_control_flow).count();
    let with_errors = bodies.iter().filter(|b| b.has_errors).count();
    info!(
        "Done: {} bodies, {} incomplete, {} with decode errors",
        bodies.len(),
        incomplete,
        with_errors
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&bodies)?);
    } else if let [body] = bodies.as_slice() {
        print!("{}", body.text);
    } else {
        for (index, body) in bodies.iter().enumerate() {
            println!("// body {}", index);
            print!("{}", body.text);
            println!();
        }
    }
    Ok(())
}
