use anyhow::Context;
use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod mcp;
mod tools;
mod utils;

use mcp::server::{McpServer, ReaderConfig};
use utils::p7m_extract::DEFAULT_STRIP_PASSES;
use utils::session::DEFAULT_MAX_INPUT_BYTES;

/// Prints a framed banner to stderr, one centered line per entry.
fn print_box(lines: &[&str]) {
    const BOX_WIDTH: usize = 60;
    const CONTENT_WIDTH: usize = BOX_WIDTH - 4;

    eprintln!("\n\x1b[36m╔{}╗", "═".repeat(BOX_WIDTH - 2));
    for line in lines {
        let len = line.chars().count();
        if len < CONTENT_WIDTH {
            let left = (CONTENT_WIDTH - len) / 2;
            let right = CONTENT_WIDTH - len - left;
            eprintln!("║  {}\x1b[0m{}\x1b[36m{}  ║", " ".repeat(left), line, " ".repeat(right));
        } else {
            eprintln!("║  \x1b[0m{}\x1b[36m  ║", line);
        }
    }
    eprintln!("╚{}╝\x1b[0m\n", "═".repeat(BOX_WIDTH - 2));
}

fn cli() -> Command {
    Command::new("p7m-reader")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Recover the PDF embedded in signed .p7m files")
        .long_about(
            "Runs a Model Context Protocol server on stdio with the following tools:\n\
            - p7m-open: Open a .p7m file and read the text of the PDF it wraps\n\
            - p7m-save: Write the recovered PDF to disk\n\
            - p7m-reset: Close the open document\n\
            - p7m-inspect: Show how the PDF was located inside the envelope\n\n\
            With --extract, converts a single file and exits instead.",
        )
        .arg(
            Arg::new("extract")
                .long("extract")
                .short('x')
                .value_name("FILE")
                .help("Extract the PDF from FILE, print the written path and exit")
                .value_parser(value_parser!(PathBuf))
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .short('o')
                .value_name("DIR")
                .env("P7M_OUTPUT_DIR")
                .help("Directory for extracted PDFs (default: next to the .p7m file)")
                .value_parser(value_parser!(PathBuf))
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("passes")
                .long("passes")
                .value_name("N")
                .env("P7M_STRIP_PASSES")
                .help("Number of full pattern-stripping passes before the markers are searched")
                .value_parser(value_parser!(usize))
                .default_value("2")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("max-input-bytes")
                .long("max-input-bytes")
                .value_name("BYTES")
                .env("P7M_MAX_INPUT_BYTES")
                .help("Refuse envelopes larger than this")
                .value_parser(value_parser!(u64))
                .default_value("104857600")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors and skip the banner (for MCP clients)")
                .action(clap::ArgAction::SetTrue),
        )
}

fn config_from_matches(matches: &ArgMatches) -> ReaderConfig {
    ReaderConfig {
        output_dir: matches.get_one::<PathBuf>("output-dir").cloned(),
        strip_passes: matches
            .get_one::<usize>("passes")
            .copied()
            .unwrap_or(DEFAULT_STRIP_PASSES),
        max_input_bytes: matches
            .get_one::<u64>("max-input-bytes")
            .copied()
            .unwrap_or(DEFAULT_MAX_INPUT_BYTES),
    }
}

fn init_tracing(quiet: bool) {
    // stdout carries JSON-RPC (or the extracted path), so logs go to stderr
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn extract_once(config: &ReaderConfig, path: &Path) -> anyhow::Result<PathBuf> {
    let mut session = config.new_session();
    session
        .load(path)
        .await
        .with_context(|| format!("failed to extract a PDF from {}", path.display()))?;
    let written = session
        .export(config.output_dir.as_deref())
        .await
        .context("failed to write the extracted PDF")?;
    Ok(written)
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    let quiet = matches.get_flag("quiet");
    init_tracing(quiet);

    let config = config_from_matches(&matches);
    info!(
        passes = config.strip_passes,
        max_input_bytes = config.max_input_bytes,
        output_dir = ?config.output_dir,
        "Configuration loaded"
    );

    if let Some(path) = matches.get_one::<PathBuf>("extract") {
        match extract_once(&config, path).await {
            Ok(written) => println!("{}", written.display()),
            Err(e) => {
                error!("{:#}", e);
                process::exit(1);
            }
        }
        return;
    }

    if !quiet {
        print_box(&[
            "",
            "P7M Reader: signed PDF recovery",
            "",
            "Model Context Protocol server for .p7m documents",
            "",
        ]);
    }

    info!("Starting MCP server...");
    let mut server = McpServer::new(config);
    if let Err(e) = server.start().await {
        error!("Server stopped: {:#}", e);
        process::exit(1);
    }
}
