//! mht2pdf CLI tool
//!
//! Converts folders of saved web pages to metadata-rich PDFs, and inspects
//! archives and PDFs.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;

use mht2pdf::batch::{self, ConvertOptions, ConvertPlan};
use mht2pdf::extract::extract_from_mht;
use mht2pdf::logging;
use mht2pdf::pdf::read_info;
use mht2pdf::render::BrowserChoice;

/// mht2pdf - Convert MHT/MHTML archives to PDFs with embedded metadata
#[derive(Parser)]
#[command(name = "mht2pdf")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Convert every archive in a folder into <folder>/_pdf_archive
    mht2pdf convert --source-root ~/saved-pages

    # Walk subfolders, skipping PDFs that already exist
    mht2pdf convert --source-root ~/saved-pages --recurse-subdirs --skip-existing

    # Use Edge and a separate output folder
    mht2pdf convert --source-root ~/saved-pages --output-root ~/pdfs --browser edge

    # Show what would be embedded for one archive
    mht2pdf extract ~/saved-pages/article.mht

    # Show the metadata of a converted PDF
    mht2pdf info ~/saved-pages/_pdf_archive/article.pdf")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a folder of archives to PDF
    Convert {
        /// Folder containing .mht/.mhtml files
        #[arg(long)]
        source_root: PathBuf,

        /// Output folder (default: <source-root>/_pdf_archive)
        #[arg(long)]
        output_root: Option<PathBuf>,

        /// Log file (default: <output-root>/logs/convert.log)
        #[arg(long, env = "MHT2PDF_LOG_PATH")]
        log_path: Option<PathBuf>,

        /// Browser to print with: auto, chrome or edge
        #[arg(long, default_value = "auto")]
        browser: BrowserChoice,

        /// Browser executable to use instead of searching for one
        #[arg(long, env = "MHT2PDF_BROWSER")]
        browser_path: Option<PathBuf>,

        /// Only convert the first N files (0 = all)
        #[arg(long, default_value_t = 0)]
        max_files: usize,

        /// Leave existing non-empty PDFs alone
        #[arg(long)]
        skip_existing: bool,

        /// Include archives in subfolders
        #[arg(long)]
        recurse_subdirs: bool,
    },

    /// Print the metadata extracted from one archive as JSON
    Extract {
        /// MHT/MHTML file to inspect
        input: PathBuf,
    },

    /// Show the metadata embedded in a PDF
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            source_root,
            output_root,
            log_path,
            browser,
            browser_path,
            max_files,
            skip_existing,
            recurse_subdirs,
        } => cmd_convert(ConvertOptions {
            source_root,
            output_root,
            log_path,
            browser,
            browser_path,
            max_files,
            skip_existing,
            recurse_subdirs,
        }),
        Commands::Extract { input } => cmd_extract(input).map(|()| 0),
        Commands::Info { input } => cmd_info(input).map(|()| 0),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Convert a folder; returns the process exit code
fn cmd_convert(options: ConvertOptions) -> anyhow::Result<i32> {
    let plan = ConvertPlan::resolve(&options).context("Cannot use source root")?;
    logging::init_with_file(&plan.log_path)
        .with_context(|| format!("Cannot open log file {}", plan.log_path.display()))?;

    match batch::run(&plan) {
        Ok(summary) => Ok(summary.exit_code()),
        Err(e) => {
            error!("FATAL: {}", e);
            Err(e.into())
        }
    }
}

/// Print extracted metadata for one archive
fn cmd_extract(input: PathBuf) -> anyhow::Result<()> {
    logging::init_stderr()?;

    let mut meta = extract_from_mht(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    meta.filename = input.file_name().map(|n| n.to_string_lossy().into_owned());
    meta.source_path = Some(
        std::path::absolute(&input)
            .unwrap_or_else(|_| input.clone())
            .display()
            .to_string(),
    );

    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> anyhow::Result<()> {
    logging::init_stderr()?;

    let info = read_info(&input).with_context(|| format!("Failed to read {}", input.display()))?;

    println!("File: {}", input.display());
    println!("Pages: {}", info.page_count);
    for (key, value) in &info.entries {
        println!("{}: {}", key, value);
    }
    println!("XMP: {}", if info.xmp.is_some() { "present" } else { "none" });

    Ok(())
}
