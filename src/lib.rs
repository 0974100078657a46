//! mht2pdf Library
//!
//! Converts saved web pages (MHT/MHTML archives) into PDFs that carry the
//! page's own metadata. This library provides functionality to:
//! - Unpack MIME web archives and find the HTML document
//! - Extract title, author, publish date, source URL and more from the markup
//! - Normalize loosely formatted dates to UTC
//! - Print archives to PDF with a headless Chrome or Edge
//! - Embed metadata in the PDF info dictionary and an XMP packet
//! - Convert whole folders with per-file logging and a JSON audit sidecar
//!
//! # Example
//!
//! ```no_run
//! use mht2pdf::batch::{run, ConvertOptions, ConvertPlan};
//! use std::path::PathBuf;
//!
//! let options = ConvertOptions {
//!     source_root: PathBuf::from("saved-pages"),
//!     recurse_subdirs: true,
//!     ..ConvertOptions::default()
//! };
//!
//! let plan = ConvertPlan::resolve(&options).expect("Invalid source folder");
//! let summary = run(&plan).expect("Conversion could not start");
//! println!("ok={} fail={}", summary.ok, summary.failed);
//! ```

pub mod batch;
pub mod date;
pub mod error;
pub mod extract;
pub mod logging;
pub mod mime;
pub mod pdf;
pub mod render;
pub mod text;

// Re-export commonly used items
pub use error::{Error, Result};
