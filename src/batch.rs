//! Batch conversion
//!
//! Walks a source folder for `.mht`/`.mhtml` archives and runs each one
//! through extraction, rendering and metadata embedding. Per-file problems
//! are logged and counted; only setup problems abort the run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use glob::glob;
use tracing::{error, info, warn};

use crate::date::to_iso;
use crate::error::{Error, Result};
use crate::extract::{extract_from_mht, source_file_time, ExtractedMetadata};
use crate::pdf::{apply_metadata, DocumentMetadata};
use crate::render::{resolve_browser, BrowserChoice, Renderer};

/// Name of the per-folder output directory
pub const ARCHIVE_DIR_NAME: &str = "_pdf_archive";

const ARCHIVE_EXTENSIONS: &[&str] = &["mht", "mhtml"];

/// Options for a conversion run, as given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub source_root: PathBuf,
    pub output_root: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub browser: BrowserChoice,
    /// Explicit browser executable, bypassing discovery
    pub browser_path: Option<PathBuf>,
    /// Only convert the first N files (0 = all)
    pub max_files: usize,
    pub skip_existing: bool,
    pub recurse_subdirs: bool,
}

/// Fully resolved paths and switches for a run
#[derive(Debug, Clone)]
pub struct ConvertPlan {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    /// Whether the output root was given rather than defaulted
    pub explicit_output_root: bool,
    pub log_path: PathBuf,
    pub tmp_root: PathBuf,
    /// Where `.mht` inputs are copied as `.mhtml` before rendering
    pub normalized_root: PathBuf,
    /// Where throwaway browser profiles are created
    pub profile_root: PathBuf,
    pub browser: BrowserChoice,
    pub browser_path: Option<PathBuf>,
    pub max_files: usize,
    pub skip_existing: bool,
    pub recurse_subdirs: bool,
}

/// Where one source file's outputs go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub pdf: PathBuf,
    /// Source path relative to the source root
    pub rel: PathBuf,
    /// Output path as shown in `OK`/`SKIP` log lines
    pub display: PathBuf,
}

impl OutputTarget {
    /// `<stem>.metadata.json` next to the PDF
    pub fn sidecar(&self) -> PathBuf {
        self.pdf.with_extension("metadata.json")
    }
}

/// Trim surrounding whitespace from a path argument
fn trim_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(s.trim()),
        None => path.to_path_buf(),
    }
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(trim_path(path))?)
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn is_nonempty_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

impl ConvertPlan {
    /// Resolve defaults and make every path absolute
    ///
    /// The source root must be an existing directory.
    pub fn resolve(options: &ConvertOptions) -> Result<Self> {
        let source_root = resolve_path(&options.source_root)?;
        if !source_root.is_dir() {
            return Err(Error::FileNotFound(source_root));
        }

        let explicit_output_root = options.output_root.is_some();
        let output_root = match &options.output_root {
            Some(path) => resolve_path(path)?,
            None => source_root.join(ARCHIVE_DIR_NAME),
        };
        let log_path = match &options.log_path {
            Some(path) => resolve_path(path)?,
            None => output_root.join("logs").join("convert.log"),
        };
        let tmp_root = output_root
            .parent()
            .unwrap_or(output_root.as_path())
            .join("tmp");

        Ok(Self {
            normalized_root: tmp_root.join("normalized-mhtml"),
            profile_root: tmp_root.join("chrome-profiles"),
            source_root,
            output_root,
            explicit_output_root,
            log_path,
            tmp_root,
            browser: options.browser,
            browser_path: options.browser_path.as_deref().map(trim_path),
            max_files: options.max_files,
            skip_existing: options.skip_existing,
            recurse_subdirs: options.recurse_subdirs,
        })
    }

    /// Create the output and working directories
    pub fn prepare_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.output_root)?;
        fs::create_dir_all(&self.normalized_root)?;
        fs::create_dir_all(&self.profile_root)?;
        Ok(())
    }

    /// Whether `path` lives in a directory this pipeline writes to
    ///
    /// The output root only counts when it is nested inside the source root;
    /// an output root at or above the source root would hide every source.
    fn is_own_artifact(&self, path: &Path) -> bool {
        let output_inside_source =
            self.output_root.starts_with(&self.source_root) && self.output_root != self.source_root;
        (output_inside_source && path.starts_with(&self.output_root))
            || path.starts_with(&self.normalized_root)
            || path.starts_with(&self.profile_root)
    }

    /// Archives to convert, sorted, limited to `max_files` when non-zero
    pub fn find_sources(&self) -> Result<Vec<PathBuf>> {
        let base = glob::Pattern::escape(&self.source_root.to_string_lossy());
        let pattern = if self.recurse_subdirs {
            format!("{}/**/*", base)
        } else {
            format!("{}/*", base)
        };

        let mut files = Vec::new();
        for entry in glob(&pattern)? {
            match entry {
                Ok(path) => {
                    if path.is_file() && is_archive(&path) && !self.is_own_artifact(&path) {
                        files.push(path);
                    }
                }
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }

        files.sort();
        if self.max_files > 0 {
            files.truncate(self.max_files);
        }
        Ok(files)
    }

    /// Output location for `src`
    pub fn output_for(&self, src: &Path) -> Result<OutputTarget> {
        let rel = src
            .strip_prefix(&self.source_root)
            .map_err(|_| Error::InvalidPath(src.to_path_buf()))?
            .to_path_buf();

        let (pdf, shown_from) = if self.explicit_output_root {
            (self.output_root.join(&rel).with_extension("pdf"), &self.output_root)
        } else if self.recurse_subdirs {
            let stem = src
                .file_stem()
                .ok_or_else(|| Error::InvalidPath(src.to_path_buf()))?;
            let dir = src.parent().unwrap_or(self.source_root.as_path());
            let mut name = stem.to_os_string();
            name.push(".pdf");
            (dir.join(ARCHIVE_DIR_NAME).join(name), &self.source_root)
        } else {
            let name = src
                .file_name()
                .ok_or_else(|| Error::InvalidPath(src.to_path_buf()))?;
            (self.output_root.join(name).with_extension("pdf"), &self.output_root)
        };

        let display = pdf
            .strip_prefix(shown_from)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| pdf.clone());

        Ok(OutputTarget { pdf, rel, display })
    }

    /// Path of the normalized `.mhtml` copy for a `.mht` source
    fn normalized_copy(&self, rel: &Path) -> PathBuf {
        self.normalized_root.join(rel).with_extension("mhtml")
    }
}

/// Counts for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    /// Process exit code: 2 when any file failed
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            2
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Converted,
    Skipped,
    Failed,
}

/// Write the audit sidecar as pretty-printed JSON
pub fn write_sidecar(path: &Path, meta: &ExtractedMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(meta)?;
    fs::write(path, json)?;
    Ok(())
}

/// Run a whole conversion
///
/// Fails only when the run cannot start (no browser, directories not
/// creatable). Per-file failures are counted in the summary.
pub fn run(plan: &ConvertPlan) -> Result<BatchSummary> {
    plan.prepare_dirs()?;
    let browser = resolve_browser(plan.browser, plan.browser_path.as_deref())?;
    let renderer = Renderer::new(browser, plan.profile_root.clone());

    info!("Browser: {}", renderer.browser().display());
    info!("Source: {}", plan.source_root.display());

    let files = plan.find_sources()?;
    info!("Target count: {}", files.len());

    let converted_at = Utc::now();
    let mut summary = BatchSummary::default();

    for src in &files {
        match convert_file(plan, &renderer, src, converted_at) {
            FileOutcome::Converted => summary.ok += 1,
            FileOutcome::Skipped => summary.skipped += 1,
            FileOutcome::Failed => summary.failed += 1,
        }
    }

    info!("DONE ok={} fail={}", summary.ok, summary.failed);
    Ok(summary)
}

fn convert_file(
    plan: &ConvertPlan,
    renderer: &Renderer,
    src: &Path,
    converted_at: DateTime<Utc>,
) -> FileOutcome {
    let target = match plan.output_for(src) {
        Ok(target) => target,
        Err(e) => {
            error!("FAIL error: {} :: {}", src.display(), e);
            return FileOutcome::Failed;
        }
    };

    if plan.skip_existing && is_nonempty_file(&target.pdf) {
        info!("SKIP existing: {}", target.display.display());
        return FileOutcome::Skipped;
    }

    let mut normalized = None;
    let result = convert_to(plan, renderer, src, &target, converted_at, &mut normalized);

    if let Some(copy) = normalized {
        let _ = fs::remove_file(copy);
    }

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("FAIL error: {} :: {}", target.rel.display(), e);
            FileOutcome::Failed
        }
    }
}

fn convert_to(
    plan: &ConvertPlan,
    renderer: &Renderer,
    src: &Path,
    target: &OutputTarget,
    converted_at: DateTime<Utc>,
    normalized: &mut Option<PathBuf>,
) -> Result<FileOutcome> {
    if let Some(parent) = target.pdf.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut meta = extract_from_mht(src)?;
    meta.filename = src.file_name().map(|n| n.to_string_lossy().into_owned());
    meta.source_path = Some(src.display().to_string());

    // Browsers only recognise the .mhtml extension
    let render_input = if src
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mht"))
    {
        let copy = plan.normalized_copy(&target.rel);
        if let Some(parent) = copy.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, &copy)?;
        *normalized = Some(copy.clone());
        copy
    } else {
        src.to_path_buf()
    };

    let outcome = renderer.render(&render_input, &target.pdf)?;
    if !is_nonempty_file(&target.pdf) {
        error!(
            "FAIL render: {} :: {}",
            target.rel.display(),
            outcome.diagnostic()
        );
        return Ok(FileOutcome::Failed);
    }

    if meta.title.is_none() {
        meta.title = src.file_stem().map(|s| s.to_string_lossy().into_owned());
    }
    if meta.published_date_iso.is_none() {
        meta.published_date_iso = Some(to_iso(&source_file_time(src)?));
    }

    let doc_meta = DocumentMetadata::from_extracted(&meta, src, converted_at)?;
    apply_metadata(&target.pdf, &doc_meta)?;
    write_sidecar(&target.sidecar(), &meta)?;

    info!("OK: {}", target.display.display());
    Ok(FileOutcome::Converted)
}
