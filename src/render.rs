//! Headless browser rendering
//!
//! Printing to PDF is delegated entirely to Chrome or Edge. Each invocation
//! gets its own throwaway `--user-data-dir` so runs never share or lock a
//! profile.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::str::FromStr;

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Which browser family to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserChoice {
    /// Chrome first, then Edge
    #[default]
    Auto,
    Chrome,
    Edge,
}

impl BrowserChoice {
    fn search_order(self) -> &'static [BrowserChoice] {
        match self {
            BrowserChoice::Auto => &[BrowserChoice::Chrome, BrowserChoice::Edge],
            BrowserChoice::Chrome => &[BrowserChoice::Chrome],
            BrowserChoice::Edge => &[BrowserChoice::Edge],
        }
    }
}

impl FromStr for BrowserChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BrowserChoice::Auto),
            "chrome" => Ok(BrowserChoice::Chrome),
            "edge" => Ok(BrowserChoice::Edge),
            other => Err(format!("unknown browser '{}' (expected auto, chrome or edge)", other)),
        }
    }
}

impl fmt::Display for BrowserChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrowserChoice::Auto => "auto",
            BrowserChoice::Chrome => "chrome",
            BrowserChoice::Edge => "edge",
        };
        f.write_str(name)
    }
}

/// Well-known install locations for a browser on this platform
#[cfg(target_os = "windows")]
fn install_locations(browser: BrowserChoice) -> Vec<PathBuf> {
    let program_files = env::var_os("ProgramFiles").unwrap_or_else(|| r"C:\Program Files".into());
    let program_files_x86 =
        env::var_os("ProgramFiles(x86)").unwrap_or_else(|| r"C:\Program Files (x86)".into());
    let relative = match browser {
        BrowserChoice::Chrome => r"Google\Chrome\Application\chrome.exe",
        BrowserChoice::Edge => r"Microsoft\Edge\Application\msedge.exe",
        BrowserChoice::Auto => return Vec::new(),
    };
    vec![
        PathBuf::from(program_files).join(relative),
        PathBuf::from(program_files_x86).join(relative),
    ]
}

#[cfg(target_os = "macos")]
fn install_locations(browser: BrowserChoice) -> Vec<PathBuf> {
    match browser {
        BrowserChoice::Chrome => vec![PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        )],
        BrowserChoice::Edge => vec![PathBuf::from(
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        )],
        BrowserChoice::Auto => Vec::new(),
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn install_locations(_browser: BrowserChoice) -> Vec<PathBuf> {
    Vec::new()
}

/// Executable names searched for on `PATH`
fn executable_names(browser: BrowserChoice) -> &'static [&'static str] {
    match browser {
        BrowserChoice::Chrome => &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "chrome",
        ],
        BrowserChoice::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
        BrowserChoice::Auto => &[],
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = candidate.with_extension("exe");
        exe.is_file().then_some(exe)
    })
}

/// Locate the browser executable
///
/// An explicit path always wins (and must exist). Otherwise the platform's
/// install locations are checked, then `PATH`, in the choice's search order.
pub fn resolve_browser(choice: BrowserChoice, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::BrowserNotFound(format!(
            "{} does not exist",
            path.display()
        )));
    }

    for &browser in choice.search_order() {
        if let Some(found) = install_locations(browser).into_iter().find(|p| p.is_file()) {
            return Ok(found);
        }
        if let Some(found) = executable_names(browser).iter().find_map(|n| find_on_path(n)) {
            return Ok(found);
        }
    }

    Err(Error::BrowserNotFound(format!("looked for {}", choice)))
}

/// `file://` URI for a path, made absolute first
pub fn file_uri(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path)?;
    Url::from_file_path(&absolute).map_err(|()| Error::InvalidPath(absolute))
}

/// What the browser process reported
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl RenderOutcome {
    /// First line of stderr (or stdout when stderr is empty), for failure logs
    pub fn diagnostic(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        text.trim().lines().next().unwrap_or_default().to_string()
    }
}

/// Prints local files to PDF with a headless browser
#[derive(Debug, Clone)]
pub struct Renderer {
    browser: PathBuf,
    profile_root: PathBuf,
}

impl Renderer {
    /// `profile_root` is where the per-run user-data directories are created
    pub fn new(browser: PathBuf, profile_root: PathBuf) -> Self {
        Self {
            browser,
            profile_root,
        }
    }

    pub fn browser(&self) -> &Path {
        &self.browser
    }

    /// Print `input` to `output`
    ///
    /// A non-zero exit status is not an error here; callers judge success by
    /// the output file. Only failing to start the browser is an error.
    pub fn render(&self, input: &Path, output: &Path) -> Result<RenderOutcome> {
        fs::create_dir_all(&self.profile_root)?;
        let profile = tempfile::Builder::new()
            .prefix("profile-")
            .tempdir_in(&self.profile_root)?;
        let uri = file_uri(input)?;

        debug!(
            browser = %self.browser.display(),
            profile = %profile.path().display(),
            input = %uri,
            output = %output.display(),
            "Invoking headless print"
        );

        let result = Command::new(&self.browser)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(uri.as_str())
            .output();

        // Browsers can leave locked files behind; removal is best effort
        let _ = profile.close();

        let output = result?;
        Ok(RenderOutcome {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_browser_choice_parsing() {
        assert_eq!("Auto".parse::<BrowserChoice>().unwrap(), BrowserChoice::Auto);
        assert_eq!("CHROME".parse::<BrowserChoice>().unwrap(), BrowserChoice::Chrome);
        assert_eq!(" edge ".parse::<BrowserChoice>().unwrap(), BrowserChoice::Edge);
        assert!("firefox".parse::<BrowserChoice>().is_err());
    }

    #[test]
    fn test_auto_prefers_chrome() {
        assert_eq!(
            BrowserChoice::Auto.search_order(),
            &[BrowserChoice::Chrome, BrowserChoice::Edge]
        );
    }

    #[test]
    fn test_explicit_browser_must_exist() {
        let result = resolve_browser(BrowserChoice::Auto, Some(Path::new("/no/such/browser")));
        assert!(matches!(result.unwrap_err(), Error::BrowserNotFound(_)));
    }

    #[test]
    fn test_explicit_browser_wins() {
        let dir = TempDir::new().unwrap();
        let fake = dir.path().join("my-browser");
        fs::write(&fake, b"").unwrap();
        let found = resolve_browser(BrowserChoice::Edge, Some(&fake)).unwrap();
        assert_eq!(found, fake);
    }

    #[test]
    fn test_file_uri_is_absolute_and_escaped() {
        let dir = TempDir::new().unwrap();
        let uri = file_uri(&dir.path().join("my page.mhtml")).unwrap();
        assert_eq!(uri.scheme(), "file");
        assert!(uri.as_str().ends_with("/my%20page.mhtml"));
    }

    #[cfg(unix)]
    fn exit_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[cfg(unix)]
    #[test]
    fn test_diagnostic_prefers_stderr() {
        let outcome = RenderOutcome {
            status: exit_status(1),
            stdout: "stdout line\n".to_string(),
            stderr: "\n  first error\nsecond error\n".to_string(),
        };
        assert_eq!(outcome.diagnostic(), "first error");

        let outcome = RenderOutcome {
            status: exit_status(1),
            stdout: "only stdout\nmore".to_string(),
            stderr: "  ".to_string(),
        };
        assert_eq!(outcome.diagnostic(), "only stdout");

        let outcome = RenderOutcome {
            status: exit_status(0),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(outcome.diagnostic(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_render_passes_isolated_profile_and_cleans_up() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let args_log = dir.path().join("args.txt");
        let script = dir.path().join("fake-browser.sh");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\nfor a in \"$@\"; do echo \"$a\" >> '{}'; done\necho 'rendered' >&2\n",
                args_log.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let profiles = dir.path().join("profiles");
        let renderer = Renderer::new(script, profiles.clone());
        let input = dir.path().join("page.mhtml");
        fs::write(&input, b"x").unwrap();
        let output = dir.path().join("page.pdf");

        let outcome = renderer.render(&input, &output).unwrap();
        assert!(outcome.status.success());
        assert_eq!(outcome.diagnostic(), "rendered");

        let args = fs::read_to_string(&args_log).unwrap();
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(&args[..4], &["--headless=new", "--disable-gpu", "--no-first-run", "--no-default-browser-check"]);
        assert!(args[4].starts_with(&format!("--user-data-dir={}", profiles.display())));
        assert_eq!(args[5], format!("--print-to-pdf={}", output.display()));
        assert!(args[6].starts_with("file://") && args[6].ends_with("/page.mhtml"));

        // The per-run profile directory is gone, the root stays
        assert!(profiles.is_dir());
        assert_eq!(fs::read_dir(&profiles).unwrap().count(), 0);
    }
}
