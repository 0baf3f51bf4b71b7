//! Udev rule file operations: listing, viewing, creation, reload.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::runner::{PasswordPrompt, PrivilegedRunner, RunOutcome};

/// Directory udev reads rule files from.
pub const RULES_DIR: &str = "/etc/udev/rules.d";

/// Rule file this tool owns.
pub const RULE_FILE: &str = "99-octavi.rules";

/// Substring used to pick Octavi rule files out of the listing.
pub const RULE_FILTER: &str = "octavi";

/// The rule granting world access to the IFR1 under the plugdev group.
pub const RULE_LINE: &str = r#"SUBSYSTEM=="usb", ATTR{idVendor}=="04d8", ATTR{idProduct}=="e6d6", MODE="0666", GROUP="plugdev""#;

/// Errors from rule-file inspection.
#[derive(Debug, thiserror::Error)]
pub enum UdevError {
    /// The rules directory is not present on this system.
    #[error("rules directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),
    /// A file or directory could not be read.
    #[error("failed to read {}: {}", .path.display(), .source)]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// List rule files whose name contains `filter`, case-insensitively.
///
/// Names come back in the order the directory listing yields them; no
/// further sorting is applied.
///
/// # Errors
///
/// Returns [`UdevError::MissingDirectory`] when `dir` does not exist and
/// [`UdevError::Read`] when the listing fails partway.
pub fn list_rule_files(dir: &Path, filter: &str) -> Result<Vec<String>, UdevError> {
    if !dir.is_dir() {
        return Err(UdevError::MissingDirectory(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|source| UdevError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let filter = filter.to_lowercase();
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| UdevError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().contains(&filter) {
            names.push(name);
        }
    }
    Ok(names)
}

/// Read one rule file's contents for display.
///
/// # Errors
///
/// Returns [`UdevError::Read`] when the file cannot be read.
pub fn read_rule_file(dir: &Path, name: &str) -> Result<String, UdevError> {
    let path = dir.join(name);
    fs::read_to_string(&path).map_err(|source| UdevError::Read { path, source })
}

/// Write the fixed Octavi rule to [`RULE_FILE`] via the runner.
pub fn create_default_rule(
    runner: &mut PrivilegedRunner,
    prompt: &mut dyn PasswordPrompt,
) -> RunOutcome {
    info!(rule = RULE_FILE, "writing default udev rule");
    let command = format!("echo '{RULE_LINE}' > {RULES_DIR}/{RULE_FILE}");
    runner.run(&command, prompt)
}

/// Ask udev to re-read its rule files.
pub fn reload_rules(runner: &mut PrivilegedRunner, prompt: &mut dyn PasswordPrompt) -> RunOutcome {
    runner.run("udevadm control --reload-rules", prompt)
}

/// Replay kernel device events so reloaded rules take effect.
pub fn trigger_rules(runner: &mut PrivilegedRunner, prompt: &mut dyn PasswordPrompt) -> RunOutcome {
    runner.run("udevadm trigger", prompt)
}
