//! Hidraw device discovery, identification and permission repair.
//!
//! The IFR1 shows up as `/dev/hidraw*`; which number it gets depends on
//! what else is plugged in, so the node is identified by the
//! vendor/product pair embedded in the `DEVPATH` udev reports.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::runner::{capture, PasswordPrompt, PrivilegedRunner, RunOutcome};

/// Directory device nodes appear under.
pub const DEV_DIR: &str = "/dev";

/// USB vendor ID of the Octavi IFR1.
pub const VENDOR_ID: &str = "04D8";

/// USB product ID of the Octavi IFR1.
pub const PRODUCT_ID: &str = "E6D6";

/// Vendor/product pair inside a HID `DEVPATH` (`...0003:VVVV:PPPP`).
const DEVPATH_PATTERN: &str = r"DEVPATH=.*0003:([0-9A-Fa-f]{4}):([0-9A-Fa-f]{4})";

/// Errors from device enumeration and inspection.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The device directory could not be listed.
    #[error("failed to list devices under {}: {}", .path.display(), .source)]
    Enumerate {
        /// Directory that failed to list.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A device node could not be inspected.
    #[error("failed to inspect {}: {}", .path.display(), .source)]
    Inspect {
        /// Device node that failed to inspect.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Per-device outcome of a permission change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFix {
    /// Device node the change was applied to.
    pub device: PathBuf,
    /// Whether the chmod succeeded.
    pub granted: bool,
    /// Human-readable outcome line.
    pub detail: String,
}

/// Summary of one search-and-grant pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchReport {
    /// Number of hidraw nodes examined.
    pub scanned: usize,
    /// Outcomes for every matched device, in scan order.
    pub fixes: Vec<DeviceFix>,
}

/// Result of [`find_and_grant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The password prompt was dismissed; nothing was changed.
    Cancelled,
    /// The scan ran to completion.
    Report(SearchReport),
}

/// Enumerate `hidraw*` nodes under `dev_dir`, sorted by name.
///
/// # Errors
///
/// Returns [`DeviceError::Enumerate`] when the directory cannot be
/// listed.
pub fn hidraw_devices(dev_dir: &Path) -> Result<Vec<PathBuf>, DeviceError> {
    let entries = fs::read_dir(dev_dir).map_err(|source| DeviceError::Enumerate {
        path: dev_dir.to_path_buf(),
        source,
    })?;

    let mut devices = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DeviceError::Enumerate {
            path: dev_dir.to_path_buf(),
            source,
        })?;
        if entry.file_name().to_string_lossy().starts_with("hidraw") {
            devices.push(entry.path());
        }
    }
    devices.sort();
    Ok(devices)
}

/// Extract the `(vendor, product)` hex pair from `udevadm info` output.
pub fn parse_device_ids(text: &str) -> Option<(String, String)> {
    static DEVPATH_RE: OnceLock<Regex> = OnceLock::new();
    let re = DEVPATH_RE
        .get_or_init(|| Regex::new(DEVPATH_PATTERN).expect("device path pattern is valid"));
    let caps = re.captures(text)?;
    Some((caps[1].to_owned(), caps[2].to_owned()))
}

/// Find devices matching `vendor_id`/`product_id` and chmod each to 0666.
///
/// Every hidraw node is queried through the runner; nodes that fail to
/// answer are skipped. Each matched device gets its own permission
/// change with an independent outcome, so one failure never aborts the
/// rest.
///
/// # Errors
///
/// Returns [`DeviceError::Enumerate`] when the device directory cannot
/// be listed. Per-device problems are reported inside the
/// [`SearchReport`] instead.
pub fn find_and_grant(
    runner: &mut PrivilegedRunner,
    prompt: &mut dyn PasswordPrompt,
    dev_dir: &Path,
    vendor_id: &str,
    product_id: &str,
) -> Result<SearchOutcome, DeviceError> {
    let devices = hidraw_devices(dev_dir)?;
    let mut report = SearchReport {
        scanned: devices.len(),
        fixes: Vec::new(),
    };

    let mut matched = Vec::new();
    for device in devices {
        let command = format!("udevadm info --query=all --name={}", device.display());
        match runner.run(&command, prompt) {
            RunOutcome::Success(details) => {
                if let Some((vendor, product)) = parse_device_ids(&details) {
                    if vendor.eq_ignore_ascii_case(vendor_id)
                        && product.eq_ignore_ascii_case(product_id)
                    {
                        debug!(device = %device.display(), "vendor/product match");
                        matched.push(device);
                    }
                }
            }
            RunOutcome::Cancelled => return Ok(SearchOutcome::Cancelled),
            RunOutcome::Failed(err) => {
                // One unreadable node must not abort the scan.
                warn!(device = %device.display(), error = %err, "device query failed, skipping");
            }
        }
    }

    for device in matched {
        let display = device.display().to_string();
        let fix = match runner.run(&format!("chmod 0666 {display}"), prompt) {
            RunOutcome::Success(_) => DeviceFix {
                device,
                granted: true,
                detail: format!("Applied chmod 0666 to {display}"),
            },
            RunOutcome::Cancelled => return Ok(SearchOutcome::Cancelled),
            RunOutcome::Failed(err) => DeviceFix {
                device,
                granted: false,
                detail: format!("Failed to apply chmod 0666 to {display}: {}", err.trim_end()),
            },
        };
        report.fixes.push(fix);
    }

    info!(
        scanned = report.scanned,
        matched = report.fixes.len(),
        "device search finished"
    );
    Ok(SearchOutcome::Report(report))
}

/// List `ls -l` output for every hidraw node (no elevation needed).
///
/// # Errors
///
/// Returns [`DeviceError::Enumerate`] when the device directory cannot
/// be listed and [`DeviceError::Inspect`] when `ls` cannot be spawned.
pub fn hidraw_permissions(dev_dir: &Path) -> Result<String, DeviceError> {
    let devices = hidraw_devices(dev_dir)?;
    if devices.is_empty() {
        return Ok("No hidraw devices found.".to_owned());
    }

    let mut out = String::from("Hidraw device permissions:\n\n");
    for device in devices {
        let display = device.display().to_string();
        let listing = capture("ls", &["-l", &display]).map_err(|source| DeviceError::Inspect {
            path: device.clone(),
            source,
        })?;
        if listing.success() {
            out.push_str(listing.stdout.trim_end());
        } else {
            out.push_str(&format!("{display}: {}", listing.stderr.trim_end()));
        }
        out.push('\n');
    }
    Ok(out)
}

/// Pull hidraw/Octavi lines out of the kernel log via the runner.
pub fn kernel_log(runner: &mut PrivilegedRunner, prompt: &mut dyn PasswordPrompt) -> RunOutcome {
    runner.run(r"dmesg | grep -i 'hidraw\|octavi'", prompt)
}
