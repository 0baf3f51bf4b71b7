//! Octavi IFR1 udev rules manager.
//!
//! Desktop utility for setting up `/dev/hidraw*` access to the Octavi
//! IFR1 on Linux: list and create udev rules, reload and trigger udev,
//! inspect device permissions, grep the kernel log, and repair plugdev
//! group membership, each by shelling out to the system tools under an
//! interactively-cached sudo password.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod cache;
pub mod device;
pub mod group;
pub mod logging;
pub mod runner;
pub mod udev;
