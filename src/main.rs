#![allow(missing_docs)]

//! Octavi IFR1 Manager entry point.
//!
//! Launches the egui shell; no CLI flags, no config file. Everything
//! interactive happens inside the window.

use anyhow::Result;
use tracing::info;

use octavi_manager::app::ManagerApp;

fn main() -> Result<()> {
    octavi_manager::logging::init();
    info!(version = env!("CARGO_PKG_VERSION"), "octavi manager starting");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size(eframe::egui::vec2(1200.0, 800.0))
            .with_min_inner_size(eframe::egui::vec2(800.0, 600.0)),
        ..Default::default()
    };

    eframe::run_native(
        "Octavi IFR1 Manager",
        options,
        Box::new(|_cc| Ok(Box::new(ManagerApp::new()))),
    )
    .map_err(|e| anyhow::anyhow!("failed to run UI: {e}"))?;

    info!("octavi manager shut down");
    Ok(())
}
