//! # fermi_phased
//!
//! Part of the fermi_phased crate family.
//!
//! This is the application to generate phase-resolved Fermi-LAT SLURM jobs with a GUI
//! using [egui](https://github.com/emilk/egui).
//!
//! ## Install
//!
//! Use `cargo install --path ./fermi_phased`
//!
//! ## Use
//!
//! To launch the application simply invoke it after it is installed
//!
//! ```bash
//! fermi_phased
//! ```
//!
//! Pick an analysis mode, fill out the fields and click Generate to write the scripts to
//! the local directory. With "Send to cluster" checked, the scripts are then uploaded
//! over SSH using the connection fields and submitted with `sbatch`.
//!
//! ## Configuration
//!
//! - Mode: Basic, Adaptive (Fixed Counts) Binning, Multiple Times or Joint Epoch Fitting.
//! In the last two, Period, T0, Min Time and Max Time take comma-separated lists.
//! - Number of Phase Bins / Number of Counts: equal-width bins, or events per bin in
//! Adaptive mode.
//! - Remote Directory, Local Directory, Spacecraft File, Event File: typed in, or picked
//! with the Browse buttons.
//! - Optional Settings: scheduler and model settings which fall back to defaults when left
//! blank.
//! - Connection: host, port, username and private key of the cluster login.
//!
//! Settings can be saved using File->Save and loaded using File->Open. Reset blanks every
//! field. Everything that happens is logged to `fermi_phased.log`.

mod app;
use app::PhasedApp;
use std::path::PathBuf;
use std::sync::Arc;

/// The program entry point
fn main() {
    // Setup logging to a file
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./fermi_phased.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()
            .unwrap(),
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()
            .unwrap(),
    );
    spdlog::set_default_logger(logger);
    // Route the library's log records to the same file
    match spdlog::init_log_crate_proxy() {
        Ok(()) => log::set_max_level(log::LevelFilter::Info),
        Err(e) => spdlog::warn!("Library logging unavailable: {}", e),
    }
    spdlog::info!("Starting Fermi Phased UI");

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("Fermi Phased")
            .with_inner_size(eframe::epaint::vec2(720.0, 760.0))
            .with_min_inner_size(eframe::epaint::vec2(600.0, 400.0)),
        ..Default::default()
    };
    match eframe::run_native(
        "fermi_phased",
        native_options,
        Box::new(|cc| Ok(Box::new(PhasedApp::new(cc)))),
    ) {
        Ok(()) => (),
        Err(e) => spdlog::error!("Eframe error: {}", e),
    }
}
