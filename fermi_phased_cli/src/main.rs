//! # fermi_phased_cli
//!
//! Part of the fermi_phased crate family.
//!
//! This is the command line application generating phase-resolved Fermi-LAT SLURM jobs.
//!
//! ## Use
//!
//! Make a template settings file (and optionally a template connection file):
//!
//! ```bash
//! fermi_phased_cli -s settings.yaml new
//! fermi_phased_cli -s settings.yaml -c connection.yaml new
//! ```
//!
//! Edit the files, then generate the scripts:
//!
//! ```bash
//! fermi_phased_cli -s settings.yaml -m adaptive
//! ```
//!
//! Add `-u -c connection.yaml` to upload the scripts and submit them with `sbatch`. The
//! mode is one of `basic`, `adaptive`, `multiple-times` or `joint-epoch`; if omitted, the
//! `Mode` field of the settings file is used.
//!
//! `fermi_phased_cli -s settings.yaml bins` only computes the adaptive bins and writes
//! `adaptive_bins.csv` to the local directory, to check the binning before generating.
use clap::{Arg, ArgAction, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use libfermi_phased::config::{AnalysisMode, ModeConfig, RunConfig};
use libfermi_phased::connection::ConnectionConfig;
use libfermi_phased::process::{generate_run, job_targets, submit_jobs, write_adaptive_table};
use libfermi_phased::settings::Settings;
use libfermi_phased::worker_status::TransferStatus;

fn make_templates(settings_path: &Path, connection_path: Option<&PathBuf>) {
    log::info!(
        "Making a template settings file at {}...",
        settings_path.to_string_lossy()
    );
    if let Err(e) = Settings::template().write_settings_file(settings_path) {
        log::error!("{e}");
        return;
    }
    if let Some(path) = connection_path {
        log::info!(
            "Making a template connection file at {}...",
            path.to_string_lossy()
        );
        if let Err(e) = ConnectionConfig::default().write_config_file(path) {
            log::error!("{e}");
        }
    }
}

fn write_bins(config: &RunConfig) {
    let ModeConfig::Adaptive { counts_per_bin, .. } = config.mode else {
        log::error!("Bins can only be computed in {} mode", AnalysisMode::Adaptive);
        return;
    };
    match write_adaptive_table(&config.common, counts_per_bin, None) {
        Ok(bins) => {
            for (idx, bin) in bins.iter().enumerate() {
                log::info!(
                    "Bin {}: {:.6} - {:.6} (center {:.6})",
                    idx + 1,
                    bin.start,
                    bin.end,
                    bin.center
                );
            }
        }
        Err(e) if e.is_warning() => log::warn!("{e}"),
        Err(e) => log::error!("{e}"),
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("fermi_phased_cli")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("new").about("Make template settings (and connection) yaml files"),
        )
        .subcommand(
            Command::new("bins").about("Only compute the adaptive bins and write the bin table"),
        )
        .arg(
            Arg::new("settings")
                .short('s')
                .long("settings")
                .required(true)
                .help("Path to the settings file"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .help("Analysis mode: basic, adaptive, multiple-times or joint-epoch"),
        )
        .arg(
            Arg::new("upload")
                .short('u')
                .long("upload")
                .action(ArgAction::SetTrue)
                .requires("connection")
                .help("Upload the scripts to the cluster and submit them"),
        )
        .arg(
            Arg::new("connection")
                .short('c')
                .long("connection")
                .help("Path to the SSH connection file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let settings_path =
        PathBuf::from(matches.get_one::<String>("settings").expect("We require args"));
    let connection_path = matches.get_one::<String>("connection").map(PathBuf::from);

    if let Some(("new", _)) = matches.subcommand() {
        make_templates(&settings_path, connection_path.as_ref());
        log::info!("Done.");
        return;
    }

    // Load our settings
    log::info!("Loading settings from {}...", settings_path.to_string_lossy());
    let settings = match Settings::read_settings_file(&settings_path) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    let mode = match matches.get_one::<String>("mode") {
        Some(m) => m.parse::<AnalysisMode>(),
        None => AnalysisMode::from_settings(&settings),
    };
    let mode = match mode {
        Ok(m) => m,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    let config = match RunConfig::from_settings(&settings, mode) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Settings successfully loaded.");
    log::info!("Mode: {mode}");
    log::info!(
        "Local Directory: {}",
        config.common.local_directory.to_string_lossy()
    );
    log::info!("Remote Directory: {}", config.common.remote_directory);
    log::info!("Event File: {}", config.common.event_file);
    log::info!("Spacecraft File: {}", config.common.spacecraft_file);

    if let Some(("bins", _)) = matches.subcommand() {
        write_bins(&config);
        log::info!("Done.");
        return;
    }

    // Connection problems should stop us before anything is generated
    let connection = match (matches.get_flag("upload"), connection_path) {
        (true, Some(path)) => match ConnectionConfig::read_config_file(&path) {
            Ok(c) => Some(c),
            Err(e) => {
                log::error!("{e}");
                return;
            }
        },
        _ => None,
    };

    let jobs = match generate_run(&config, None) {
        Ok(jobs) => jobs,
        Err(e) if e.is_warning() => {
            log::warn!("Nothing generated: {e}");
            return;
        }
        Err(e) => {
            log::error!("Generation failed with error: {e}");
            return;
        }
    };

    let Some(connection) = connection else {
        log::info!("Done.");
        return;
    };

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}") {
        pb.set_style(style);
    }
    let (tx, rx) = mpsc::channel::<TransferStatus>();
    let targets = job_targets(&jobs);
    // Spawn the task!
    let handle = std::thread::spawn(move || submit_jobs(connection, targets, tx));

    loop {
        std::thread::sleep(std::time::Duration::from_millis(200));
        for status in rx.try_iter() {
            pb.set_position((status.progress * 100.0) as u64);
            pb.set_message(format!("{} {}", status.stage, status.message));
        }

        if handle.is_finished() {
            match handle.join() {
                Ok(result) => match result {
                    Ok(_) => log::info!("Successfully submitted all jobs!"),
                    Err(e) => log::error!("Transfer failed with error: {e}"),
                },
                Err(_) => log::error!("Failed to join transfer task!"),
            }
            break;
        }
    }

    pb.finish();

    log::info!("Done.");
}
