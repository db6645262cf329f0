use std::path::Path;
use std::sync::mpsc::Sender;

use super::binning::{adaptive_bins, write_bin_table, PhaseBin, BIN_TABLE_NAME};
use super::config::{CommonConfig, ModeConfig, RunConfig};
use super::connection::ConnectionConfig;
use super::error::{GeneratorError, ProcessorError};
use super::events::EventList;
use super::generator::{
    plan_adaptive, plan_basic, plan_joint_epoch, plan_multiple_times, JobDirectory,
};
use super::transfer::{upload_and_submit, RemoteShell, SshSession};
use super::worker_status::{TransferStage, TransferStatus};

/// Compute the adaptive bins for the configured energy window.
///
/// Uses `events` if given, otherwise loads the configured event file.
pub fn compute_adaptive_bins(
    common: &CommonConfig,
    counts_per_bin: usize,
    events: Option<&EventList>,
) -> Result<Vec<PhaseBin>, ProcessorError> {
    let loaded;
    let events = match events {
        Some(e) => e,
        None => {
            log::info!("Loading event file: {}", common.event_file);
            loaded = EventList::read_fits(Path::new(&common.event_file))?;
            &loaded
        }
    };
    let phases = events.phases_in_energy_window(common.emin, common.emax);
    log::info!(
        "{} of {} events lie within {} - {} MeV",
        phases.len(),
        events.len(),
        common.emin,
        common.emax
    );
    let bins = adaptive_bins(&phases, counts_per_bin)?;
    log::info!(
        "Adaptive binning with {counts_per_bin} counts per bin gives {} bins",
        bins.len()
    );
    Ok(bins)
}

/// Render every job directory of a run, without writing anything
pub fn plan_run(
    config: &RunConfig,
    events: Option<&EventList>,
) -> Result<Vec<JobDirectory>, ProcessorError> {
    let common = &config.common;
    let jobs = match &config.mode {
        ModeConfig::Basic {
            ephemeris,
            window,
            phase_bins,
        } => vec![plan_basic(common, ephemeris, window, *phase_bins)?],
        ModeConfig::Adaptive {
            window,
            counts_per_bin,
        } => {
            let bins = compute_adaptive_bins(common, *counts_per_bin, events)?;
            vec![plan_adaptive(common, window, &bins)?]
        }
        ModeConfig::MultipleTimes { epochs, phase_bins } => {
            vec![plan_multiple_times(common, epochs, *phase_bins)?]
        }
        ModeConfig::JointEpoch { epochs, phase_bins } => {
            plan_joint_epoch(common, epochs, *phase_bins)?
        }
    };
    Ok(jobs)
}

/// Generate the scripts for a run and write them to the local directory.
///
/// Rendering completes before the first write, so configuration and binning errors
/// leave the disk untouched.
pub fn generate_run(
    config: &RunConfig,
    events: Option<&EventList>,
) -> Result<Vec<JobDirectory>, ProcessorError> {
    log::info!("Generating {} scripts...", config.mode.mode());
    let jobs = plan_run(config, events)?;
    for job in jobs.iter() {
        job.write()?;
    }
    log::info!(
        "Scripts successfully saved in: {}",
        config.common.local_directory.to_string_lossy()
    );
    Ok(jobs)
}

/// Compute the adaptive bins and only persist the bin table, for inspection before
/// committing to a run
pub fn write_adaptive_table(
    common: &CommonConfig,
    counts_per_bin: usize,
    events: Option<&EventList>,
) -> Result<Vec<PhaseBin>, ProcessorError> {
    let bins = compute_adaptive_bins(common, counts_per_bin, events)?;
    std::fs::create_dir_all(&common.local_directory).map_err(GeneratorError::from)?;
    let path = common.local_directory.join(BIN_TABLE_NAME);
    write_bin_table(&path, &bins).map_err(GeneratorError::from)?;
    log::info!("Adaptive bin edges saved to {}", path.to_string_lossy());
    Ok(bins)
}

/// Upload and submit several job directories over one shell
pub fn submit_jobs_with<S: RemoteShell>(
    shell: &mut S,
    jobs: &[(std::path::PathBuf, String)],
    tx: &Sender<TransferStatus>,
) -> Result<(), ProcessorError> {
    for (local, remote) in jobs {
        upload_and_submit(shell, local, remote, tx)?;
    }
    tx.send(TransferStatus::new(1.0, TransferStage::Done, ""))
        .map_err(super::error::TransferError::from)?;
    Ok(())
}

/// The function to be called by a separate thread (typically the UI).
///
/// Opens one SSH session for all of the given (local, remote) directory pairs. The
/// session is closed when this returns, whether or not the transfer succeeded.
pub fn submit_jobs(
    connection: ConnectionConfig,
    jobs: Vec<(std::path::PathBuf, String)>,
    tx: Sender<TransferStatus>,
) -> Result<(), ProcessorError> {
    connection.validate()?;
    tx.send(TransferStatus::new(
        0.0,
        TransferStage::Connecting,
        &connection.host,
    ))
    .map_err(super::error::TransferError::from)?;
    let mut session = SshSession::connect(&connection)?;
    submit_jobs_with(&mut session, &jobs, &tx)
}

/// The (local, remote) directory pairs of a set of generated jobs
pub fn job_targets(jobs: &[JobDirectory]) -> Vec<(std::path::PathBuf, String)> {
    jobs.iter()
        .map(|j| (j.local_directory.clone(), j.remote_directory.clone()))
        .collect()
}
