use std::path::{Path, PathBuf};

use super::analysis::{analysis_driver, AnalysisConfig, ANALYSIS_CONFIG_NAME, ANALYSIS_DRIVER_NAME};
use super::binning::{format_bin_table, uniform_bin_centers, PhaseBin, BIN_TABLE_NAME};
use super::config::{CommonConfig, Ephemeris, Epoch, TimeWindow};
use super::error::GeneratorError;
use super::templates;

/// A file to be written, relative to its job directory
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: String,
}

/// Everything generated for one local directory, and the remote directory it is meant
/// to be submitted from.
///
/// Jobs are fully rendered in memory before anything touches the disk, so a failed
/// generation never leaves a half-written directory behind.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDirectory {
    pub local_directory: PathBuf,
    pub remote_directory: String,
    pub files: Vec<GeneratedFile>,
    pub n_scripts: usize,
}

impl JobDirectory {
    /// Write every file, creating the directory if needed and replacing existing files
    pub fn write(&self) -> Result<(), GeneratorError> {
        std::fs::create_dir_all(&self.local_directory)?;
        for file in self.files.iter() {
            std::fs::write(self.local_directory.join(&file.name), &file.contents)?;
        }
        log::info!(
            "Wrote {} scripts ({} files) to {}",
            self.n_scripts,
            self.files.len(),
            self.local_directory.to_string_lossy()
        );
        Ok(())
    }

    pub fn file(&self, name: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// Assemble a job directory from its rendered scripts, adding the shared analysis files
fn assemble(
    common: &CommonConfig,
    local_directory: &Path,
    remote_directory: &str,
    scripts: Vec<String>,
    config_window: &TimeWindow,
    phase_centers: &[f64],
    flux_scales: &[f64],
) -> Result<JobDirectory, GeneratorError> {
    let n_scripts = scripts.len();
    let mut files: Vec<GeneratedFile> = scripts
        .into_iter()
        .enumerate()
        .map(|(idx, contents)| GeneratedFile {
            name: templates::script_name(idx + 1),
            contents,
        })
        .collect();
    files.push(GeneratedFile {
        name: String::from(ANALYSIS_CONFIG_NAME),
        contents: AnalysisConfig::new(common, config_window).to_yaml()?,
    });
    files.push(GeneratedFile {
        name: String::from(ANALYSIS_DRIVER_NAME),
        contents: analysis_driver(
            remote_directory,
            &common.model.source_name,
            phase_centers,
            flux_scales,
        ),
    });
    Ok(JobDirectory {
        local_directory: local_directory.to_path_buf(),
        remote_directory: remote_directory.to_string(),
        files,
        n_scripts,
    })
}

fn basic_scripts(
    common: &CommonConfig,
    remote_directory: &str,
    ephemeris: &Ephemeris,
    window: &TimeWindow,
    phase_bins: usize,
) -> Vec<String> {
    (1..=phase_bins)
        .map(|i| {
            templates::join_blocks(&[
                templates::header(i, remote_directory, &common.scheduler),
                templates::gtmktime(i, common, &templates::basic_filter(ephemeris, i, phase_bins)),
                templates::gtselect(i, common, window, None),
                templates::gtbin(common),
                templates::gtltcube(common, window),
                templates::closer(phase_bins, &common.scheduler),
            ])
        })
        .collect()
}

/// Equal-width phase bins for a single ephemeris
pub fn plan_basic(
    common: &CommonConfig,
    ephemeris: &Ephemeris,
    window: &TimeWindow,
    phase_bins: usize,
) -> Result<JobDirectory, GeneratorError> {
    let scripts = basic_scripts(
        common,
        &common.remote_directory,
        ephemeris,
        window,
        phase_bins,
    );
    assemble(
        common,
        &common.local_directory,
        &common.remote_directory,
        scripts,
        window,
        &uniform_bin_centers(phase_bins),
        &vec![1.0; phase_bins],
    )
}

/// One job per adaptive bin. The phase cut is done by gtselect, so gtmktime only applies
/// the data quality filter. The bin table is written next to the scripts.
pub fn plan_adaptive(
    common: &CommonConfig,
    window: &TimeWindow,
    bins: &[PhaseBin],
) -> Result<JobDirectory, GeneratorError> {
    let n_bins = bins.len();
    let scripts = bins
        .iter()
        .enumerate()
        .map(|(idx, bin)| {
            let i = idx + 1;
            templates::join_blocks(&[
                templates::header(i, &common.remote_directory, &common.scheduler),
                templates::gtmktime(i, common, &templates::quality_filter()),
                templates::gtselect(i, common, window, Some((bin.start, bin.end))),
                templates::gtbin(common),
                templates::gtltcube(common, window),
                templates::closer(n_bins, &common.scheduler),
            ])
        })
        .collect();
    let centers: Vec<f64> = bins.iter().map(|b| b.center).collect();
    // gtselect's phase cut keeps the full livetime, so the fitted flux scales with width
    let widths: Vec<f64> = bins.iter().map(|b| b.width).collect();
    let mut job = assemble(
        common,
        &common.local_directory,
        &common.remote_directory,
        scripts,
        window,
        &centers,
        &widths,
    )?;
    job.files.push(GeneratedFile {
        name: String::from(BIN_TABLE_NAME),
        contents: format_bin_table(bins),
    });
    Ok(job)
}

/// Equal-width phase bins accumulated over several time windows, each with its own
/// ephemeris
pub fn plan_multiple_times(
    common: &CommonConfig,
    epochs: &[Epoch],
    phase_bins: usize,
) -> Result<JobDirectory, GeneratorError> {
    let span = TimeWindow {
        tmin: epochs
            .iter()
            .map(|e| e.window.tmin)
            .fold(f64::INFINITY, f64::min),
        tmax: epochs
            .iter()
            .map(|e| e.window.tmax)
            .fold(f64::NEG_INFINITY, f64::max),
    };
    let scripts = (1..=phase_bins)
        .map(|i| {
            templates::join_blocks(&[
                templates::header(i, &common.remote_directory, &common.scheduler),
                templates::gtmktime(i, common, &templates::windows_filter(epochs, i, phase_bins)),
                templates::gtselect(i, common, &span, None),
                templates::gtbin(common),
                templates::gtltcube(common, &span),
                templates::closer(phase_bins, &common.scheduler),
            ])
        })
        .collect();
    assemble(
        common,
        &common.local_directory,
        &common.remote_directory,
        scripts,
        &span,
        &uniform_bin_centers(phase_bins),
        &vec![1.0; phase_bins],
    )
}

/// Directory name of a (1-based) epoch in joint-epoch mode
pub fn epoch_directory_name(index: usize) -> String {
    format!("epoch_{index}")
}

/// One independent set of phase bins per epoch, each in its own subdirectory, so the
/// epochs can be fitted jointly afterwards
pub fn plan_joint_epoch(
    common: &CommonConfig,
    epochs: &[Epoch],
    phase_bins: usize,
) -> Result<Vec<JobDirectory>, GeneratorError> {
    let mut jobs = Vec::with_capacity(epochs.len());
    for (idx, epoch) in epochs.iter().enumerate() {
        let name = epoch_directory_name(idx + 1);
        let local = common.local_directory.join(&name);
        let remote = format!("{}/{name}", common.remote_directory);
        let scripts = basic_scripts(
            common,
            &remote,
            &epoch.ephemeris,
            &epoch.window,
            phase_bins,
        );
        jobs.push(assemble(
            common,
            &local,
            &remote,
            scripts,
            &epoch.window,
            &uniform_bin_centers(phase_bins),
            &vec![1.0; phase_bins],
        )?);
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::complete_settings;
    use crate::config::{AnalysisMode, ModeConfig, RunConfig};
    use crate::settings::*;

    fn basic(local: &str) -> (CommonConfig, Ephemeris, TimeWindow, usize) {
        let config = RunConfig::from_settings(&complete_settings(local), AnalysisMode::Basic).unwrap();
        match config.mode {
            ModeConfig::Basic {
                ephemeris,
                window,
                phase_bins,
            } => (config.common, ephemeris, window, phase_bins),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_basic_plan() {
        let (common, ephemeris, window, n) = basic("/tmp/out");
        let job = plan_basic(&common, &ephemeris, &window, n).unwrap();
        assert_eq!(job.n_scripts, 14);
        assert_eq!(job.files.len(), 16);
        assert_eq!(job.remote_directory, "/scratch/ls5039/epoch1");
        assert!(job.file("phase_1.sh").is_some());
        assert!(job.file("phase_14.sh").is_some());
        assert!(job.file("phase_15.sh").is_none());
        assert!(job.file(BIN_TABLE_NAME).is_none());

        let script = &job.file("phase_2.sh").unwrap().contents;
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("#SBATCH -D /scratch/ls5039/epoch1/2/"));
        assert!(script.contains("outfile=./2.fits"));
        assert!(script.contains("gtselect infile=./2.fits"));
        assert!(script.contains(" - 1*3.90608*"));
        assert!(script.contains("touch done.flag"));

        let driver = &job.file(ANALYSIS_DRIVER_NAME).unwrap().contents;
        assert!(driver.contains("BASE_DIR = '/scratch/ls5039/epoch1'"));
        assert!(driver.contains(&format!("FLUX_SCALES = np.array([{}])", vec!["1.0"; 14].join(", "))));
    }

    #[test]
    fn test_adaptive_plan() {
        let (common, _, window, _) = basic("/tmp/out");
        let bins = vec![
            PhaseBin::new(0.01, 0.3),
            PhaseBin::new(0.3, 0.55),
            PhaseBin::new(0.55, 1.0),
        ];
        let job = plan_adaptive(&common, &window, &bins).unwrap();
        assert_eq!(job.n_scripts, 3);
        let script = &job.file("phase_3.sh").unwrap().contents;
        assert!(script.contains("phasemin=0.55 phasemax=1 "));
        assert!(script.contains("filter=\"(DATA_QUAL>0) && (LAT_CONFIG==1)\""));
        assert!(script.contains("-eq 3 ]"));
        let table = &job.file(BIN_TABLE_NAME).unwrap().contents;
        assert_eq!(table.lines().count(), 4);
        let driver = &job.file(ANALYSIS_DRIVER_NAME).unwrap().contents;
        let centers = format!(
            "np.array([{:?}, {:?}, {:?}])",
            bins[0].center, bins[1].center, bins[2].center
        );
        assert!(driver.contains(&centers));
        let widths = format!(
            "FLUX_SCALES = np.array([{:?}, {:?}, {:?}])",
            bins[0].width, bins[1].width, bins[2].width
        );
        assert!(driver.contains(&widths));
    }

    #[test]
    fn test_multiple_times_span() {
        let mut settings = complete_settings("/tmp/out");
        settings.set(PERIOD, "3.90608,3.90608,3.90608");
        settings.set(T0, "55016.58,55016.58,55016.58");
        settings.set(MIN_TIME, "300000000,239557417,500000000");
        settings.set(MAX_TIME, "400000000,299999999,668413063");
        let config = RunConfig::from_settings(&settings, AnalysisMode::MultipleTimes).unwrap();
        let ModeConfig::MultipleTimes { epochs, phase_bins } = config.mode else {
            unreachable!()
        };
        let job = plan_multiple_times(&config.common, &epochs, phase_bins).unwrap();
        let script = &job.file("phase_1.sh").unwrap().contents;
        assert!(script.contains("tmin=239557417 tmax=668413063"));
        assert!(script.contains("(START > 500000000)"));
        assert_eq!(script.matches(" || ").count(), 2);
    }

    #[test]
    fn test_joint_epoch_directories() {
        let mut settings = complete_settings("/tmp/out");
        settings.set(PERIOD, "3.90608,3.9061");
        settings.set(T0, "55016.58,55016.6");
        settings.set(MIN_TIME, "239557417,400000000");
        settings.set(MAX_TIME, "399999999,668413063");
        settings.set(PHASE_BINS, "4");
        let config = RunConfig::from_settings(&settings, AnalysisMode::JointEpoch).unwrap();
        let ModeConfig::JointEpoch { epochs, phase_bins } = config.mode else {
            unreachable!()
        };
        let jobs = plan_joint_epoch(&config.common, &epochs, phase_bins).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].local_directory, PathBuf::from("/tmp/out/epoch_2"));
        assert_eq!(jobs[1].remote_directory, "/scratch/ls5039/epoch1/epoch_2");
        let script = &jobs[1].file("phase_4.sh").unwrap().contents;
        assert!(script.contains("#SBATCH -D /scratch/ls5039/epoch1/epoch_2/4/"));
        assert!(script.contains("55016.6 - 3*3.9061*0.25)/3.9061"));
        assert!(script.contains("tmin=400000000 tmax=668413063"));
    }

    #[test]
    fn test_write_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("out");
        let (common, ephemeris, window, n) = basic(local.to_str().unwrap());
        let job = plan_basic(&common, &ephemeris, &window, n).unwrap();
        job.write().unwrap();
        let first: Vec<Vec<u8>> = job
            .files
            .iter()
            .map(|f| std::fs::read(local.join(&f.name)).unwrap())
            .collect();

        let again = plan_basic(&common, &ephemeris, &window, n).unwrap();
        assert_eq!(again, job);
        again.write().unwrap();
        for (file, bytes) in job.files.iter().zip(first) {
            assert_eq!(std::fs::read(local.join(&file.name)).unwrap(), bytes);
        }
    }
}
