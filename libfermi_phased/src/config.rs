use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::ConfigError;
use super::settings::*;

/// The analysis modes. Each one needs a different subset of the settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AnalysisMode {
    #[default]
    Basic,
    Adaptive,
    MultipleTimes,
    JointEpoch,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 4] = [
        AnalysisMode::Basic,
        AnalysisMode::Adaptive,
        AnalysisMode::MultipleTimes,
        AnalysisMode::JointEpoch,
    ];

    /// The extra field this mode shows beyond the common ones
    pub fn bin_field(&self) -> &'static str {
        match self {
            AnalysisMode::Adaptive => COUNTS_PER_BIN,
            _ => PHASE_BINS,
        }
    }

    /// The numeric fields this mode reads, in form order
    pub fn form_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::with_capacity(EPHEMERIS_FIELDS.len() + COMMON_FIELDS.len() + 1);
        if *self != AnalysisMode::Adaptive {
            fields.extend(EPHEMERIS_FIELDS);
        }
        fields.extend(COMMON_FIELDS);
        fields.push(self.bin_field());
        fields
    }

    /// Whether the ephemeris and time window fields accept comma-separated lists
    pub fn takes_lists(&self) -> bool {
        matches!(self, AnalysisMode::MultipleTimes | AnalysisMode::JointEpoch)
    }

    /// The mode stored in the settings, Basic if the field is blank
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        match settings.get(MODE) {
            Some(value) => value.parse(),
            None => Ok(AnalysisMode::default()),
        }
    }

    /// Short name used on the command line and in settings files
    pub fn key(&self) -> &'static str {
        match self {
            AnalysisMode::Basic => "basic",
            AnalysisMode::Adaptive => "adaptive",
            AnalysisMode::MultipleTimes => "multiple-times",
            AnalysisMode::JointEpoch => "joint-epoch",
        }
    }
}

impl Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisMode::Basic => write!(f, "Basic"),
            AnalysisMode::Adaptive => write!(f, "Adaptive (Fixed Counts) Binning"),
            AnalysisMode::MultipleTimes => write!(f, "Multiple Times"),
            AnalysisMode::JointEpoch => write!(f, "Joint Epoch Fitting"),
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        for mode in Self::ALL {
            if s.eq_ignore_ascii_case(mode.key()) || s == mode.to_string() {
                return Ok(mode);
            }
        }
        Err(ConfigError::UnknownMode(s.to_string()))
    }
}

/// Whether a field takes one entry per epoch in the multi-epoch modes
pub fn is_list_field(key: &str) -> bool {
    [PERIOD, T0, MIN_TIME, MAX_TIME].contains(&key)
}

/// Timing solution of the source: period in days and reference epoch T0 in MJD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ephemeris {
    pub period: f64,
    pub t0: f64,
}

/// Closed time range in MET seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub tmin: f64,
    pub tmax: f64,
}

/// One observing epoch with its own ephemeris
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epoch {
    pub ephemeris: Ephemeris,
    pub window: TimeWindow,
}

/// Resource requests and environment setup for the SLURM header
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub partition: String,
    pub wall_time: String,
    pub conda_profile: String,
    pub conda_environment: String,
    pub analysis_environment: String,
    pub fermi_directory: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            partition: String::from("tiny"),
            wall_time: String::from("4:00:00"),
            conda_profile: String::from("/c1/apps/anaconda/2021.05/etc/profile.d/conda.sh"),
            conda_environment: String::from("fermi2"),
            analysis_environment: String::from("fermipy"),
            fermi_directory: None,
        }
    }
}

/// Source and background model used by the fermipy analysis
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub source_name: String,
    pub galactic_diffuse: String,
    pub isotropic_diffuse: String,
    pub catalogs: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            source_name: String::from("4FGL J1826.2-1450"),
            galactic_diffuse: String::from(
                "$FERMI_DIR/refdata/fermi/galdiffuse/gll_iem_v07.fits",
            ),
            isotropic_diffuse: String::from(
                "$FERMI_DIR/refdata/fermi/galdiffuse/iso_P8R3_SOURCE_V3_v1.txt",
            ),
            catalogs: vec![String::from("4FGL-DR4")],
        }
    }
}

/// Parameters shared by every mode
#[derive(Debug, Clone, PartialEq)]
pub struct CommonConfig {
    pub ra: f64,
    pub dec: f64,
    pub radius: f64,
    pub emin: f64,
    pub emax: f64,
    pub energy_bins: usize,
    pub remote_directory: String,
    pub local_directory: PathBuf,
    pub spacecraft_file: String,
    pub event_file: String,
    pub scheduler: SchedulerConfig,
    pub model: ModelConfig,
}

/// The mode-specific part of a run
#[derive(Debug, Clone, PartialEq)]
pub enum ModeConfig {
    Basic {
        ephemeris: Ephemeris,
        window: TimeWindow,
        phase_bins: usize,
    },
    Adaptive {
        window: TimeWindow,
        counts_per_bin: usize,
    },
    MultipleTimes {
        epochs: Vec<Epoch>,
        phase_bins: usize,
    },
    JointEpoch {
        epochs: Vec<Epoch>,
        phase_bins: usize,
    },
}

impl ModeConfig {
    pub fn mode(&self) -> AnalysisMode {
        match self {
            ModeConfig::Basic { .. } => AnalysisMode::Basic,
            ModeConfig::Adaptive { .. } => AnalysisMode::Adaptive,
            ModeConfig::MultipleTimes { .. } => AnalysisMode::MultipleTimes,
            ModeConfig::JointEpoch { .. } => AnalysisMode::JointEpoch,
        }
    }
}

/// A validated run: everything needed to render the scripts for one mode.
///
/// Built from the raw [Settings]; all parsing and validation happens here, before
/// any file is touched.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub common: CommonConfig,
    pub mode: ModeConfig,
}

impl RunConfig {
    pub fn from_settings(settings: &Settings, mode: AnalysisMode) -> Result<Self, ConfigError> {
        let common = CommonConfig {
            ra: parse_float(settings, RA)?,
            dec: parse_float(settings, DEC)?,
            radius: parse_positive(settings, RADIUS)?,
            emin: parse_float(settings, MIN_ENERGY)?,
            emax: parse_float(settings, MAX_ENERGY)?,
            energy_bins: parse_count(settings, ENERGY_BINS)?,
            remote_directory: require(settings, REMOTE_DIRECTORY)?
                .trim_end_matches('/')
                .to_string(),
            local_directory: PathBuf::from(require(settings, LOCAL_DIRECTORY)?),
            spacecraft_file: require(settings, SPACECRAFT_FILE)?.to_string(),
            event_file: require(settings, EVENT_FILE)?.to_string(),
            scheduler: scheduler_from_settings(settings),
            model: model_from_settings(settings),
        };
        if common.emin >= common.emax {
            return Err(invalid(
                MAX_ENERGY,
                settings,
                "must be greater than the minimum energy",
            ));
        }

        let mode = match mode {
            AnalysisMode::Basic => ModeConfig::Basic {
                ephemeris: Ephemeris {
                    period: parse_positive(settings, PERIOD)?,
                    t0: parse_float(settings, T0)?,
                },
                window: parse_window(settings)?,
                phase_bins: parse_count(settings, PHASE_BINS)?,
            },
            AnalysisMode::Adaptive => ModeConfig::Adaptive {
                window: parse_window(settings)?,
                counts_per_bin: parse_count(settings, COUNTS_PER_BIN)?,
            },
            AnalysisMode::MultipleTimes => ModeConfig::MultipleTimes {
                epochs: parse_epochs(settings)?,
                phase_bins: parse_count(settings, PHASE_BINS)?,
            },
            AnalysisMode::JointEpoch => ModeConfig::JointEpoch {
                epochs: parse_epochs(settings)?,
                phase_bins: parse_count(settings, PHASE_BINS)?,
            },
        };

        Ok(Self { common, mode })
    }
}

fn require<'a>(settings: &'a Settings, key: &str) -> Result<&'a str, ConfigError> {
    settings
        .get(key)
        .ok_or_else(|| ConfigError::MissingField(key.to_string()))
}

fn invalid(key: &str, settings: &Settings, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: key.to_string(),
        value: settings.get(key).unwrap_or_default().to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value(key: &str, value: &str) -> Result<f64, ConfigError> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(ConfigError::InvalidField {
            field: key.to_string(),
            value: value.to_string(),
            reason: String::from("must be finite"),
        }),
        Err(e) => Err(ConfigError::InvalidField {
            field: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_float(settings: &Settings, key: &str) -> Result<f64, ConfigError> {
    parse_value(key, require(settings, key)?)
}

fn parse_positive(settings: &Settings, key: &str) -> Result<f64, ConfigError> {
    let value = parse_float(settings, key)?;
    if value <= 0.0 {
        return Err(invalid(key, settings, "must be greater than zero"));
    }
    Ok(value)
}

fn parse_count(settings: &Settings, key: &str) -> Result<usize, ConfigError> {
    let value = require(settings, key)?;
    match value.parse::<usize>() {
        Ok(0) => Err(invalid(key, settings, "must be at least 1")),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(key, settings, &e.to_string())),
    }
}

fn parse_list(settings: &Settings, key: &str) -> Result<Vec<f64>, ConfigError> {
    require(settings, key)?
        .split(',')
        .map(|v| parse_value(key, v))
        .collect()
}

fn parse_window(settings: &Settings) -> Result<TimeWindow, ConfigError> {
    let window = TimeWindow {
        tmin: parse_float(settings, MIN_TIME)?,
        tmax: parse_float(settings, MAX_TIME)?,
    };
    if window.tmin >= window.tmax {
        return Err(invalid(
            MAX_TIME,
            settings,
            "must be later than the minimum time",
        ));
    }
    Ok(window)
}

fn parse_epochs(settings: &Settings) -> Result<Vec<Epoch>, ConfigError> {
    let periods = parse_list(settings, PERIOD)?;
    let t0s = parse_list(settings, T0)?;
    let tmins = parse_list(settings, MIN_TIME)?;
    let tmaxs = parse_list(settings, MAX_TIME)?;
    if !(periods.len() == t0s.len() && t0s.len() == tmins.len() && tmins.len() == tmaxs.len()) {
        return Err(ConfigError::MismatchedEpochLists(
            t0s.len(),
            periods.len(),
            tmins.len(),
            tmaxs.len(),
        ));
    }

    let mut epochs = Vec::with_capacity(periods.len());
    for (((period, t0), tmin), tmax) in periods.into_iter().zip(t0s).zip(tmins).zip(tmaxs) {
        if period <= 0.0 {
            return Err(invalid(PERIOD, settings, "periods must be greater than zero"));
        }
        if tmin >= tmax {
            return Err(invalid(
                MAX_TIME,
                settings,
                "each stop time must be later than its start time",
            ));
        }
        epochs.push(Epoch {
            ephemeris: Ephemeris { period, t0 },
            window: TimeWindow { tmin, tmax },
        });
    }
    Ok(epochs)
}

fn scheduler_from_settings(settings: &Settings) -> SchedulerConfig {
    let default = SchedulerConfig::default();
    let or_default = |key: &str, fallback: String| -> String {
        settings.get(key).map(String::from).unwrap_or(fallback)
    };
    SchedulerConfig {
        partition: or_default(PARTITION, default.partition),
        wall_time: or_default(WALL_TIME, default.wall_time),
        conda_profile: or_default(CONDA_PROFILE, default.conda_profile),
        conda_environment: or_default(CONDA_ENVIRONMENT, default.conda_environment),
        analysis_environment: or_default(ANALYSIS_ENVIRONMENT, default.analysis_environment),
        fermi_directory: settings.get(FERMI_DIRECTORY).map(String::from),
    }
}

fn model_from_settings(settings: &Settings) -> ModelConfig {
    let default = ModelConfig::default();
    ModelConfig {
        source_name: settings
            .get(SOURCE_NAME)
            .map(String::from)
            .unwrap_or(default.source_name),
        galactic_diffuse: settings
            .get(GALACTIC_DIFFUSE)
            .map(String::from)
            .unwrap_or(default.galactic_diffuse),
        isotropic_diffuse: settings
            .get(ISOTROPIC_DIFFUSE)
            .map(String::from)
            .unwrap_or(default.isotropic_diffuse),
        catalogs: match settings.get(CATALOGS) {
            Some(list) => list
                .split(',')
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect(),
            None => default.catalogs,
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn complete_settings(local_dir: &str) -> Settings {
        let mut settings = Settings::template();
        settings.set(REMOTE_DIRECTORY, "/scratch/ls5039/epoch1/");
        settings.set(LOCAL_DIRECTORY, local_dir);
        settings.set(SPACECRAFT_FILE, "/data/ls5039_sc.fits");
        settings.set(EVENT_FILE, "/data/ls5039_ft1.fits");
        settings
    }

    #[test]
    fn test_form_fields_per_mode() {
        let adaptive = AnalysisMode::Adaptive.form_fields();
        assert!(!adaptive.contains(&PERIOD));
        assert!(!adaptive.contains(&T0));
        assert!(!adaptive.contains(&PHASE_BINS));
        assert_eq!(adaptive.last(), Some(&COUNTS_PER_BIN));
        assert!(adaptive.contains(&MIN_TIME));

        for mode in [
            AnalysisMode::Basic,
            AnalysisMode::MultipleTimes,
            AnalysisMode::JointEpoch,
        ] {
            let fields = mode.form_fields();
            assert_eq!(&fields[..2], &[PERIOD, T0]);
            assert_eq!(fields.last(), Some(&PHASE_BINS));
            assert!(!fields.contains(&COUNTS_PER_BIN));
        }
    }

    #[test]
    fn test_adaptive_ignores_ephemeris() {
        let mut settings = complete_settings("/tmp/out");
        settings.set(PERIOD, "");
        settings.set(T0, "");
        assert!(RunConfig::from_settings(&settings, AnalysisMode::Adaptive).is_ok());
    }

    #[test]
    fn test_list_fields() {
        assert!(is_list_field(PERIOD));
        assert!(is_list_field(MAX_TIME));
        assert!(!is_list_field(RADIUS));
    }

    #[test]
    fn test_mode_from_settings() {
        let mut settings = complete_settings("/tmp/out");
        assert_eq!(AnalysisMode::from_settings(&settings).unwrap(), AnalysisMode::Basic);
        settings.set(MODE, "Joint Epoch Fitting");
        assert_eq!(
            AnalysisMode::from_settings(&settings).unwrap(),
            AnalysisMode::JointEpoch
        );
        settings.set(MODE, "");
        assert_eq!(AnalysisMode::from_settings(&settings).unwrap(), AnalysisMode::Basic);
        settings.set(MODE, "phase-resolved");
        assert!(matches!(
            AnalysisMode::from_settings(&settings),
            Err(ConfigError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_basic_config() {
        let config =
            RunConfig::from_settings(&complete_settings("/tmp/out"), AnalysisMode::Basic).unwrap();
        assert_eq!(config.common.remote_directory, "/scratch/ls5039/epoch1");
        assert_eq!(config.common.energy_bins, 14);
        assert_eq!(config.common.scheduler, SchedulerConfig::default());
        match config.mode {
            ModeConfig::Basic {
                ephemeris,
                window,
                phase_bins,
            } => {
                assert_eq!(ephemeris.period, 3.90608);
                assert_eq!(ephemeris.t0, 55016.58);
                assert_eq!(window.tmin, 239557417.0);
                assert_eq!(phase_bins, 14);
            }
            other => panic!("wrong mode {other:?}"),
        }
    }

    #[test]
    fn test_missing_radius() {
        let mut settings = complete_settings("/tmp/out");
        settings.set(RADIUS, "");
        for mode in AnalysisMode::ALL {
            match RunConfig::from_settings(&settings, mode) {
                Err(ConfigError::MissingField(field)) => assert_eq!(field, "Radius"),
                other => panic!("unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_number() {
        let mut settings = complete_settings("/tmp/out");
        settings.set(RA, "276.5.6");
        let err = RunConfig::from_settings(&settings, AnalysisMode::Basic).unwrap_err();
        assert!(err.to_string().contains("RA"));

        let mut settings = complete_settings("/tmp/out");
        settings.set(PHASE_BINS, "0");
        assert!(matches!(
            RunConfig::from_settings(&settings, AnalysisMode::Basic),
            Err(ConfigError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_adaptive_does_not_need_ephemeris() {
        let mut settings = complete_settings("/tmp/out");
        settings.set(PERIOD, "");
        settings.set(T0, "");
        settings.set(PHASE_BINS, "");
        let config = RunConfig::from_settings(&settings, AnalysisMode::Adaptive).unwrap();
        assert_eq!(
            config.mode,
            ModeConfig::Adaptive {
                window: TimeWindow {
                    tmin: 239557417.0,
                    tmax: 668413063.0
                },
                counts_per_bin: 10000,
            }
        );
        assert!(RunConfig::from_settings(&settings, AnalysisMode::Basic).is_err());
    }

    #[test]
    fn test_epoch_lists() {
        let mut settings = complete_settings("/tmp/out");
        settings.set(PERIOD, "3.90608, 3.90610, 3.90612");
        settings.set(T0, "55016.58,55016.58,55016.60");
        settings.set(MIN_TIME, "239557417,300000000,400000000");
        settings.set(MAX_TIME, "299999999,399999999,668413063");
        let config = RunConfig::from_settings(&settings, AnalysisMode::MultipleTimes).unwrap();
        match config.mode {
            ModeConfig::MultipleTimes { epochs, .. } => {
                assert_eq!(epochs.len(), 3);
                assert_eq!(epochs[2].ephemeris.period, 3.90612);
                assert_eq!(epochs[1].window.tmax, 399999999.0);
            }
            other => panic!("wrong mode {other:?}"),
        }

        settings.set(T0, "55016.58");
        assert!(matches!(
            RunConfig::from_settings(&settings, AnalysisMode::JointEpoch),
            Err(ConfigError::MismatchedEpochLists(1, 3, 3, 3))
        ));
    }

    #[test]
    fn test_reversed_windows() {
        let mut settings = complete_settings("/tmp/out");
        settings.set(MIN_ENERGY, "1000");
        settings.set(MAX_ENERGY, "100");
        assert!(RunConfig::from_settings(&settings, AnalysisMode::Basic).is_err());

        let mut settings = complete_settings("/tmp/out");
        settings.set(MAX_TIME, "1");
        assert!(RunConfig::from_settings(&settings, AnalysisMode::Adaptive).is_err());
    }

    #[test]
    fn test_optional_settings() {
        let mut settings = complete_settings("/tmp/out");
        settings.set(PARTITION, "short");
        settings.set(FERMI_DIRECTORY, "/scratch/4FGL_Make");
        settings.set(CATALOGS, "4FGL-DR4, /scratch/ext/W44.xml,");
        let config = RunConfig::from_settings(&settings, AnalysisMode::Basic).unwrap();
        assert_eq!(config.common.scheduler.partition, "short");
        assert_eq!(config.common.scheduler.wall_time, "4:00:00");
        assert_eq!(
            config.common.scheduler.fermi_directory.as_deref(),
            Some("/scratch/4FGL_Make")
        );
        assert_eq!(
            config.common.model.catalogs,
            vec!["4FGL-DR4", "/scratch/ext/W44.xml"]
        );
    }

    #[test]
    fn test_mode_names() {
        for mode in AnalysisMode::ALL {
            assert_eq!(mode.key().parse::<AnalysisMode>().unwrap(), mode);
            assert_eq!(mode.to_string().parse::<AnalysisMode>().unwrap(), mode);
        }
        assert!("fancy".parse::<AnalysisMode>().is_err());
    }
}
