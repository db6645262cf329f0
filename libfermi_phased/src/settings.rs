use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::error::SettingsError;

pub const PERIOD: &str = "Period";
pub const T0: &str = "T0";
pub const RA: &str = "RA";
pub const DEC: &str = "DEC";
pub const RADIUS: &str = "Radius";
pub const MIN_TIME: &str = "Min Time (MET)";
pub const MAX_TIME: &str = "Max Time (MET)";
pub const MIN_ENERGY: &str = "Min Energy";
pub const MAX_ENERGY: &str = "Max Energy";
pub const ENERGY_BINS: &str = "Number of Energy Bins";
pub const PHASE_BINS: &str = "Number of Phase Bins";
pub const COUNTS_PER_BIN: &str = "Number of Counts";
pub const REMOTE_DIRECTORY: &str = "Remote Directory";
pub const LOCAL_DIRECTORY: &str = "Local Directory";
pub const SPACECRAFT_FILE: &str = "Spacecraft File";
pub const EVENT_FILE: &str = "Event File";
pub const MODE: &str = "Mode";

pub const PARTITION: &str = "Partition";
pub const WALL_TIME: &str = "Wall Time";
pub const CONDA_PROFILE: &str = "Conda Profile";
pub const CONDA_ENVIRONMENT: &str = "Conda Environment";
pub const ANALYSIS_ENVIRONMENT: &str = "Analysis Environment";
pub const FERMI_DIRECTORY: &str = "Fermi Directory";

pub const SOURCE_NAME: &str = "Source Name";
pub const GALACTIC_DIFFUSE: &str = "Galactic Diffuse Model";
pub const ISOTROPIC_DIFFUSE: &str = "Isotropic Diffuse Model";
pub const CATALOGS: &str = "Catalogs";

/// Timing solution, read by every mode except adaptive binning, which takes the phase
/// from the event file
pub const EPHEMERIS_FIELDS: [&str; 2] = [PERIOD, T0];

/// The numeric fields shown for every mode, in form order
pub const COMMON_FIELDS: [&str; 8] = [
    RA,
    DEC,
    RADIUS,
    MIN_TIME,
    MAX_TIME,
    MIN_ENERGY,
    MAX_ENERGY,
    ENERGY_BINS,
];

/// Directories and input files
pub const PATH_FIELDS: [&str; 4] = [REMOTE_DIRECTORY, LOCAL_DIRECTORY, SPACECRAFT_FILE, EVENT_FILE];

/// Optional fields which fall back to a default when left blank
pub const OPTIONAL_FIELDS: [&str; 10] = [
    PARTITION,
    WALL_TIME,
    CONDA_PROFILE,
    CONDA_ENVIRONMENT,
    ANALYSIS_ENVIRONMENT,
    FERMI_DIRECTORY,
    SOURCE_NAME,
    GALACTIC_DIFFUSE,
    ISOTROPIC_DIFFUSE,
    CATALOGS,
];

/// The persisted form of the user input: a flat mapping of field name to the raw text
/// the user typed.
///
/// Settings are written as YAML. Since YAML is a superset of JSON, flat JSON settings
/// files can be loaded as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    fields: BTreeMap<String, String>,
}

impl Settings {
    /// Settings pre-filled with the LS 5039 ephemeris and a typical selection.
    /// Paths are left blank.
    pub fn template() -> Self {
        let mut settings = Self::default();
        for (key, value) in [
            (PERIOD, "3.90608"),
            (T0, "55016.58"),
            (RA, "276.5637"),
            (DEC, "-14.8496"),
            (RADIUS, "10"),
            (MIN_TIME, "239557417"),
            (MAX_TIME, "668413063"),
            (MIN_ENERGY, "100"),
            (MAX_ENERGY, "100000"),
            (ENERGY_BINS, "14"),
            (PHASE_BINS, "14"),
            (COUNTS_PER_BIN, "10000"),
            (REMOTE_DIRECTORY, ""),
            (LOCAL_DIRECTORY, ""),
            (SPACECRAFT_FILE, ""),
            (EVENT_FILE, ""),
            (MODE, "basic"),
        ] {
            settings.set(key, value);
        }
        settings
    }

    /// Read settings from a YAML (or JSON) file
    pub fn read_settings_file(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::BadFilePath(path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the settings to a YAML file, replacing it if it exists
    pub fn write_settings_file(&self, path: &Path) -> Result<(), SettingsError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml_str)?;
        Ok(())
    }

    /// Get the trimmed value of a field. Blank fields count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.fields.insert(key.to_string(), value.to_string());
    }

    /// Mutable access to the raw text of a field, creating it empty if needed.
    /// Used by the UI to bind text boxes directly to the settings.
    pub fn entry_mut(&mut self, key: &str) -> &mut String {
        self.fields.entry(key.to_string()).or_default()
    }

    /// Blank every field, keeping the keys
    pub fn reset(&mut self) {
        for value in self.fields.values_mut() {
            value.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
