use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::TransferStatus;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Settings failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Settings failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingField(String),
    #[error("Setting {field} has invalid value {value:?}: {reason}")]
    InvalidField {
        field: String,
        value: String,
        reason: String,
    },
    #[error("Unknown analysis mode {0:?}")]
    UnknownMode(String),
    #[error("T0s, Periods, start times, and stop times must have the same count -- found {0}, {1}, {2}, {3}")]
    MismatchedEpochLists(usize, usize, usize, usize),
    #[error("Failed to load connection config as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BinningError {
    #[error("Not enough counts for requested bin size -- {available} events available, {requested} requested per bin")]
    InsufficientCounts { available: usize, requested: usize },
    #[error("Number of counts per bin must be at least 1")]
    ZeroCountsPerBin,
    #[error("Phase value {0} lies outside [0, 1)")]
    PhaseOutOfRange(f64),
}

#[derive(Debug, Error)]
pub enum BinTableError {
    #[error("Bin table failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Bin table failed to parse a number: {0}")]
    ParsingError(#[from] std::num::ParseFloatError),
    #[error("Bin table was given a file with the incorrect format; expected 4 columns on line {0}")]
    BadFileFormat(usize),
}

#[derive(Debug, Error)]
pub enum EventListError {
    #[error("Could not open event file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event file failed due to FITS error: {0}")]
    FitsError(#[from] fitsio::errors::Error),
    #[error("Event file columns have mismatched lengths -- ENERGY: {0}, PULSE_PHASE: {1}")]
    MismatchedColumns(usize, usize),
}

#[derive(Debug, Error)]
pub enum AnalysisConfigError {
    #[error("Analysis config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Analysis config failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Generator failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Generator failed due to analysis config error: {0}")]
    AnalysisConfigError(#[from] AnalysisConfigError),
    #[error("Generator failed due to bin table error: {0}")]
    BinTableError(#[from] BinTableError),
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Transfer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Transfer failed due to SSH error: {0}")]
    SshError(#[from] ssh2::Error),
    #[error("No .sh files found to transfer in {0:?}")]
    NoMatchingFiles(PathBuf),
    #[error("Could not find private key file {0:?}")]
    BadKeyPath(PathBuf),
    #[error("Remote command exited with status {status}: {stderr}")]
    RemoteCommandFailed { status: i32, stderr: String },
    #[error("Transfer failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<TransferStatus>),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Binning error: {0}")]
    BinningError(#[from] BinningError),
    #[error("Processor failed due to EventList error: {0}")]
    EventListError(#[from] EventListError),
    #[error("Processor failed due to Generator error: {0}")]
    GeneratorError(#[from] GeneratorError),
    #[error("Processor failed due to Transfer error: {0}")]
    TransferError(#[from] TransferError),
}

impl ProcessorError {
    /// Failures the user resolves by adjusting the request rather than fixing an input,
    /// reported as warnings instead of errors
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ProcessorError::BinningError(BinningError::InsufficientCounts { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_counts_is_warning() {
        let err = ProcessorError::from(BinningError::InsufficientCounts {
            available: 10,
            requested: 20,
        });
        assert!(err.is_warning());
        assert!(!ProcessorError::from(BinningError::ZeroCountsPerBin).is_warning());
        assert!(!ProcessorError::from(ConfigError::MissingField(String::from("Radius"))).is_warning());
    }
}
