use std::path::Path;

use fitsio::FitsFile;

use super::error::EventListError;

const EVENTS_HDU: &str = "EVENTS";
const ENERGY_COLUMN: &str = "ENERGY";
const PHASE_COLUMN: &str = "PULSE_PHASE";

/// The (energy, phase) pairs of a photon event file.
///
/// Only the two columns needed for adaptive binning are loaded. The event file must
/// already carry a `PULSE_PHASE` column (e.g. from tempo2 or gtpphase).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventList {
    energy: Vec<f64>,
    pulse_phase: Vec<f64>,
}

impl EventList {
    pub fn new(energy: Vec<f64>, pulse_phase: Vec<f64>) -> Result<Self, EventListError> {
        if energy.len() != pulse_phase.len() {
            return Err(EventListError::MismatchedColumns(
                energy.len(),
                pulse_phase.len(),
            ));
        }
        Ok(Self {
            energy,
            pulse_phase,
        })
    }

    /// Read the EVENTS extension of a FITS FT1 file
    pub fn read_fits(path: &Path) -> Result<Self, EventListError> {
        if !path.exists() {
            return Err(EventListError::BadFilePath(path.to_path_buf()));
        }
        let mut fptr = FitsFile::open(path)?;
        let hdu = fptr.hdu(EVENTS_HDU)?;
        let energy: Vec<f64> = hdu.read_col(&mut fptr, ENERGY_COLUMN)?;
        let pulse_phase: Vec<f64> = hdu.read_col(&mut fptr, PHASE_COLUMN)?;
        log::info!(
            "Loaded {} events from {}",
            energy.len(),
            path.to_string_lossy()
        );
        Self::new(energy, pulse_phase)
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    /// Phases of the events with `emin < energy < emax`, in file order
    pub fn phases_in_energy_window(&self, emin: f64, emax: f64) -> Vec<f64> {
        self.energy
            .iter()
            .zip(self.pulse_phase.iter())
            .filter(|(e, _)| **e > emin && **e < emax)
            .map(|(_, p)| *p)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitsio::tables::{ColumnDataType, ColumnDescription};

    /// Write an FT1-like file with an EVENTS table holding the given columns
    fn write_event_file(path: &Path, energy: &[f32], pulse_phase: Option<&[f64]>) {
        let mut fptr = FitsFile::create(path).open().unwrap();
        let mut description = vec![ColumnDescription::new(ENERGY_COLUMN)
            .with_type(ColumnDataType::Float)
            .create()
            .unwrap()];
        if pulse_phase.is_some() {
            description.push(
                ColumnDescription::new(PHASE_COLUMN)
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
            );
        }
        let hdu = fptr.create_table(EVENTS_HDU, &description).unwrap();
        hdu.write_col(&mut fptr, ENERGY_COLUMN, energy).unwrap();
        if let Some(phase) = pulse_phase {
            hdu.write_col(&mut fptr, PHASE_COLUMN, phase).unwrap();
        }
    }

    #[test]
    fn test_read_event_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ft1.fits");
        write_event_file(
            &path,
            &[50.0, 150.0, 2500.0, 100_000.0, 350.0],
            Some(&[0.05, 0.15, 0.25, 0.35, 0.45]),
        );

        let events = EventList::read_fits(&path).unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events.phases_in_energy_window(100.0, 100_000.0),
            vec![0.15, 0.25, 0.45]
        );
    }

    #[test]
    fn test_event_file_without_phases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ft1_nophase.fits");
        write_event_file(&path, &[150.0, 2500.0], None);
        assert!(matches!(
            EventList::read_fits(&path),
            Err(EventListError::FitsError(_))
        ));
    }

    #[test]
    fn test_energy_window_is_exclusive() {
        let events = EventList::new(
            vec![100.0, 150.0, 99_999.0, 100_000.0, 250.0],
            vec![0.1, 0.2, 0.3, 0.4, 0.5],
        )
        .unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events.phases_in_energy_window(100.0, 100_000.0),
            vec![0.2, 0.3, 0.5]
        );
        assert!(events.phases_in_energy_window(1e6, 1e7).is_empty());
    }

    #[test]
    fn test_mismatched_columns() {
        assert!(matches!(
            EventList::new(vec![1.0, 2.0], vec![0.5]),
            Err(EventListError::MismatchedColumns(2, 1))
        ));
    }

    #[test]
    fn test_missing_event_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ft1.fits");
        assert!(matches!(
            EventList::read_fits(&path),
            Err(EventListError::BadFilePath(_))
        ));
    }
}
