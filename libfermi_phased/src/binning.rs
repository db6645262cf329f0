use std::fmt::Write as _;
use std::path::Path;

use super::error::{BinTableError, BinningError};

pub const BIN_TABLE_NAME: &str = "adaptive_bins.csv";
const BIN_TABLE_HEADER: &str = "Bin Start,Bin End,Bin Width,Bin Center";
const ENTRIES_PER_LINE: usize = 4;

/// One phase bin. Boundaries are phase values in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseBin {
    pub start: f64,
    pub end: f64,
    pub width: f64,
    pub center: f64,
}

impl PhaseBin {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            width: end - start,
            center: 0.5 * (start + end),
        }
    }
}

/// Partition a sample of event phases into bins holding `counts_per_bin` events each.
///
/// The sample is sorted (on a copy) and bin `i` starts at the phase found at sorted
/// index `i * counts_per_bin`. Each bin ends where the next one starts, and the last bin
/// always ends at exactly 1.0, so the bins tile the cycle from the first event onwards.
/// Any remainder events past the last full bin fall into that last bin.
///
/// Returns `floor(N / counts_per_bin)` bins. A sample with fewer than
/// `counts_per_bin` events is refused rather than producing an empty table.
pub fn adaptive_bins(phases: &[f64], counts_per_bin: usize) -> Result<Vec<PhaseBin>, BinningError> {
    if counts_per_bin == 0 {
        return Err(BinningError::ZeroCountsPerBin);
    }
    if phases.len() < counts_per_bin {
        return Err(BinningError::InsufficientCounts {
            available: phases.len(),
            requested: counts_per_bin,
        });
    }
    if let Some(bad) = phases.iter().find(|p| !(0.0..1.0).contains(*p)) {
        return Err(BinningError::PhaseOutOfRange(*bad));
    }

    let mut sorted = phases.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);

    let num_bins = sorted.len() / counts_per_bin;
    let mut edges: Vec<f64> = (0..num_bins).map(|i| sorted[i * counts_per_bin]).collect();
    edges.push(1.0);

    Ok(edges
        .windows(2)
        .map(|edge| PhaseBin::new(edge[0], edge[1]))
        .collect())
}

/// The bin centers used for equal-width phase bins. The gtmktime phase filter
/// centres bin `k` (0-indexed) on phase `k / n`.
pub fn uniform_bin_centers(phase_bins: usize) -> Vec<f64> {
    (0..phase_bins)
        .map(|k| k as f64 / phase_bins as f64)
        .collect()
}

/// Render the bin table as CSV text
pub fn format_bin_table(bins: &[PhaseBin]) -> String {
    let mut table = String::from(BIN_TABLE_HEADER);
    table.push('\n');
    for bin in bins {
        // Writing to a String cannot fail
        let _ = writeln!(
            table,
            "{},{},{},{}",
            bin.start, bin.end, bin.width, bin.center
        );
    }
    table
}

/// Persist the bin table so a run can be reproduced and inspected later
pub fn write_bin_table(path: &Path, bins: &[PhaseBin]) -> Result<(), BinTableError> {
    std::fs::write(path, format_bin_table(bins))?;
    Ok(())
}

/// Read back a table written by [write_bin_table]
pub fn read_bin_table(path: &Path) -> Result<Vec<PhaseBin>, BinTableError> {
    let contents = std::fs::read_to_string(path)?;
    let mut bins = Vec::new();

    let mut lines = contents.lines();
    lines.next(); // Skip the header
    for (idx, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entries: Vec<&str> = line.split_terminator(',').collect();
        if entries.len() != ENTRIES_PER_LINE {
            return Err(BinTableError::BadFileFormat(idx + 2));
        }
        bins.push(PhaseBin {
            start: entries[0].trim().parse()?,
            end: entries[1].trim().parse()?,
            width: entries[2].trim().parse()?,
            center: entries[3].trim().parse()?,
        });
    }
    Ok(bins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// 100 evenly spaced phases over [0.01, 0.99], shuffled deterministically
    fn spread_sample() -> Vec<f64> {
        let mut sample: Vec<f64> = (0..100).map(|i| 0.01 + 0.98 * i as f64 / 99.0).collect();
        // Reverse then interleave so the input is not pre-sorted
        sample.reverse();
        let (a, b) = sample.split_at(50);
        a.iter().zip(b).flat_map(|(x, y)| [*y, *x]).collect()
    }

    #[test]
    fn test_four_equal_bins() {
        let sample = spread_sample();
        let mut sorted = sample.clone();
        sorted.sort_by(f64::total_cmp);

        let bins = adaptive_bins(&sample, 25).unwrap();
        assert_eq!(bins.len(), 4);
        assert_eq!(bins[0].start, sorted[0]);
        assert_eq!(bins[0].end, sorted[25]);
        assert_eq!(bins[1].start, sorted[25]);
        assert_eq!(bins[2].start, sorted[50]);
        assert_eq!(bins[3].start, sorted[75]);
        assert_eq!(bins[3].end, 1.0);
        assert!(sorted[99] < 1.0);
    }

    #[test]
    fn test_bin_count_and_starts() {
        let sample: Vec<f64> = (0..1037).map(|i| (i as f64 * 0.618034) % 1.0).collect();
        let mut sorted = sample.clone();
        sorted.sort_by(f64::total_cmp);
        for k in [1, 2, 7, 100, 518, 1036, 1037] {
            let bins = adaptive_bins(&sample, k).unwrap();
            assert_eq!(bins.len(), sample.len() / k);
            for (i, bin) in bins.iter().enumerate() {
                assert_eq!(bin.start, sorted[i * k]);
                assert!(bin.width >= 0.0);
                assert_abs_diff_eq!(bin.width, bin.end - bin.start);
                assert_abs_diff_eq!(bin.center, 0.5 * (bin.start + bin.end));
                if bin.width > 0.0 {
                    assert!(bin.start < bin.center && bin.center < bin.end);
                }
            }
            assert_eq!(bins.last().unwrap().end, 1.0);
        }
    }

    #[test]
    fn test_contiguous() {
        let sample: Vec<f64> = (0..400).map(|i| ((i * 37) % 400) as f64 / 400.0).collect();
        let bins = adaptive_bins(&sample, 30).unwrap();
        for pair in bins.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_abs_diff_eq!(
            bins.iter().map(|b| b.width).sum::<f64>(),
            1.0 - bins[0].start,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_input_untouched() {
        let sample = spread_sample();
        let copy = sample.clone();
        let _ = adaptive_bins(&sample, 10).unwrap();
        assert_eq!(sample, copy);
    }

    #[test]
    fn test_insufficient_counts() {
        let sample: Vec<f64> = (0..10).map(|i| i as f64 / 10.0).collect();
        assert_eq!(
            adaptive_bins(&sample, 20),
            Err(BinningError::InsufficientCounts {
                available: 10,
                requested: 20
            })
        );
        assert!(matches!(
            adaptive_bins(&[], 1),
            Err(BinningError::InsufficientCounts { .. })
        ));
    }

    #[test]
    fn test_bad_input() {
        assert_eq!(adaptive_bins(&[0.5], 0), Err(BinningError::ZeroCountsPerBin));
        assert_eq!(
            adaptive_bins(&[0.5, 1.0], 1),
            Err(BinningError::PhaseOutOfRange(1.0))
        );
        assert!(matches!(
            adaptive_bins(&[f64::NAN, 0.2], 1),
            Err(BinningError::PhaseOutOfRange(_))
        ));
    }

    #[test]
    fn test_uniform_centers() {
        assert_eq!(uniform_bin_centers(4), vec![0.0, 0.25, 0.5, 0.75]);
        assert!(uniform_bin_centers(0).is_empty());
    }

    #[test]
    fn test_bin_table_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BIN_TABLE_NAME);
        let bins = vec![PhaseBin::new(0.015, 0.4), PhaseBin::new(0.4, 1.0)];
        write_bin_table(&path, &bins).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Bin Start,Bin End,Bin Width,Bin Center\n"));
        assert_eq!(text.lines().count(), 3);
        assert_eq!(read_bin_table(&path).unwrap(), bins);
    }

    #[test]
    fn test_bad_bin_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BIN_TABLE_NAME);
        std::fs::write(&path, "Bin Start,Bin End,Bin Width,Bin Center\n0.1,0.2,0.1\n").unwrap();
        assert!(matches!(
            read_bin_table(&path),
            Err(BinTableError::BadFileFormat(2))
        ));
    }
}
