use std::path::{Path, PathBuf};

use super::analysis::ANALYSIS_DRIVER_NAME;
use super::error::TransferError;

const SCRIPT_EXTENSION: &str = "sh";
const CONFIG_EXTENSION: &str = "yaml";

/// UploadList collects the generated files of a local job directory and pairs each with
/// its destination on the cluster.
pub struct UploadList {
    file_stack: Vec<(PathBuf, String, u64)>,
    total_data_size_bytes: u64,
}

impl UploadList {
    /// Create a new UploadList.
    ///
    /// Picks up the job scripts (.sh), configs (.yaml) and the analysis driver. Fails if the
    /// directory holds no job script, since there would be nothing to submit.
    pub fn new(local_directory: &Path, remote_directory: &str) -> Result<Self, TransferError> {
        let mut stack = Vec::new();
        let mut total_size: u64 = 0;
        let mut n_scripts = 0;
        for (path, bytes) in Self::get_file_stack(local_directory)? {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            if Self::is_script(&path) {
                n_scripts += 1;
            }
            let dst = format!("{}/{name}", remote_directory.trim_end_matches('/'));
            stack.push((path, dst, bytes));
            total_size += bytes;
        }
        if n_scripts == 0 {
            return Err(TransferError::NoMatchingFiles(local_directory.to_path_buf()));
        }
        Ok(Self {
            file_stack: stack,
            total_data_size_bytes: total_size,
        })
    }

    fn is_script(path: &Path) -> bool {
        path.extension().is_some_and(|e| e == SCRIPT_EXTENSION)
    }

    fn is_uploaded(path: &Path) -> bool {
        let by_extension = path
            .extension()
            .is_some_and(|e| e == SCRIPT_EXTENSION || e == CONFIG_EXTENSION);
        let by_name = path
            .file_name()
            .is_some_and(|n| n == ANALYSIS_DRIVER_NAME);
        path.is_file() && (by_extension || by_name)
    }

    /// Matching files in the directory, sorted by name
    fn get_file_stack(parent_path: &Path) -> Result<Vec<(PathBuf, u64)>, TransferError> {
        let mut file_list: Vec<(PathBuf, u64)> = Vec::new();
        for item in parent_path.read_dir()? {
            let item_path = item?.path();
            if Self::is_uploaded(&item_path) {
                let bytes = item_path.metadata()?.len();
                file_list.push((item_path, bytes));
            }
        }
        file_list.sort();
        Ok(file_list)
    }

    /// Get total upload size of files.
    pub fn get_total_data_size(&self) -> u64 {
        self.total_data_size_bytes
    }

    /// Source path, remote destination and size in bytes of every file to upload
    pub fn upload_meta(&self) -> &Vec<(PathBuf, String, u64)> {
        &self.file_stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "phase_2.sh",
            "phase_1.sh",
            "config.yaml",
            "analyze_phases.py",
            "adaptive_bins.csv",
            "other.py",
        ] {
            std::fs::write(dir.path().join(name), "echo\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.sh")).unwrap();

        let list = UploadList::new(dir.path(), "/scratch/run/").unwrap();
        let remote: Vec<&str> = list.upload_meta().iter().map(|(_, r, _)| r.as_str()).collect();
        assert_eq!(
            remote,
            vec![
                "/scratch/run/analyze_phases.py",
                "/scratch/run/config.yaml",
                "/scratch/run/phase_1.sh",
                "/scratch/run/phase_2.sh",
            ]
        );
        assert_eq!(list.get_total_data_size(), 20);
    }

    #[test]
    fn test_requires_scripts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "data: {}\n").unwrap();
        assert!(matches!(
            UploadList::new(dir.path(), "/scratch/run"),
            Err(TransferError::NoMatchingFiles(_))
        ));
    }
}
