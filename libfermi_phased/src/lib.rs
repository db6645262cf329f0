//! # fermi_phased
//!
//! fermi_phased prepares phase-resolved Fermi-LAT analyses of periodic sources (binaries,
//! pulsars) for a SLURM cluster, written in Rust. From a handful of settings (ephemeris,
//! region of interest, time and energy ranges, binning) it writes one batch job script per
//! phase bin that runs the Fermitools selection chain, together with a fermipy
//! configuration and an analysis driver. The scripts can optionally be copied to the
//! cluster over SSH and submitted with `sbatch`.
//!
//! ## Installation
//!
//! Currently the only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### CFITSIO and libssh2
//!
//! Event files are read through CFITSIO and the cluster is reached through libssh2. Both
//! are typically installed using a package manager (homebrew, apt, etc), for example
//! `apt install libcfitsio-dev libssh2-1-dev`. The Rust libraries will find them through
//! pkg-config.
//!
//! ### Building & Install
//!
//! To build and install the GUI use `cargo install --path ./fermi_phased` from the top
//! level repository.
//!
//! To build and install the CLI use `cargo install --path ./fermi_phased_cli` from the top
//! level repository.
//!
//! These binaries will be installed to your cargo install location (typically something
//! like `~/.cargo/bin/`). To use the CLI see the `fermi_phased_cli` README.
//!
//! ## Analysis Modes
//!
//! - Basic: equal-width phase bins. Events are selected with a cosine phase window around
//! each bin center, computed by gtmktime from the event time and the ephemeris.
//! - Adaptive (Fixed Counts) Binning: bins holding a fixed number of events each. The
//! event file must carry a `PULSE_PHASE` column (for example from `tempo2` or
//! `gtpphase`). The bin edges are written to `adaptive_bins.csv`.
//! - Multiple Times: like Basic, but the Period, T0, Min Time and Max Time fields take
//! comma-separated lists. Each entry describes one time window with its own ephemeris, and
//! every phase bin collects the events of all windows.
//! - Joint Epoch Fitting: the same lists, but every epoch becomes its own Basic run in an
//! `epoch_<n>` subdirectory, locally and on the cluster.
//!
//! ## Configuration
//!
//! Settings are stored as a flat YAML map of field name to value. A settings file saved
//! using the UI is compatible with the CLI and vice-versa. Blank fields count as missing.
//!
//! ```yml
//! Period: '3.90608'
//! T0: '55016.58'
//! RA: '276.5637'
//! DEC: '-14.8496'
//! Radius: '10'
//! Min Time (MET): '239557417'
//! Max Time (MET): '668413063'
//! Min Energy: '100'
//! Max Energy: '100000'
//! Number of Energy Bins: '14'
//! Number of Phase Bins: '14'
//! Number of Counts: '10000'
//! Remote Directory: /scratch/ls5039/
//! Local Directory: ./ls5039
//! Spacecraft File: /data/ls5039_sc.fits
//! Event File: /data/ls5039_ft1.fits
//! Mode: basic
//! ```
//!
//! Optional fields fall back to defaults when left out: `Partition`, `Wall Time`,
//! `Conda Profile`, `Conda Environment`, `Analysis Environment`, `Fermi Directory`,
//! `Source Name`, `Galactic Diffuse Model`, `Isotropic Diffuse Model` and `Catalogs`
//! (comma-separated).
//!
//! The SSH connection is configured separately:
//!
//! ```yml
//! host: cluster.example.edu
//! port: 22
//! username: fermi
//! key_path: ~/.ssh/id_rsa
//! ```
//!
//! ## Output
//!
//! The local directory receives:
//!
//! - `phase_<i>.sh`: one SLURM job per phase bin, numbered from 1. Each job runs in the
//! remote subdirectory `<i>/` and touches `done.flag` when finished.
//! - `config.yaml`: the fermipy configuration of the run.
//! - `analyze_phases.py`: the fermipy driver, fitting the source in every bin.
//! - `adaptive_bins.csv`: bin start, end, width and center (Adaptive mode only).
//!
//! The last job also waits for every `done.flag` and then submits `analyze_phases.slurm`,
//! which runs the driver.
pub mod analysis;
pub mod binning;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod generator;
pub mod process;
pub mod settings;
pub mod templates;
pub mod transfer;
pub mod upload_list;
pub mod worker_status;
