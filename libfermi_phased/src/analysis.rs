use serde::{Deserialize, Serialize};

use super::config::{CommonConfig, TimeWindow};
use super::error::AnalysisConfigError;

pub const ANALYSIS_CONFIG_NAME: &str = "config.yaml";
pub const ANALYSIS_DRIVER_NAME: &str = "analyze_phases.py";

const IRFS: &str = "P8R3_SOURCE_V3";
const PIXEL_SIZE_DEG: f64 = 0.05;
const BINS_PER_DECADE: u32 = 8;
const MAX_ZENITH_DEG: f64 = 90.0;
const EVENT_CLASS: u32 = 128;
const EVENT_TYPE: u32 = 3;
/// The model ROI extends this far beyond the data ROI, in degrees
const MODEL_ROI_PADDING_DEG: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    pub evfile: String,
    pub scfile: String,
    pub ltcube: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningSection {
    pub roiwidth: f64,
    pub binsz: f64,
    pub binsperdec: u32,
    pub enumbins: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSection {
    pub emin: f64,
    pub emax: f64,
    pub zmax: f64,
    pub evclass: u32,
    pub evtype: u32,
    pub ra: f64,
    pub dec: f64,
    pub tmin: f64,
    pub tmax: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GtlikeSection {
    pub edisp: bool,
    pub irfs: String,
    pub edisp_disable: Vec<String>,
    pub edisp_bins: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    pub src_roiwidth: f64,
    pub galdiff: String,
    pub isodiff: String,
    pub catalogs: Vec<String>,
}

/// The fermipy configuration shared by every bin of a run. Each bin job works in its own
/// directory, so the data products are referenced relative to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub data: DataSection,
    pub binning: BinningSection,
    pub selection: SelectionSection,
    pub gtlike: GtlikeSection,
    pub model: ModelSection,
}

impl AnalysisConfig {
    pub fn new(common: &CommonConfig, window: &TimeWindow) -> Self {
        Self {
            data: DataSection {
                evfile: String::from("./ft1_00.fits"),
                scfile: common.spacecraft_file.clone(),
                ltcube: String::from("./ltcube_00.fits"),
            },
            binning: BinningSection {
                roiwidth: common.radius,
                binsz: PIXEL_SIZE_DEG,
                binsperdec: BINS_PER_DECADE,
                enumbins: common.energy_bins,
            },
            selection: SelectionSection {
                emin: common.emin,
                emax: common.emax,
                zmax: MAX_ZENITH_DEG,
                evclass: EVENT_CLASS,
                evtype: EVENT_TYPE,
                ra: common.ra,
                dec: common.dec,
                tmin: window.tmin,
                tmax: window.tmax,
            },
            gtlike: GtlikeSection {
                edisp: true,
                irfs: String::from(IRFS),
                edisp_disable: vec![String::from("isodiff")],
                edisp_bins: -2,
            },
            model: ModelSection {
                src_roiwidth: common.radius + MODEL_ROI_PADDING_DEG,
                galdiff: common.model.galactic_diffuse.clone(),
                isodiff: common.model.isotropic_diffuse.clone(),
                catalogs: common.model.catalogs.clone(),
            },
        }
    }

    pub fn to_yaml(&self) -> Result<String, AnalysisConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn python_list(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<String>>()
        .join(", ")
}

/// Text of the driver program run once every bin job is done. It fits the source
/// normalisation in every bin directory with fermipy and plots flux, the LogParabola
/// alpha and beta, and TS against phase, drawing two cycles.
///
/// `flux_scales` divides each bin's fitted flux. It is the bin width when the phase
/// cut is made by gtselect, which leaves the exposure of the whole orbit in the
/// livetime cube, and 1 when gtmktime already restricted the good time intervals.
pub fn analysis_driver(
    remote_directory: &str,
    source_name: &str,
    phase_centers: &[f64],
    flux_scales: &[f64],
) -> String {
    format!(
        r#"import os

import numpy as np
import matplotlib.pyplot as plt
from fermipy.gtanalysis import GTAnalysis

BASE_DIR = '{remote_directory}'
SOURCE_NAME = '{source_name}'
PHASE_CENTERS = np.array([{centers}])
FLUX_SCALES = np.array([{scales}])
SPECTRAL_PARS = ('norm', 'alpha', 'beta', 'Eb')


def fit_bin(directory):
    os.chdir(directory)
    gta = GTAnalysis('./config.yaml', logging={{'verbosity': 3}})
    gta.setup(optimizer={{'min_fit_quality': 3, 'optimizer': 'MINUIT', 'retries': 1000, 'max_iter': 1000}})
    gta.free_sources(distance=15, free=False)
    gta.free_source(SOURCE_NAME, pars='norm')
    gta.fit(min_fit_quality=3, optimizer='MINUIT', retries=1000, tol=1e-8)
    gta.write_roi('norm', make_plots=True)
    return gta


def analyze_phases():
    return [fit_bin(os.path.join(BASE_DIR, str(i + 1))) for i in range(len(PHASE_CENTERS))]


def load_data_and_plot():
    n_bins = len(PHASE_CENTERS)
    fluxes = np.zeros(n_bins)
    flux_errs = np.zeros(n_bins)
    ts = np.zeros(n_bins)
    spec_params = np.zeros((n_bins, len(SPECTRAL_PARS)))
    spec_errs = np.zeros((n_bins, len(SPECTRAL_PARS)))
    for i in range(n_bins):
        p = np.load(os.path.join(BASE_DIR, str(i + 1), 'norm.npy'), allow_pickle=True).flat[0]
        src = p['sources'][SOURCE_NAME]
        fluxes[i] = src['flux']
        flux_errs[i] = src['flux_err']
        ts[i] = src['ts']
        for j, par in enumerate(SPECTRAL_PARS):
            spec_params[i, j] = src['spectral_pars'][par]['value']
            spec_errs[i, j] = src['spectral_pars'][par]['error']

    fluxes /= FLUX_SCALES
    flux_errs /= FLUX_SCALES

    phase = np.append(PHASE_CENTERS, PHASE_CENTERS + 1)
    fluxes = np.tile(fluxes, 2)
    flux_errs = np.tile(flux_errs, 2)
    ts = np.tile(ts, 2)
    spec_params = np.vstack([spec_params, spec_params])
    spec_errs = np.vstack([spec_errs, spec_errs])

    fig, (ax_flux, ax_alpha, ax_beta, ax_ts) = plt.subplots(4, 1, figsize=(20, 24), constrained_layout=True)
    ax_flux.step(phase, fluxes * 1e8, 'k', where='mid')
    ax_flux.errorbar(phase, fluxes * 1e8, yerr=flux_errs * 1e8, fmt='k+')
    ax_flux.set_ylabel(r'Flux ($10^{{-8}}$ Ph cm$^{{-2}}$ s$^{{-1}}$)', fontsize=28)
    ax_alpha.step(phase, spec_params[:, 1], 'k', where='mid')
    ax_alpha.errorbar(phase, spec_params[:, 1], yerr=spec_errs[:, 1], fmt='k+')
    ax_alpha.set_ylabel(r'$\alpha$', fontsize=28)
    ax_beta.step(phase, spec_params[:, 2], 'k', where='mid')
    ax_beta.errorbar(phase, spec_params[:, 2], yerr=spec_errs[:, 2], fmt='k+')
    ax_beta.set_ylabel(r'$\beta$', fontsize=28)
    ax_ts.step(phase, ts, 'k', where='mid')
    ax_ts.set_ylabel('TS', fontsize=28)
    for ax in (ax_flux, ax_alpha, ax_beta, ax_ts):
        ax.set_xlim(0, 2)
        ax.axvline(1, color='gray', linestyle='--')
    ax_ts.set_xlabel('Phase', fontsize=28)
    fig.savefig(os.path.join(BASE_DIR, 'phaseogram.png'))
    return spec_params, spec_errs, phase, fluxes, flux_errs, ts


if __name__ == '__main__':
    analyze_phases()
    load_data_and_plot()
"#,
        centers = python_list(phase_centers),
        scales = python_list(flux_scales),
    )
}
