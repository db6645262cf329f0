//! Text of the SLURM job scripts.
//!
//! Everything in here is plain string formatting. The command lines follow the flag sets
//! required by the Fermitools (gtmktime, gtselect, gtbin, gtltcube); they are not ours to
//! change, so they are reproduced as-is.
use super::config::{CommonConfig, Ephemeris, Epoch, SchedulerConfig, TimeWindow};

/// Fermi MET zero point expressed in MJD (2001-01-01)
const MET_MJD_REFERENCE: u32 = 51910;
const SECONDS_PER_DAY: u32 = 86400;
/// Literal written into the filter expressions; gtmktime does not know `PI`
const PI_LITERAL: &str = "3.14159265359";
const QUALITY_FILTER: &str = "(DATA_QUAL>0) && (LAT_CONFIG==1)";

pub const DONE_FLAG: &str = "done.flag";
pub const ANALYSIS_JOB_NAME: &str = "analyze_phases.slurm";

/// Name of the job script for a (1-based) bin
pub fn script_name(index: usize) -> String {
    format!("phase_{index}.sh")
}

/// Join the blocks of a script the way every job script is laid out
pub fn join_blocks(blocks: &[String]) -> String {
    blocks.join("\n\n")
}

fn resource_lines(scheduler: &SchedulerConfig) -> String {
    let mut lines = format!("#SBATCH -p {}\n#SBATCH -N 1\n", scheduler.partition);
    if let Some(dir) = &scheduler.fermi_directory {
        lines.push_str(&format!("#SBATCH --export=MY_FERMI_DIR={dir}\n"));
    }
    lines.push_str(&format!("#SBATCH -t {}\n", scheduler.wall_time));
    lines
}

/// SLURM header. Each bin job runs in `<remote>/<index>/`.
pub fn header(index: usize, remote_directory: &str, scheduler: &SchedulerConfig) -> String {
    let mut lines = format!(
        "#!/bin/sh\n\n#SBATCH -p {}\n#SBATCH -N 1\n#SBATCH -D {remote_directory}/{index}/\n",
        scheduler.partition
    );
    if let Some(dir) = &scheduler.fermi_directory {
        lines.push_str(&format!("#SBATCH --export=MY_FERMI_DIR={dir}\n"));
    }
    lines.push_str(&format!(
        "#SBATCH -t {}\n\n. {}\n\nconda activate {}\n",
        scheduler.wall_time, scheduler.conda_profile, scheduler.conda_environment
    ));
    lines
}

/// The cosine threshold selecting a window of width 1/n around the bin center
pub fn cos_threshold(phase_bins: usize) -> f64 {
    (std::f64::consts::PI / phase_bins as f64).cos()
}

/// Predicate true when the orbital phase of `column` (START or STOP, in MET) lies
/// within half a bin of phase `(index - 1) / phase_bins`
pub fn phase_predicate(
    column: &str,
    ephemeris: &Ephemeris,
    index: usize,
    phase_bins: usize,
) -> String {
    format!(
        "COS(2*{PI_LITERAL}*({column}/({SECONDS_PER_DAY})+ {MET_MJD_REFERENCE}-{t0} - {k}*{period}*{frac})/{period})>{cos}",
        t0 = ephemeris.t0,
        k = index - 1,
        period = ephemeris.period,
        frac = 1.0 / phase_bins as f64,
        cos = cos_threshold(phase_bins),
    )
}

/// Filter for a single ephemeris over the whole time range
pub fn basic_filter(ephemeris: &Ephemeris, index: usize, phase_bins: usize) -> String {
    format!(
        "{} && {} && {QUALITY_FILTER}",
        phase_predicate("START", ephemeris, index, phase_bins),
        phase_predicate("STOP", ephemeris, index, phase_bins),
    )
}

/// Filter over several time windows, each with its own ephemeris. One clause per
/// window, all ORed together, with the quality cut applied to the whole disjunction.
pub fn windows_filter(epochs: &[Epoch], index: usize, phase_bins: usize) -> String {
    let clauses: Vec<String> = epochs
        .iter()
        .map(|epoch| {
            let TimeWindow { tmin, tmax } = epoch.window;
            format!(
                "((START > {tmin}) && (START < {tmax}) && (STOP > {tmin}) && (STOP < {tmax}) && {} && {})",
                phase_predicate("START", &epoch.ephemeris, index, phase_bins),
                phase_predicate("STOP", &epoch.ephemeris, index, phase_bins),
            )
        })
        .collect();
    format!("({}) && {QUALITY_FILTER}", clauses.join(" || "))
}

/// Filter with only the quality cut, for modes selecting phase in gtselect
pub fn quality_filter() -> String {
    String::from(QUALITY_FILTER)
}

pub fn gtmktime(index: usize, common: &CommonConfig, filter: &str) -> String {
    format!(
        "gtmktime apply_filter=yes evfile={} scfile={} outfile=./{index}.fits filter=\"{filter}\" roicut=no",
        common.event_file, common.spacecraft_file,
    )
}

/// Event selection. `phase_range` adds phasemin/phasemax cuts (adaptive bins).
pub fn gtselect(
    index: usize,
    common: &CommonConfig,
    window: &TimeWindow,
    phase_range: Option<(f64, f64)>,
) -> String {
    let phase_cut = match phase_range {
        Some((pmin, pmax)) => format!(" phasemin={pmin} phasemax={pmax}"),
        None => String::new(),
    };
    format!(
        "gtselect infile=./{index}.fits outfile=./ft1_00.fits ra={} dec={} rad={} tmin={} tmax={} emin={} emax={}{phase_cut} zmin=0.0 zmax=90.0 evclass=128 evtype=3 convtype=-1 evtable=\"EVENTS\" chatter=3 clobber=yes debug=no gui=no mode=\"ql\" ",
        common.ra, common.dec, common.radius, window.tmin, window.tmax, common.emin, common.emax,
    )
}

/// Counts cube
pub fn gtbin(common: &CommonConfig) -> String {
    format!(
        "gtbin evfile=./ft1_00.fits scfile={} outfile=./ccube_00.fits algorithm=\"ccube\" ebinalg=\"LOG\" emin={} emax={} enumbins={} ebinfile=NONE tbinalg=\"LIN\" tbinfile=NONE nxpix=200 nypix=200 binsz=0.1 coordsys=\"CEL\" xref={} yref={} axisrot=0.0 rafield=\"RA\" decfield=\"DEC\" proj=\"AIT\" hpx_ordering_scheme=\"RING\" hpx_order=3 hpx_ebin=yes hpx_region= evtable=\"EVENTS\" sctable=\"SC_DATA\" efield=\"ENERGY\" tfield=\"TIME\" chatter=3 clobber=yes debug=no gui=no mode=\"ql\" ",
        common.spacecraft_file, common.emin, common.emax, common.energy_bins, common.ra, common.dec,
    )
}

/// Livetime cube
pub fn gtltcube(common: &CommonConfig, window: &TimeWindow) -> String {
    format!(
        "gtltcube evfile=./ft1_00.fits evtable=\"EVENTS\" scfile={} sctable=\"SC_DATA\" outfile=./ltcube_00.fits dcostheta=0.025 binsz=1.0 phibins=0 tmin={} tmax={} file_version=\"1\" zmin=0.0 zmax=90.0 chatter=2 clobber=yes debug=no gui=no mode=\"ql\" ",
        common.spacecraft_file, window.tmin, window.tmax,
    )
}

/// Tail of every bin job. The last job to finish copies the analysis config into every
/// bin directory and submits the analysis job.
pub fn closer(phase_bins: usize, scheduler: &SchedulerConfig) -> String {
    format!(
        r#"touch {DONE_FLAG}
sleep 60
cd ..
COUNT=$(find . -type f -name "{DONE_FLAG}" | wc -l)

if [ "$COUNT" -eq {phase_bins} ]; then
    echo "All $COUNT phases complete. Running analysis."
    for i in $(seq 1 {phase_bins})
    do
        cp config.yaml $i
    done

    cat > {ANALYSIS_JOB_NAME} << 'EOF'
#!/bin/sh
{resources}
. {profile}
conda activate {environment}

python analyze_phases.py
EOF

    sbatch {ANALYSIS_JOB_NAME}
else
    echo "$COUNT/{phase_bins} phases done. Passing to another node..."
fi
"#,
        resources = resource_lines(scheduler),
        profile = scheduler.conda_profile,
        environment = scheduler.analysis_environment,
    )
}
