use console::style;
use log::{debug, info, warn};
use mstat::report::{self, SeriesSummary};
use mstat::{
    CgroupConfig, LaunchConfig, LaunchOutcome, Result, SamplerConfig, Supervisor, privilege, util,
};
use std::io;
use std::path::PathBuf;

use crate::cli::Cli;

/// CLI-level settings that only matter once the run is over
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            output: cli.output.clone(),
            verbose: cli.verbose,
        }
    }
}

/// Build the launch configuration for `program` from the parsed flags
pub fn launch_config(cli: &Cli, program: String) -> Result<LaunchConfig> {
    let mut config = LaunchConfig::new(program, cli.args.clone());
    config.env = cli.env.clone();
    config.sampler = SamplerConfig {
        frequency_hz: cli.freq,
        keep_raw_stats: cli.verbose,
    };

    if let Some(m) = &cli.memory_limit {
        debug!("Overriding memory limit: {}", m);
        config.cgroup = CgroupConfig::with_memory(util::parse_memory_size(m)?);
    }

    Ok(config)
}

/// Launch and measure the command, write the report, and return the exit
/// code the process should end with
pub fn run_measurement(run: &RunConfig, launch: &LaunchConfig) -> Result<i32> {
    info!("Executing: {} {:?}", launch.program, launch.args);

    let outcome = Supervisor::launch(launch)?;
    finish_run(run, &outcome)
}

/// Give up elevated ids, then write the report as the invoking user.
///
/// Runs after the cgroup is gone, so nothing left needs the privileges.
fn finish_run(run: &RunConfig, outcome: &LaunchOutcome) -> Result<i32> {
    privilege::drop_to_real_ids()?;
    report_outcome(run, outcome)?;

    Ok(outcome.exit.code())
}

fn report_outcome(run: &RunConfig, outcome: &LaunchOutcome) -> Result<()> {
    let summary = report::summary(&outcome.series);
    log_summary(&summary);

    if let Some(path) = &run.output {
        report::write_tsv_file(&outcome.series, path)?;
        debug!("wrote {} samples to {}", summary.samples, path.display());
    }

    if run.verbose {
        match outcome.series.last_raw_stats() {
            Some(stats) => report::write_raw_stats_json(stats, io::stdout().lock())?,
            None => warn!("no raw statistics were recorded"),
        }
    }

    if !outcome.exit.success() {
        let code = style(outcome.exit.code()).red().bold();
        info!("{}={}", style("exit_code").dim(), code);
    }

    Ok(())
}

fn log_summary(summary: &SeriesSummary) {
    info!(
        "{}={} | {}={} | {}={} | {}={}ms",
        style("samples").dim(),
        style(summary.samples).bold(),
        style("peak_rss_bytes").dim(),
        style(summary.peak_rss).bold(),
        style("peak_kernel_bytes").dim(),
        style(summary.peak_kernel).bold(),
        style("duration").dim(),
        style(summary.duration.as_millis()).bold(),
    );
}
