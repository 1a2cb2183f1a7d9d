use clap::Parser;
use mstat::config::DEFAULT_FREQUENCY_HZ;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mstat")]
#[command(version, about = "Run a command in a memory cgroup and record its memory usage", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Sample at the default 10 Hz and write the series to a file
    mstat -o usage.tsv python3 script.py

    # Sample faster, with extra environment variables
    mstat --freq 50 -e RUST_BACKTRACE=1 -o run.tsv -- ./target/release/app --flag

    # Dump the final raw cgroup statistics as JSON
    mstat -v sleep 1

    # Check that this machine can run mstat
    mstat --check
")]
pub struct Cli {
    /// Program to measure
    #[arg(value_name = "PROGRAM", required_unless_present = "check")]
    pub program: Option<String>,

    /// Program arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Write the memory time series to this file (TSV)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Show verbose output and dump the final raw statistics as JSON
    #[arg(short, long)]
    pub verbose: bool,

    /// Sampling frequency in Hz
    #[arg(short, long, value_name = "HZ", default_value_t = DEFAULT_FREQUENCY_HZ)]
    pub freq: u32,

    /// Extra environment variable for the program (repeatable)
    #[arg(short, long, value_name = "KEY=VALUE", value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    /// Memory limit of the cgroup (100M, 1G, 4G)
    #[arg(short, long, value_name = "SIZE")]
    pub memory_limit: Option<String>,

    /// Check mstat requirements
    #[arg(long)]
    pub check: bool,
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    mstat::parse_env_assignment(s).map_err(|e| e.to_string())
}
