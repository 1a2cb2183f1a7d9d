//! mstat CLI - Record the memory usage of a command over time

mod cli;
mod commands;
mod logging;
mod runner;

use clap::Parser;
use cli::Cli;
use commands::check_requirements;
use console::style;
use mstat::execution::bootstrap;
use mstat::{Mode, MstatError};
use runner::{RunConfig, launch_config, run_measurement};

fn main() {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    if cli.check {
        check_requirements();
        return;
    }

    let Some(program) = cli.program.clone() else {
        eprintln!("{} No program specified", style("error:").red().bold());
        eprintln!("Try {} for more information", style("mstat --help").cyan());
        std::process::exit(1);
    };

    let mode = launch_config(&cli, program).and_then(Mode::select);
    let code = match mode {
        Ok(Mode::Bootstrap(config)) => match bootstrap::run(config) {
            Ok(never) => match never {},
            Err(e) => fail(e),
        },
        Ok(Mode::Supervisor(config)) => {
            let run = RunConfig::from_cli(&cli);
            run_measurement(&run, &config).unwrap_or_else(|e| fail(e))
        }
        Err(e) => fail(e),
    };

    std::process::exit(code);
}

fn fail(e: MstatError) -> ! {
    eprintln!("{} {}", style("error:").red().bold(), e);
    std::process::exit(1);
}
