extern crate cohort_extract;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap_complete::generate;

#[macro_use]
extern crate log;

use cohort_extract::cli::{build_cli, config_from_matches, set_log_level};
use cohort_extract::engine::extract_engine::{run_extract, EngineOutcome};

fn main() {
    let mut app = build_cli();
    let matches = app.clone().get_matches();

    match matches.subcommand() {
        Some(("extract", m)) => {
            set_log_level(m, true);
            match run(m) {
                Ok(()) => {}
                Err(e) => {
                    error!("Extract failed: {:?}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(("shell-completion", m)) => {
            set_log_level(m, true);
            let mut file = match std::fs::File::create(m.get_one::<String>("output-file").unwrap())
            {
                Ok(file) => file,
                Err(e) => {
                    error!("Failed to open output file: {}", e);
                    std::process::exit(1);
                }
            };
            if let Some(generator) = m.get_one::<clap_complete::Shell>("shell").copied() {
                let mut cmd = build_cli();
                info!("Generating completion script for shell {}", generator);
                let name = cmd.get_name().to_string();
                generate(generator, &mut cmd, name, &mut file);
            }
        }
        _ => {
            app.print_help().unwrap();
            println!();
        }
    }
}

fn run(m: &clap::ArgMatches) -> anyhow::Result<()> {
    let config = config_from_matches(m).context("invalid extract configuration")?;
    let cancel = Arc::new(AtomicBool::new(false));
    let outcome = run_extract(config, cancel).context("extraction failed")?;
    match outcome {
        EngineOutcome::Completed(stats) => {
            info!("Extract complete: {} loci written", stats.records_written);
        }
        EngineOutcome::Cancelled(stats) => {
            warn!(
                "Extract cancelled after {} records read, {} loci written",
                stats.records_read, stats.records_written
            );
        }
    }
    Ok(())
}
