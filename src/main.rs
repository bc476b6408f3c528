//! Binary entry point: parse arguments and dispatch.
//!
//! All application logic lives in the library; this file only turns a
//! [`CliAction`] into the matching startup path (daemon, simulation, or
//! help/version output).

use anyhow::Result;
use std::sync::Arc;

use riegor::args::{CliAction, ParsedArgs, display_help, display_version};
use riegor::time_source::{SimulatedTimeSource, init_time_source, parse_datetime};
use riegor::{Riegor, config, log_error_exit, log_version, log_warning};

fn main() -> Result<()> {
    let parsed = ParsedArgs::parse(std::env::args().skip(1));

    match parsed.action {
        CliAction::ShowHelp => {
            display_help();
            Ok(())
        }
        CliAction::ShowVersion => {
            display_version();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            display_help();
            std::process::exit(riegor::constants::EXIT_FAILURE);
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => {
            config::set_config_dir(config_dir)?;
            Riegor::new(debug_enabled).run()
        }
        CliAction::Simulate {
            debug_enabled,
            config_dir,
            start_time,
            end_time,
            multiplier,
        } => {
            config::set_config_dir(config_dir)?;

            let start = match parse_datetime(&start_time) {
                Ok(start) => start,
                Err(e) => {
                    log_error_exit!("Invalid simulation start: {}", e);
                    std::process::exit(riegor::constants::EXIT_FAILURE);
                }
            };
            let end = match parse_datetime(&end_time) {
                Ok(end) => end,
                Err(e) => {
                    log_error_exit!("Invalid simulation end: {}", e);
                    std::process::exit(riegor::constants::EXIT_FAILURE);
                }
            };
            if end <= start {
                log_error_exit!("Simulation end must be after its start");
                std::process::exit(riegor::constants::EXIT_FAILURE);
            }

            init_time_source(Arc::new(SimulatedTimeSource::new(start, end, multiplier)));

            log_version!();
            log_warning!("Simulation mode: relays are not driven");

            Riegor::new(debug_enabled)
                .without_lock()
                .without_headers()
                .with_noop_backend()
                .run()
        }
    }
}
