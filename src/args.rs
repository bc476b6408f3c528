//! Command-line argument parsing and processing.
//!
//! Hand-rolled parsing for the small surface riegor exposes: the daemon
//! itself, a simulate subcommand for dry-running a schedule under
//! accelerated time, and the standard help/version/debug flags. Unknown
//! options show help and exit with a failure status.

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon with these settings.
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Dry-run the schedule between two points in time with the no-op
    /// backend. `multiplier` accelerates time; 0 means fast-forward.
    Simulate {
        debug_enabled: bool,
        config_dir: Option<String>,
        start_time: String,
        end_time: String,
        multiplier: f64,
    },
    /// Display help information and exit.
    ShowHelp,
    /// Display version information and exit.
    ShowVersion,
    /// Show help due to unknown arguments and exit with failure.
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments (without the program name) into a
    /// structured action.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut config_dir: Option<String> = None;
        let mut simulate_args: Vec<String> = Vec::new();
        let mut in_simulate = false;

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            let arg = arg.as_ref();
            match arg {
                "--help" | "-h" => {
                    return ParsedArgs {
                        action: CliAction::ShowHelp,
                    };
                }
                "--version" | "-V" => {
                    return ParsedArgs {
                        action: CliAction::ShowVersion,
                    };
                }
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => match iter.next() {
                    Some(dir) => config_dir = Some(dir.as_ref().to_string()),
                    None => {
                        log_warning!("--config requires a directory argument");
                        return ParsedArgs {
                            action: CliAction::ShowHelpDueToError,
                        };
                    }
                },
                "simulate" if !in_simulate => in_simulate = true,
                other if in_simulate && !other.starts_with('-') => {
                    simulate_args.push(other.to_string());
                }
                other => {
                    log_warning!("Unknown argument: {}", other);
                    return ParsedArgs {
                        action: CliAction::ShowHelpDueToError,
                    };
                }
            }
        }

        if in_simulate {
            // simulate <start> <end> [multiplier]
            if simulate_args.len() < 2 || simulate_args.len() > 3 {
                log_warning!("simulate expects: simulate <start> <end> [multiplier]");
                return ParsedArgs {
                    action: CliAction::ShowHelpDueToError,
                };
            }
            let multiplier = match simulate_args.get(2) {
                None => 0.0,
                Some(text) => match text.parse::<f64>() {
                    Ok(value) if value >= 0.0 => value,
                    _ => {
                        log_warning!("Invalid simulate multiplier: {}", text);
                        return ParsedArgs {
                            action: CliAction::ShowHelpDueToError,
                        };
                    }
                },
            };
            return ParsedArgs {
                action: CliAction::Simulate {
                    debug_enabled,
                    config_dir,
                    start_time: simulate_args[0].clone(),
                    end_time: simulate_args[1].clone(),
                    multiplier,
                },
            };
        }

        ParsedArgs {
            action: CliAction::Run {
                debug_enabled,
                config_dir,
            },
        }
    }
}

/// Display the help message.
pub fn display_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!("riegor v{version}, irrigation zone scheduler");
    println!();
    println!("USAGE:");
    println!("    riegor [OPTIONS]");
    println!("    riegor simulate <start> <end> [multiplier] [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <DIR>   Use DIR instead of the default config directory");
    println!("    -d, --debug          Enable verbose operational output");
    println!("    -h, --help           Print this help and exit");
    println!("    -V, --version        Print version and exit");
    println!();
    println!("SIMULATE:");
    println!("    Dry-run the configured weekly program between two points in");
    println!("    time using the no-op relay backend. Times are local,");
    println!("    formatted \"YYYY-MM-DD HH:MM\". The multiplier accelerates");
    println!("    time (60 = one simulated minute per real second); omitting");
    println!("    it fast-forwards through the whole window.");
    println!();
    println!("    riegor simulate \"2026-03-02 19:55\" \"2026-03-02 21:30\" 60");
}

/// Display the version line.
pub fn display_version() {
    println!("riegor {}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_args_runs_with_defaults() {
        let parsed = ParsedArgs::parse(Vec::<String>::new());
        assert_eq!(
            parsed.action,
            CliAction::Run {
                debug_enabled: false,
                config_dir: None,
            }
        );
    }

    #[test]
    fn debug_and_config_flags() {
        let parsed = ParsedArgs::parse(["--debug", "--config", "/tmp/riegor-test"]);
        assert_eq!(
            parsed.action,
            CliAction::Run {
                debug_enabled: true,
                config_dir: Some("/tmp/riegor-test".to_string()),
            }
        );
    }

    #[test]
    fn config_without_value_is_an_error() {
        crate::logger::Log::set_enabled(false);
        let parsed = ParsedArgs::parse(["--config"]);
        crate::logger::Log::set_enabled(true);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn help_wins_over_everything() {
        let parsed = ParsedArgs::parse(["--debug", "--help"]);
        assert_eq!(parsed.action, CliAction::ShowHelp);
    }

    #[test]
    fn simulate_with_multiplier() {
        let parsed = ParsedArgs::parse(["simulate", "2026-03-02 19:55", "2026-03-02 21:30", "60"]);
        assert_eq!(
            parsed.action,
            CliAction::Simulate {
                debug_enabled: false,
                config_dir: None,
                start_time: "2026-03-02 19:55".to_string(),
                end_time: "2026-03-02 21:30".to_string(),
                multiplier: 60.0,
            }
        );
    }

    #[test]
    fn simulate_defaults_to_fast_forward() {
        let parsed = ParsedArgs::parse(["simulate", "2026-03-02 00:00", "2026-03-08 23:59"]);
        match parsed.action {
            CliAction::Simulate { multiplier, .. } => assert_eq!(multiplier, 0.0),
            other => panic!("expected simulate, got {other:?}"),
        }
    }

    #[test]
    fn simulate_rejects_missing_times() {
        crate::logger::Log::set_enabled(false);
        let parsed = ParsedArgs::parse(["simulate", "2026-03-02 00:00"]);
        crate::logger::Log::set_enabled(true);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn unknown_flag_shows_help_with_error() {
        crate::logger::Log::set_enabled(false);
        let parsed = ParsedArgs::parse(["--frobnicate"]);
        crate::logger::Log::set_enabled(true);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }
}
