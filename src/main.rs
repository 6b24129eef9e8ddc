mod cli;

use std::io::IsTerminal;

use clap::Parser;

use cli::{Cli, Commands};
use extracto::logging::{init_logging, LogConfig};

fn main() {
    let cli = Cli::parse();

    init_logging(
        &LogConfig::from_verbosity(cli.verbose)
            .with_format(cli.log_format)
            .with_ansi(std::io::stderr().is_terminal()),
    );

    let profiles = cli.profiles.as_deref();
    let result = match &cli.command {
        Commands::Import {
            file,
            json,
            dedupe,
            map,
            data_start,
            preview,
            strict_dates,
            source,
        } => cli::import::run(cli::import::ImportArgs {
            file,
            json: *json,
            dedupe: *dedupe,
            map: map.as_deref(),
            data_start: *data_start,
            preview: *preview,
            strict_dates: *strict_dates,
            profiles,
            source,
        }),
        Commands::Detect { file, json, source } => cli::detect::run(file, *json, profiles, source),
        Commands::Profiles { json } => cli::profiles::list(*json, profiles),
        Commands::Completions { shell } => cli::completions(*shell),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
