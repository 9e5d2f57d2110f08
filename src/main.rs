mod cli;

use clap::Parser;
use cli::{Cli, Commands, FetchArgs};
use std::process::ExitCode;

use fetchpool::config::Config;
use fetchpool::download::{self, FetchOptions};
use fetchpool::logging;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, BoxError> {
    let mut config = Config::load_unvalidated(cli.config.clone())?;

    if cli.verbose {
        config.logging.verbose = true;
    }
    if let Commands::Fetch(FetchArgs {
        workers: Some(workers),
        ..
    }) = &cli.command
    {
        config.pool.workers = usize::from(*workers);
    }

    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<bool, BoxError> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(true)
        }
        Commands::Fetch(args) => {
            let _guard = logging::init(&config.logging)?;
            fetch(&config, args)
        }
    }
}

fn fetch(config: &Config, args: FetchArgs) -> Result<bool, BoxError> {
    let mut targets = args.urls;
    if let Some(path) = &args.input {
        targets.extend(download::read_targets(path)?);
    }

    let summary = download::run(
        config,
        FetchOptions {
            targets,
            producers: usize::from(args.producers),
            output: args.output,
        },
    )?;

    println!(
        "{} succeeded, {} failed, {} skipped in {:.2}s",
        summary.succeeded,
        summary.failed,
        summary.skipped,
        summary.elapsed.as_secs_f64()
    );
    if summary.write_errors > 0 {
        println!("{} downloads could not be saved", summary.write_errors);
    }

    Ok(summary.all_succeeded())
}
