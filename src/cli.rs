use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fetchpool")]
#[command(about = "Concurrent HTTP downloader", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides FETCHPOOL_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug output on the console
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download one or more URLs with a pool of workers
    Fetch(FetchArgs),
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// URLs to download
    pub urls: Vec<String>,

    /// File with one URL per line ('#' starts a comment)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Number of concurrent downloads
    #[arg(short, long, visible_alias = "downloader", value_parser = clap::value_parser!(u8).range(1..=12))]
    pub workers: Option<u8>,

    /// Number of threads feeding URLs into the pool
    #[arg(short, long, visible_alias = "producer", default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub producers: u8,

    /// Directory to save successful downloads into
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("fetchpool").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_defaults() {
        let cli = parse(&["fetch", "http://a/1", "http://a/2"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.config.is_none());

        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.urls, vec!["http://a/1", "http://a/2"]);
        assert_eq!(args.workers, None);
        assert_eq!(args.producers, 1);
        assert!(args.output.is_none());
        assert!(args.input.is_none());
    }

    #[test]
    fn test_fetch_flags() {
        let cli = parse(&[
            "-v",
            "fetch",
            "--downloader",
            "12",
            "-p",
            "5",
            "-i",
            "urls.txt",
            "-o",
            "out",
            "--config",
            "custom.toml",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));

        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.workers, Some(12));
        assert_eq!(args.producers, 5);
        assert_eq!(args.input, Some(PathBuf::from("urls.txt")));
        assert_eq!(args.output, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_worker_count_range() {
        assert!(parse(&["fetch", "-w", "0"]).is_err());
        assert!(parse(&["fetch", "-w", "13"]).is_err());
        assert!(parse(&["fetch", "-w", "three"]).is_err());
        assert!(parse(&["fetch", "-w", "1"]).is_ok());
    }

    #[test]
    fn test_producer_count_range() {
        assert!(parse(&["fetch", "-p", "0"]).is_err());
        assert!(parse(&["fetch", "-p", "6"]).is_err());
    }

    #[test]
    fn test_show_config() {
        let cli = parse(&["show-config"]).unwrap();
        assert!(matches!(cli.command, Commands::ShowConfig));
    }
}
