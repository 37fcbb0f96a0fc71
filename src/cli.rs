//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use teradl_core::StrategyKind;

/// Resolve TeraBox share links and download the shared file.
///
/// Credentials and endpoints come from `~/.config/teradl/config.toml`
/// and `TERADL_*` environment variables.
#[derive(Parser, Debug)]
#[command(name = "teradl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/teradl/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Resolution strategy, overriding the config file
    /// (cookie-header, cookie-file, html-scrape, relay-api)
    #[arg(short, long, global = true, value_name = "STRATEGY")]
    pub strategy: Option<StrategyKind>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a share link and print the file name, size and direct link
    Resolve {
        /// Share link (or text containing one)
        link: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a share link and download the file into a directory
    Fetch {
        /// Share link (or text containing one)
        link: String,

        /// Destination directory
        #[arg(short, long, default_value = ".", value_name = "DIR")]
        output: PathBuf,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Show the effective configuration (secrets redacted)
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_resolve_parses_link() {
        let args = Args::try_parse_from(["teradl", "resolve", "https://terabox.com/s/1abc"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        match args.command {
            Command::Resolve { link, json } => {
                assert_eq!(link, "https://terabox.com/s/1abc");
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_fetch_defaults_output_to_current_dir() {
        let args = Args::try_parse_from(["teradl", "fetch", "https://terabox.com/s/1abc"]).unwrap();
        match args.command {
            Command::Fetch {
                output,
                no_progress,
                ..
            } => {
                assert_eq!(output, PathBuf::from("."));
                assert!(!no_progress);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["teradl", "-vv", "config"]).unwrap();
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["teradl", "config", "--verbose"]).unwrap();
        assert_eq!(args.verbose, 1);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["teradl", "-q", "config"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_strategy_override_parses() {
        let args = Args::try_parse_from([
            "teradl",
            "--strategy",
            "html-scrape",
            "resolve",
            "https://terabox.com/s/1abc",
        ])
        .unwrap();
        assert_eq!(args.strategy, Some(StrategyKind::HtmlScrape));
    }

    #[test]
    fn test_cli_unknown_strategy_rejected() {
        let err = Args::try_parse_from(["teradl", "-s", "magic", "config"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_missing_subcommand_rejected() {
        let err = Args::try_parse_from(["teradl"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["teradl", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["teradl", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
