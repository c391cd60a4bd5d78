//! Command-line argument parsing and configuration.
//!
//! Supports:
//! - CLI arguments via clap
//! - TOML configuration file
//! - Merging CLI with file config (CLI takes precedence)

use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

fn default_engine_config() -> PathBuf {
    PathBuf::from("config/engine.toml")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/droplink.log")
}

/// Droplink - P2P transfer console.
#[derive(Parser, Deserialize, Clone, Debug)]
#[command(author, version, about)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to a TOML configuration file. Defaults to ./config.toml.
    #[clap(short, long)]
    #[serde(default)]
    pub config: Option<PathBuf>,

    /// Configuration file handed to the transfer engine on server start.
    #[clap(long, default_value = "config/engine.toml")]
    #[serde(default = "default_engine_config")]
    pub engine_config: PathBuf,

    /// Display name announced to peers.
    #[clap(long)]
    #[serde(default)]
    pub device_name: Option<String>,

    /// Verbosity level (-v, -vv, -vvv).
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    #[serde(default)]
    pub verbose: u8,

    /// Seconds to wait for an accept/reject decision on an inbound request.
    #[clap(long)]
    #[serde(default)]
    pub decision_timeout: Option<u64>,

    /// Dev mode: sample process resources during transfers and print the
    /// extended engineering report on completion.
    #[clap(long)]
    #[serde(default)]
    pub dev: bool,

    /// File receiving the full log history.
    #[clap(long, default_value = "logs/droplink.log")]
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Args {
    /// Load Args from CLI + TOML file (if it exists).
    /// CLI values override those from the file.
    pub fn load() -> Self {
        let cli_args = Args::parse();

        let path = cli_args
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from("config.toml"));
        if let Some(file_args) = Self::from_file(&path) {
            return Self::merge(file_args, cli_args);
        }

        cli_args
    }

    /// Load args from a TOML file.
    fn from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let content = fs::read_to_string(path).ok()?;
        toml::from_str::<Args>(&content).ok()
    }

    /// Merge file args with CLI args (CLI takes precedence).
    fn merge(mut file: Args, cli: Args) -> Args {
        if cli.config.is_some() {
            file.config = cli.config;
        }
        if cli.engine_config != default_engine_config() {
            file.engine_config = cli.engine_config;
        }
        if cli.device_name.is_some() {
            file.device_name = cli.device_name;
        }
        if cli.verbose > 0 {
            file.verbose = cli.verbose;
        }
        if cli.decision_timeout.is_some() {
            file.decision_timeout = cli.decision_timeout;
        }
        if cli.dev {
            file.dev = true;
        }
        if cli.log_file != default_log_file() {
            file.log_file = cli.log_file;
        }
        file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(content: &str) -> Args {
        toml::from_str::<Args>(content).unwrap()
    }

    fn cli(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("droplink").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn file_fields_are_all_optional() {
        let args = from_toml("");
        assert_eq!(args.engine_config, default_engine_config());
        assert_eq!(args.log_file, default_log_file());
        assert_eq!(args.device_name, None);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn cli_overrides_file_values() {
        let file = from_toml("device_name = \"den\"\nverbose = 1\ndecision_timeout = 30\n");
        let merged = Args::merge(file, cli(&["--device-name", "laptop", "-vv"]));
        assert_eq!(merged.device_name.as_deref(), Some("laptop"));
        assert_eq!(merged.verbose, 2);
        assert_eq!(merged.decision_timeout, Some(30));
    }

    #[test]
    fn dev_mode_comes_from_either_source() {
        let merged = Args::merge(from_toml("dev = true\n"), cli(&[]));
        assert!(merged.dev);
        let merged = Args::merge(from_toml(""), cli(&["--dev"]));
        assert!(merged.dev);
    }

    #[test]
    fn file_values_survive_when_cli_is_silent() {
        let file = from_toml("engine_config = \"/etc/droplink/engine.toml\"\n");
        let merged = Args::merge(file, cli(&[]));
        assert_eq!(
            merged.engine_config,
            PathBuf::from("/etc/droplink/engine.toml")
        );
    }
}
