//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rolegate_appconfig::connection::{CONNECTION_STRING_ENV, ENDPOINT_ENV};
use rolegate_roles::{SyncOptions, DEFAULT_BATCH_SIZE};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "role-admin")]
#[command(about = "Manage user roles in Azure App Configuration")]
pub struct Cli {
    /// Path to the role file (JSON)
    #[arg(long)]
    pub file: PathBuf,

    /// App Configuration connection string (takes precedence over --endpoint)
    #[arg(long, env = CONNECTION_STRING_ENV, hide_env_values = true)]
    pub connection_string: Option<String>,

    /// App Configuration endpoint, authenticated with Azure AD
    #[arg(long, env = ENDPOINT_ENV)]
    pub endpoint: Option<String>,

    /// Remove roles for users not in the role file
    #[arg(long)]
    pub remove_missing: bool,

    /// Number of users to process in each batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,

    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

impl Cli {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions::default()
            .with_remove_missing(self.remove_missing)
            .with_batch_size(self.batch_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error | LogLevel::Critical => Level::ERROR,
        }
    }
}

fn parse_batch_size(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["role-admin", "--file", "users.json"]).unwrap();
        assert_eq!(cli.file, PathBuf::from("users.json"));
        assert_eq!(cli.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cli.log_level, LogLevel::Info);
        assert!(!cli.remove_missing);
        assert!(!cli.sync_options().remove_missing);
    }

    #[test]
    fn test_file_is_required() {
        assert!(Cli::try_parse_from(["role-admin"]).is_err());
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "role-admin",
            "--file",
            "users.json",
            "--endpoint",
            "https://roles.azconfig.io",
            "--remove-missing",
            "--batch-size",
            "10",
            "--log-level",
            "DEBUG",
        ])
        .unwrap();
        assert_eq!(cli.endpoint.as_deref(), Some("https://roles.azconfig.io"));
        assert_eq!(cli.log_level, LogLevel::Debug);
        let options = cli.sync_options();
        assert!(options.remove_missing);
        assert_eq!(options.batch_size, 10);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = Cli::try_parse_from(["role-admin", "--file", "f.json", "--batch-size", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_critical_maps_to_error() {
        assert_eq!(Level::from(LogLevel::Critical), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Warning), Level::WARN);
    }
}
