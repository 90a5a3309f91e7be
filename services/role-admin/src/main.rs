//! Rolegate Role Admin
//!
//! Applies a role file to the App Configuration store, writing
//! `users:{email}:roles` for every user in the file and optionally removing
//! users that are no longer listed.
//!
//! ## Exit codes
//!
//! - `0` - every update and removal succeeded
//! - `1` - some operations failed, or no store was given
//! - `2` - role file not found
//! - `3` - role file is not valid JSON
//! - `4` - the store could not be reached or rejected the credentials
//! - `10` - unexpected error

mod cli;
mod error;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rolegate_appconfig::{AppConfigClient, StoreConnection};
use rolegate_roles::{RoleFile, RoleSync, SyncReport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::AdminError;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level: tracing::Level = cli.log_level.into();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level.as_str().to_ascii_lowercase()))
        .init();

    match run(&cli).await {
        Ok(report) => {
            log_summary(&report, cli.remove_missing);
            if report.has_failures() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<SyncReport, AdminError> {
    let connection =
        StoreConnection::from_parts(cli.connection_string.as_deref(), cli.endpoint.as_deref())
            .map_err(AdminError::Connection)?
            .ok_or(AdminError::MissingStore)?;

    info!(file = %cli.file.display(), "Starting role assignment");
    let file = RoleFile::load(&cli.file)?;

    let client = AppConfigClient::connect(&connection);
    client.probe().await.map_err(AdminError::Connection)?;
    info!(
        endpoint = %connection.endpoint(),
        auth = connection.auth_kind(),
        "Connected to App Configuration"
    );

    let report = RoleSync::new(Arc::new(client))
        .apply(file.assignments(), &cli.sync_options())
        .await?;
    Ok(report)
}

fn log_summary(report: &SyncReport, remove_missing: bool) {
    info!("Role assignment completed");
    info!("{} roles updated successfully", report.successful_updates);
    if report.failed_updates > 0 {
        warn!("{} role updates failed", report.failed_updates);
    }
    if report.skipped > 0 {
        warn!("{} invalid entries skipped", report.skipped);
    }

    if remove_missing {
        info!("{} obsolete roles removed", report.successful_removals);
        if report.failed_removals > 0 {
            warn!("{} role removals failed", report.failed_removals);
        }
    }

    info!("Total execution time: {:.2} seconds", report.elapsed.as_secs_f64());
}
