//! idsync - reconcile a Google directory into a SCIM identity store

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use core_async::sync::CancellationToken;
use core_runtime::config::{CoreConfig, SyncMethod};
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use core_sync::SyncReport;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "idsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SCIM base URL of the identity store
    #[arg(long, env = "IDSYNC_SCIM_ENDPOINT")]
    scim_endpoint: String,

    /// SCIM bearer token
    #[arg(long, env = "IDSYNC_SCIM_ACCESS_TOKEN", hide_env_values = true)]
    scim_access_token: String,

    /// Directory API bearer token
    #[arg(
        long,
        env = "IDSYNC_GOOGLE_ACCESS_TOKEN",
        hide_env_values = true,
        required_unless_present = "google_token_file"
    )]
    google_access_token: Option<String>,

    /// File holding the directory API bearer token
    #[arg(long, env = "IDSYNC_GOOGLE_TOKEN_FILE", conflicts_with = "google_access_token")]
    google_token_file: Option<PathBuf>,

    #[arg(long, env = "IDSYNC_GOOGLE_CUSTOMER_ID", default_value = "my_customer")]
    google_customer_id: String,

    /// `groups` (full reconciliation) or `users_groups` (independent passes)
    #[arg(long, env = "IDSYNC_SYNC_METHOD", default_value = "groups")]
    sync_method: String,

    /// Directory query selecting users
    #[arg(long, env = "IDSYNC_USER_MATCH", default_value = "")]
    user_match: String,

    /// Directory query selecting groups
    #[arg(long, env = "IDSYNC_GROUP_MATCH", default_value = "")]
    group_match: String,

    #[arg(long, env = "IDSYNC_IGNORE_USERS", value_delimiter = ',')]
    ignore_users: Vec<String>,

    #[arg(long, env = "IDSYNC_IGNORE_GROUPS", value_delimiter = ',')]
    ignore_groups: Vec<String>,

    /// When set, only these group emails are synced
    #[arg(long, env = "IDSYNC_INCLUDE_GROUPS", value_delimiter = ',')]
    include_groups: Vec<String>,

    /// Concurrent target membership probes
    #[arg(long, env = "IDSYNC_PROBE_CONCURRENCY", default_value_t = 1)]
    probe_concurrency: usize,

    /// Print the plan without touching the identity store
    #[arg(long, env = "IDSYNC_DRY_RUN")]
    dry_run: bool,

    #[arg(long, env = "IDSYNC_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// `pretty`, `json` or `compact`
    #[arg(long, env = "IDSYNC_LOG_FORMAT")]
    log_format: Option<String>,
}

impl Cli {
    fn logging(&self) -> Result<LoggingConfig> {
        let mut config = LoggingConfig::default().with_level(LogLevel::from_str(&self.log_level)?);
        if let Some(format) = &self.log_format {
            config = config.with_format(LogFormat::from_str(format)?);
        }
        Ok(config)
    }

    fn google_token(&self) -> Result<String> {
        if let Some(path) = &self.google_token_file {
            let token = std::fs::read_to_string(path)
                .with_context(|| format!("reading directory token from {}", path.display()))?;
            return Ok(token.trim().to_string());
        }
        self.google_access_token
            .clone()
            .context("no directory access token given")
    }

    fn core_config(&self) -> Result<CoreConfig> {
        let config = CoreConfig::builder()
            .scim_endpoint(self.scim_endpoint.as_str())
            .scim_access_token(self.scim_access_token.as_str())
            .google_access_token(self.google_token()?)
            .google_customer_id(self.google_customer_id.as_str())
            .sync_method(SyncMethod::from_str(&self.sync_method)?)
            .user_match(self.user_match.as_str())
            .group_match(self.group_match.as_str())
            .ignore_users(self.ignore_users.iter().cloned())
            .ignore_groups(self.ignore_groups.iter().cloned())
            .include_groups(self.include_groups.iter().cloned())
            .membership_probe_concurrency(self.probe_concurrency)
            .dry_run(self.dry_run)
            .build()?;
        Ok(config)
    }
}

fn print_report(report: &SyncReport) -> Result<()> {
    let stats = &report.run.stats;

    if report.dry_run {
        if let Some(plan) = &report.plan {
            println!("{}", serde_json::to_string_pretty(plan)?);
        }
        return Ok(());
    }

    info!(
        run_id = %report.run.id,
        users_added = stats.users_added,
        users_updated = stats.users_updated,
        users_deleted = stats.users_deleted,
        users_conflicted = stats.users_conflicted,
        groups_added = stats.groups_added,
        groups_deleted = stats.groups_deleted,
        members_added = stats.members_added,
        members_removed = stats.members_removed,
        deleted_users_purged = stats.deleted_users_purged,
        duration_secs = report.run.duration_secs().unwrap_or_default(),
        "Sync finished"
    );
    if stats.users_conflicted > 0 {
        warn!(
            count = stats.users_conflicted,
            "Some users already existed in the identity store and were left as-is"
        );
    }
    Ok(())
}

#[core_async::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.logging()?)?;

    let config = cli.core_config()?;
    info!(?config, "Loaded configuration");

    let service = core_service::bootstrap_desktop(config)?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    core_async::spawn(async move {
        if core_async::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current call");
            interrupt.cancel();
        }
    });

    let report = service.run(token).await.context("sync run failed")?;

    print_report(&report)
}
