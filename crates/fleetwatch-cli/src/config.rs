//! Command-line arguments and environment variables.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use fleetwatch_db::DbConfig;
use fleetwatch_etl::config::{EtlConfig, FetcherConfig, RegisterPolicy, RulesConfig};

/// Fleetwatch - vehicle telemetry disconnection tracking
#[derive(Parser, Debug)]
#[command(name = "fleetwatch", version)]
#[command(about = "Ingest fleet telemetry and track vehicle disconnections")]
pub struct Cli {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending schema migrations
    Migrate,

    /// Run one ingestion pass and print its statistics as JSON
    Etl(EtlArgs),

    /// Print the connected/disconnected matrix as JSON
    Summary(SummaryArgs),
}

/// SurrealDB connection
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    #[arg(long, env = "SURREAL_URL", default_value = "127.0.0.1:8000")]
    pub surreal_url: String,

    #[arg(long, env = "SURREAL_NS", default_value = "fleetwatch")]
    pub surreal_ns: String,

    #[arg(long, env = "SURREAL_DB", default_value = "main")]
    pub surreal_db: String,

    #[arg(long, env = "SURREAL_USER", default_value = "root")]
    pub surreal_user: String,

    #[arg(long, env = "SURREAL_PASS", default_value = "root", hide_env_values = true)]
    pub surreal_pass: String,
}

impl DbArgs {
    pub fn to_config(&self) -> DbConfig {
        DbConfig {
            url: self.surreal_url.clone(),
            namespace: self.surreal_ns.clone(),
            database: self.surreal_db.clone(),
            username: self.surreal_user.clone(),
            password: self.surreal_pass.clone(),
            ..Default::default()
        }
    }
}

/// Deployment rules shared by `etl` and `summary`.
#[derive(Args, Debug, Clone)]
pub struct RulesArgs {
    /// Speeds above this are "moving" (km/h)
    #[arg(long, env = "SPEED_THRESHOLD", default_value_t = 5.0)]
    pub speed_threshold: f64,

    /// Geofence name the provider uses for "outside every geofence"
    #[arg(long, env = "OUTSIDE_GEOFENCE_LABEL", default_value = "Fuera")]
    pub outside_geofence_label: String,

    /// Deployment time zone as minutes east of UTC
    #[arg(long, env = "UTC_OFFSET_MINUTES", default_value_t = -360, allow_hyphen_values = true)]
    pub utc_offset_minutes: i32,
}

impl RulesArgs {
    pub fn to_config(&self) -> RulesConfig {
        RulesConfig {
            speed_threshold: self.speed_threshold,
            outside_geofence_label: self.outside_geofence_label.clone(),
            utc_offset_minutes: self.utc_offset_minutes,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct EtlArgs {
    /// Stop after this many pages (0 = all)
    #[arg(long, default_value_t = 0)]
    pub max_pages: u32,

    /// Paged telemetry endpoint
    #[arg(long, env = "TELEMETRY_API_URL")]
    pub api_url: String,

    /// Bearer token for the telemetry endpoint
    #[arg(long, env = "TELEMETRY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "ETL_PAGE_SIZE", default_value_t = 5000)]
    pub page_size: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "ETL_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    #[arg(long, env = "ETL_BATCH_SIZE", default_value_t = 2000)]
    pub batch_size: usize,

    /// Records processed concurrently within a batch
    #[arg(long, env = "ETL_CONCURRENCY", default_value_t = 8)]
    pub concurrency: usize,

    /// Only VINs containing this substring are ingested (empty = all)
    #[arg(long, env = "VIN_FILTER_PATTERN", default_value = "SZ")]
    pub vin_filter: String,

    #[command(flatten)]
    pub rules: RulesArgs,
}

impl EtlArgs {
    pub fn to_config(&self) -> EtlConfig {
        EtlConfig {
            fetcher: FetcherConfig {
                base_url: self.api_url.clone(),
                api_key: self.api_key.clone(),
                page_size: self.page_size,
                timeout_secs: self.timeout_secs,
                ..Default::default()
            },
            rules: self.rules.to_config(),
            policy: RegisterPolicy::default(),
            vin_filter_pattern: self.vin_filter.clone(),
            batch_size: self.batch_size,
            concurrency: self.concurrency,
        }
    }
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// First report date (default: end - 7 days)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last report date (default: today)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Restrict to one group, by provider group id
    #[arg(long)]
    pub group: Option<i64>,

    #[command(flatten)]
    pub rules: RulesArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etl_defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["fleetwatch", "etl", "--api-url", "http://x/vehicles"])
            .unwrap();
        let Command::Etl(args) = cli.command else {
            panic!("expected etl");
        };
        let config = args.to_config();
        let defaults = EtlConfig::default();
        assert_eq!(config.batch_size, defaults.batch_size);
        assert_eq!(config.vin_filter_pattern, defaults.vin_filter_pattern);
        assert_eq!(config.fetcher.page_size, defaults.fetcher.page_size);
        assert_eq!(config.rules.utc_offset_minutes, -360);
        assert_eq!(args.max_pages, 0);
    }

    #[test]
    fn summary_parses_dates() {
        let cli = Cli::try_parse_from([
            "fleetwatch",
            "summary",
            "--start",
            "2025-01-14",
            "--end",
            "2025-01-21",
            "--group",
            "70",
        ])
        .unwrap();
        let Command::Summary(args) = cli.command else {
            panic!("expected summary");
        };
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2025, 1, 14));
        assert_eq!(args.group, Some(70));
    }
}
