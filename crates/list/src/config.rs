//! Command line configuration for `hlist`.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HLIST_DATABASE` | listing.db | SQLite database file (`:memory:` for a scratch database) |
//! | `HLIST_SCHEMA` | | Entity schema JSON document |
//! | `HLIST_FILTER_TYPE` | and | How filters combine (`and`, `or`) |
//! | `HLIST_TIMEZONE` | UTC | Client timezone offset |
//! | `HLIST_LOG_LEVEL` | warn | Log level |
//! | `HLIST_QUERY_TIMEOUT` | 30s | Bound on each data store query |
//! | `HLIST_SEGMENT_TIMEOUT` | 10s | Bound on computed segment resolution |
//! | `HLIST_DEFAULT_PAGE_SIZE` | 10 | Page size when `--size` is absent |
//! | `HLIST_MAX_PAGE_SIZE` | 1000 | Largest accepted page size |
//! | `HLIST_MAX_CONNECTIONS` | 10 | SQLite pool size |
//! | `HLIST_BUSY_TIMEOUT_MS` | 5000 | SQLite busy timeout |

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use helios_listing::ListingConfig;
use helios_listing::backends::sqlite::SqliteBackendConfig;
use helios_listing::types::{ListParams, PageParams};

/// Lists the records of one entity and prints them as JSON.
#[derive(Debug, Clone, Parser)]
#[command(name = "hlist")]
#[command(about = "Paginated record listing over a SQLite database")]
pub struct ListConfig {
    /// Entity to list, as named in the schema document.
    pub entity: String,

    /// SQLite database file.
    #[arg(long, env = "HLIST_DATABASE", default_value = "listing.db")]
    pub database: String,

    /// Entity schema JSON document.
    #[arg(long, env = "HLIST_SCHEMA")]
    pub schema: PathBuf,

    /// Requested fields, `Entity=a,b` (repeatable; associations use their name).
    #[arg(long = "fields", value_parser = parse_key_value)]
    pub fields: Vec<(String, String)>,

    /// Filter, `field=v1,v2` or `association:field=v` (repeatable).
    #[arg(long = "filter", value_parser = parse_key_value)]
    pub filters: Vec<(String, String)>,

    /// How filters combine (and, or).
    #[arg(long, env = "HLIST_FILTER_TYPE")]
    pub filter_type: Option<String>,

    /// Free-text search term.
    #[arg(long)]
    pub search: Option<String>,

    /// Also search the string fields of associations.
    #[arg(long, default_value = "false")]
    pub search_extended: bool,

    /// Raw SELECT restricting the listing to the keys it returns.
    #[arg(long)]
    pub query: Option<String>,

    /// Sort field, `-` prefixed for descending.
    #[arg(long)]
    pub sort: Option<String>,

    /// Page number, starting at 1.
    #[arg(long)]
    pub page: Option<u64>,

    /// Page size.
    #[arg(long)]
    pub size: Option<u64>,

    /// Client timezone (`+02:00`, `-0530`, `Z`, `UTC`).
    #[arg(long, env = "HLIST_TIMEZONE")]
    pub timezone: Option<String>,

    /// Segment to apply.
    #[arg(long)]
    pub segment: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "HLIST_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Bound on each data store query.
    #[arg(long, env = "HLIST_QUERY_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub query_timeout: Duration,

    /// Bound on computed segment resolution.
    #[arg(long, env = "HLIST_SEGMENT_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    pub segment_timeout: Duration,

    /// Page size when `--size` is absent.
    #[arg(long, env = "HLIST_DEFAULT_PAGE_SIZE", default_value = "10")]
    pub default_page_size: u64,

    /// Largest accepted page size.
    #[arg(long, env = "HLIST_MAX_PAGE_SIZE", default_value = "1000")]
    pub max_page_size: u64,

    /// SQLite connection pool size.
    #[arg(long, env = "HLIST_MAX_CONNECTIONS", default_value = "10")]
    pub max_connections: u32,

    /// SQLite busy timeout in milliseconds.
    #[arg(long, env = "HLIST_BUSY_TIMEOUT_MS", default_value = "5000")]
    pub busy_timeout_ms: u32,
}

impl ListConfig {
    /// The request parameters described by the arguments.
    pub fn list_params(&self) -> ListParams {
        ListParams {
            fields: self.fields.iter().cloned().collect(),
            filter: self.filters.iter().cloned().collect(),
            filter_type: self.filter_type.clone(),
            search: self.search.clone(),
            search_extended: self.search_extended,
            query: self.query.clone(),
            sort: self.sort.clone(),
            page: PageParams {
                number: self.page,
                size: self.size,
            },
            timezone: self.timezone.clone(),
            segment: self.segment.clone(),
        }
    }

    /// Pipeline configuration.
    pub fn listing_config(&self) -> ListingConfig {
        ListingConfig::default()
            .with_page_sizes(self.default_page_size, self.max_page_size)
            .with_query_timeout(self.query_timeout)
            .with_segment_timeout(self.segment_timeout)
    }

    /// SQLite pool configuration.
    pub fn backend_config(&self) -> SqliteBackendConfig {
        SqliteBackendConfig {
            max_connections: self.max_connections,
            busy_timeout_ms: self.busy_timeout_ms,
            ..Default::default()
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}
