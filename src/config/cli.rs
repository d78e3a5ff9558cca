use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};

/// Command-line arguments for the Reelview binary.
#[derive(Debug, Parser)]
#[command(name = "reelview", version, about = "Reelview movie and TV catalog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "REELVIEW_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub upstream: UpstreamOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the catalog HTTP service.
    Serve(Box<ServeArgs>),
    /// Resolve one catalog listing through the cache and print it as JSON.
    Probe(ProbeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

/// Metadata API overrides, shared by every command.
#[derive(Debug, Args, Default, Clone)]
pub struct UpstreamOverrides {
    /// Metadata API credential.
    #[arg(long = "tmdb-api-key", env = "TMDB_API_KEY", value_name = "KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Metadata API base URL.
    #[arg(long = "tmdb-api-base-url", env = "TMDB_API_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Image CDN base URL.
    #[arg(long = "tmdb-image-base-url", env = "TMDB_IMAGE_BASE_URL", value_name = "URL")]
    pub image_base_url: Option<String>,

    /// Language sent with every metadata request.
    #[arg(long = "language", env = "DEFAULT_LANGUAGE", value_name = "TAG")]
    pub language: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the in-memory cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the maximum number of cached entries.
    #[arg(long = "cache-max-entries", value_name = "COUNT")]
    pub cache_max_entries: Option<usize>,

    /// Override the number of attempts per upstream request.
    #[arg(long = "upstream-max-attempts", value_name = "COUNT")]
    pub upstream_max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProbeResource {
    Trending,
    Movies,
    Tv,
    Search,
}

#[derive(Debug, Args, Clone)]
pub struct ProbeArgs {
    /// Listing to resolve.
    #[arg(value_enum, value_name = "RESOURCE")]
    pub resource: ProbeResource,

    /// Media type for trending, or list name for movies and tv.
    #[arg(long = "kind", value_name = "NAME")]
    pub kind: Option<String>,

    /// Time window for trending (day|week).
    #[arg(long = "window", value_name = "WINDOW")]
    pub window: Option<String>,

    /// Search text.
    #[arg(long = "query", short = 'q', value_name = "TEXT")]
    pub query: Option<String>,

    /// Listing page.
    #[arg(long = "page", value_name = "PAGE")]
    pub page: Option<u32>,

    /// Print compact JSON.
    #[arg(long = "compact", action = clap::ArgAction::SetTrue)]
    pub compact: bool,
}
