//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::{native::DEFAULT_SDK_BASE_URL, sdk::DEFAULT_SDK_PACKAGE};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "native-render";
const ENV_PREFIX: &str = "NATIVE_RENDER";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8003;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_GRAPHQL_ENDPOINT: &str = "http://127.0.0.1:8000/graphql";
const DEFAULT_GRAPHQL_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SDK_CACHE_DIR: &str = "sdk-cache";
const DEFAULT_SDK_INSTALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SDK_REFRESH_SECS: u64 = 60;
const DEFAULT_TRACKING_TIMEOUT_MS: u64 = 2_000;

/// Command-line arguments for the native render server.
#[derive(Debug, Parser)]
#[command(
    name = "native-render",
    version,
    about = "Native checkout popup/fallback renderer"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "NATIVE_RENDER_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Resolve the live SDK version, installing it if needed, and print it.
    #[command(name = "sdk-version")]
    SdkVersion(SdkVersionArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SdkOverrides {
    /// Override the SDK package cache directory.
    #[arg(long = "sdk-cache-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub cache_dir: Option<PathBuf>,

    /// Pin the live SDK version instead of using the newest cached one.
    #[arg(long = "sdk-live-version", value_name = "VERSION")]
    pub live_version: Option<String>,

    /// Override the CDN the SDK bundles are installed from and served by.
    #[arg(long = "sdk-cdn-base-url", value_name = "URL")]
    pub cdn_base_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SdkVersionArgs {
    #[command(flatten)]
    pub sdk: SdkOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub sdk: SdkOverrides,

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

    /// Override the GraphQL endpoint used for render parameters.
    #[arg(long = "graphql-endpoint", value_name = "URL")]
    pub graphql_endpoint: Option<String>,

    /// Override the tracking beacon endpoint.
    #[arg(long = "tracking-endpoint", value_name = "URL")]
    pub tracking_endpoint: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub graphql: GraphqlSettings,
    pub sdk: SdkSettings,
    pub tracking: TrackingSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct GraphqlSettings {
    pub endpoint: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SdkSettings {
    pub package: String,
    pub cache_dir: PathBuf,
    pub live_version: Option<String>,
    pub cdn_base_url: Url,
    pub install_timeout: Duration,
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct TrackingSettings {
    pub endpoint: Option<Url>,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::SdkVersion(args)) => raw.apply_sdk_overrides(&args.sdk),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    graphql: RawGraphqlSettings,
    sdk: RawSdkSettings,
    tracking: RawTrackingSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(endpoint) = overrides.graphql_endpoint.as_ref() {
            self.graphql.endpoint = Some(endpoint.clone());
        }
        if let Some(endpoint) = overrides.tracking_endpoint.as_ref() {
            self.tracking.endpoint = Some(endpoint.clone());
        }

        self.apply_sdk_overrides(&overrides.sdk);
    }

    fn apply_sdk_overrides(&mut self, overrides: &SdkOverrides) {
        if let Some(dir) = overrides.cache_dir.as_ref() {
            self.sdk.cache_dir = Some(dir.clone());
        }
        if let Some(version) = overrides.live_version.as_ref() {
            self.sdk.live_version = Some(version.clone());
        }
        if let Some(url) = overrides.cdn_base_url.as_ref() {
            self.sdk.cdn_base_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            graphql,
            sdk,
            tracking,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            graphql: build_graphql_settings(graphql)?,
            sdk: build_sdk_settings(sdk)?,
            tracking: build_tracking_settings(tracking)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);

    Ok(ServerSettings {
        addr,
        graceful_shutdown: positive_duration(
            graceful_secs,
            Duration::from_secs,
            "server.graceful_shutdown_seconds",
        )?,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_graphql_settings(graphql: RawGraphqlSettings) -> Result<GraphqlSettings, LoadError> {
    let endpoint = graphql
        .endpoint
        .unwrap_or_else(|| DEFAULT_GRAPHQL_ENDPOINT.to_string());
    let endpoint = parse_http_url(&endpoint, "graphql.endpoint")?;

    let timeout = positive_duration(
        graphql.timeout_ms.unwrap_or(DEFAULT_GRAPHQL_TIMEOUT_MS),
        Duration::from_millis,
        "graphql.timeout_ms",
    )?;

    Ok(GraphqlSettings { endpoint, timeout })
}

fn build_sdk_settings(sdk: RawSdkSettings) -> Result<SdkSettings, LoadError> {
    let package = non_blank(sdk.package).unwrap_or_else(|| DEFAULT_SDK_PACKAGE.to_string());

    let cache_dir = sdk
        .cache_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SDK_CACHE_DIR));
    if cache_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "sdk.cache_dir",
            "path must not be empty",
        ));
    }

    let cdn_base_url = sdk
        .cdn_base_url
        .unwrap_or_else(|| DEFAULT_SDK_BASE_URL.to_string());
    let cdn_base_url = parse_http_url(&cdn_base_url, "sdk.cdn_base_url")?;

    Ok(SdkSettings {
        package,
        cache_dir,
        live_version: non_blank(sdk.live_version),
        cdn_base_url,
        install_timeout: positive_duration(
            sdk.install_timeout_seconds
                .unwrap_or(DEFAULT_SDK_INSTALL_TIMEOUT_SECS),
            Duration::from_secs,
            "sdk.install_timeout_seconds",
        )?,
        refresh_interval: positive_duration(
            sdk.refresh_seconds.unwrap_or(DEFAULT_SDK_REFRESH_SECS),
            Duration::from_secs,
            "sdk.refresh_seconds",
        )?,
    })
}

fn build_tracking_settings(tracking: RawTrackingSettings) -> Result<TrackingSettings, LoadError> {
    let endpoint = match non_blank(tracking.endpoint) {
        Some(value) => Some(parse_http_url(&value, "tracking.endpoint")?),
        None => None,
    };

    Ok(TrackingSettings {
        endpoint,
        timeout: positive_duration(
            tracking.timeout_ms.unwrap_or(DEFAULT_TRACKING_TIMEOUT_MS),
            Duration::from_millis,
            "tracking.timeout_ms",
        )?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGraphqlSettings {
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSdkSettings {
    package: Option<String>,
    cache_dir: Option<PathBuf>,
    live_version: Option<String>,
    cdn_base_url: Option<String>,
    install_timeout_seconds: Option<u64>,
    refresh_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTrackingSettings {
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_http_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid url `{value}`: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

fn positive_duration(
    value: u64,
    unit: fn(u64) -> Duration,
    key: &'static str,
) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(unit(value))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
