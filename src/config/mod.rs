use chrono_tz::Tz;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::classification::ClassificationRules;
use crate::errors::{AppError, AppResult};
use crate::proxy::catchup::CatchUpMode;

/// Environment prefix for overrides, e.g. `IPTV_PROXY_WEB__PORT=9000`
pub const ENV_PREFIX: &str = "IPTV_PROXY_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub epg: EpgConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where channel records come from. The provider session itself is
/// negotiated elsewhere; its outcome is passed in through `session_id` and
/// `headers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// HTTP endpoint returning a JSON array of channel records
    pub channels_url: Option<String>,
    /// Local JSON file with channel records (takes precedence over the URL)
    pub channels_file: Option<PathBuf>,
    #[serde(default = "default_request_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
    /// Extra request headers sent to the provider portal
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Session identifier obtained from the portal login
    pub session_id: Option<String>,
}

/// Ordered classification rules. Order matters: first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Channels whose name matches any of these patterns are dropped
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Group assigned when no group rule matches
    #[serde(default = "default_group")]
    pub default_group: String,
    #[serde(default)]
    pub groups: Vec<GroupRuleConfig>,
    #[serde(default)]
    pub logos: Vec<LogoRuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRuleConfig {
    pub pattern: String,
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoRuleConfig {
    pub pattern: String,
    /// Logo name template, `$1`, `$2`, ... refer to capture groups
    pub logo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval", with = "duration_serde::duration")]
    pub interval: Duration,
    /// Retries after the first failed attempt of a cycle
    #[serde(default = "default_refresh_max_retries")]
    pub max_retries: u32,
    /// Fixed sleep between attempts
    #[serde(default = "default_refresh_backoff", with = "duration_serde::duration")]
    pub backoff: Duration,
}

/// Upstream guide dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpgDialect {
    /// Days addressed by signed index (`getTvodProgListByIndex.jsp`)
    DayIndex,
    /// Days addressed by formatted calendar date
    Date,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_epg_dialect")]
    pub dialect: EpgDialect,
    /// Portal base URL, e.g. `http://epg.example:8080`
    pub endpoint: Option<String>,
    #[serde(default = "default_epg_back_days")]
    pub back_days: u32,
    #[serde(default = "default_epg_preview_days")]
    pub preview_days: u32,
    /// Index the upstream uses for today in day-index addressing
    #[serde(default = "default_epg_day_index_base")]
    pub day_index_base: i64,
    /// chrono format for date addressing
    #[serde(default = "default_epg_date_format")]
    pub date_format: String,
    #[serde(default = "default_epg_day_concurrency")]
    pub day_concurrency: usize,
    #[serde(default = "default_epg_channel_concurrency")]
    pub channel_concurrency: usize,
    #[serde(default = "default_epg_refresh_interval", with = "duration_serde::duration")]
    pub refresh_interval: Duration,
    /// IANA zone of the provider's wall-clock times
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// Named udpxy relays, e.g. `home = "http://192.168.1.1:4022"`
    #[serde(default)]
    pub udpxy: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub multicast_first: bool,
    /// Catch-up mode 0-4
    #[serde(default = "default_catchup_mode")]
    pub catchup_mode: u8,
    /// Time-format suffix (mode 1) or raw query (mode 4)
    #[serde(default = "default_catchup_source")]
    pub catchup_source: String,
    #[serde(default = "default_logo_dir")]
    pub logo_dir: PathBuf,
    /// Public base URL of the logo route, used by the CLI
    pub logo_base_url: Option<String>,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

// Refresh defaults
fn default_refresh_interval() -> Duration {
    Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)
}

fn default_refresh_max_retries() -> u32 {
    DEFAULT_REFRESH_MAX_RETRIES
}

fn default_refresh_backoff() -> Duration {
    Duration::from_secs(DEFAULT_REFRESH_BACKOFF_SECS)
}

// EPG defaults
fn default_true() -> bool {
    true
}

fn default_epg_dialect() -> EpgDialect {
    EpgDialect::DayIndex
}

fn default_epg_back_days() -> u32 {
    DEFAULT_EPG_BACK_DAYS
}

fn default_epg_preview_days() -> u32 {
    DEFAULT_EPG_PREVIEW_DAYS
}

fn default_epg_day_index_base() -> i64 {
    DEFAULT_EPG_DAY_INDEX_BASE
}

fn default_epg_date_format() -> String {
    DEFAULT_EPG_DATE_FORMAT.to_string()
}

fn default_epg_day_concurrency() -> usize {
    DEFAULT_EPG_DAY_CONCURRENCY
}

fn default_epg_channel_concurrency() -> usize {
    DEFAULT_EPG_CHANNEL_CONCURRENCY
}

fn default_epg_refresh_interval() -> Duration {
    Duration::from_secs(DEFAULT_EPG_REFRESH_INTERVAL_SECS)
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

// Playlist defaults
fn default_catchup_mode() -> u8 {
    DEFAULT_CATCHUP_MODE
}

fn default_catchup_source() -> String {
    DIYP_CATCHUP_SOURCE.to_string()
}

fn default_logo_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOGO_DIR)
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            default_group: default_group(),
            groups: Vec::new(),
            logos: Vec::new(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: default_refresh_interval(),
            max_retries: default_refresh_max_retries(),
            backoff: default_refresh_backoff(),
        }
    }
}

impl Default for EpgConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dialect: default_epg_dialect(),
            endpoint: None,
            back_days: default_epg_back_days(),
            preview_days: default_epg_preview_days(),
            day_index_base: default_epg_day_index_base(),
            date_format: default_epg_date_format(),
            day_concurrency: default_epg_day_concurrency(),
            channel_concurrency: default_epg_channel_concurrency(),
            refresh_interval: default_epg_refresh_interval(),
            timezone: default_timezone(),
        }
    }
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            udpxy: BTreeMap::new(),
            multicast_first: true,
            catchup_mode: default_catchup_mode(),
            catchup_source: default_catchup_source(),
            logo_dir: default_logo_dir(),
            logo_base_url: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            upstream: UpstreamConfig {
                channels_url: None,
                channels_file: None,
                request_timeout: default_request_timeout(),
                headers: BTreeMap::new(),
                session_id: None,
            },
            rules: RulesConfig::default(),
            refresh: RefreshConfig::default(),
            epg: EpgConfig::default(),
            playlist: PlaylistConfig::default(),
        }
    }
}

impl EpgConfig {
    pub fn tz(&self) -> AppResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| AppError::configuration(format!("Invalid timezone '{}': {e}", self.timezone)))
    }
}

impl PlaylistConfig {
    /// Resolve a udpxy relay by name, or the first one by sorted name
    pub fn udpxy_url(&self, name: Option<&str>) -> Option<String> {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => self.udpxy.get(name).cloned(),
            None => self.udpxy.values().next().cloned(),
        }
    }
}

impl Config {
    /// Load the TOML file, layering `IPTV_PROXY_*` environment overrides on
    /// top. A missing file is created with defaults first.
    pub fn load_from_file(config_file: &str) -> AppResult<Self> {
        if !Path::new(config_file).exists() {
            let contents = toml::to_string_pretty(&Self::default())
                .map_err(|e| AppError::configuration(format!("Failed to encode defaults: {e}")))?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
        }

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| AppError::configuration(format!("{config_file}: {e}")))?;

        Ok(config)
    }

    /// Fail fast on anything that would otherwise surface per channel or per
    /// request.
    pub fn validate(&self) -> AppResult<()> {
        ClassificationRules::compile(&self.rules)?;
        CatchUpMode::try_from(self.playlist.catchup_mode)?;
        self.epg.tz()?;

        if self.upstream.channels_file.is_none() && self.upstream.channels_url.is_none() {
            return Err(AppError::configuration(
                "upstream.channels_url or upstream.channels_file must be set",
            ));
        }
        if self.epg.enabled && self.epg.endpoint.is_none() {
            return Err(AppError::configuration(
                "epg.endpoint must be set when epg.enabled is true",
            ));
        }
        if self.epg.day_concurrency == 0 || self.epg.channel_concurrency == 0 {
            return Err(AppError::configuration("EPG concurrency limits must be positive"));
        }
        for (name, relay) in &self.playlist.udpxy {
            url::Url::parse(relay).map_err(|e| {
                AppError::configuration(format!("Invalid udpxy URL '{relay}' for '{name}': {e}"))
            })?;
        }

        Ok(())
    }
}
