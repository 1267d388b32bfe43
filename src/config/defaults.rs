/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8088;

// Upstream defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

// Classification defaults
pub const DEFAULT_GROUP: &str = "Other";

// Directory refresh defaults
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 24 * 3600;
pub const DEFAULT_REFRESH_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REFRESH_BACKOFF_SECS: u64 = 30;

// EPG defaults
pub const DEFAULT_EPG_BACK_DAYS: u32 = 7;
pub const DEFAULT_EPG_PREVIEW_DAYS: u32 = 4;
pub const DEFAULT_EPG_DAY_INDEX_BASE: i64 = 0;
pub const DEFAULT_EPG_DATE_FORMAT: &str = "%Y%m%d";
pub const DEFAULT_EPG_DAY_CONCURRENCY: usize = 4;
pub const DEFAULT_EPG_CHANNEL_CONCURRENCY: usize = 8;
pub const DEFAULT_EPG_REFRESH_INTERVAL_SECS: u64 = 12 * 3600;
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

// Playlist defaults
pub const DEFAULT_LOGO_DIR: &str = "./logos";
pub const DEFAULT_CATCHUP_MODE: u8 = 0;
pub const DIYP_CATCHUP_SOURCE: &str = "?playseek=${(b)yyyyMMddHHmmss}-${(e)yyyyMMddHHmmss}";
pub const KODI_CATCHUP_SOURCE: &str = "?playseek={utc:YmdHMS}-{utcend:YmdHMS}";
