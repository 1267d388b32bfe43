//! Catch-up (time-shift) URL strategies
//!
//! The mode numbers and their labels are what playlist clients understand;
//! they must not change.

use tracing::warn;

use crate::config::defaults::{DIYP_CATCHUP_SOURCE, KODI_CATCHUP_SOURCE};
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatchUpMode {
    /// Base URL unchanged
    #[default]
    Default,
    /// Base URL plus a time-format suffix
    Append,
    /// Flussonic archive query
    Flussonic,
    /// `?timeshift=` query
    Xdomo,
    /// Base URL plus a raw query string
    Custom,
}

impl CatchUpMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Append => "append",
            Self::Flussonic => "flussonic",
            Self::Xdomo => "xdomo",
            Self::Custom => "custom",
        }
    }

    /// Catch-up source URL for a channel's time-shift base.
    ///
    /// `supplied` is the time-format suffix for [`CatchUpMode::Append`] and
    /// the raw query for [`CatchUpMode::Custom`]; other modes ignore it.
    pub fn source_url(self, base: &str, supplied: &str) -> String {
        match self {
            Self::Default => base.to_string(),
            Self::Append => format!("{base}{supplied}"),
            Self::Flussonic => format!("{base}?start=${{start}}&end=${{end}}&dvr=${{duration}}"),
            Self::Xdomo => format!("{base}?timeshift=${{start}}-${{end}}"),
            Self::Custom => format!("{base}?{}", supplied.trim_start_matches('?')),
        }
    }
}

impl TryFrom<u8> for CatchUpMode {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Default),
            1 => Ok(Self::Append),
            2 => Ok(Self::Flussonic),
            3 => Ok(Self::Xdomo),
            4 => Ok(Self::Custom),
            other => Err(AppError::configuration(format!(
                "Unknown catch-up mode {other}, expected 0-4"
            ))),
        }
    }
}

impl std::str::FromStr for CatchUpMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .map_err(|_| AppError::configuration(format!("Unknown catch-up mode '{s}', expected 0-4")))
            .and_then(Self::try_from)
    }
}

impl From<CatchUpMode> for u8 {
    fn from(mode: CatchUpMode) -> Self {
        match mode {
            CatchUpMode::Default => 0,
            CatchUpMode::Append => 1,
            CatchUpMode::Flussonic => 2,
            CatchUpMode::Xdomo => 3,
            CatchUpMode::Custom => 4,
        }
    }
}

/// Time-format suffixes understood by common players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatchUpSourceFormat {
    #[default]
    Diyp,
    Kodi,
}

impl CatchUpSourceFormat {
    /// `0` selects DIYP, `1` Kodi; anything else falls back to DIYP
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Kodi,
            _ => Self::Diyp,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Diyp => DIYP_CATCHUP_SOURCE,
            Self::Kodi => KODI_CATCHUP_SOURCE,
        }
    }
}

/// Mode plus the externally supplied part of the source URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchUpSettings {
    pub mode: CatchUpMode,
    pub supplied: String,
}

impl CatchUpSettings {
    pub fn new(mode: CatchUpMode, supplied: impl Into<String>) -> Self {
        Self {
            mode,
            supplied: supplied.into(),
        }
    }

    /// Settings as requested by a client: the suffix comes from the format
    /// code, and custom mode takes the raw query when one is given.
    pub fn from_request(mode: CatchUpMode, format: CatchUpSourceFormat, custom_query: Option<&str>) -> Self {
        match (mode, custom_query.filter(|q| !q.is_empty())) {
            (CatchUpMode::Custom, Some(query)) => Self::new(mode, query),
            (CatchUpMode::Custom, None) => {
                warn!("Custom catch-up mode without a query, using the {:?} suffix", format);
                Self::new(mode, format.suffix())
            }
            _ => Self::new(mode, format.suffix()),
        }
    }

    pub fn source_url(&self, base: &str) -> String {
        self.mode.source_url(base, &self.supplied)
    }
}

impl Default for CatchUpSettings {
    fn default() -> Self {
        Self::new(CatchUpMode::Default, DIYP_CATCHUP_SOURCE)
    }
}
