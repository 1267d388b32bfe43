//! Shared data model for the channel directory, guide and renderers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::duration_serde;
use crate::errors::SourceError;

pub mod epg;

pub use epg::*;

/// URL scheme the provider uses for multicast endpoints
pub const SCHEME_IGMP: &str = "igmp";

/// Transport class of a channel endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlScheme {
    Unicast,
    Multicast,
}

/// A single transport endpoint of a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUrl {
    pub url: Url,
}

impl ChannelUrl {
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(raw.trim())?,
        })
    }

    pub fn scheme(&self) -> UrlScheme {
        if self.url.scheme() == SCHEME_IGMP {
            UrlScheme::Multicast
        } else {
            UrlScheme::Unicast
        }
    }

    pub fn is_multicast(&self) -> bool {
        self.scheme() == UrlScheme::Multicast
    }

    /// `host[:port]` of the endpoint, as addressed by a udpxy relay
    pub fn host_with_port(&self) -> Option<String> {
        let host = self.url.host_str()?;
        Some(match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Channel record as delivered by the acquisition collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChannelRecord {
    #[serde(rename = "channelID")]
    pub channel_id: String,
    #[serde(rename = "channelName")]
    pub channel_name: String,
    #[serde(rename = "userChannelID", default)]
    pub user_channel_id: String,
    #[serde(rename = "channelURLs", default)]
    pub channel_urls: Vec<String>,
    /// "1" when the provider offers catch-up for this channel
    #[serde(rename = "timeShift", default)]
    pub time_shift: String,
    #[serde(rename = "timeShiftLength", default, with = "duration_serde::duration")]
    pub time_shift_length: Duration,
    #[serde(rename = "timeShiftURL", default)]
    pub time_shift_url: Option<String>,
}

/// A fully ingested and classified channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    pub user_channel_id: String,
    pub name: String,
    pub urls: Vec<ChannelUrl>,
    pub time_shift: bool,
    #[serde(with = "duration_serde::duration")]
    pub time_shift_window: Duration,
    pub time_shift_url: Option<Url>,
    pub group: String,
    pub logo_identity: String,
}

impl Channel {
    /// Whether catch-up attributes can be emitted for this channel
    pub fn supports_catchup(&self) -> bool {
        self.time_shift && !self.time_shift_window.is_zero() && self.time_shift_url.is_some()
    }

    /// Whole days of catch-up history, rounded down
    pub fn catchup_days(&self) -> u64 {
        self.time_shift_window.as_secs() / 3600 / 24
    }
}

impl TryFrom<RawChannelRecord> for Channel {
    type Error = SourceError;

    /// Unparseable URLs are dropped one by one; a record left without any URL
    /// is rejected.
    fn try_from(raw: RawChannelRecord) -> Result<Self, Self::Error> {
        let urls: Vec<ChannelUrl> = raw
            .channel_urls
            .iter()
            .filter_map(|candidate| match ChannelUrl::parse(candidate) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(
                        "Dropping invalid URL '{}' of channel '{}': {}",
                        candidate,
                        raw.channel_name,
                        e
                    );
                    None
                }
            })
            .collect();

        if urls.is_empty() {
            return Err(SourceError::parse(
                "channel",
                format!(
                    "channel '{}' ({}) has no valid URL",
                    raw.channel_name, raw.channel_id
                ),
            ));
        }

        let time_shift_url = raw
            .time_shift_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .and_then(|u| match Url::parse(u.trim()) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(
                        "Dropping invalid catch-up URL '{}' of channel '{}': {}",
                        u,
                        raw.channel_name,
                        e
                    );
                    None
                }
            });

        Ok(Self {
            channel_id: raw.channel_id,
            user_channel_id: raw.user_channel_id,
            name: raw.channel_name,
            urls,
            time_shift: raw.time_shift == "1",
            time_shift_window: raw.time_shift_length,
            time_shift_url,
            group: String::new(),
            logo_identity: String::new(),
        })
    }
}

/// Immutable view of the channel directory produced by one refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub channels: Vec<Channel>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            channels,
            refreshed_at: Some(Utc::now()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
