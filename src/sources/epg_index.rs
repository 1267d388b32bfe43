//! Day-index guide dialect
//!
//! Portals of this family serve one channel-day per request from
//! `getTvodProgListByIndex.jsp`, addressing the day by a signed offset from
//! today. The endpoint only answers requests that look like they come from
//! the set-top box browser, hence the fixed headers and cookies.

use async_trait::async_trait;
use reqwest::header::{COOKIE, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::traits::ProgramFetcher;
use crate::errors::{SourceError, SourceResult};
use crate::models::{Channel, DayAddressing, DayKey, RawProgramEntry};

const PROGRAM_LIST_PATH: &str = "EPG/jsp/defaulttrans2/en/datajsp/getTvodProgListByIndex.jsp";
const REFERER_PATH: &str = "EPG/jsp/defaulttrans2/en/chanMiniList.html";
const STB_USER_AGENT: &str = "webkit;Resolution(PAL,720P,1080P)";
const STB_REQUESTED_WITH: &str = "com.hisense.iptv";

/// `{"data": [{"progName", "startTime", "endTime", "progId"}]}`
#[derive(Debug, Deserialize)]
pub(crate) struct ProgramListPayload {
    #[serde(default)]
    pub data: Vec<ProgramItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgramItem {
    #[serde(rename = "progName")]
    pub prog_name: String,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: String,
}

/// Decode a programme list body. An empty `data` array means the portal has
/// nothing for that day.
pub(crate) fn decode_program_list(
    dialect: &str,
    channel: &Channel,
    day: DayKey,
    body: &[u8],
) -> SourceResult<Vec<RawProgramEntry>> {
    let payload: ProgramListPayload = serde_json::from_slice(body)
        .map_err(|e| SourceError::parse(dialect, format!("{}: {e}", channel.name)))?;

    if payload.data.is_empty() {
        return Err(SourceError::DayNotFound {
            channel_id: channel.channel_id.clone(),
            day: day.to_string(),
        });
    }

    Ok(payload
        .data
        .into_iter()
        .map(|item| RawProgramEntry {
            name: item.prog_name,
            start_time: item.start_time,
            end_time: item.end_time,
        })
        .collect())
}

pub struct DayIndexProgramFetcher {
    client: Client,
    endpoint: Url,
    session_id: String,
}

impl DayIndexProgramFetcher {
    pub fn new(endpoint: &str, timeout: Duration, session_id: Option<&str>) -> SourceResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| SourceError::parse("epg endpoint", e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| SourceError::transport(endpoint.as_str(), e))?;

        Ok(Self {
            client,
            endpoint,
            session_id: session_id.unwrap_or_default().to_string(),
        })
    }

    fn url_for(&self, path: &str) -> SourceResult<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| SourceError::parse("epg endpoint", e.to_string()))
    }

    fn cookies(&self, channel: &Channel) -> String {
        [
            ("JSESSIONID", self.session_id.clone()),
            ("STARV_TIMESHFTCID", channel.channel_id.clone()),
            ("STARV_TIMESHFTCNAME", urlencoding::encode(&channel.name).into_owned()),
            ("maidianFlag", "1".to_string()),
            ("navNameFocus", "3".to_string()),
            ("channelTip", "1".to_string()),
            ("jumpTime", "0".to_string()),
            ("lastChanNum", "1".to_string()),
        ]
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
    }
}

#[async_trait]
impl ProgramFetcher for DayIndexProgramFetcher {
    fn dialect_name(&self) -> &str {
        "day_index"
    }

    fn addressing(&self) -> DayAddressing {
        DayAddressing::Index
    }

    async fn fetch_day_program(
        &self,
        channel: &Channel,
        day: DayKey,
    ) -> SourceResult<Vec<RawProgramEntry>> {
        let DayKey::Index(index) = day else {
            return Err(SourceError::parse(
                self.dialect_name(),
                format!("expected a day index, got {day}"),
            ));
        };

        let mut url = self.url_for(PROGRAM_LIST_PATH)?;
        url.query_pairs_mut()
            .append_pair("CHANNELID", &channel.channel_id)
            .append_pair("index", &index.to_string());
        let referer = self.url_for(REFERER_PATH)?;

        debug!("Fetching guide of '{}' at {}", channel.name, day);
        let response = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, STB_USER_AGENT)
            .header("X-Requested-With", STB_REQUESTED_WITH)
            .header(REFERER, referer.as_str())
            .header(COOKIE, self.cookies(channel))
            .send()
            .await
            .map_err(|e| SourceError::transport(url.as_str(), e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::DayNotFound {
                channel_id: channel.channel_id.clone(),
                day: day.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("guide request for '{}' at {day} failed", channel.name),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::transport(url.as_str(), e))?;
        decode_program_list(self.dialect_name(), channel, day, &body)
    }
}
