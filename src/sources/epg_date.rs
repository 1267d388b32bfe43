//! Calendar-date guide dialect
//!
//! Portals of this family take the channel id and a formatted date as query
//! parameters and answer with the same `data` list as the day-index dialect.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::channels::portal_headers;
use super::epg_index::decode_program_list;
use super::traits::ProgramFetcher;
use crate::errors::{SourceError, SourceResult};
use crate::models::{Channel, DayAddressing, DayKey, RawProgramEntry};

pub struct DateProgramFetcher {
    client: Client,
    endpoint: Url,
    date_format: String,
}

impl DateProgramFetcher {
    pub fn new(
        endpoint: &str,
        date_format: impl Into<String>,
        timeout: Duration,
        headers: &BTreeMap<String, String>,
        session_id: Option<&str>,
    ) -> SourceResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| SourceError::parse("epg endpoint", e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .default_headers(portal_headers(headers, session_id)?)
            .build()
            .map_err(|e| SourceError::transport(endpoint.as_str(), e))?;

        Ok(Self {
            client,
            endpoint,
            date_format: date_format.into(),
        })
    }

    fn request_url(&self, channel: &Channel, day: DayKey) -> SourceResult<Url> {
        let DayKey::Date(date) = day else {
            return Err(SourceError::parse(
                self.dialect_name(),
                format!("expected a calendar date, got {day}"),
            ));
        };
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("channelId", &channel.channel_id)
            .append_pair("date", &date.format(&self.date_format).to_string());
        Ok(url)
    }
}

#[async_trait]
impl ProgramFetcher for DateProgramFetcher {
    fn dialect_name(&self) -> &str {
        "date"
    }

    fn addressing(&self) -> DayAddressing {
        DayAddressing::Date
    }

    async fn fetch_day_program(
        &self,
        channel: &Channel,
        day: DayKey,
    ) -> SourceResult<Vec<RawProgramEntry>> {
        let url = self.request_url(channel, day)?;

        debug!("Fetching guide of '{}' on {}", channel.name, day);
        let response = self
            .client
            .get(url.as_str())
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
                message: format!("guide request for '{}' on {day} failed", channel.name),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::transport(url.as_str(), e))?;
        decode_program_list(self.dialect_name(), channel, day, &body)
    }
}
