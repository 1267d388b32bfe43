//! Programme guide aggregation
//!
//! Fetches every day of the window for a channel, tolerating days the
//! upstream does not have and days that fail outright. Only cancellation
//! aborts an aggregation.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult, SourceError, SourceResult};
use crate::models::{
    Channel, ChannelProgramList, DateProgramList, DayAddressing, DayKey, Program,
    RawProgramEntry,
};
use crate::sources::ProgramFetcher;

/// Days around an anchor date to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpgWindow {
    pub anchor: NaiveDate,
    pub back_days: u32,
    pub preview_days: u32,
    /// Upstream index of the anchor day in day-index addressing
    pub day_index_base: i64,
}

impl EpgWindow {
    pub fn new(anchor: NaiveDate, back_days: u32, preview_days: u32) -> Self {
        Self {
            anchor,
            back_days,
            preview_days,
            day_index_base: 0,
        }
    }

    /// Window anchored on today's date in `tz`
    pub fn today(tz: Tz, back_days: u32, preview_days: u32) -> Self {
        Self::new(Utc::now().with_timezone(&tz).date_naive(), back_days, preview_days)
    }

    pub fn with_day_index_base(mut self, day_index_base: i64) -> Self {
        self.day_index_base = day_index_base;
        self
    }

    /// Offsets from the anchor, oldest first
    pub fn offsets(&self) -> impl Iterator<Item = i64> + use<> {
        -i64::from(self.back_days)..=i64::from(self.preview_days)
    }

    pub fn date_at(&self, offset: i64) -> Option<NaiveDate> {
        let days = Days::new(offset.unsigned_abs());
        if offset < 0 {
            self.anchor.checked_sub_days(days)
        } else {
            self.anchor.checked_add_days(days)
        }
    }

    pub fn day_key(&self, offset: i64, addressing: DayAddressing) -> Option<DayKey> {
        match addressing {
            DayAddressing::Date => self.date_at(offset).map(DayKey::Date),
            DayAddressing::Index => Some(DayKey::Index(offset + self.day_index_base)),
        }
    }
}

fn parse_wall_clock(value: &str) -> Option<NaiveTime> {
    // "HH:MM" or "HH:MM:SS"; seconds are dropped
    let trimmed = value.trim();
    let hhmm = trimmed.get(..5).unwrap_or(trimmed);
    NaiveTime::parse_from_str(hhmm, "%H:%M").ok()
}

/// Anchor a raw entry to `date`. An end earlier than the start belongs to
/// the next day.
pub fn parse_program_times(date: NaiveDate, entry: &RawProgramEntry) -> SourceResult<Program> {
    let start = parse_wall_clock(&entry.start_time).ok_or_else(|| {
        SourceError::parse(
            "programme",
            format!("'{}': bad start time '{}'", entry.name, entry.start_time),
        )
    })?;
    let end = parse_wall_clock(&entry.end_time).ok_or_else(|| {
        SourceError::parse(
            "programme",
            format!("'{}': bad end time '{}'", entry.name, entry.end_time),
        )
    })?;

    let start = NaiveDateTime::new(date, start);
    let mut end = NaiveDateTime::new(date, end);
    if end < start {
        end = end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| SourceError::parse("programme", format!("'{}': end out of range", entry.name)))?;
    }
    if end == start {
        return Err(SourceError::parse(
            "programme",
            format!("'{}': zero-length slot at {}", entry.name, start),
        ));
    }

    Ok(Program {
        name: entry.name.clone(),
        start,
        end,
    })
}

/// Parse every entry of one day, dropping the bad ones
pub fn build_date_program_list(
    channel: &Channel,
    date: NaiveDate,
    entries: &[RawProgramEntry],
) -> DateProgramList {
    let mut programs: Vec<Program> = entries
        .iter()
        .filter_map(|entry| match parse_program_times(date, entry) {
            Ok(program) => Some(program),
            Err(e) => {
                warn!("Dropping programme of '{}' on {}: {}", channel.name, date, e);
                None
            }
        })
        .collect();
    programs.sort_by(|a, b| a.start.cmp(&b.start));

    DateProgramList { date, programs }
}

pub struct EpgAggregator {
    fetcher: Arc<dyn ProgramFetcher>,
    day_concurrency: usize,
    channel_concurrency: usize,
}

impl EpgAggregator {
    pub fn new(
        fetcher: Arc<dyn ProgramFetcher>,
        day_concurrency: usize,
        channel_concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            day_concurrency: day_concurrency.max(1),
            channel_concurrency: channel_concurrency.max(1),
        }
    }

    async fn fetch_day(
        &self,
        channel: &Channel,
        window: &EpgWindow,
        offset: i64,
    ) -> Option<DateProgramList> {
        let addressing = self.fetcher.addressing();
        let (Some(date), Some(day)) = (window.date_at(offset), window.day_key(offset, addressing))
        else {
            warn!("Offset {} is outside the calendar range", offset);
            return None;
        };

        match self.fetcher.fetch_day_program(channel, day).await {
            Ok(entries) => {
                let list = build_date_program_list(channel, date, &entries);
                debug!(
                    "Guide of '{}' on {}: {} programme(s)",
                    channel.name,
                    date,
                    list.programs.len()
                );
                (!list.programs.is_empty()).then_some(list)
            }
            Err(e) if e.is_day_not_found() => None,
            Err(e) => {
                warn!(
                    "Guide of '{}' at {} unavailable from {}: {}",
                    channel.name,
                    day,
                    self.fetcher.dialect_name(),
                    e
                );
                None
            }
        }
    }

    /// All days of the window for one channel, dates ascending. Missing
    /// days are absent from the result.
    pub async fn fetch_channel_program_list(
        &self,
        cancel: &CancellationToken,
        channel: &Channel,
        window: &EpgWindow,
    ) -> AppResult<ChannelProgramList> {
        let requests: Vec<BoxFuture<'_, Option<DateProgramList>>> = window
            .offsets()
            .map(|offset| self.fetch_day(channel, window, offset).boxed())
            .collect();
        let days = stream::iter(requests)
            .buffer_unordered(self.day_concurrency)
            .filter_map(futures::future::ready)
            .collect::<Vec<_>>();

        let mut date_programs = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::cancelled("guide aggregation")),
            days = days => days,
        };
        date_programs.sort_by_key(|day| day.date);

        Ok(ChannelProgramList {
            channel_id: channel.channel_id.clone(),
            channel_name: channel.name.clone(),
            date_programs,
        })
    }

    /// Aggregate every channel. The result keeps the order of `channels`.
    pub async fn aggregate(
        &self,
        cancel: &CancellationToken,
        channels: &[Channel],
        window: &EpgWindow,
    ) -> AppResult<Vec<ChannelProgramList>> {
        let requests: Vec<BoxFuture<'_, AppResult<(usize, ChannelProgramList)>>> = channels
            .iter()
            .enumerate()
            .map(|(position, channel)| {
                self.fetch_channel_program_list(cancel, channel, window)
                    .map(move |result| result.map(|list| (position, list)))
                    .boxed()
            })
            .collect();
        let mut lists = stream::iter(requests)
            .buffer_unordered(self.channel_concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<AppResult<Vec<_>>>()?;

        lists.sort_by_key(|(position, _)| *position);
        Ok(lists.into_iter().map(|(_, list)| list).collect())
    }
}
