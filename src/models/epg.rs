//! Programme guide model

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Programme entry as delivered by a program-fetch collaborator.
/// Times are wall-clock "HH:MM" strings, optionally with seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProgramEntry {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
}

/// A programme anchored to its calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// All programmes of one channel on one day, ordered by start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateProgramList {
    pub date: NaiveDate,
    pub programs: Vec<Program>,
}

/// Guide data of one channel over the aggregation window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelProgramList {
    pub channel_id: String,
    pub channel_name: String,
    pub date_programs: Vec<DateProgramList>,
}

impl ChannelProgramList {
    pub fn program_count(&self) -> usize {
        self.date_programs.iter().map(|d| d.programs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.date_programs.is_empty()
    }
}

/// How an upstream dialect identifies a guide day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayAddressing {
    /// Literal calendar date
    Date,
    /// Signed offset from the provider's notion of today
    Index,
}

/// Key for a single guide day request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKey {
    Date(NaiveDate),
    Index(i64),
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayKey::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            DayKey::Index(index) => write!(f, "index {index}"),
        }
    }
}
