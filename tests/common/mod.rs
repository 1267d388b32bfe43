//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use iptv_proxy::classification::ClassificationRules;
use iptv_proxy::config::{GroupRuleConfig, LogoRuleConfig, RulesConfig};
use iptv_proxy::directory::ChannelDirectory;
use iptv_proxy::errors::{SourceError, SourceResult};
use iptv_proxy::models::{Channel, DayAddressing, DayKey, RawProgramEntry};
use iptv_proxy::sources::{FileChannelAcquirer, ProgramFetcher};

pub const CHANNELS_JSON: &str = r#"[
    {"channelID": "1001", "channelName": "CCTV-1高清", "userChannelID": "1",
     "channelURLs": ["rtsp://10.255.1.1/live/1001", "igmp://239.3.1.129:8008"],
     "timeShift": "1", "timeShiftLength": 604800, "timeShiftURL": "rtsp://10.255.1.1/ts/1001"},
    {"channelID": "1002", "channelName": "湖南卫视", "userChannelID": "20",
     "channelURLs": ["igmp://239.3.1.241:8000"],
     "timeShift": "0", "timeShiftLength": 0},
    {"channelID": "1003", "channelName": "CCTV-5+体育", "userChannelID": "5",
     "channelURLs": ["igmp://239.3.1.130:8004"],
     "timeShift": "1", "timeShiftLength": "3days", "timeShiftURL": "rtsp://10.255.1.1/ts/1003"},
    {"channelID": "1004", "channelName": "导视购物", "userChannelID": "99",
     "channelURLs": ["igmp://239.3.1.200:8000"]},
    {"channelID": "1005", "channelName": "Broken", "userChannelID": "100",
     "channelURLs": ["not a url"]},
    {"channelID": "1006", "channelName": "本地新闻", "userChannelID": "30",
     "channelURLs": ["http://10.255.2.2/local.m3u8"]}
]"#;

pub fn rules_config() -> RulesConfig {
    RulesConfig {
        exclude: vec!["购物".to_string()],
        default_group: "其他".to_string(),
        groups: vec![
            GroupRuleConfig {
                pattern: "^CCTV".to_string(),
                group: "央视".to_string(),
            },
            GroupRuleConfig {
                pattern: "卫视$".to_string(),
                group: "卫视".to_string(),
            },
        ],
        logos: vec![LogoRuleConfig {
            pattern: r"^CCTV-(\d+)(\+)?".to_string(),
            logo: "CCTV$1$2".to_string(),
        }],
    }
}

pub fn write_channels(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("channels.json");
    std::fs::write(&path, CHANNELS_JSON).unwrap();
    path
}

pub fn directory_from_file(path: &Path) -> Arc<ChannelDirectory> {
    let rules = ClassificationRules::compile(&rules_config()).unwrap();
    Arc::new(ChannelDirectory::new(
        Arc::new(FileChannelAcquirer::new(path)),
        Arc::new(rules),
    ))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn entry(name: &str, start: &str, end: &str) -> RawProgramEntry {
    RawProgramEntry {
        name: name.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
    }
}

/// Serves listings keyed by (channel id, date); any other day is not found.
/// Days listed in `failing` answer with an HTTP 500.
pub struct DateFetcher {
    pub listings: HashMap<(String, NaiveDate), Vec<RawProgramEntry>>,
    pub failing: Vec<NaiveDate>,
}

#[async_trait]
impl ProgramFetcher for DateFetcher {
    fn dialect_name(&self) -> &str {
        "fixture"
    }

    fn addressing(&self) -> DayAddressing {
        DayAddressing::Date
    }

    async fn fetch_day_program(
        &self,
        channel: &Channel,
        day: DayKey,
    ) -> SourceResult<Vec<RawProgramEntry>> {
        let DayKey::Date(date) = day else {
            panic!("fixture only understands dates");
        };
        if self.failing.contains(&date) {
            return Err(SourceError::Http {
                status: 500,
                message: "upstream exploded".to_string(),
            });
        }
        self.listings
            .get(&(channel.channel_id.clone(), date))
            .cloned()
            .ok_or_else(|| SourceError::DayNotFound {
                channel_id: channel.channel_id.clone(),
                day: day.to_string(),
            })
    }
}
