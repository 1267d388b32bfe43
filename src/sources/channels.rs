//! Channel list adapters
//!
//! The provider portal handshake happens outside this crate; what reaches us
//! is either an HTTP endpoint serving the channel records as JSON (with the
//! session carried in headers and a `JSESSIONID` cookie) or a JSON file
//! exported from such a session.

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::ChannelAcquirer;
use crate::errors::{SourceError, SourceResult};
use crate::models::RawChannelRecord;

/// Accepted payload shapes: a bare array or `{"channels": [...]}`. Elements
/// stay untyped so one malformed record cannot sink the rest.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChannelPayload {
    List(Vec<Value>),
    Wrapped { channels: Vec<Value> },
}

impl ChannelPayload {
    fn into_elements(self) -> Vec<Value> {
        match self {
            Self::List(elements) | Self::Wrapped { channels: elements } => elements,
        }
    }
}

fn decode_channels(source_type: &str, body: &[u8]) -> SourceResult<Vec<RawChannelRecord>> {
    let elements = serde_json::from_slice::<ChannelPayload>(body)
        .map_err(|e| SourceError::parse(source_type, e.to_string()))?
        .into_elements();
    let total = elements.len();

    let records: Vec<RawChannelRecord> = elements
        .into_iter()
        .enumerate()
        .filter_map(|(position, element)| {
            match serde_json::from_value::<RawChannelRecord>(element) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(
                        "Skipping malformed record #{} from {}: {}",
                        position, source_type, e
                    );
                    None
                }
            }
        })
        .collect();

    if records.is_empty() {
        return Err(SourceError::Empty {
            source_type: source_type.to_string(),
        });
    }
    if records.len() < total {
        debug!("Decoded {} of {} record(s) from {}", records.len(), total, source_type);
    }
    Ok(records)
}

/// Builds the default header map for portal requests
pub(crate) fn portal_headers(
    headers: &BTreeMap<String, String>,
    session_id: Option<&str>,
) -> SourceResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SourceError::parse("header", format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| SourceError::parse("header", format!("{name}: {e}")))?;
        map.insert(name, value);
    }
    if let Some(session_id) = session_id {
        let cookie = HeaderValue::from_str(&format!("JSESSIONID={session_id}"))
            .map_err(|e| SourceError::parse("header", format!("cookie: {e}")))?;
        map.insert(COOKIE, cookie);
    }
    Ok(map)
}

/// Channel records served as JSON over HTTP
pub struct HttpChannelAcquirer {
    client: Client,
    url: String,
}

impl HttpChannelAcquirer {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        headers: &BTreeMap<String, String>,
        session_id: Option<&str>,
    ) -> SourceResult<Self> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .default_headers(portal_headers(headers, session_id)?)
            .build()
            .map_err(|e| SourceError::transport(&url, e))?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl ChannelAcquirer for HttpChannelAcquirer {
    fn source_name(&self) -> &str {
        "http"
    }

    async fn fetch_all_channels(&self) -> SourceResult<Vec<RawChannelRecord>> {
        debug!("Fetching channel list from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::transport(&self.url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::Empty {
                source_type: format!("http {}", self.url),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("channel list request to {} failed", self.url),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::transport(&self.url, e))?;
        decode_channels("channel list", &body)
    }
}

/// Channel records read from a local JSON file on every refresh
pub struct FileChannelAcquirer {
    path: PathBuf,
}

impl FileChannelAcquirer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ChannelAcquirer for FileChannelAcquirer {
    fn source_name(&self) -> &str {
        "file"
    }

    async fn fetch_all_channels(&self) -> SourceResult<Vec<RawChannelRecord>> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SourceError::transport(self.path.display().to_string(), e))?;
        decode_channels("channel file", &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDS: &str = r#"[
        {"channelID": "1", "channelName": "CCTV-1", "userChannelID": "1",
         "channelURLs": ["igmp://239.1.1.1:1234"], "timeShift": "0", "timeShiftLength": 0},
        {"channelID": "2", "channelName": "CCTV-2", "userChannelID": "2",
         "channelURLs": ["rtsp://10.0.0.1/2"], "timeShift": "1", "timeShiftLength": 86400,
         "timeShiftURL": "rtsp://10.0.0.1/ts/2"}
    ]"#;

    #[test]
    fn test_decode_bare_and_wrapped_payloads() {
        assert_eq!(decode_channels("t", RECORDS.as_bytes()).unwrap().len(), 2);

        let wrapped = format!(r#"{{"channels": {RECORDS}}}"#);
        assert_eq!(decode_channels("t", wrapped.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn test_decode_empty_is_distinct_from_parse_failure() {
        assert!(matches!(
            decode_channels("t", b"[]"),
            Err(SourceError::Empty { .. })
        ));
        assert!(matches!(
            decode_channels("t", b"<html>"),
            Err(SourceError::Parse { .. })
        ));
    }

    #[test]
    fn test_malformed_records_are_skipped_individually() {
        let mixed = r#"[
            {"channelID": "1", "channelName": "CCTV-1", "channelURLs": ["igmp://239.1.1.1:1234"]},
            {"channelID": "2", "channelURLs": ["igmp://239.1.1.2:1234"]},
            {"channelID": "3", "channelName": "CCTV-3", "channelURLs": [42]},
            {"channelID": "4", "channelName": "CCTV-4", "timeShiftLength": 1.5}
        ]"#;
        let records = decode_channels("t", mixed.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].channel_id, "1");
    }

    #[test]
    fn test_only_malformed_records_is_empty() {
        let broken = r#"{"channels": [{"channelID": "2"}, "junk"]}"#;
        assert!(matches!(
            decode_channels("t", broken.as_bytes()),
            Err(SourceError::Empty { .. })
        ));
    }

    #[test]
    fn test_portal_headers_carry_session_cookie() {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), "webkit".to_string());
        let map = portal_headers(&headers, Some("abc")).unwrap();
        assert_eq!(map.get("user-agent").unwrap(), "webkit");
        assert_eq!(map.get(COOKIE).unwrap(), "JSESSIONID=abc");
    }

    #[tokio::test]
    async fn test_file_acquirer_reads_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");
        std::fs::write(&path, RECORDS).unwrap();

        let records = FileChannelAcquirer::new(&path)
            .fetch_all_channels()
            .await
            .unwrap();
        assert_eq!(records[1].channel_name, "CCTV-2");
    }

    #[tokio::test]
    async fn test_file_acquirer_missing_file_is_transport_error() {
        let err = FileChannelAcquirer::new("/nonexistent/channels.json")
            .fetch_all_channels()
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Transport { .. }));
    }
}
