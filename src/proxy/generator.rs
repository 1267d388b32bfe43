//! Playlist rendering
//!
//! Turns a directory snapshot into either a simple `name,url` list grouped
//! under `#genre#` headers or an extended M3U playlist. Channels that cannot
//! be rendered are left out and reported back to the caller.

use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::catchup::CatchUpSettings;
use crate::errors::{AppError, RenderError};
use crate::models::{Channel, ChannelUrl, Snapshot};
use crate::sources::{LogoDirectory, LogoExistence, NoLogos};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistFormat {
    /// `group,#genre#` headers followed by `name,url` lines
    Txt,
    /// Extended M3U
    M3u,
}

impl PlaylistFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Txt => "text/plain; charset=utf-8",
            Self::M3u => "audio/x-mpegurl; charset=utf-8",
        }
    }
}

impl FromStr for PlaylistFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" => Ok(Self::Txt),
            "m3u" | "m3u8" => Ok(Self::M3u),
            other => Err(AppError::configuration(format!(
                "Unknown playlist format '{other}', expected txt or m3u"
            ))),
        }
    }
}

/// Per-call rendering options
#[derive(Clone)]
pub struct PlaylistOptions {
    /// udpxy relay that multicast URLs are rewritten to
    pub udpxy_url: Option<String>,
    pub multicast_first: bool,
    pub catchup: CatchUpSettings,
    /// Public base URL logos are served from
    pub logo_base_url: Option<String>,
    pub logos: Arc<dyn LogoExistence>,
}

impl Default for PlaylistOptions {
    fn default() -> Self {
        Self {
            udpxy_url: None,
            multicast_first: false,
            catchup: CatchUpSettings::default(),
            logo_base_url: None,
            logos: Arc::new(NoLogos),
        }
    }
}

impl std::fmt::Debug for PlaylistOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistOptions")
            .field("udpxy_url", &self.udpxy_url)
            .field("multicast_first", &self.multicast_first)
            .field("catchup", &self.catchup)
            .field("logo_base_url", &self.logo_base_url)
            .finish_non_exhaustive()
    }
}

/// A rendered playlist plus the channels that had to be left out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub content: String,
    pub rendered: usize,
    pub skipped: Vec<RenderError>,
}

/// Pick the URL to emit for a channel.
///
/// A single URL is used as is. With several, the first one matching the
/// multicast preference wins, or the last one when none matches. Multicast
/// URLs are rewritten to `{proxy}/rtp/{host:port}` when a relay is given.
pub fn resolve_url(
    channel: &Channel,
    proxy_base_url: Option<&str>,
    prefer_multicast: bool,
) -> Result<String, RenderError> {
    let selected = select_url(&channel.urls, prefer_multicast).ok_or_else(|| RenderError::NoUrls {
        channel_id: channel.channel_id.clone(),
        channel_name: channel.name.clone(),
    })?;

    match (proxy_base_url.filter(|p| !p.is_empty()), selected.is_multicast()) {
        (Some(proxy), true) => match selected.host_with_port() {
            Some(group) => Ok(format!("{}/rtp/{}", proxy.trim_end_matches('/'), group)),
            None => Ok(selected.as_str().to_string()),
        },
        _ => Ok(selected.as_str().to_string()),
    }
}

fn select_url(urls: &[ChannelUrl], prefer_multicast: bool) -> Option<&ChannelUrl> {
    match urls {
        [] => None,
        [only] => Some(only),
        _ => urls
            .iter()
            .find(|url| url.is_multicast() == prefer_multicast)
            .or_else(|| urls.last()),
    }
}

/// Groups in first-seen order, each with its channels in snapshot order
fn group_channels(channels: &[Channel]) -> Vec<(&str, Vec<&Channel>)> {
    let mut groups: Vec<(&str, Vec<&Channel>)> = Vec::new();
    for channel in channels {
        match groups.iter().position(|(name, _)| *name == channel.group) {
            Some(index) => groups[index].1.push(channel),
            None => groups.push((channel.group.as_str(), vec![channel])),
        }
    }
    groups
}

fn logo_url(channel: &Channel, options: &PlaylistOptions) -> Option<String> {
    let base = options.logo_base_url.as_deref().filter(|b| !b.is_empty())?;
    if channel.logo_identity.is_empty() || !options.logos.logo_exists(&channel.logo_identity) {
        return None;
    }
    let file_name = LogoDirectory::file_name(&channel.logo_identity);
    Some(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(&file_name)
    ))
}

fn extinf_line(channel: &Channel, options: &PlaylistOptions) -> String {
    let mut line = format!(
        "#EXTINF:-1 tvg-id=\"{}\" tvg-chno=\"{}\"",
        channel.channel_id, channel.user_channel_id
    );

    if let Some(logo) = logo_url(channel, options) {
        line.push_str(&format!(" tvg-logo=\"{logo}\""));
    }

    if let (true, Some(base)) = (channel.supports_catchup(), channel.time_shift_url.as_ref()) {
        line.push_str(&format!(
            " catchup=\"{}\" catchup-source=\"{}\" catchup-days=\"{}\"",
            options.catchup.mode.label(),
            options.catchup.source_url(base.as_str()),
            channel.catchup_days()
        ));
    }

    line.push_str(&format!(" group-title=\"{}\",{}", channel.group, channel.name));
    line
}

/// Render `snapshot` in `format`. Zero rendered channels is an error.
pub fn render_playlist(
    snapshot: &Snapshot,
    format: PlaylistFormat,
    options: &PlaylistOptions,
) -> Result<RenderedDocument, RenderError> {
    if snapshot.is_empty() {
        return Err(RenderError::NoChannels);
    }

    let mut content = String::new();
    let mut rendered = 0;
    let mut skipped = Vec::new();
    let udpxy = options.udpxy_url.as_deref();

    match format {
        PlaylistFormat::Txt => {
            for (group, members) in group_channels(&snapshot.channels) {
                let mut lines = String::new();
                for channel in members {
                    match resolve_url(channel, udpxy, options.multicast_first) {
                        Ok(url) => {
                            lines.push_str(&format!("{},{}\n", channel.name, url));
                            rendered += 1;
                        }
                        Err(e) => skipped.push(e),
                    }
                }
                if !lines.is_empty() {
                    content.push_str(&format!("{group},#genre#\n"));
                    content.push_str(&lines);
                }
            }
        }
        PlaylistFormat::M3u => {
            content.push_str("#EXTM3U\n");
            for channel in &snapshot.channels {
                match resolve_url(channel, udpxy, options.multicast_first) {
                    Ok(url) => {
                        content.push_str(&format!("{}\n{}\n", extinf_line(channel, options), url));
                        rendered += 1;
                    }
                    Err(e) => skipped.push(e),
                }
            }
        }
    }

    for error in &skipped {
        warn!("Channel left out of playlist: {}", error);
    }
    if rendered == 0 {
        return Err(RenderError::NoChannels);
    }

    debug!(
        "Rendered {:?} playlist: {} channel(s), {} skipped",
        format,
        rendered,
        skipped.len()
    );
    Ok(RenderedDocument {
        content,
        rendered,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::catchup::CatchUpMode;
    use std::time::Duration;
    use url::Url;

    fn channel(id: &str, name: &str, group: &str, urls: &[&str]) -> Channel {
        Channel {
            channel_id: id.to_string(),
            user_channel_id: id.to_string(),
            name: name.to_string(),
            urls: urls.iter().map(|u| ChannelUrl::parse(u).unwrap()).collect(),
            time_shift: false,
            time_shift_window: Duration::ZERO,
            time_shift_url: None,
            group: group.to_string(),
            logo_identity: name.to_string(),
        }
    }

    struct KnownLogos(Vec<&'static str>);

    impl LogoExistence for KnownLogos {
        fn logo_exists(&self, identity: &str) -> bool {
            self.0.iter().any(|known| *known == identity)
        }
    }

    #[test]
    fn test_resolve_prefers_first_matching_url() {
        let ch = channel(
            "1",
            "A",
            "G",
            &["rtsp://10.0.0.1/a", "igmp://239.1.1.1:1234", "igmp://239.1.1.2:1234"],
        );
        assert_eq!(resolve_url(&ch, None, true).unwrap(), "igmp://239.1.1.1:1234");
        assert_eq!(resolve_url(&ch, None, false).unwrap(), "rtsp://10.0.0.1/a");
    }

    #[test]
    fn test_resolve_falls_back_to_last_url() {
        let ch = channel("1", "A", "G", &["rtsp://10.0.0.1/a", "rtsp://10.0.0.1/b"]);
        assert_eq!(resolve_url(&ch, None, true).unwrap(), "rtsp://10.0.0.1/b");
    }

    #[test]
    fn test_multicast_rewrite() {
        let ch = channel("1", "A", "G", &["igmp://239.1.1.1:1234"]);
        assert_eq!(
            resolve_url(&ch, Some("http://192.168.1.1:4022"), true).unwrap(),
            "http://192.168.1.1:4022/rtp/239.1.1.1:1234"
        );
        assert_eq!(
            resolve_url(&ch, Some("http://192.168.1.1:4022/"), false).unwrap(),
            "http://192.168.1.1:4022/rtp/239.1.1.1:1234"
        );
    }

    #[test]
    fn test_resolve_without_urls() {
        let ch = channel("7", "Empty", "G", &[]);
        assert_eq!(
            resolve_url(&ch, None, true),
            Err(RenderError::NoUrls {
                channel_id: "7".to_string(),
                channel_name: "Empty".to_string(),
            })
        );
    }

    #[test]
    fn test_txt_groups_in_first_seen_order() {
        let snapshot = Snapshot::new(vec![
            channel("1", "CCTV-1", "央视", &["http://s/1"]),
            channel("2", "湖南卫视", "卫视", &["http://s/2"]),
            channel("3", "CCTV-2", "央视", &["http://s/3"]),
        ]);
        let doc = render_playlist(&snapshot, PlaylistFormat::Txt, &PlaylistOptions::default()).unwrap();
        assert_eq!(
            doc.content,
            "央视,#genre#\nCCTV-1,http://s/1\nCCTV-2,http://s/3\n卫视,#genre#\n湖南卫视,http://s/2\n"
        );
        assert_eq!(doc.rendered, 3);
    }

    #[test]
    fn test_m3u_line_with_flussonic_catchup_and_logo() {
        let mut ch = channel("42", "CCTV1", "央视", &["igmp://239.1.1.1:1234"]);
        ch.time_shift = true;
        ch.time_shift_window = Duration::from_secs(7 * 86400);
        ch.time_shift_url = Some(Url::parse("http://h/ts").unwrap());

        let options = PlaylistOptions {
            catchup: CatchUpSettings::new(CatchUpMode::Flussonic, ""),
            logo_base_url: Some("http://proxy:8088/logo".to_string()),
            logos: Arc::new(KnownLogos(vec!["CCTV1"])),
            ..PlaylistOptions::default()
        };
        let doc = render_playlist(&Snapshot::new(vec![ch]), PlaylistFormat::M3u, &options).unwrap();

        assert_eq!(
            doc.content,
            "#EXTM3U\n#EXTINF:-1 tvg-id=\"42\" tvg-chno=\"42\" tvg-logo=\"http://proxy:8088/logo/CCTV1.png\" \
             catchup=\"flussonic\" catchup-source=\"http://h/ts?start=${start}&end=${end}&dvr=${duration}\" \
             catchup-days=\"7\" group-title=\"央视\",CCTV1\nigmp://239.1.1.1:1234\n"
        );
    }

    #[test]
    fn test_missing_logo_is_omitted() {
        let options = PlaylistOptions {
            logo_base_url: Some("http://proxy/logo".to_string()),
            logos: Arc::new(KnownLogos(vec![])),
            ..PlaylistOptions::default()
        };
        let snapshot = Snapshot::new(vec![channel("1", "A", "G", &["http://s/1"])]);
        let doc = render_playlist(&snapshot, PlaylistFormat::M3u, &options).unwrap();
        assert!(!doc.content.contains("tvg-logo"));
        assert!(!doc.content.contains("catchup"));
    }

    #[test]
    fn test_unrenderable_channels_are_reported() {
        let snapshot = Snapshot::new(vec![
            channel("1", "A", "G", &["http://s/1"]),
            channel("2", "B", "H", &[]),
        ]);
        let doc = render_playlist(&snapshot, PlaylistFormat::Txt, &PlaylistOptions::default()).unwrap();
        assert_eq!(doc.rendered, 1);
        assert_eq!(doc.skipped.len(), 1);
        assert!(!doc.content.contains("H,#genre#"));
    }

    #[test]
    fn test_nothing_to_render_is_an_error() {
        let empty = Snapshot::empty();
        assert_eq!(
            render_playlist(&empty, PlaylistFormat::M3u, &PlaylistOptions::default()),
            Err(RenderError::NoChannels)
        );

        let broken = Snapshot::new(vec![channel("2", "B", "H", &[])]);
        assert_eq!(
            render_playlist(&broken, PlaylistFormat::Txt, &PlaylistOptions::default()),
            Err(RenderError::NoChannels)
        );
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("M3U".parse::<PlaylistFormat>().unwrap(), PlaylistFormat::M3u);
        assert_eq!("txt".parse::<PlaylistFormat>().unwrap(), PlaylistFormat::Txt);
        assert!("xml".parse::<PlaylistFormat>().is_err());
    }
}
