//! XMLTV guide rendering

use chrono::{Days, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use quick_xml::escape::escape;
use tracing::{debug, warn};

use crate::errors::RenderError;
use crate::models::ChannelProgramList;

/// XMLTV timestamp layout
pub const XMLTV_TIME_FORMAT: &str = "%Y%m%d%H%M%S %z";

#[derive(Debug, Clone, Copy)]
pub struct GuideOptions {
    /// Zone the programme wall-clock times belong to
    pub timezone: Tz,
    /// Keep only dates on or after `today - back_days`; `None` keeps all
    pub back_days: Option<u32>,
    pub today: NaiveDate,
}

impl GuideOptions {
    pub fn new(timezone: Tz, today: NaiveDate) -> Self {
        Self {
            timezone,
            back_days: None,
            today,
        }
    }

    pub fn with_back_days(mut self, back_days: Option<u32>) -> Self {
        self.back_days = back_days;
        self
    }

    fn earliest_date(&self) -> Option<NaiveDate> {
        self.back_days
            .and_then(|days| self.today.checked_sub_days(Days::new(u64::from(days))))
    }
}

fn format_time(timezone: Tz, time: NaiveDateTime) -> Option<String> {
    timezone
        .from_local_datetime(&time)
        .earliest()
        .map(|local| local.format(XMLTV_TIME_FORMAT).to_string())
}

/// Render the guide as an XMLTV document. Every channel gets a `<channel>`
/// element; programmes before the `back_days` cut-off are left out.
pub fn render_guide(
    lists: &[ChannelProgramList],
    options: &GuideOptions,
) -> Result<String, RenderError> {
    if lists.is_empty() {
        return Err(RenderError::NoChannels);
    }

    let earliest = options.earliest_date();
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n\
         <tv generator-info-name=\"iptv-proxy\">\n",
    );

    for list in lists {
        xml.push_str(&format!(
            "  <channel id=\"{}\">\n    <display-name>{}</display-name>\n  </channel>\n",
            escape(list.channel_id.as_str()),
            escape(list.channel_name.as_str())
        ));
    }

    let mut programmes = 0;
    for list in lists {
        let days = list
            .date_programs
            .iter()
            .filter(|day| earliest.is_none_or(|cutoff| day.date >= cutoff));

        for program in days.flat_map(|day| day.programs.iter()) {
            let (Some(start), Some(stop)) = (
                format_time(options.timezone, program.start),
                format_time(options.timezone, program.end),
            ) else {
                warn!(
                    "Skipping programme '{}' of '{}': time does not exist in {}",
                    program.name, list.channel_name, options.timezone
                );
                continue;
            };

            xml.push_str(&format!(
                "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">\n    <title>{}</title>\n  </programme>\n",
                start,
                stop,
                escape(list.channel_id.as_str()),
                escape(program.name.as_str())
            ));
            programmes += 1;
        }
    }

    xml.push_str("</tv>\n");
    debug!(
        "Rendered XMLTV guide: {} channel(s), {} programme(s)",
        lists.len(),
        programmes
    );
    Ok(xml)
}

/// Gzip a rendered document
#[cfg(feature = "compression-gzip")]
pub fn gzip(content: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    encoder.finish()
}
