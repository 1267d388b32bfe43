//! Builds upstream adapters from configuration

use std::sync::Arc;

use super::channels::{FileChannelAcquirer, HttpChannelAcquirer};
use super::epg_date::DateProgramFetcher;
use super::epg_index::DayIndexProgramFetcher;
use super::traits::{ChannelAcquirer, ProgramFetcher};
use crate::config::{EpgConfig, EpgDialect, UpstreamConfig};
use crate::errors::{AppError, AppResult};

pub struct SourceFactory;

impl SourceFactory {
    /// Channel acquirer for the configured upstream. A configured file wins
    /// over a URL.
    pub fn create_acquirer(upstream: &UpstreamConfig) -> AppResult<Arc<dyn ChannelAcquirer>> {
        if let Some(path) = &upstream.channels_file {
            return Ok(Arc::new(FileChannelAcquirer::new(path)));
        }
        match &upstream.channels_url {
            Some(url) => Ok(Arc::new(HttpChannelAcquirer::new(
                url,
                upstream.request_timeout,
                &upstream.headers,
                upstream.session_id.as_deref(),
            )?)),
            None => Err(AppError::configuration(
                "upstream.channels_url or upstream.channels_file must be set",
            )),
        }
    }

    /// Program fetcher for the configured guide dialect
    pub fn create_program_fetcher(
        epg: &EpgConfig,
        upstream: &UpstreamConfig,
    ) -> AppResult<Arc<dyn ProgramFetcher>> {
        let endpoint = epg
            .endpoint
            .as_deref()
            .ok_or_else(|| AppError::configuration("epg.endpoint is not set"))?;

        match epg.dialect {
            EpgDialect::DayIndex => Ok(Arc::new(DayIndexProgramFetcher::new(
                endpoint,
                upstream.request_timeout,
                upstream.session_id.as_deref(),
            )?)),
            EpgDialect::Date => Ok(Arc::new(DateProgramFetcher::new(
                endpoint,
                epg.date_format.clone(),
                upstream.request_timeout,
                &upstream.headers,
                upstream.session_id.as_deref(),
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::DayAddressing;

    #[test]
    fn test_dialect_selection() {
        let mut config = Config::default();
        config.epg.endpoint = Some("http://epg.example".to_string());

        let fetcher = SourceFactory::create_program_fetcher(&config.epg, &config.upstream).unwrap();
        assert_eq!(fetcher.addressing(), DayAddressing::Index);

        config.epg.dialect = EpgDialect::Date;
        let fetcher = SourceFactory::create_program_fetcher(&config.epg, &config.upstream).unwrap();
        assert_eq!(fetcher.addressing(), DayAddressing::Date);
    }

    #[test]
    fn test_missing_upstream_is_configuration_error() {
        let config = Config::default();
        assert!(matches!(
            SourceFactory::create_acquirer(&config.upstream),
            Err(AppError::Configuration { .. })
        ));
    }
}
