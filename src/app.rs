//! Wiring of the directory, guide store and adapters from configuration

use std::sync::Arc;
use tracing::info;

use crate::classification::ClassificationRules;
use crate::config::Config;
use crate::directory::ChannelDirectory;
use crate::epg::{EpgAggregator, GuideStore, WindowSettings};
use crate::errors::AppResult;
use crate::sources::{LogoDirectory, SourceFactory};
use crate::utils::RetryPolicy;
use crate::web::AppState;

pub struct App {
    pub config: Arc<Config>,
    pub directory: Arc<ChannelDirectory>,
    pub guide: Option<Arc<GuideStore>>,
    pub logos: Arc<LogoDirectory>,
}

impl App {
    /// Validate `config` and build every component it describes
    pub fn from_config(config: Config) -> AppResult<Self> {
        config.validate()?;

        let rules = Arc::new(ClassificationRules::compile(&config.rules)?);
        let acquirer = SourceFactory::create_acquirer(&config.upstream)?;
        info!("Channel source: {}", acquirer.source_name());
        let directory = Arc::new(ChannelDirectory::new(acquirer, rules));

        let guide = if config.epg.enabled {
            let fetcher = SourceFactory::create_program_fetcher(&config.epg, &config.upstream)?;
            info!("Guide dialect: {}", fetcher.dialect_name());
            let aggregator = EpgAggregator::new(
                fetcher,
                config.epg.day_concurrency,
                config.epg.channel_concurrency,
            );
            let settings = WindowSettings {
                timezone: config.epg.tz()?,
                back_days: config.epg.back_days,
                preview_days: config.epg.preview_days,
                day_index_base: config.epg.day_index_base,
            };
            Some(Arc::new(GuideStore::new(directory.clone(), aggregator, settings)))
        } else {
            None
        };

        let logos = Arc::new(LogoDirectory::new(config.playlist.logo_dir.clone()));

        Ok(Self {
            config: Arc::new(config),
            directory,
            guide,
            logos,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.refresh.max_retries, self.config.refresh.backoff)
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: self.config.clone(),
            directory: self.directory.clone(),
            guide: self.guide.clone(),
            logos: self.logos.clone(),
        }
    }
}
