//! Cached programme guide
//!
//! Holds the latest aggregation over the current channel directory with the
//! same swap-on-success semantics as the directory itself.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::aggregator::{EpgAggregator, EpgWindow};
use crate::directory::ChannelDirectory;
use crate::errors::{AppError, AppResult};
use crate::models::ChannelProgramList;
use crate::utils::{RetryPolicy, spawn_periodic, with_retry};

/// One complete aggregation
#[derive(Debug, Clone, Default)]
pub struct Guide {
    pub channels: Vec<ChannelProgramList>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Guide {
    pub fn program_count(&self) -> usize {
        self.channels.iter().map(ChannelProgramList::program_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.program_count() == 0
    }
}

/// Shape of the window fetched on each refresh
#[derive(Debug, Clone, Copy)]
pub struct WindowSettings {
    pub timezone: Tz,
    pub back_days: u32,
    pub preview_days: u32,
    pub day_index_base: i64,
}

impl WindowSettings {
    pub fn window_for_today(&self) -> EpgWindow {
        EpgWindow::today(self.timezone, self.back_days, self.preview_days)
            .with_day_index_base(self.day_index_base)
    }
}

pub struct GuideStore {
    directory: Arc<ChannelDirectory>,
    aggregator: EpgAggregator,
    settings: WindowSettings,
    guide: ArcSwap<Guide>,
}

impl GuideStore {
    pub fn new(
        directory: Arc<ChannelDirectory>,
        aggregator: EpgAggregator,
        settings: WindowSettings,
    ) -> Self {
        Self {
            directory,
            aggregator,
            settings,
            guide: ArcSwap::from_pointee(Guide::default()),
        }
    }

    pub fn current(&self) -> Arc<Guide> {
        self.guide.load_full()
    }

    pub fn settings(&self) -> &WindowSettings {
        &self.settings
    }

    /// Aggregate over today's window
    pub async fn refresh(&self, cancel: &CancellationToken) -> AppResult<Arc<Guide>> {
        self.refresh_window(cancel, &self.settings.window_for_today())
            .await
    }

    /// Aggregate every channel of the current directory snapshot and publish
    /// the result. A result without a single programme keeps the previous
    /// guide.
    pub async fn refresh_window(
        &self,
        cancel: &CancellationToken,
        window: &EpgWindow,
    ) -> AppResult<Arc<Guide>> {
        let snapshot = self.directory.current();
        if snapshot.is_empty() {
            return Err(AppError::empty_result("channel directory is empty"));
        }

        let channels = self
            .aggregator
            .aggregate(cancel, &snapshot.channels, window)
            .await?;
        let guide = Guide {
            channels,
            refreshed_at: Some(Utc::now()),
        };
        if guide.is_empty() {
            return Err(AppError::empty_result(format!(
                "no programme data for {} channel(s)",
                snapshot.len()
            )));
        }

        let guide = Arc::new(guide);
        self.guide.store(guide.clone());
        info!(
            "Guide refreshed: {} programme(s) across {} channel(s)",
            guide.program_count(),
            guide.channels.iter().filter(|c| !c.is_empty()).count()
        );
        Ok(guide)
    }

    /// Refresh every `interval`, starting as soon as the channel directory
    /// holds its first snapshot.
    pub fn start_auto_refresh(
        self: &Arc<Self>,
        cancel: CancellationToken,
        interval: Duration,
        policy: RetryPolicy,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);

        spawn_periodic("guide refresh", interval, cancel, move |cancel| {
            let store = store.clone();
            async move {
                // the first cycle has nothing to aggregate until the directory is filled
                if let Err(e) = store.directory.wait_until_populated().await {
                    error!("Guide refresh cycle skipped: {}", e);
                    return;
                }
                match with_retry(policy, &cancel, || store.refresh(&cancel), "guide refresh").await {
                    Ok(_) => {}
                    Err(e) if e.is_cancelled() => debug!("Guide refresh cancelled"),
                    Err(e) => error!("Guide refresh cycle failed: {}", e),
                }
            }
        })
    }
}
