//! Channel directory
//!
//! Owns the current [`Snapshot`] of the channel list. A refresh fetches every
//! record from the acquirer, drops unusable and excluded channels, classifies
//! the survivors and swaps the new snapshot in as a whole. Readers load the
//! current snapshot without locking and always see a complete one.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classification::ClassificationRules;
use crate::errors::{AppError, AppResult};
use crate::models::{Channel, RawChannelRecord, Snapshot};
use crate::sources::ChannelAcquirer;
use crate::utils::{RetryPolicy, spawn_periodic, with_retry};

pub struct ChannelDirectory {
    acquirer: Arc<dyn ChannelAcquirer>,
    rules: Arc<ClassificationRules>,
    snapshot: ArcSwap<Snapshot>,
    /// Flips to true once the first snapshot is published
    populated: watch::Sender<bool>,
}

impl ChannelDirectory {
    /// New directory with an empty snapshot
    pub fn new(acquirer: Arc<dyn ChannelAcquirer>, rules: Arc<ClassificationRules>) -> Self {
        Self {
            acquirer,
            rules,
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
            populated: watch::Sender::new(false),
        }
    }

    /// The snapshot produced by the last successful refresh
    pub fn current(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Resolves once a refresh has published a snapshot. Returns immediately
    /// when one already has.
    pub async fn wait_until_populated(&self) -> AppResult<()> {
        let mut populated = self.populated.subscribe();
        loop {
            let ready = *populated.borrow_and_update();
            if ready {
                return Ok(());
            }
            populated
                .changed()
                .await
                .map_err(|_| AppError::internal("channel directory dropped"))?;
        }
    }

    /// Fetch, filter and classify the channel list and publish it. On any
    /// failure the previous snapshot stays current.
    pub async fn refresh(&self, cancel: &CancellationToken) -> AppResult<Arc<Snapshot>> {
        if cancel.is_cancelled() {
            return Err(AppError::cancelled("channel refresh"));
        }

        let records = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::cancelled("channel refresh")),
            result = self.acquirer.fetch_all_channels() => result?,
        };
        let fetched = records.len();

        let channels = self.build_channels(records);
        if channels.is_empty() {
            return Err(AppError::empty_result(format!(
                "{} of {} channel record(s) survived ingestion from {}",
                channels.len(),
                fetched,
                self.acquirer.source_name()
            )));
        }

        // late cancellation still must not publish
        if cancel.is_cancelled() {
            return Err(AppError::cancelled("channel refresh"));
        }

        let snapshot = Arc::new(Snapshot::new(channels));
        self.snapshot.store(snapshot.clone());
        self.populated.send_replace(true);
        info!(
            "Channel directory refreshed: {} channel(s) from {} record(s)",
            snapshot.len(),
            fetched
        );
        Ok(snapshot)
    }

    fn build_channels(&self, records: Vec<RawChannelRecord>) -> Vec<Channel> {
        records
            .into_iter()
            .filter(|record| {
                let excluded = self.rules.is_excluded(&record.channel_name);
                if excluded {
                    debug!("Excluding channel '{}'", record.channel_name);
                }
                !excluded
            })
            .filter_map(|record| match Channel::try_from(record) {
                Ok(channel) => Some(channel),
                Err(e) => {
                    warn!("Skipping channel record: {}", e);
                    None
                }
            })
            .map(|mut channel| {
                let classification = self.rules.classify(&channel.name);
                channel.group = classification.group;
                channel.logo_identity = classification.logo_identity;
                channel
            })
            .collect()
    }

    /// One refresh cycle: the first attempt plus up to `policy.max_retries`
    /// retries.
    pub async fn refresh_with_retry(
        &self,
        cancel: &CancellationToken,
        policy: RetryPolicy,
    ) -> AppResult<Arc<Snapshot>> {
        with_retry(policy, cancel, || self.refresh(cancel), "channel refresh").await
    }

    /// Refresh now and then every `interval` until `cancel` fires. A failed
    /// cycle is logged and the next one starts from scratch.
    pub fn start_auto_refresh(
        self: &Arc<Self>,
        cancel: CancellationToken,
        interval: Duration,
        max_retries: u32,
        backoff: Duration,
    ) -> JoinHandle<()> {
        let directory = Arc::clone(self);
        let policy = RetryPolicy::new(max_retries, backoff);

        spawn_periodic("channel refresh", interval, cancel, move |cancel| {
            let directory = directory.clone();
            async move {
                match directory.refresh_with_retry(&cancel, policy).await {
                    Ok(_) => {}
                    Err(e) if e.is_cancelled() => debug!("Channel refresh cancelled"),
                    Err(e) => error!(
                        "Channel refresh cycle failed after {} attempt(s): {}",
                        policy.attempts(),
                        e
                    ),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupRuleConfig, RulesConfig};
    use crate::errors::{SourceError, SourceResult};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Scripted = Result<Vec<RawChannelRecord>, fn() -> SourceError>;

    /// Replays queued responses; the last one repeats
    struct ScriptedAcquirer {
        responses: Mutex<Vec<Scripted>>,
        calls: AtomicUsize,
    }

    impl ScriptedAcquirer {
        fn new(responses: Vec<Scripted>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChannelAcquirer for ScriptedAcquirer {
        fn source_name(&self) -> &str {
            "scripted"
        }

        async fn fetch_all_channels(&self) -> SourceResult<Vec<RawChannelRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut responses = self.responses.lock().unwrap();
                if responses.len() > 1 {
                    responses.remove(0)
                } else {
                    responses[0].clone()
                }
            };
            next.map_err(|make_error| make_error())
        }
    }

    fn empty_upstream() -> SourceError {
        SourceError::Empty {
            source_type: "scripted".to_string(),
        }
    }

    fn refused() -> SourceError {
        SourceError::transport("http://portal", "connection refused")
    }

    fn record(id: &str, name: &str, urls: &[&str]) -> RawChannelRecord {
        RawChannelRecord {
            channel_id: id.to_string(),
            channel_name: name.to_string(),
            user_channel_id: id.to_string(),
            channel_urls: urls.iter().map(|u| u.to_string()).collect(),
            time_shift: "0".to_string(),
            time_shift_length: Duration::ZERO,
            time_shift_url: None,
        }
    }

    fn rules() -> Arc<ClassificationRules> {
        let config = RulesConfig {
            exclude: vec!["购物".to_string()],
            groups: vec![GroupRuleConfig {
                pattern: "^CCTV".to_string(),
                group: "CCTV".to_string(),
            }],
            ..RulesConfig::default()
        };
        Arc::new(ClassificationRules::compile(&config).unwrap())
    }

    fn lineup() -> Vec<RawChannelRecord> {
        vec![
            record("1", "CCTV-1", &["igmp://239.1.1.1:1234"]),
            record("2", "家有购物", &["igmp://239.1.1.2:1234"]),
            record("3", "Broken", &[]),
            record("4", "Local", &["rtsp://10.0.0.1/4"]),
        ]
    }

    #[tokio::test]
    async fn test_current_is_empty_before_first_refresh() {
        let directory = ChannelDirectory::new(Arc::new(ScriptedAcquirer::new(vec![Ok(lineup())])), rules());
        assert!(directory.current().is_empty());
        assert!(directory.current().refreshed_at.is_none());
    }

    #[tokio::test]
    async fn test_refresh_filters_and_classifies() {
        let directory = ChannelDirectory::new(Arc::new(ScriptedAcquirer::new(vec![Ok(lineup())])), rules());
        let snapshot = directory.refresh(&CancellationToken::new()).await.unwrap();

        let names: Vec<_> = snapshot.channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["CCTV-1", "Local"]);
        assert_eq!(snapshot.channels[0].group, "CCTV");
        assert_eq!(snapshot.channels[1].group, "Other");
        assert_eq!(snapshot.channels[1].logo_identity, "Local");
        assert!(Arc::ptr_eq(&snapshot, &directory.current()));
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let directory = ChannelDirectory::new(Arc::new(ScriptedAcquirer::new(vec![Ok(lineup())])), rules());
        let cancel = CancellationToken::new();
        let first = directory.refresh(&cancel).await.unwrap();
        let second = directory.refresh(&cancel).await.unwrap();
        assert_eq!(first.channels, second.channels);
    }

    #[tokio::test]
    async fn test_zero_channels_keeps_previous_snapshot() {
        let acquirer = ScriptedAcquirer::new(vec![
            Ok(lineup()),
            Ok(vec![record("9", "购物频道", &["http://a/b"])]),
        ]);
        let directory = ChannelDirectory::new(Arc::new(acquirer), rules());
        let cancel = CancellationToken::new();

        let before = directory.refresh(&cancel).await.unwrap();
        let err = directory.refresh(&cancel).await.unwrap_err();

        assert!(matches!(err, AppError::EmptyResult { .. }));
        assert!(Arc::ptr_eq(&before, &directory.current()));
    }

    #[tokio::test]
    async fn test_acquisition_failure_keeps_previous_snapshot() {
        let acquirer = ScriptedAcquirer::new(vec![
            Ok(lineup()),
            Err(refused as fn() -> SourceError),
        ]);
        let directory = ChannelDirectory::new(Arc::new(acquirer), rules());
        let cancel = CancellationToken::new();

        directory.refresh(&cancel).await.unwrap();
        let err = directory.refresh(&cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Acquisition(SourceError::Transport { .. })));
        assert_eq!(directory.current().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_leaves_snapshot_untouched() {
        let acquirer = Arc::new(ScriptedAcquirer::new(vec![Ok(lineup())]));
        let directory = ChannelDirectory::new(acquirer.clone(), rules());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = directory.refresh(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(directory.current().is_empty());
        assert_eq!(acquirer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_cycle_retries_then_gives_up() {
        let acquirer = Arc::new(ScriptedAcquirer::new(vec![Err(empty_upstream as fn() -> SourceError)]));
        let directory = ChannelDirectory::new(acquirer.clone(), rules());

        let result = directory
            .refresh_with_retry(
                &CancellationToken::new(),
                RetryPolicy::new(2, Duration::from_millis(1)),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(acquirer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_populated_only_after_successful_refresh() {
        let acquirer = ScriptedAcquirer::new(vec![
            Err(refused as fn() -> SourceError),
            Ok(lineup()),
        ]);
        let directory = Arc::new(ChannelDirectory::new(Arc::new(acquirer), rules()));
        let cancel = CancellationToken::new();

        let waiter = {
            let directory = directory.clone();
            tokio::spawn(async move { directory.wait_until_populated().await })
        };

        directory.refresh(&cancel).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        directory.refresh(&cancel).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // later waiters return straight away
        directory.wait_until_populated().await.unwrap();
    }

    #[tokio::test]
    async fn test_auto_refresh_publishes_and_stops_on_cancel() {
        let directory = Arc::new(ChannelDirectory::new(
            Arc::new(ScriptedAcquirer::new(vec![Ok(lineup())])),
            rules(),
        ));
        let cancel = CancellationToken::new();
        let handle = directory.start_auto_refresh(
            cancel.clone(),
            Duration::from_secs(3600),
            0,
            Duration::from_millis(1),
        );

        for _ in 0..100 {
            if !directory.current().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(directory.current().len(), 2);

        cancel.cancel();
        handle.await.unwrap();
    }
}
