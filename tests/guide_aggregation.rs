//! Guide store over a directory snapshot, rendered as XMLTV

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use iptv_proxy::epg::{EpgAggregator, EpgWindow, GuideStore, WindowSettings};
use iptv_proxy::errors::AppError;
use iptv_proxy::proxy::{GuideOptions, render_guide};
use iptv_proxy::utils::RetryPolicy;

use common::{DateFetcher, date, directory_from_file, entry, write_channels};

fn settings() -> WindowSettings {
    WindowSettings {
        timezone: chrono_tz::Asia::Shanghai,
        back_days: 2,
        preview_days: 1,
        day_index_base: 0,
    }
}

fn window() -> EpgWindow {
    EpgWindow::new(date(2024, 6, 10), 2, 1)
}

#[tokio::test]
#[traced_test]
async fn test_guide_refresh_skips_missing_and_failing_days() {
    let dir = tempfile::tempdir().unwrap();
    let directory = directory_from_file(&write_channels(dir.path()));
    let cancel = CancellationToken::new();
    directory.refresh(&cancel).await.unwrap();

    let fetcher = DateFetcher {
        listings: HashMap::from([
            (
                ("1001".to_string(), date(2024, 6, 10)),
                vec![
                    entry("晚间新闻", "23:30:00", "00:15:00"),
                    entry("朝闻天下", "06:00", "09:00"),
                ],
            ),
            (
                ("1001".to_string(), date(2024, 6, 11)),
                vec![entry("新闻联播", "19:00", "19:30")],
            ),
            (
                ("1002".to_string(), date(2024, 6, 8)),
                vec![entry("快乐大本营", "20:00", "22:00")],
            ),
        ]),
        failing: vec![date(2024, 6, 9)],
    };
    let store = GuideStore::new(
        directory.clone(),
        EpgAggregator::new(Arc::new(fetcher), 2, 2),
        settings(),
    );

    let guide = store.refresh_window(&cancel, &window()).await.unwrap();
    assert!(Arc::ptr_eq(&guide, &store.current()));
    assert_eq!(guide.channels.len(), directory.current().len());

    let cctv1 = &guide.channels[0];
    assert_eq!(cctv1.channel_id, "1001");
    let dates: Vec<_> = cctv1.date_programs.iter().map(|d| d.date).collect();
    assert_eq!(dates, vec![date(2024, 6, 10), date(2024, 6, 11)]);

    let today = &cctv1.date_programs[0].programs;
    assert_eq!(today[0].name, "朝闻天下");
    assert_eq!(today[1].end, date(2024, 6, 11).and_hms_opt(0, 15, 0).unwrap());

    assert_eq!(guide.program_count(), 4);
    assert!(logs_contain("upstream exploded"));
}

#[tokio::test]
async fn test_guide_without_programmes_keeps_previous() {
    let dir = tempfile::tempdir().unwrap();
    let directory = directory_from_file(&write_channels(dir.path()));
    let cancel = CancellationToken::new();

    let store = GuideStore::new(
        directory.clone(),
        EpgAggregator::new(
            Arc::new(DateFetcher {
                listings: HashMap::new(),
                failing: Vec::new(),
            }),
            1,
            1,
        ),
        settings(),
    );

    // nothing to aggregate before the directory is populated
    let err = store.refresh_window(&cancel, &window()).await.unwrap_err();
    assert!(matches!(err, AppError::EmptyResult { .. }));

    directory.refresh(&cancel).await.unwrap();
    let err = store.refresh_window(&cancel, &window()).await.unwrap_err();
    assert!(matches!(err, AppError::EmptyResult { .. }));
    assert!(store.current().channels.is_empty());
    assert!(store.current().refreshed_at.is_none());
}

#[tokio::test]
async fn test_rendered_guide_honours_back_days() {
    let dir = tempfile::tempdir().unwrap();
    let directory = directory_from_file(&write_channels(dir.path()));
    let cancel = CancellationToken::new();
    directory.refresh(&cancel).await.unwrap();

    let fetcher = DateFetcher {
        listings: HashMap::from([
            (
                ("1001".to_string(), date(2024, 6, 8)),
                vec![entry("Two Days Ago", "08:00", "09:00")],
            ),
            (
                ("1001".to_string(), date(2024, 6, 10)),
                vec![entry("Today", "08:00", "09:00")],
            ),
        ]),
        failing: Vec::new(),
    };
    let store = GuideStore::new(
        directory,
        EpgAggregator::new(Arc::new(fetcher), 4, 4),
        settings(),
    );
    let guide = store.refresh_window(&cancel, &window()).await.unwrap();

    let options = GuideOptions::new(chrono_tz::Asia::Shanghai, date(2024, 6, 10));
    let full = render_guide(&guide.channels, &options).unwrap();
    assert!(full.contains("<title>Two Days Ago</title>"));
    assert!(full.contains(
        "<programme start=\"20240610080000 +0800\" stop=\"20240610090000 +0800\" channel=\"1001\">"
    ));
    assert!(full.contains("<display-name>湖南卫视</display-name>"));

    let recent = render_guide(&guide.channels, &options.with_back_days(Some(1))).unwrap();
    assert!(!recent.contains("Two Days Ago"));
    assert!(recent.contains("<title>Today</title>"));
}

#[tokio::test]
async fn test_guide_auto_refresh_waits_for_first_directory_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let channels_path = dir.path().join("channels.json");
    let directory = directory_from_file(&channels_path);
    let cancel = CancellationToken::new();

    let today = chrono::Utc::now()
        .with_timezone(&chrono_tz::Asia::Shanghai)
        .date_naive();
    let fetcher = DateFetcher {
        listings: HashMap::from([(
            ("1001".to_string(), today),
            vec![entry("新闻联播", "19:00", "19:30")],
        )]),
        failing: Vec::new(),
    };
    let store = Arc::new(GuideStore::new(
        directory.clone(),
        EpgAggregator::new(Arc::new(fetcher), 2, 2),
        settings(),
    ));
    let handle = store.start_auto_refresh(
        cancel.clone(),
        Duration::from_secs(3600),
        RetryPolicy::new(1, Duration::from_millis(10)),
    );

    // the channel source shows up well after the guide's retry budget
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.current().refreshed_at.is_none());
    write_channels(dir.path());
    directory.refresh(&cancel).await.unwrap();

    for _ in 0..100 {
        if store.current().refreshed_at.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.current().program_count(), 1);

    cancel.cancel();
    handle.await.unwrap();
}
