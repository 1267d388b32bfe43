use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iptv_proxy::{
    app::App,
    config::Config,
    proxy::{
        CatchUpMode, CatchUpSettings, GuideOptions, PlaylistFormat, PlaylistOptions,
        render_guide, render_playlist,
    },
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "iptv-proxy")]
#[command(version)]
#[command(about = "IPTV channel directory, playlist and programme guide service")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service with background refreshes
    Serve {
        /// Listening IP address
        #[arg(short = 'H', long, value_name = "IP")]
        host: Option<String>,

        /// Listening port
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,
    },
    /// Fetch the channel list once and write a playlist
    Channel {
        /// Output format: m3u or txt
        #[arg(short, long, default_value = "m3u")]
        format: String,

        /// Output file, stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Named udpxy relay to rewrite multicast URLs to
        #[arg(long)]
        udpxy: Option<String>,

        /// Catch-up mode 0-4, overrides the configured one
        #[arg(long)]
        catchup: Option<String>,
    },
    /// Fetch the programme guide once and write XMLTV
    Epg {
        /// Output file
        #[arg(short, long, default_value = "epg.xml")]
        output: PathBuf,

        /// Days of history to keep, 0 keeps everything fetched
        #[arg(long, default_value_t = 0)]
        back_days: u32,

        /// Gzip the output
        #[arg(long)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("iptv_proxy={},tower_http=trace", cli.log_level)
    } else {
        format!("iptv_proxy={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            shutdown.cancel();
        }
    });

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.web.host = host;
            }
            if let Some(port) = port {
                config.web.port = port;
            }
            serve(config, cancel).await
        }
        Command::Channel {
            format,
            output,
            udpxy,
            catchup,
        } => {
            if let Some(name) = udpxy {
                let relay = config
                    .playlist
                    .udpxy_url(Some(&name))
                    .with_context(|| format!("Unknown udpxy relay '{name}'"))?;
                config.playlist.udpxy = [(name, relay)].into_iter().collect();
            }
            if let Some(mode) = catchup {
                config.playlist.catchup_mode = mode.parse::<CatchUpMode>()?.into();
            }
            write_playlist(config, format.parse()?, output, cancel).await
        }
        Command::Epg {
            output,
            back_days,
            gzip,
        } => write_guide(config, output, back_days, gzip, cancel).await,
    }
}

async fn serve(config: Config, cancel: CancellationToken) -> Result<()> {
    info!("Starting IPTV proxy v{}", env!("CARGO_PKG_VERSION"));
    let app = App::from_config(config)?;

    let refresh = &app.config.refresh;
    let directory_task = app.directory.start_auto_refresh(
        cancel.clone(),
        refresh.interval,
        refresh.max_retries,
        refresh.backoff,
    );
    let guide_task = app.guide.as_ref().map(|store| {
        store.start_auto_refresh(
            cancel.clone(),
            app.config.epg.refresh_interval,
            app.retry_policy(),
        )
    });

    let server = WebServer::new(&app.config, app.state())?;
    let result = server.serve_with_cancellation(cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = directory_task.await {
        warn!("Channel refresh task ended abnormally: {}", e);
    }
    if let Some(task) = guide_task {
        if let Err(e) = task.await {
            warn!("Guide refresh task ended abnormally: {}", e);
        }
    }
    result
}

async fn write_playlist(
    config: Config,
    format: PlaylistFormat,
    output: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<()> {
    let app = App::from_config(config)?;
    let snapshot = app
        .directory
        .refresh_with_retry(&cancel, app.retry_policy())
        .await?;

    let playlist = &app.config.playlist;
    let options = PlaylistOptions {
        udpxy_url: playlist.udpxy_url(None),
        multicast_first: playlist.multicast_first,
        catchup: CatchUpSettings::new(
            CatchUpMode::try_from(playlist.catchup_mode)?,
            playlist.catchup_source.clone(),
        ),
        logo_base_url: playlist.logo_base_url.clone(),
        logos: app.logos.clone(),
    };
    let document = render_playlist(&snapshot, format, &options)?;
    if !document.skipped.is_empty() {
        warn!("{} channel(s) left out of the playlist", document.skipped.len());
    }

    match output {
        Some(path) => {
            tokio::fs::write(&path, document.content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} channel(s) to {}", document.rendered, path.display());
        }
        None => print!("{}", document.content),
    }
    Ok(())
}

async fn write_guide(
    config: Config,
    output: PathBuf,
    back_days: u32,
    gzip: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let app = App::from_config(config)?;
    let Some(store) = app.guide.clone() else {
        anyhow::bail!("The programme guide is disabled (epg.enabled = false)");
    };

    app.directory
        .refresh_with_retry(&cancel, app.retry_policy())
        .await?;
    let guide = store.refresh(&cancel).await?;

    let timezone = store.settings().timezone;
    let options = GuideOptions::new(timezone, Utc::now().with_timezone(&timezone).date_naive())
        .with_back_days((back_days > 0).then_some(back_days));
    let xml = render_guide(&guide.channels, &options)?;

    let bytes = if gzip { compress(xml)? } else { xml.into_bytes() };
    tokio::fs::write(&output, bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        "Wrote guide with {} programme(s) to {}",
        guide.program_count(),
        output.display()
    );
    Ok(())
}

#[cfg(feature = "compression-gzip")]
fn compress(xml: String) -> Result<Vec<u8>> {
    Ok(iptv_proxy::proxy::epg_generator::gzip(xml.as_bytes())?)
}

#[cfg(not(feature = "compression-gzip"))]
fn compress(_xml: String) -> Result<Vec<u8>> {
    tracing::error!("Built without the compression-gzip feature");
    anyhow::bail!("gzip output is not available in this build")
}
