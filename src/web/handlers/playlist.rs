//! Playlist endpoints
//!
//! Query parameters:
//! - `catchup`: catch-up mode 0-4
//! - `cs_format`: 0 DIYP or 1 Kodi time-format suffix
//! - `catchup_source`: raw query for custom catch-up
//! - `multicast_first`: prefer multicast URLs
//! - `udpxy`: name of the udpxy relay to rewrite multicast URLs to

use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::errors::{AppError, AppResult};
use crate::proxy::{
    CatchUpMode, CatchUpSettings, CatchUpSourceFormat, PlaylistFormat, PlaylistOptions,
    render_playlist,
};
use crate::web::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistQuery {
    pub catchup: Option<String>,
    pub cs_format: Option<u8>,
    pub catchup_source: Option<String>,
    pub multicast_first: Option<bool>,
    pub udpxy: Option<String>,
}

fn logo_base_url(state: &AppState, headers: &HeaderMap) -> Option<String> {
    if let Some(configured) = &state.config.playlist.logo_base_url {
        return Some(configured.clone());
    }
    headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(|host| format!("http://{host}/logo"))
}

/// Build per-request options on top of the configured defaults
pub fn playlist_options(
    state: &AppState,
    query: &PlaylistQuery,
    headers: &HeaderMap,
) -> AppResult<PlaylistOptions> {
    let playlist = &state.config.playlist;

    let mode = match query.catchup.as_deref().filter(|m| !m.is_empty()) {
        Some(raw) => raw.parse::<CatchUpMode>()?,
        None => CatchUpMode::try_from(playlist.catchup_mode)?,
    };
    let catchup = if query.cs_format.is_none() && query.catchup_source.is_none() {
        CatchUpSettings::new(mode, playlist.catchup_source.clone())
    } else {
        CatchUpSettings::from_request(
            mode,
            CatchUpSourceFormat::from_code(query.cs_format.unwrap_or_default()),
            query.catchup_source.as_deref(),
        )
    };

    let udpxy_url = match query.udpxy.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => Some(
            playlist
                .udpxy_url(Some(name))
                .ok_or_else(|| AppError::configuration(format!("Unknown udpxy relay '{name}'")))?,
        ),
        None => playlist.udpxy_url(None),
    };

    Ok(PlaylistOptions {
        udpxy_url,
        multicast_first: query.multicast_first.unwrap_or(playlist.multicast_first),
        catchup,
        logo_base_url: logo_base_url(state, headers),
        logos: state.logos.clone(),
    })
}

async fn serve_playlist(
    state: AppState,
    query: PlaylistQuery,
    headers: HeaderMap,
    format: PlaylistFormat,
) -> AppResult<Response> {
    let options = playlist_options(&state, &query, &headers)?;
    let snapshot = state.directory.current();
    let document = render_playlist(&snapshot, format, &options)?;

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::HeaderName::from_static("x-skipped-channels"),
                document.skipped.len().to_string(),
            ),
        ],
        document.content,
    )
        .into_response())
}

pub async fn serve_m3u(
    State(state): State<AppState>,
    Query(query): Query<PlaylistQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    serve_playlist(state, query, headers, PlaylistFormat::M3u).await
}

pub async fn serve_txt(
    State(state): State<AppState>,
    Query(query): Query<PlaylistQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    serve_playlist(state, query, headers, PlaylistFormat::Txt).await
}
