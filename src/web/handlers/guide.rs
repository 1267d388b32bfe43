//! XMLTV guide endpoints

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;

use crate::errors::{AppError, AppResult};
use crate::proxy::{GuideOptions, render_guide};
use crate::web::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GuideQuery {
    /// Days of history to keep; absent keeps everything fetched
    pub back_days: Option<u32>,
}

fn render_current_guide(state: &AppState, query: &GuideQuery) -> AppResult<String> {
    let store = state
        .guide
        .as_ref()
        .ok_or_else(|| AppError::empty_result("programme guide is disabled"))?;
    let guide = store.current();
    let timezone = store.settings().timezone;

    let options = GuideOptions::new(timezone, Utc::now().with_timezone(&timezone).date_naive())
        .with_back_days(query.back_days);
    Ok(render_guide(&guide.channels, &options)?)
}

pub async fn serve_xmltv(
    State(state): State<AppState>,
    Query(query): Query<GuideQuery>,
) -> AppResult<Response> {
    let xml = render_current_guide(&state, &query)?;
    Ok(([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml).into_response())
}

#[cfg(feature = "compression-gzip")]
pub async fn serve_xmltv_gz(
    State(state): State<AppState>,
    Query(query): Query<GuideQuery>,
) -> AppResult<Response> {
    let xml = render_current_guide(&state, &query)?;
    let compressed = crate::proxy::epg_generator::gzip(xml.as_bytes())?;
    Ok(([(header::CONTENT_TYPE, "application/gzip")], compressed).into_response())
}
