use super::parse_code;
use crate::error::{AppError, Result};
use crate::model::{
    ClicksQuery, LinkStatsResponse, OverviewResponse, TimeseriesQuery, TimeseriesResponse,
};
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use linktrack_core::ClickEvent;
use linktrack_redirector::analytics::DEFAULT_RECENT_CLICKS;
use linktrack_redirector::Period;

pub async fn link_stats_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<LinkStatsResponse>> {
    let code = parse_code(&code)?;
    let report = state.analytics().link_report(&code).await?;
    Ok(Json(LinkStatsResponse::new(report, state.base_url())))
}

pub async fn link_clicks_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    query: std::result::Result<Query<ClicksQuery>, QueryRejection>,
) -> Result<Json<Vec<ClickEvent>>> {
    let code = parse_code(&code)?;
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_CLICKS);
    let clicks = state.analytics().recent_clicks(&code, limit).await?;
    Ok(Json(clicks))
}

pub async fn link_timeseries_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    query: std::result::Result<Query<TimeseriesQuery>, QueryRejection>,
) -> Result<Json<TimeseriesResponse>> {
    let code = parse_code(&code)?;
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let period = match query.period.as_deref() {
        Some(raw) => raw
            .parse::<Period>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => Period::default(),
    };

    let points = state.analytics().timeseries(&code, period).await?;
    Ok(Json(TimeseriesResponse {
        code: code.to_string(),
        period,
        bucket: period.bucket(),
        points,
    }))
}

pub async fn overview_handler(State(state): State<AppState>) -> Result<Json<OverviewResponse>> {
    let overview = state.analytics().overview().await?;
    Ok(Json(OverviewResponse::new(overview, state.base_url())))
}
