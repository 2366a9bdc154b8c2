use super::parse_code;
use crate::error::{AppError, Result};
use crate::model::{
    BulkItemResult, BulkRequest, BulkResponse, CreateLinkRequest, LinkResponse,
    LinkSummaryResponse, ListLinksQuery, UpdateLinkRequest, MAX_BULK_ITEMS,
};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use linktrack_core::{LinkFilter, ShortenParams};
use tracing::info;

pub async fn create_link_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<Json<LinkResponse>> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let link = state.shortener().shorten(request.into()).await?;
    info!(code = %link.code, target = %link.target_url, "created link");
    Ok(Json(LinkResponse::new(link, state.base_url())))
}

pub async fn bulk_create_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<BulkRequest>, JsonRejection>,
) -> Result<Json<BulkResponse>> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    if request.urls.is_empty() {
        return Err(AppError::BadRequest("no urls provided".to_string()));
    }
    if request.urls.len() > MAX_BULK_ITEMS {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_BULK_ITEMS} urls per request"
        )));
    }

    let batch: Vec<ShortenParams> = request.urls.iter().cloned().map(Into::into).collect();
    let outcomes = state.shortener().shorten_many(batch).await;

    let base_url = state.base_url();
    let results = request
        .urls
        .into_iter()
        .zip(outcomes)
        .map(|(item, outcome)| match outcome {
            Ok(link) => BulkItemResult {
                target_url: item.target_url,
                label: item.label,
                short_url: Some(link.code.to_url(base_url)),
                code: Some(link.code.into_inner()),
                success: true,
                error: None,
            },
            Err(err) => BulkItemResult {
                target_url: item.target_url,
                label: item.label,
                code: None,
                short_url: None,
                success: false,
                error: Some(if err.is_client_error() {
                    err.to_string()
                } else {
                    "internal server error".to_string()
                }),
            },
        })
        .collect();

    let response = BulkResponse::new(results);
    info!(
        total = response.total_count,
        succeeded = response.success_count,
        "bulk shorten finished"
    );
    Ok(Json(response))
}

pub async fn list_links_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListLinksQuery>, QueryRejection>,
) -> Result<Json<Vec<LinkSummaryResponse>>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let links = state.shortener().list(LinkFilter::from(query)).await?;
    let base_url = state.base_url();
    Ok(Json(
        links
            .into_iter()
            .map(|summary| LinkSummaryResponse::new(summary, base_url))
            .collect(),
    ))
}

pub async fn get_link_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<LinkResponse>> {
    let code = parse_code(&code)?;
    let link = state
        .shortener()
        .resolve(&code)
        .await?
        .ok_or_else(|| AppError::NotFound(code.to_string()))?;
    Ok(Json(LinkResponse::new(link, state.base_url())))
}

pub async fn update_link_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    payload: std::result::Result<Json<UpdateLinkRequest>, JsonRejection>,
) -> Result<Json<LinkResponse>> {
    let code = parse_code(&code)?;
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let update = request.metadata();
    let mut link = None;
    if !update.is_empty() {
        link = Some(state.shortener().update(&code, update).await?);
    }
    if let Some(active) = request.active {
        link = Some(state.shortener().set_active(&code, active).await?);
    }
    let link = match link {
        Some(link) => link,
        None => state
            .shortener()
            .resolve(&code)
            .await?
            .ok_or_else(|| AppError::NotFound(code.to_string()))?,
    };

    info!(code = %link.code, active = link.active, "updated link");
    Ok(Json(LinkResponse::new(link, state.base_url())))
}

/// Deactivates the link. Its code stays reserved and its clicks are kept.
pub async fn delete_link_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<LinkResponse>> {
    let code = parse_code(&code)?;
    let link = state.shortener().set_active(&code, false).await?;
    info!(code = %link.code, "deactivated link");
    Ok(Json(LinkResponse::new(link, state.base_url())))
}
