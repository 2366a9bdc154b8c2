use super::parse_code;
use crate::client::ClientVisit;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use linktrack_redirector::{RedirectOutcome, Visit};
use tracing::debug;

pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    ClientVisit(visit): ClientVisit,
) -> Result<Response> {
    follow(&state, &code, visit).await
}

/// Same as [`redirect_handler`], but the click is attributed to a QR scan.
pub async fn qr_redirect_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    ClientVisit(mut visit): ClientVisit,
) -> Result<Response> {
    visit.via_qr = true;
    follow(&state, &code, visit).await
}

async fn follow(state: &AppState, raw: &str, visit: Visit) -> Result<Response> {
    let code = parse_code(raw)?;
    match state.redirector().redirect(&code, visit).await? {
        RedirectOutcome::Redirect { target_url, .. } => {
            debug!(code = %code, target = %target_url, "redirecting");
            let location = HeaderValue::try_from(target_url)
                .map_err(|e| AppError::Internal(format!("unusable target for {code}: {e}")))?;
            // 302 rather than axum's 303 `Redirect::to`
            Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
        }
        RedirectOutcome::NotFound => Err(AppError::NotFound(code.into_inner())),
        RedirectOutcome::Gone => Err(AppError::Gone(code.into_inner())),
    }
}
