mod health;
mod links;
mod redirect;
mod stats;

pub use health::health_handler;
pub use links::{
    bulk_create_handler, create_link_handler, delete_link_handler, get_link_handler,
    list_links_handler, update_link_handler,
};
pub use redirect::{qr_redirect_handler, redirect_handler};
pub use stats::{
    link_clicks_handler, link_stats_handler, link_timeseries_handler, overview_handler,
};

use crate::error::AppError;
use linktrack_core::ShortCode;

/// A path segment that is not a well-formed code can never resolve.
fn parse_code(raw: &str) -> Result<ShortCode, AppError> {
    ShortCode::new(raw).map_err(|_| AppError::NotFound(raw.to_string()))
}
