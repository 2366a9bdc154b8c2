mod link;
mod stats;

pub use link::*;
pub use stats::*;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
