//! HTTP surface of linktrack.
//!
//! [`App::router`] builds the axum router over an [`AppState`]; the
//! `linktrack` binary wires it to a storage backend chosen by [`Config`].

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;
pub mod telemetry;

pub use app::App;
pub use config::Config;
pub use error::AppError;
pub use state::{AppState, StateOptions};
