//! URL shortener service implementation.
//!
//! This crate provides [`ShortenerService`], which validates input and
//! allocates short codes against a [`Repository`](linktrack_core::Repository).
//! Core types are re-exported from `linktrack_core`.

pub mod service;
pub mod validate;

pub use linktrack_core::{ShortenParams, Shortener, ShortenerError};
pub use service::{ShortenerService, DEFAULT_MAX_ATTEMPTS};
