//! Core types and traits for the linktrack URL shortener.
//!
//! This crate provides the domain model shared by the storage backends,
//! the shortener, the redirector and the HTTP gateway.

pub mod click;
pub mod error;
pub mod link;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use click::{
    ClickEvent, DeviceCount, LinkStats, NewClick, Overview, ReferrerCount, SourceCount, TimeBucket,
    TimeseriesPoint,
};
pub use error::{ShortenerError, StorageError};
pub use link::{FieldUpdate, LinkFilter, LinkSummary, LinkUpdate, NewLink, ShortLink};
pub use repository::{ClickRepository, ReadRepository, Repository};
pub use shortcode::ShortCode;
pub use shortener::{ShortenParams, Shortener};
