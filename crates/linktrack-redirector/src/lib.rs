//! Redirect handling, click recording and click analytics.
//!
//! [`RedirectorService`] implements the redirect state machine: unknown
//! codes are [`RedirectOutcome::NotFound`], deactivated ones
//! [`RedirectOutcome::Gone`], and active ones redirect after a best-effort
//! click insert. [`AnalyticsService`] answers the read-only statistics
//! queries. Both work over any repository implementing
//! [`ReadRepository`](linktrack_core::ReadRepository) and
//! [`ClickRepository`](linktrack_core::ClickRepository).

pub mod analytics;
pub mod error;
pub mod redirector;
pub mod service;
pub mod source;

pub use analytics::{Analytics, AnalyticsService, LinkReport, Period, UnknownPeriod};
pub use error::{RedirectorError, Result};
pub use redirector::{RedirectOutcome, Redirector, Visit};
pub use service::RedirectorService;
pub use source::classify_source;
