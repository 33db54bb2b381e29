//! Service layer for the change-detection engine.
//!
//! This module contains:
//! - Outbound rate limiting (`RateLimiter`)
//! - Page fetching (`PageFetcher`, `HttpFetcher`)

mod fetcher;
mod limiter;

pub use fetcher::{Endpoint, HttpFetcher, PageFetcher};
pub use limiter::RateLimiter;
