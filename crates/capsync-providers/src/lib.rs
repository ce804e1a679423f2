//! Calendar fetch boundary.
//!
//! This crate talks to the calendar provider and turns its payloads into
//! canonical [`Event`](capsync_core::Event)s:
//!
//! - [`Transport`] - the outbound request seam, with [`HttpTransport`] for
//!   real traffic and [`CannedTransport`] for tests
//! - [`CalendarFetcher`] - Calendar API v3 requests and pagination
//! - [`RawEvent`] - an opaque provider payload
//! - [`EventNormalizer`] - RawEvent to Event conversion
//! - [`ProviderError`] - failures that keep the upstream HTTP status
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Google API     │
//! └────────┬────────┘
//!          │  Transport (HttpTransport / CannedTransport)
//!          ▼
//! ┌─────────────────┐
//! │ CalendarFetcher │
//! └────────┬────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │  RawEvent   │
//!   └──────┬──────┘
//!          │ EventNormalizer
//!          ▼
//!   ┌─────────────┐
//!   │    Event    │
//!   └─────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use capsync_providers::{CalendarFetcher, EventNormalizer, HttpTransport};
//!
//! let transport = HttpTransport::new(GOOGLE_CALENDAR_API_BASE, Duration::from_secs(30))?;
//! let fetcher = CalendarFetcher::new(Arc::new(transport));
//! let raws = fetcher.list_events(token, "primary", &window).await?;
//! let batch = EventNormalizer::default().normalize_all(&raws, "primary");
//! ```

pub mod error;
pub mod fetcher;
#[cfg(feature = "http")]
pub mod http;
pub mod normalize;
pub mod raw_event;
pub mod transport;

// Re-export main types at crate root
pub use error::{MalformedEventError, ProviderError, ProviderErrorCode, ProviderResult};
pub use fetcher::{CalendarFetcher, MAX_RESULTS_PER_PAGE};
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use normalize::{EventNormalizer, NormalizedBatch, UNTITLED_EVENT};
pub use raw_event::{CalendarMeta, RawEvent};
pub use transport::{
    BoxFuture, CannedTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
