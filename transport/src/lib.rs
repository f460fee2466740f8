//! # Transport
//!
//! Single chokepoint for backend calls made by the organizer engine.
//!
//! ## Features
//!
//! - **Authentication**: bearer tokens with single-flight renewal on a 401
//! - **Caching**: TTL cache of reads keyed by exact request target
//! - **Invalidation**: boundary-aware prefix invalidation after mutations
//! - **Deduplication**: identical concurrent calls share one round-trip
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Transport                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ApiRequest ──► ResponseCache ──► SingleFlight ──► reqwest      │
//! │                      ▲                 │                        │
//! │                      │                 ▼ 401                    │
//! │                 invalidate      refresh (SingleFlight)          │
//! │                      │                 │                        │
//! │                 ApiResponse ◄──────────┘ CredentialStore        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod request;
pub mod response;
pub mod single_flight;
pub mod timestamp;

pub use cache::{CacheStats, CacheTicket, ResponseCache, derived_prefixes, prefix_matches};
pub use client::Transport;
pub use config::{BASE_URL_ENV, CACHE_TTL_ENV, TransportConfig};
pub use credentials::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use error::{ApiError, Result};
pub use request::ApiRequest;
pub use response::{ApiResponse, ListPayload};
pub use single_flight::SingleFlight;

pub use reqwest::Method;
