//! # Meridian API
//!
//! HTTP service for the multi-store sale/refund transaction engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Meridian API                                │
//! │                                                                     │
//! │  Client ──► axum routes ──► Services ──► SQLite (one transaction   │
//! │                                │          per sale/refund request) │
//! │                                ▼                                    │
//! │                              Redis     (post-commit invalidation,  │
//! │                                         fire-and-forget)           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod invalidation;
pub mod routes;
pub mod services;

pub use config::ApiConfig;
pub use error::{ApiError, ErrorCode};
pub use routes::{create_app, AppState};
