//! Booking Service Library
//!
//! Account owners, identified by wallet addresses, publish weekly
//! availability; other parties book slots with them. Every participant of a
//! booked meeting receives their own encrypted copy of the meeting details,
//! readable only with a private key that is stored sealed under the
//! participant's wallet signature.
//!
//! # Architecture
//!
//! Handler -> Service -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `availability` - Pure bookability checks over weekly templates
//! - `config` - Service configuration from environment
//! - `crypto` - Key sealing and per-participant envelopes
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `models` - Data models
//! - `observability` - Metrics
//! - `repositories` - Storage seams and their PostgreSQL implementations
//! - `routes` - Axum router setup
//! - `services` - Slot allocation and account operations

pub mod availability;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
